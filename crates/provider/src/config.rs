//! Provider configuration and Kubernetes client construction

use std::path::PathBuf;

use kube::Client;
use kube::api::PatchParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use tracing::{debug, instrument};

use crate::Result;

/// Field manager used when none is configured
pub const DEFAULT_FIELD_MANAGER: &str = "crdform";

/// Settings shared by every resource operation
#[derive(clap::Args, Clone, Debug, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Kubeconfig file, the standard lookup (KUBECONFIG, ~/.kube/config, in-cluster) when unset
    #[arg(long, env = "CRDFORM_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use instead of the current one
    #[arg(long, env = "KUBE_CONTEXT")]
    pub context: Option<String>,

    /// Field manager owning the applied fields
    #[arg(long, env = "CRDFORM_FIELD_MANAGER", default_value = DEFAULT_FIELD_MANAGER)]
    pub field_manager: String,

    /// Take ownership of fields managed by others on conflict
    #[arg(long, env = "CRDFORM_FORCE_CONFLICTS")]
    pub force_conflicts: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            force_conflicts: false,
        }
    }
}

impl ProviderConfig {
    /// Parameters for server-side apply
    #[must_use]
    pub fn patch_params(&self) -> PatchParams {
        let params = PatchParams::apply(&self.field_manager);
        if self.force_conflicts {
            params.force()
        } else {
            params
        }
    }

    /// Builds a client from the configured kubeconfig and context
    ///
    /// # Errors
    /// Returns an error when no usable configuration is found
    #[instrument(skip(self), fields(kubeconfig = ?self.kubeconfig, context = ?self.context))]
    pub async fn client(&self) -> Result<Client> {
        let options = KubeConfigOptions {
            context: self.context.clone(),
            ..KubeConfigOptions::default()
        };

        let config = match (&self.kubeconfig, &self.context) {
            (Some(path), _) => {
                let kubeconfig = Kubeconfig::read_from(path)?;
                kube::Config::from_custom_kubeconfig(kubeconfig, &options).await?
            }
            (None, Some(_)) => kube::Config::from_kubeconfig(&options).await?,
            (None, None) => kube::Config::infer().await?,
        };

        debug!(cluster_url = %config.cluster_url, "kubernetes client configured");
        Ok(Client::try_from(config)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        provider: ProviderConfig,
    }

    fn parse(args: &[&str]) -> ProviderConfig {
        Cli::try_parse_from(std::iter::once("crdform").chain(args.iter().copied()))
            .unwrap()
            .provider
    }

    #[test]
    fn defaults() {
        temp_env::with_vars_unset(
            [
                "CRDFORM_KUBECONFIG",
                "KUBE_CONTEXT",
                "CRDFORM_FIELD_MANAGER",
                "CRDFORM_FORCE_CONFLICTS",
            ],
            || {
                assert_eq!(parse(&[]), ProviderConfig::default());
            },
        );
    }

    #[test]
    fn environment() {
        temp_env::with_vars(
            [
                ("CRDFORM_FIELD_MANAGER", Some("terraform")),
                ("CRDFORM_FORCE_CONFLICTS", Some("true")),
                ("KUBE_CONTEXT", Some("kind-dev")),
            ],
            || {
                let config = parse(&[]);
                assert_eq!(config.field_manager, "terraform");
                assert!(config.force_conflicts);
                assert_eq!(config.context.as_deref(), Some("kind-dev"));
            },
        );
    }

    #[test]
    fn kubeconfig_variable_is_left_to_the_standard_lookup() {
        temp_env::with_vars(
            [
                ("CRDFORM_KUBECONFIG", None),
                ("KUBECONFIG", Some("/etc/kube/admin.conf")),
            ],
            || assert_eq!(parse(&[]).kubeconfig, None),
        );
        temp_env::with_var("CRDFORM_KUBECONFIG", Some("/etc/kube/ci.conf"), || {
            assert_eq!(parse(&[]).kubeconfig, Some(PathBuf::from("/etc/kube/ci.conf")));
        });
    }

    #[test]
    fn flags_win_over_environment() {
        temp_env::with_var("CRDFORM_FIELD_MANAGER", Some("terraform"), || {
            let config = parse(&["--field-manager", "ci"]);
            assert_eq!(config.field_manager, "ci");
        });
    }

    #[test]
    fn patch_params_follow_force() {
        let params = ProviderConfig::default().patch_params();
        assert_eq!(params.field_manager.as_deref(), Some("crdform"));
        assert!(!params.force);

        let forced = ProviderConfig {
            force_conflicts: true,
            ..ProviderConfig::default()
        }
        .patch_params();
        assert!(forced.force);
    }

    #[tokio::test]
    async fn missing_kubeconfig_file() {
        let config = ProviderConfig {
            kubeconfig: Some("/nonexistent/kubeconfig".into()),
            ..ProviderConfig::default()
        };
        assert!(matches!(
            config.client().await,
            Err(crate::Error::KubeconfigError(_))
        ));
    }
}
