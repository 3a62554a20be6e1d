//! crdform entrypoint

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use crdform::manifest::render_manifest;
use crdform::resource::resolve_kind;
use crdform::{DynamicResource, ProviderConfig, ResolvedKind, ResourceModel, telemetry};
use crdform_crd::Catalog;
use tracing::{info, instrument};

#[derive(Parser)]
#[command(
    name = "crdform",
    version,
    about = "Manage Kubernetes custom resources with server-side apply"
)]
struct Cli {
    #[command(flatten)]
    provider: ProviderConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply a resource file and wait for its upsert conditions
    Apply {
        /// YAML or JSON resource file
        file: PathBuf,
    },
    /// Print the live state of a resource file's object
    Get {
        /// YAML or JSON resource file
        file: PathBuf,
    },
    /// Delete a resource file's object and wait for it to disappear
    Delete {
        /// YAML or JSON resource file
        file: PathBuf,
    },
    /// Print an existing object as a resource file
    Import {
        /// Provider type name, see `kinds`
        type_name: String,
        /// `namespace/name`, or `name` for cluster-scoped kinds
        id: String,
    },
    /// Render a resource file as a Kubernetes manifest
    Manifest {
        /// YAML or JSON resource file
        file: PathBuf,
    },
    /// List the built-in kinds
    Kinds,
}

fn load(path: &Path) -> anyhow::Result<ResourceModel> {
    let doc = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    ResourceModel::from_yaml(&doc).with_context(|| format!("parsing {}", path.display()))
}

async fn connect(
    config: &ProviderConfig,
    catalog: &Catalog,
    model: &ResourceModel,
) -> anyhow::Result<DynamicResource> {
    let client = config.client().await?;
    let kind = resolve_kind(&client, catalog, &model.api_version, &model.kind).await?;
    Ok(DynamicResource::new(client, kind, config))
}

#[instrument(skip_all)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let catalog = Catalog::builtin();
    let config = &cli.provider;

    match cli.command {
        Command::Apply { file } => {
            let model = load(&file)?;
            let resource = connect(config, &catalog, &model).await?;
            let state = resource.apply(&model).await?;
            info!(id = %state.id(), "applied");
            print!("{}", serde_yaml::to_string(&state)?);
        }
        Command::Get { file } => {
            let model = load(&file)?;
            let resource = connect(config, &catalog, &model).await?;
            match resource.read(&model).await? {
                Some(state) => print!("{}", serde_yaml::to_string(&state)?),
                None => bail!("{} {} not found", model.kind, model.id()),
            }
        }
        Command::Delete { file } => {
            let model = load(&file)?;
            let resource = connect(config, &catalog, &model).await?;
            resource.delete(&model).await?;
            info!(id = %model.id(), "deleted");
        }
        Command::Import { type_name, id } => {
            let entry = catalog
                .by_type_name(&type_name)
                .with_context(|| format!("unknown type {type_name}, see `crdform kinds`"))?;
            let client = config.client().await?;
            let resource = DynamicResource::new(client, ResolvedKind::from(entry), config);
            let state = resource.import(&id).await?;
            print!("{}", serde_yaml::to_string(&state)?);
        }
        Command::Manifest { file } => {
            let model = load(&file)?;
            print!("{}", render_manifest(&model)?);
        }
        Command::Kinds => {
            for entry in catalog.entries() {
                let ar = entry.api_resource();
                let scope = if entry.namespaced() {
                    "Namespaced"
                } else {
                    "Cluster"
                };
                println!("{}\t{}\t{}\t{scope}", entry.type_name(), ar.api_version, ar.kind);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let telemetry = telemetry::init()?;

    let result = run(cli).await;
    telemetry.shutdown();
    result
}
