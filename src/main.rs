//! LVM operator - node-local LogicalVolume controller

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{DynamicObject, Patch, PatchParams};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lvm_operator::controller::{error_policy, reconcile, Context, ControllerConfig, FIELD_MANAGER};
use lvm_operator::crd::{crd_for, SchemaGroup};
use lvm_operator::{DEFAULT_LVMD_ENDPOINT, DEFAULT_MOUNT_ROOT, DEFAULT_REQUEUE_SECS};

/// LVM operator - provisions, expands, snapshots and deletes LVM logical volumes
#[derive(Parser, Debug)]
#[command(name = "lvm-operator", version, about, long_about = None)]
struct Cli {
    /// Print the LogicalVolume CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Serve the legacy API group instead of the current one
    #[arg(long, env = "USE_LEGACY", global = true)]
    legacy: bool,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the LogicalVolume controller for one node (default mode)
    Controller(ControllerArgs),
}

/// Controller mode arguments
#[derive(Parser, Debug)]
struct ControllerArgs {
    /// Node whose LogicalVolumes this instance reconciles
    #[arg(long, env = "NODE_NAME")]
    node_name: String,

    /// Volume-management service address (`unix://` socket or `http://` URL)
    #[arg(long, env = "LVMD_ENDPOINT", default_value = DEFAULT_LVMD_ENDPOINT)]
    lvmd_endpoint: String,

    /// Host directory volumes are mounted under for snapshot executors
    #[arg(long, env = "MOUNT_ROOT", default_value = DEFAULT_MOUNT_ROOT)]
    mount_root: PathBuf,

    /// Snapshot executor image
    #[arg(long, env = "EXECUTOR_IMAGE")]
    executor_image: Option<String>,

    /// Namespace snapshot executor Jobs run in
    #[arg(long, env = "EXECUTOR_NAMESPACE")]
    executor_namespace: Option<String>,

    /// Seconds to wait before re-checking a pending external event
    #[arg(long, default_value_t = DEFAULT_REQUEUE_SECS)]
    requeue_secs: u64,

    /// Skip installing the CRD on startup
    #[arg(long)]
    skip_crd_install: bool,
}

impl ControllerArgs {
    fn into_config(self, schema: SchemaGroup) -> ControllerConfig {
        let mut config = ControllerConfig::new(self.node_name);
        config.schema = schema;
        config.lvmd_endpoint = self.lvmd_endpoint;
        config.mount_root = self.mount_root;
        config.requeue_after = Duration::from_secs(self.requeue_secs);
        if let Some(image) = self.executor_image {
            config.executor_image = image;
        }
        if let Some(namespace) = self.executor_namespace {
            config.executor_namespace = namespace;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let registry = tracing_subscriber::registry().with(EnvFilter::from_default_env());
    if cli.log_json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    let schema = if cli.legacy {
        SchemaGroup::Legacy
    } else {
        SchemaGroup::Current
    };

    if cli.crd {
        let crd = serde_yaml::to_string(&crd_for(schema))
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    match cli.command {
        Some(Commands::Controller(args)) => run_controller(args, schema).await,
        None => Err(anyhow::anyhow!(
            "no command given; run `lvm-operator controller --node-name <NODE>`"
        )),
    }
}

/// Install the LogicalVolume CRD with server-side apply
///
/// The controller installs its own CRD so the schema always matches the binary.
async fn ensure_crd_installed(client: &Client, schema: SchemaGroup) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();
    let crd = crd_for(schema);
    let name = crd.metadata.name.clone().unwrap_or_default();

    tracing::info!(crd = %name, "Installing LogicalVolume CRD...");
    crds.patch(&name, &params, &Patch::Apply(&crd))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to install LogicalVolume CRD: {}", e))?;
    Ok(())
}

async fn run_controller(args: ControllerArgs, schema: SchemaGroup) -> anyhow::Result<()> {
    let skip_crd_install = args.skip_crd_install;
    let config = args.into_config(schema);
    tracing::info!(
        node = %config.node_name,
        group = schema.group(),
        lvmd = %config.lvmd_endpoint,
        "Starting LogicalVolume controller"
    );

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if !skip_crd_install {
        ensure_crd_installed(&client, schema).await?;
    }

    let ctx = Arc::new(
        Context::builder(client.clone(), config)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build controller context: {}", e))?,
    );

    let resource = schema.api_resource();
    let volumes: Api<DynamicObject> = Api::all_with(client, &resource);

    Controller::new_with(volumes, WatcherConfig::default(), resource)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "LogicalVolume reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "LogicalVolume reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("LVM operator shutting down");
    Ok(())
}
