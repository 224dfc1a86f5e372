//! Controller context and configuration

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use kube::Client;

use super::client::{KubeClient, KubeStore};
use crate::crd::{MetadataKeys, SchemaGroup};
use crate::executor::{ExecutorFactory, JobExecutorFactory, JobSettings};
use crate::lvmd::{GrpcVolumeService, VolumeService};
use crate::mount::{HostMounter, Mounter};
use crate::retry::RetryConfig;
use crate::{Error, DEFAULT_LVMD_ENDPOINT, DEFAULT_MOUNT_ROOT, DEFAULT_REQUEUE_SECS};

/// Settings of one node-local controller instance
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Node this instance reconciles volumes for
    pub node_name: String,
    /// API group LogicalVolumes are served under
    pub schema: SchemaGroup,
    /// Volume-management daemon address (`unix://` or `http://`)
    pub lvmd_endpoint: String,
    /// Host directory volumes are mounted under for executors
    pub mount_root: PathBuf,
    /// Executor Job image
    pub executor_image: String,
    /// Namespace executor Jobs run in
    pub executor_namespace: String,
    /// Delay before re-checking a pending external event
    pub requeue_after: Duration,
}

impl ControllerConfig {
    /// Config with defaults for everything but the node name
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            schema: SchemaGroup::default(),
            lvmd_endpoint: DEFAULT_LVMD_ENDPOINT.to_string(),
            mount_root: PathBuf::from(DEFAULT_MOUNT_ROOT),
            executor_image: "ghcr.io/lvm-operator/snapshot-executor:latest".to_string(),
            executor_namespace: "lvm-system".to_string(),
            requeue_after: Duration::from_secs(DEFAULT_REQUEUE_SECS),
        }
    }

    /// Executor Job settings derived from this config
    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            namespace: self.executor_namespace.clone(),
            image: self.executor_image.clone(),
            mount_root: self.mount_root.clone(),
            owner_api_version: self.schema.api_version(),
        }
    }
}

/// Controller context containing shared state and clients
///
/// The context is shared across all reconciliation calls and holds the
/// clients for every collaborator. Nothing in it changes between passes.
///
/// ```ignore
/// let ctx = Context::builder(client, ControllerConfig::new("node-a")).build()?;
/// ```
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Volume-management service
    pub volumes: Arc<dyn VolumeService>,
    /// Mount management for executors
    pub mounter: Arc<dyn Mounter>,
    /// Executor construction
    pub executors: Arc<dyn ExecutorFactory>,
    /// Instance configuration
    pub config: ControllerConfig,
    /// Finalizer and annotation keys for the configured group
    pub keys: MetadataKeys,
    /// Backoff for conflicting writes
    pub retry: RetryConfig,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client, config: ControllerConfig) -> ContextBuilder {
        ContextBuilder::new(client, config)
    }

    /// Create a context for testing with custom mock clients
    #[cfg(test)]
    pub fn for_testing(
        kube: Arc<dyn KubeClient>,
        volumes: Arc<dyn VolumeService>,
        mounter: Arc<dyn Mounter>,
        executors: Arc<dyn ExecutorFactory>,
        node_name: &str,
    ) -> Self {
        let config = ControllerConfig::new(node_name);
        Self {
            kube,
            volumes,
            mounter,
            executors,
            keys: config.schema.keys(),
            config,
            retry: RetryConfig::immediate(5),
        }
    }
}

/// Builder for constructing [`Context`] instances
///
/// Wires the production collaborators: the API server store, the gRPC
/// volume service, host mounts and executor Jobs.
pub struct ContextBuilder {
    client: Client,
    config: ControllerConfig,
}

impl ContextBuilder {
    fn new(client: Client, config: ControllerConfig) -> Self {
        Self { client, config }
    }

    /// Build the Context
    ///
    /// Fails only when the volume-management endpoint cannot be parsed.
    pub fn build(self) -> Result<Context, Error> {
        let config = self.config;

        let volumes: Arc<dyn VolumeService> =
            Arc::new(GrpcVolumeService::connect_lazy(&config.lvmd_endpoint)?);
        let kube: Arc<dyn KubeClient> = Arc::new(KubeStore::new(self.client.clone(), config.schema));
        let mounter: Arc<dyn Mounter> =
            Arc::new(HostMounter::new(volumes.clone(), &config.mount_root));
        let executors: Arc<dyn ExecutorFactory> = Arc::new(JobExecutorFactory::new(
            self.client,
            config.job_settings(),
        ));

        Ok(Context {
            kube,
            volumes,
            mounter,
            executors,
            keys: config.schema.keys(),
            config,
            retry: RetryConfig::default(),
        })
    }
}
