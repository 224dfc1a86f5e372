//! Snapshot executors
//!
//! An executor is one opaque unit of work for a snapshot workflow: copy a
//! volume out to the backup repository, populate it back, delete a repository
//! snapshot, or tear down what a previous executor left behind. The
//! controller only learns whether launching it succeeded; the work itself
//! reports progress by patching `status.snapshot` on the LogicalVolume.
//!
//! Executors run as Kubernetes Jobs pinned to the volume's node, with the
//! controller's mount root bind-mounted so the Job sees the mounted volume.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, HostPathVolumeSource, PodSpec, PodTemplateSpec, SecurityContext, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{Api, DeleteParams, PostParams, PropagationPolicy};
use kube::{Client, ResourceExt};
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::crd::{
    LogicalVolume, SnapshotOperation, VolumeSnapshotClass, VolumeSnapshotContent,
    CREATED_BY_LABEL, CREATED_BY_VALUE,
};
use crate::mount::MountResponse;
use crate::Error;

/// Label carrying the uid of the LogicalVolume an executor works on
pub const LOGICAL_VOLUME_LABEL: &str = "lvm-operator.io/logical-volume";

/// Kind of executor to run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutorKind {
    /// Copy the mounted volume to the backup repository
    Backup,
    /// Populate the mounted volume from the backup repository
    Restore,
    /// Delete the repository snapshot of a volume being deleted
    ///
    /// Its Job has no owner and no cleanup step; the finished Job is only
    /// removed by `ttlSecondsAfterFinished` ([`JOB_TTL_SECONDS`]).
    Delete,
    /// Remove what the executor of the given workflow left behind
    Cleanup(SnapshotOperation),
}

impl ExecutorKind {
    /// Operation name used in Job names and executor arguments
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Backup => "backup",
            Self::Restore => "restore",
            Self::Delete => "delete",
            Self::Cleanup(_) => "cleanup",
        }
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cleanup(op) => write!(f, "cleanup-{}", op),
            other => f.write_str(other.operation()),
        }
    }
}

/// Everything an executor needs to know about the work it does
#[derive(Clone, Debug)]
pub struct ExecutorRequest {
    /// Executor kind
    pub kind: ExecutorKind,
    /// Volume the executor works on
    pub lv: LogicalVolume,
    /// Where the volume is mounted, for backup and restore
    pub mount: Option<MountResponse>,
    /// Snapshot content the workflow belongs to
    pub content: Option<VolumeSnapshotContent>,
    /// Snapshot class configuring the backup repository
    pub class: Option<VolumeSnapshotClass>,
    /// Name of the LogicalVolume whose backup is restored
    pub source: Option<String>,
    /// Repository snapshot to restore from or delete
    pub snapshot_id: Option<String>,
}

impl ExecutorRequest {
    /// Request with no mount or snapshot context
    pub fn new(kind: ExecutorKind, lv: LogicalVolume) -> Self {
        Self {
            kind,
            lv,
            mount: None,
            content: None,
            class: None,
            source: None,
            snapshot_id: None,
        }
    }

    /// Attach the mount the executor should work in
    pub fn with_mount(mut self, mount: MountResponse) -> Self {
        self.mount = Some(mount);
        self
    }

    /// Attach snapshot content and class
    pub fn with_snapshot(
        mut self,
        content: Option<VolumeSnapshotContent>,
        class: Option<VolumeSnapshotClass>,
    ) -> Self {
        self.content = content;
        self.class = class;
        self
    }

    /// Attach the restore source
    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    /// Attach the repository snapshot id, ignoring empty ids
    pub fn with_snapshot_id(mut self, snapshot_id: Option<String>) -> Self {
        self.snapshot_id = snapshot_id.filter(|id| !id.is_empty());
        self
    }
}

/// A launched-once unit of snapshot work
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Executor: Send + Sync {
    /// Start the work; returns once it has been handed off
    async fn execute(&self) -> Result<(), Error>;
}

/// Builds executors for requests
#[cfg_attr(test, automock)]
pub trait ExecutorFactory: Send + Sync {
    /// Executor for `request`
    fn executor(&self, request: ExecutorRequest) -> Box<dyn Executor>;
}

/// Settings for executor Jobs
#[derive(Clone, Debug)]
pub struct JobSettings {
    /// Namespace the Jobs run in
    pub namespace: String,
    /// Executor container image
    pub image: String,
    /// Host directory volumes are mounted under
    pub mount_root: PathBuf,
    /// apiVersion of the watched LogicalVolume group, for owner references
    pub owner_api_version: String,
}

/// [`ExecutorFactory`] running executors as Kubernetes Jobs
pub struct JobExecutorFactory {
    client: Client,
    settings: JobSettings,
}

impl JobExecutorFactory {
    /// Create a factory for Jobs in `settings.namespace`
    pub fn new(client: Client, settings: JobSettings) -> Self {
        Self { client, settings }
    }
}

impl ExecutorFactory for JobExecutorFactory {
    fn executor(&self, request: ExecutorRequest) -> Box<dyn Executor> {
        let jobs: Api<Job> = Api::namespaced(self.client.clone(), &self.settings.namespace);
        match request.kind {
            ExecutorKind::Cleanup(op) => Box::new(CleanupJobExecutor {
                jobs,
                name: request.lv.uid().map(|uid| job_name(op_kind(op).operation(), &uid)),
            }),
            _ => Box::new(LaunchJobExecutor {
                jobs,
                job: build_executor_job(&request, &self.settings),
            }),
        }
    }
}

fn op_kind(op: SnapshotOperation) -> ExecutorKind {
    match op {
        SnapshotOperation::Backup => ExecutorKind::Backup,
        SnapshotOperation::Restore => ExecutorKind::Restore,
    }
}

/// Creates the executor Job; an existing Job counts as launched
struct LaunchJobExecutor {
    jobs: Api<Job>,
    job: Result<Job, Error>,
}

#[async_trait]
impl Executor for LaunchJobExecutor {
    async fn execute(&self) -> Result<(), Error> {
        let job = match &self.job {
            Ok(job) => job,
            Err(e) => return Err(Error::executor(e.to_string())),
        };
        let name = job.name_any();
        match self.jobs.create(&PostParams::default(), job).await {
            Ok(_) => {
                info!(job = %name, "Launched executor job");
                Ok(())
            }
            Err(e) => {
                let err = Error::from(e);
                if err.is_already_exists() {
                    debug!(job = %name, "Executor job already exists");
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }
}

/// Deletes the Job of a finished workflow; a missing Job counts as cleaned
struct CleanupJobExecutor {
    jobs: Api<Job>,
    name: Option<String>,
}

#[async_trait]
impl Executor for CleanupJobExecutor {
    async fn execute(&self) -> Result<(), Error> {
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| Error::executor("logical volume has no uid"))?;
        let params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            ..Default::default()
        };
        match self.jobs.delete(name, &params).await {
            Ok(_) => {
                info!(job = %name, "Deleted executor job");
                Ok(())
            }
            Err(e) => {
                let err = Error::from(e);
                if err.is_not_found() {
                    debug!(job = %name, "Executor job already gone");
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }
}

/// Seconds a finished executor Job is kept before the API server removes it
pub const JOB_TTL_SECONDS: i32 = 300;

/// Job name for an executor operation on a LogicalVolume
pub fn job_name(operation: &str, lv_uid: &str) -> String {
    format!("lv-{}-{}", operation, lv_uid)
}

/// Build the Job for a backup, restore or delete executor.
///
/// The Job:
/// - Runs on the volume's node (`nodeName`)
/// - Mounts the controller's mount root from the host
/// - Passes the operation, volume and snapshot context as args
/// - Is owned by the LogicalVolume, except for delete which outlives it and
///   is left to the finished-Job TTL
pub fn build_executor_job(request: &ExecutorRequest, settings: &JobSettings) -> Result<Job, Error> {
    let lv = &request.lv;
    let uid = lv.uid_or_err()?;
    let operation = request.kind.operation();
    let name = job_name(operation, &uid);
    let mount_root = settings.mount_root.display().to_string();

    let mut args = vec![
        operation.to_string(),
        format!("--logical-volume={}", lv.name_any()),
        format!("--volume-id={}", lv.volume_id()),
        format!("--device-class={}", lv.spec.device_class),
    ];
    match (&request.kind, &request.mount) {
        (ExecutorKind::Backup | ExecutorKind::Restore, Some(mount)) => {
            args.push(format!("--mount-path={}", mount.mount_path));
        }
        (ExecutorKind::Backup | ExecutorKind::Restore, None) => {
            return Err(Error::executor(format!(
                "{} executor for {} needs a mounted volume",
                operation,
                lv.name_any()
            )));
        }
        _ => {}
    }
    if let Some(source) = &request.source {
        args.push(format!("--source={}", source));
    }
    if let Some(snapshot_id) = &request.snapshot_id {
        args.push(format!("--snapshot-id={}", snapshot_id));
    }
    if let Some(content) = &request.content {
        args.push(format!(
            "--snapshot-content={}",
            content.metadata.name.as_deref().unwrap_or_default()
        ));
    }
    if let Some(class) = &request.class {
        args.push(format!(
            "--snapshot-class={}",
            class.metadata.name.as_deref().unwrap_or_default()
        ));
        for (key, value) in &class.parameters {
            args.push(format!("--param={}={}", key, value));
        }
    }

    let mut labels = BTreeMap::new();
    labels.insert(CREATED_BY_LABEL.to_string(), CREATED_BY_VALUE.to_string());
    labels.insert(LOGICAL_VOLUME_LABEL.to_string(), uid.clone());

    let container = Container {
        name: "executor".to_string(),
        image: Some(settings.image.clone()),
        args: Some(args),
        volume_mounts: Some(vec![VolumeMount {
            name: "mount-root".to_string(),
            mount_path: mount_root.clone(),
            mount_propagation: Some("HostToContainer".to_string()),
            ..Default::default()
        }]),
        security_context: Some(SecurityContext {
            privileged: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };

    let volume = Volume {
        name: "mount-root".to_string(),
        host_path: Some(HostPathVolumeSource {
            path: mount_root,
            type_: Some("DirectoryOrCreate".to_string()),
        }),
        ..Default::default()
    };

    // The delete Job must survive garbage collection of its LogicalVolume
    let owner_references = match request.kind {
        ExecutorKind::Delete => None,
        _ => Some(vec![OwnerReference {
            api_version: settings.owner_api_version.clone(),
            kind: "LogicalVolume".to_string(),
            name: lv.name_any(),
            uid,
            controller: Some(true),
            block_owner_deletion: Some(true),
        }]),
    };

    Ok(Job {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(settings.namespace.clone()),
            labels: Some(labels.clone()),
            owner_references,
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(3),
            ttl_seconds_after_finished: Some(JOB_TTL_SECONDS),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    node_name: Some(lv.spec.node_name.clone()),
                    containers: vec![container],
                    volumes: Some(vec![volume]),
                    restart_policy: Some("Never".to_string()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}
