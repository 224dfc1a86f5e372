//! In-memory collaborators for driving whole reconcile passes in tests
//!
//! [`FakeCluster`] plays both the resource store and the volume-management
//! service. Writes are checked against resourceVersion like the API server
//! does, and an object with a deletion timestamp disappears once its last
//! finalizer is removed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;

use super::client::KubeClient;
use super::context::Context;
use crate::crd::{
    LogicalVolume, LogicalVolumeSpec, LogicalVolumeStatus, SnapshotReference, StatusCode,
    VolumeSnapshotClass, VolumeSnapshotContent, VolumeSnapshotContentSpec, CREATED_BY_LABEL,
    CREATED_BY_VALUE, SNAPSHOT_MODE_PARAMETER,
};
use crate::executor::{Executor, ExecutorFactory, ExecutorKind, ExecutorRequest};
use crate::lvmd::{Volume, VolumeService};
use crate::mount::{MountOptions, MountResponse, Mounter};
use crate::Error;

pub const NODE: &str = "node-a";
pub const DEVICE_CLASS: &str = "ssd";
pub const GI: i64 = 1024 * 1024 * 1024;

/// Remote and store calls observed by the fake
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Calls {
    pub create: usize,
    pub create_snapshot: usize,
    pub resize: usize,
    pub remove: usize,
    pub status_writes: usize,
    pub metadata_writes: usize,
}

#[derive(Default)]
struct State {
    volumes: BTreeMap<String, LogicalVolume>,
    resource_version: u64,
    persistent_volumes: BTreeSet<String>,
    contents: BTreeMap<String, VolumeSnapshotContent>,
    classes: BTreeMap<String, VolumeSnapshotClass>,
    backing: BTreeMap<String, (String, Volume)>,
    pending_conflicts: usize,
    calls: Calls,
}

impl State {
    fn next_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    fn check_write(&mut self, lv: &LogicalVolume) -> Result<String, Error> {
        let name = lv.name_any();
        let stored = self
            .volumes
            .get(&name)
            .ok_or_else(|| Error::internal(format!("{} not found", name)))?;
        if self.pending_conflicts > 0 {
            self.pending_conflicts -= 1;
            return Err(Error::conflict("injected conflict"));
        }
        if stored.resource_version() != lv.resource_version() {
            return Err(Error::conflict(format!("{} has been modified", name)));
        }
        Ok(name)
    }
}

/// Resource store and volume service backed by maps
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Store `lv`, assigning a uid and resourceVersion
    pub fn insert(&self, mut lv: LogicalVolume) {
        let mut state = self.state();
        if lv.metadata.uid.is_none() {
            lv.metadata.uid = Some(format!("uid-{}", lv.name_any()));
        }
        lv.metadata.resource_version = Some(state.next_version());
        state.volumes.insert(lv.name_any(), lv);
    }

    /// Current stored copy of a LogicalVolume
    pub fn volume(&self, name: &str) -> Option<LogicalVolume> {
        self.state().volumes.get(name).cloned()
    }

    /// Change a stored LogicalVolume the way another writer would
    pub fn modify(&self, name: &str, f: impl FnOnce(&mut LogicalVolume)) {
        let mut state = self.state();
        let version = state.next_version();
        let lv = state.volumes.get_mut(name).unwrap();
        f(lv);
        lv.metadata.resource_version = Some(version);
    }

    pub fn calls(&self) -> Calls {
        self.state().calls.clone()
    }

    pub fn backing_volume(&self, name: &str) -> Option<Volume> {
        self.state().backing.get(name).map(|(_, v)| v.clone())
    }

    pub fn add_backing_volume(&self, name: &str, size_bytes: i64) {
        self.state().backing.insert(
            name.to_string(),
            (
                DEVICE_CLASS.to_string(),
                Volume {
                    name: name.to_string(),
                    size_bytes,
                    path: format!("/dev/{}/{}", DEVICE_CLASS, name),
                },
            ),
        );
    }

    pub fn add_persistent_volume(&self, name: &str) {
        self.state().persistent_volumes.insert(name.to_string());
    }

    /// Register `snapcontent-<id>` for the volume `snapshot-<id>` with a class in `mode`
    pub fn add_snapshot(&self, id: &str, mode: &str) {
        let class_name = format!("class-{}", mode);
        let mut class = VolumeSnapshotClass::default();
        class.metadata.name = Some(class_name.clone());
        class.driver = "topolvm.io".to_string();
        class
            .parameters
            .insert(SNAPSHOT_MODE_PARAMETER.to_string(), mode.to_string());

        let mut content = VolumeSnapshotContent::default();
        content.metadata.name = Some(format!("snapcontent-{}", id));
        content.spec = VolumeSnapshotContentSpec {
            driver: "topolvm.io".to_string(),
            deletion_policy: "Delete".to_string(),
            volume_snapshot_class_name: Some(class_name.clone()),
            volume_snapshot_ref: SnapshotReference {
                name: format!("snap-{}", id),
                namespace: "default".to_string(),
                uid: None,
            },
        };

        let mut state = self.state();
        state.classes.insert(class_name, class);
        state
            .contents
            .insert(format!("snapcontent-{}", id), content);
    }

    /// Make the next `n` LogicalVolume writes fail with a conflict
    pub fn inject_conflicts(&self, n: usize) {
        self.state().pending_conflicts = n;
    }
}

#[async_trait]
impl KubeClient for FakeCluster {
    async fn get_logical_volume(&self, name: &str) -> Result<Option<LogicalVolume>, Error> {
        Ok(self.volume(name))
    }

    async fn patch_logical_volume_metadata(
        &self,
        lv: &LogicalVolume,
    ) -> Result<LogicalVolume, Error> {
        let mut state = self.state();
        let name = state.check_write(lv)?;
        let version = state.next_version();
        state.calls.metadata_writes += 1;

        let stored = state
            .volumes
            .get_mut(&name)
            .ok_or_else(|| Error::internal("vanished"))?;
        stored.metadata.finalizers = lv.metadata.finalizers.clone();
        stored.metadata.labels = lv.metadata.labels.clone();
        stored.metadata.annotations = lv.metadata.annotations.clone();
        stored.metadata.resource_version = Some(version);
        let updated = stored.clone();

        if updated.metadata.deletion_timestamp.is_some() && updated.finalizers().is_empty() {
            state.volumes.remove(&name);
        }
        Ok(updated)
    }

    async fn patch_logical_volume_status(
        &self,
        lv: &LogicalVolume,
    ) -> Result<LogicalVolume, Error> {
        let mut state = self.state();
        let name = state.check_write(lv)?;
        let version = state.next_version();
        state.calls.status_writes += 1;

        let stored = state
            .volumes
            .get_mut(&name)
            .ok_or_else(|| Error::internal("vanished"))?;
        stored.status = lv.status.clone();
        stored.metadata.resource_version = Some(version);
        Ok(stored.clone())
    }

    async fn persistent_volume_exists(&self, name: &str) -> Result<bool, Error> {
        Ok(self.state().persistent_volumes.contains(name))
    }

    async fn get_volume_snapshot_content(
        &self,
        name: &str,
    ) -> Result<Option<VolumeSnapshotContent>, Error> {
        Ok(self.state().contents.get(name).cloned())
    }

    async fn get_volume_snapshot_class(
        &self,
        name: &str,
    ) -> Result<Option<VolumeSnapshotClass>, Error> {
        Ok(self.state().classes.get(name).cloned())
    }
}

#[async_trait]
impl VolumeService for FakeCluster {
    async fn create_volume(
        &self,
        name: &str,
        device_class: &str,
        size_bytes: i64,
        _lvcreate_option_class: &str,
    ) -> Result<Volume, Error> {
        let volume = Volume {
            name: name.to_string(),
            size_bytes,
            path: format!("/dev/{}/{}", device_class, name),
        };
        let mut state = self.state();
        state.calls.create += 1;
        state
            .backing
            .insert(name.to_string(), (device_class.to_string(), volume.clone()));
        Ok(volume)
    }

    async fn create_snapshot_volume(
        &self,
        name: &str,
        _device_class: &str,
        source_volume_id: &str,
        size_bytes: i64,
        _access_type: &str,
    ) -> Result<Volume, Error> {
        self.state().calls.create_snapshot += 1;
        if self.backing_volume(source_volume_id).is_none() {
            return Err(Error::rpc(StatusCode::NotFound, "source volume not found"));
        }
        self.add_backing_volume(name, size_bytes);
        self.backing_volume(name)
            .ok_or_else(|| Error::internal("create lost"))
    }

    async fn resize_volume(
        &self,
        name: &str,
        _device_class: &str,
        size_bytes: i64,
    ) -> Result<i64, Error> {
        let mut state = self.state();
        state.calls.resize += 1;
        let (_, volume) = state
            .backing
            .get_mut(name)
            .ok_or_else(|| Error::rpc(StatusCode::NotFound, "volume not found"))?;
        volume.size_bytes = size_bytes;
        Ok(size_bytes)
    }

    async fn remove_volume(&self, name: &str, _device_class: &str) -> Result<(), Error> {
        let mut state = self.state();
        state.calls.remove += 1;
        state
            .backing
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::rpc(StatusCode::NotFound, "volume not found"))
    }

    async fn list_volumes(&self, device_class: &str) -> Result<Vec<Volume>, Error> {
        Ok(self
            .state()
            .backing
            .values()
            .filter(|(dc, _)| dc == device_class)
            .map(|(_, v)| v.clone())
            .collect())
    }
}

/// Mounter recording mount and unmount calls
#[derive(Default)]
pub struct RecordingMounter {
    pub mounts: Mutex<Vec<(String, MountOptions)>>,
    pub unmounts: Mutex<Vec<String>>,
}

#[async_trait]
impl Mounter for RecordingMounter {
    async fn mount(
        &self,
        lv: &LogicalVolume,
        options: &MountOptions,
    ) -> Result<MountResponse, Error> {
        self.mounts
            .lock()
            .unwrap()
            .push((lv.name_any(), options.clone()));
        Ok(MountResponse {
            device_path: format!("/dev/{}/{}", lv.spec.device_class, lv.volume_id()),
            mount_path: format!("/mnt/{}", lv.uid_or_err()?),
        })
    }

    async fn unmount(&self, lv: &LogicalVolume) -> Result<(), Error> {
        self.unmounts.lock().unwrap().push(lv.name_any());
        Ok(())
    }
}

type LaunchHook = Box<dyn Fn() + Send + Sync>;

/// Executor factory recording every request and failing chosen kinds
#[derive(Default)]
pub struct RecordingExecutors {
    pub requests: Mutex<Vec<ExecutorRequest>>,
    pub failing: Mutex<Vec<ExecutorKind>>,
    on_launch: Mutex<Option<LaunchHook>>,
}

impl RecordingExecutors {
    /// Run `hook` whenever an executor is launched
    pub fn on_launch(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_launch.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn kinds(&self) -> Vec<ExecutorKind> {
        self.requests.lock().unwrap().iter().map(|r| r.kind).collect()
    }

    pub fn fail(&self, kind: ExecutorKind) {
        self.failing.lock().unwrap().push(kind);
    }
}

struct FixedExecutor(Result<(), String>);

#[async_trait]
impl Executor for FixedExecutor {
    async fn execute(&self) -> Result<(), Error> {
        self.0.clone().map_err(Error::executor)
    }
}

impl ExecutorFactory for RecordingExecutors {
    fn executor(&self, request: ExecutorRequest) -> Box<dyn Executor> {
        let fails = self.failing.lock().unwrap().contains(&request.kind);
        let result = if fails {
            Err(format!("{} executor failed to start", request.kind))
        } else {
            Ok(())
        };
        self.requests.lock().unwrap().push(request);
        if let Some(hook) = self.on_launch.lock().unwrap().as_ref() {
            hook();
        }
        Box::new(FixedExecutor(result))
    }
}

/// Fakes wired into a [`Context`] for node [`NODE`]
pub struct Harness {
    pub cluster: Arc<FakeCluster>,
    pub mounter: Arc<RecordingMounter>,
    pub executors: Arc<RecordingExecutors>,
    pub ctx: Context,
}

impl Harness {
    pub fn new() -> Self {
        let cluster = Arc::new(FakeCluster::default());
        let mounter = Arc::new(RecordingMounter::default());
        let executors = Arc::new(RecordingExecutors::default());
        let ctx = Context::for_testing(
            cluster.clone(),
            cluster.clone(),
            mounter.clone(),
            executors.clone(),
            NODE,
        );
        Self {
            cluster,
            mounter,
            executors,
            ctx,
        }
    }

    /// Store a volume already carrying the finalizer and provenance label
    pub fn insert_managed(&self, mut lv: LogicalVolume) {
        lv.metadata.finalizers = Some(vec![self.ctx.keys.finalizer.clone()]);
        lv.labels_mut()
            .insert(CREATED_BY_LABEL.to_string(), CREATED_BY_VALUE.to_string());
        self.cluster.insert(lv);
    }

    /// Store a managed volume whose backing LV exists and is recorded
    pub fn insert_created(&self, mut lv: LogicalVolume, size_bytes: i64) {
        let uid = format!("uid-{}", lv.name_any());
        lv.metadata.uid = Some(uid.clone());
        lv.status = Some(LogicalVolumeStatus {
            volume_id: uid.clone(),
            current_size: Some(crate::crd::quantity_from_bytes(size_bytes)),
            ..Default::default()
        });
        self.cluster.add_backing_volume(&uid, size_bytes);
        self.insert_managed(lv);
    }

    pub fn mark_deleted(&self, name: &str) {
        self.cluster.modify(name, |lv| {
            lv.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        });
    }
}

/// LogicalVolume spec for node [`NODE`] in [`DEVICE_CLASS`]
pub fn logical_volume(name: &str, size: &str) -> LogicalVolume {
    LogicalVolume::new(
        name,
        LogicalVolumeSpec {
            name: name.to_string(),
            node_name: NODE.to_string(),
            size: Quantity(size.to_string()),
            device_class: DEVICE_CLASS.to_string(),
            lvcreate_option_class: None,
            source: None,
            access_type: None,
        },
    )
}
