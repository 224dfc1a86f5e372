//! Volume-management service client
//!
//! The node-local lvmd daemon owns all LVM commands. This module wraps its
//! gRPC API behind the [`VolumeService`] trait so reconcile logic can be tested
//! against a mock.

use std::path::PathBuf;

use async_trait::async_trait;
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::proto::lv_service_client::LvServiceClient;
use crate::proto::vg_service_client::VgServiceClient;
use crate::proto::{
    CreateLvRequest, CreateLvSnapshotRequest, GetLvListRequest, RemoveLvRequest, ResizeLvRequest,
};
use crate::Error;

/// A logical volume as reported by the volume-management service
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Volume {
    /// LV name on the node (the LogicalVolume uid)
    pub name: String,
    /// Actual size in bytes
    pub size_bytes: i64,
    /// Device path, e.g. `/dev/vg/uid`
    pub path: String,
}

impl TryFrom<crate::proto::LogicalVolume> for Volume {
    type Error = Error;

    fn try_from(lv: crate::proto::LogicalVolume) -> Result<Self, Error> {
        Ok(Self {
            size_bytes: bytes_to_i64(lv.size_bytes)?,
            name: lv.name,
            path: lv.path,
        })
    }
}

/// Trait abstracting the volume-management service for testability
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VolumeService: Send + Sync {
    /// Create a plain logical volume; an empty option class means defaults
    async fn create_volume(
        &self,
        name: &str,
        device_class: &str,
        size_bytes: i64,
        lvcreate_option_class: &str,
    ) -> Result<Volume, Error>;

    /// Create a thin snapshot of `source_volume_id`
    async fn create_snapshot_volume(
        &self,
        name: &str,
        device_class: &str,
        source_volume_id: &str,
        size_bytes: i64,
        access_type: &str,
    ) -> Result<Volume, Error>;

    /// Grow a volume, returning the resulting size
    async fn resize_volume(
        &self,
        name: &str,
        device_class: &str,
        size_bytes: i64,
    ) -> Result<i64, Error>;

    /// Remove a volume; a missing volume is reported as `NotFound`
    async fn remove_volume(&self, name: &str, device_class: &str) -> Result<(), Error>;

    /// List volumes in a device class
    async fn list_volumes(&self, device_class: &str) -> Result<Vec<Volume>, Error>;
}

/// gRPC-backed [`VolumeService`]
#[derive(Clone)]
pub struct GrpcVolumeService {
    lv: LvServiceClient<Channel>,
    vg: VgServiceClient<Channel>,
}

impl GrpcVolumeService {
    /// Build a client for `endpoint` without connecting yet
    ///
    /// Accepts `unix:///path/to/socket` or an `http(s)://host:port` address.
    /// The connection is established on first use and re-established after
    /// failures.
    pub fn connect_lazy(endpoint: &str) -> Result<Self, Error> {
        let channel = if let Some(path) = endpoint.strip_prefix("unix://") {
            let socket = PathBuf::from(path);
            debug!(socket = %socket.display(), "Using unix socket for volume service");
            // The URI is required by the builder but unused by the connector
            Endpoint::try_from("http://[::]:50051")
                .map_err(|e| Error::internal(format!("invalid endpoint: {}", e)))?
                .connect_with_connector_lazy(tower::service_fn(move |_: Uri| {
                    let socket = socket.clone();
                    async move {
                        Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(socket).await?))
                    }
                }))
        } else {
            Endpoint::from_shared(endpoint.to_string())
                .map_err(|e| Error::validation(format!("invalid lvmd endpoint '{}': {}", endpoint, e)))?
                .connect_lazy()
        };

        Ok(Self {
            lv: LvServiceClient::new(channel.clone()),
            vg: VgServiceClient::new(channel),
        })
    }
}

#[async_trait]
impl VolumeService for GrpcVolumeService {
    async fn create_volume(
        &self,
        name: &str,
        device_class: &str,
        size_bytes: i64,
        lvcreate_option_class: &str,
    ) -> Result<Volume, Error> {
        let response = self
            .lv
            .clone()
            .create_lv(CreateLvRequest {
                name: name.to_string(),
                size_bytes: bytes_to_u64(size_bytes)?,
                tags: Vec::new(),
                device_class: device_class.to_string(),
                lvcreate_option_class: lvcreate_option_class.to_string(),
            })
            .await?
            .into_inner();

        response
            .volume
            .ok_or_else(|| Error::internal("CreateLV response carried no volume"))?
            .try_into()
    }

    async fn create_snapshot_volume(
        &self,
        name: &str,
        device_class: &str,
        source_volume_id: &str,
        size_bytes: i64,
        access_type: &str,
    ) -> Result<Volume, Error> {
        let response = self
            .lv
            .clone()
            .create_lv_snapshot(CreateLvSnapshotRequest {
                name: name.to_string(),
                source_volume: source_volume_id.to_string(),
                size_bytes: bytes_to_u64(size_bytes)?,
                access_type: access_type.to_string(),
                device_class: device_class.to_string(),
                tags: Vec::new(),
            })
            .await?
            .into_inner();

        response
            .snapshot
            .ok_or_else(|| Error::internal("CreateLVSnapshot response carried no volume"))?
            .try_into()
    }

    async fn resize_volume(
        &self,
        name: &str,
        device_class: &str,
        size_bytes: i64,
    ) -> Result<i64, Error> {
        let response = self
            .lv
            .clone()
            .resize_lv(ResizeLvRequest {
                name: name.to_string(),
                size_bytes: bytes_to_u64(size_bytes)?,
                device_class: device_class.to_string(),
            })
            .await?
            .into_inner();

        // Older daemons leave size_bytes unset; the request size is what was applied
        if response.size_bytes == 0 {
            Ok(size_bytes)
        } else {
            bytes_to_i64(response.size_bytes)
        }
    }

    async fn remove_volume(&self, name: &str, device_class: &str) -> Result<(), Error> {
        self.lv
            .clone()
            .remove_lv(RemoveLvRequest {
                name: name.to_string(),
                device_class: device_class.to_string(),
            })
            .await?;
        Ok(())
    }

    async fn list_volumes(&self, device_class: &str) -> Result<Vec<Volume>, Error> {
        let response = self
            .vg
            .clone()
            .get_lv_list(GetLvListRequest {
                device_class: device_class.to_string(),
            })
            .await?
            .into_inner();

        response.volumes.into_iter().map(Volume::try_from).collect()
    }
}

fn bytes_to_u64(bytes: i64) -> Result<u64, Error> {
    u64::try_from(bytes).map_err(|_| Error::validation(format!("negative size {}", bytes)))
}

fn bytes_to_i64(bytes: u64) -> Result<i64, Error> {
    i64::try_from(bytes).map_err(|_| Error::internal(format!("size {} overflows i64", bytes)))
}
