//! gRPC protocol definitions for the volume-management service
//!
//! Messages and clients generated from `proto/lvmd.proto` (package `proto`)
//! and checked in, so building the operator does not need `protoc`.
//!
//! # Example
//!
//! ```ignore
//! use lvm_operator::proto::lv_service_client::LvServiceClient;
//!
//! let mut client = LvServiceClient::new(channel);
//! let response = client
//!     .resize_lv(ResizeLvRequest { name, size_bytes, device_class })
//!     .await?;
//! ```

#![allow(missing_docs)] // Generated code doesn't have docs

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Empty {}
/// An LVM logical volume.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogicalVolume {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(uint64, tag = "2")]
    pub size_bytes: u64,
    #[prost(string, tag = "3")]
    pub path: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "4")]
    pub tags: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateLvRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(uint64, tag = "2")]
    pub size_bytes: u64,
    #[prost(string, repeated, tag = "3")]
    pub tags: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, tag = "4")]
    pub device_class: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub lvcreate_option_class: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateLvResponse {
    #[prost(message, optional, tag = "1")]
    pub volume: ::core::option::Option<LogicalVolume>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateLvSnapshotRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub source_volume: ::prost::alloc::string::String,
    #[prost(uint64, tag = "3")]
    pub size_bytes: u64,
    #[prost(string, tag = "4")]
    pub access_type: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub device_class: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "6")]
    pub tags: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateLvSnapshotResponse {
    #[prost(message, optional, tag = "1")]
    pub snapshot: ::core::option::Option<LogicalVolume>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResizeLvRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(uint64, tag = "2")]
    pub size_bytes: u64,
    #[prost(string, tag = "3")]
    pub device_class: ::prost::alloc::string::String,
}
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ResizeLvResponse {
    #[prost(uint64, tag = "1")]
    pub size_bytes: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RemoveLvRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub device_class: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetLvListRequest {
    #[prost(string, tag = "1")]
    pub device_class: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetLvListResponse {
    #[prost(message, repeated, tag = "1")]
    pub volumes: ::prost::alloc::vec::Vec<LogicalVolume>,
}
/// Generated client implementations.
pub mod lv_service_client {
    #![allow(
        unused_variables,
        dead_code,
        missing_docs,
        clippy::wildcard_imports,
        clippy::let_unit_value
    )]
    use tonic::codegen::http::Uri;
    use tonic::codegen::*;
    #[derive(Debug, Clone)]
    pub struct LvServiceClient<T> {
        inner: tonic::client::Grpc<T>,
    }
    impl LvServiceClient<tonic::transport::Channel> {
        /// Attempt to create a new client by connecting to a given endpoint.
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }
    impl<T> LvServiceClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }
        pub fn with_origin(inner: T, origin: Uri) -> Self {
            let inner = tonic::client::Grpc::with_origin(inner, origin);
            Self { inner }
        }
        pub async fn create_lv(
            &mut self,
            request: impl tonic::IntoRequest<super::CreateLvRequest>,
        ) -> std::result::Result<tonic::Response<super::CreateLvResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/proto.LVService/CreateLV");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("proto.LVService", "CreateLV"));
            self.inner.unary(req, path, codec).await
        }
        pub async fn create_lv_snapshot(
            &mut self,
            request: impl tonic::IntoRequest<super::CreateLvSnapshotRequest>,
        ) -> std::result::Result<tonic::Response<super::CreateLvSnapshotResponse>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/proto.LVService/CreateLVSnapshot");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("proto.LVService", "CreateLVSnapshot"));
            self.inner.unary(req, path, codec).await
        }
        pub async fn resize_lv(
            &mut self,
            request: impl tonic::IntoRequest<super::ResizeLvRequest>,
        ) -> std::result::Result<tonic::Response<super::ResizeLvResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/proto.LVService/ResizeLV");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("proto.LVService", "ResizeLV"));
            self.inner.unary(req, path, codec).await
        }
        pub async fn remove_lv(
            &mut self,
            request: impl tonic::IntoRequest<super::RemoveLvRequest>,
        ) -> std::result::Result<tonic::Response<super::Empty>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/proto.LVService/RemoveLV");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("proto.LVService", "RemoveLV"));
            self.inner.unary(req, path, codec).await
        }
    }
}
/// Generated client implementations.
pub mod vg_service_client {
    #![allow(
        unused_variables,
        dead_code,
        missing_docs,
        clippy::wildcard_imports,
        clippy::let_unit_value
    )]
    use tonic::codegen::http::Uri;
    use tonic::codegen::*;
    #[derive(Debug, Clone)]
    pub struct VgServiceClient<T> {
        inner: tonic::client::Grpc<T>,
    }
    impl VgServiceClient<tonic::transport::Channel> {
        /// Attempt to create a new client by connecting to a given endpoint.
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }
    impl<T> VgServiceClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }
        pub fn with_origin(inner: T, origin: Uri) -> Self {
            let inner = tonic::client::Grpc::with_origin(inner, origin);
            Self { inner }
        }
        pub async fn get_lv_list(
            &mut self,
            request: impl tonic::IntoRequest<super::GetLvListRequest>,
        ) -> std::result::Result<tonic::Response<super::GetLvListResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/proto.VGService/GetLVList");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("proto.VGService", "GetLVList"));
            self.inner.unary(req, path, codec).await
        }
    }
}
