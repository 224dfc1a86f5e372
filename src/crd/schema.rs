//! API group variants of the LogicalVolume resource
//!
//! Older clusters serve LogicalVolume under a legacy API group. The variant is
//! resolved once at startup; everything downstream works on the normalized
//! [`LogicalVolume`](super::LogicalVolume) type and the [`MetadataKeys`] derived
//! here.

use std::str::FromStr;

use kube::discovery::ApiResource;

use crate::Error;

/// Label key recording which component created a resource
pub const CREATED_BY_LABEL: &str = "app.kubernetes.io/created-by";

/// Value of [`CREATED_BY_LABEL`] for resources owned by this controller
pub const CREATED_BY_VALUE: &str = "lvm-operator";

/// VolumeSnapshotClass parameter selecting the snapshot mode
pub const SNAPSHOT_MODE_PARAMETER: &str = "topolvm.io/snapshot-mode";

/// Value of [`SNAPSHOT_MODE_PARAMETER`] enabling backup/restore orchestration
pub const SNAPSHOT_MODE_ONLINE: &str = "online";

const VERSION: &str = "v1";
const KIND: &str = "LogicalVolume";
const PLURAL: &str = "logicalvolumes";

/// API group serving LogicalVolume resources
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SchemaGroup {
    /// `topolvm.io`
    #[default]
    Current,
    /// `topolvm.cybozu.com`
    Legacy,
}

impl SchemaGroup {
    /// API group name
    pub fn group(&self) -> &'static str {
        match self {
            Self::Current => "topolvm.io",
            Self::Legacy => "topolvm.cybozu.com",
        }
    }

    /// Full apiVersion string
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group(), VERSION)
    }

    /// ApiResource for dynamic API access
    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group().to_string(),
            version: VERSION.to_string(),
            api_version: self.api_version(),
            kind: KIND.to_string(),
            plural: PLURAL.to_string(),
        }
    }

    /// Finalizer, annotation and label keys for this group
    pub fn keys(&self) -> MetadataKeys {
        let group = self.group();
        MetadataKeys {
            finalizer: format!("{}/logicalvolume", group),
            pending_deletion: format!("{}/pendingdeletion", group),
            restore_required: format!("{}/restore-required", group),
        }
    }
}

impl FromStr for SchemaGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" | "topolvm.io" => Ok(Self::Current),
            "legacy" | "topolvm.cybozu.com" => Ok(Self::Legacy),
            other => Err(Error::validation(format!(
                "unknown schema group '{}'",
                other
            ))),
        }
    }
}

/// Metadata keys whose names depend on the API group
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataKeys {
    /// Finalizer gating deletion of the backing LV
    pub finalizer: String,
    /// Annotation set by node cleanup to take over a forced teardown
    pub pending_deletion: String,
    /// Annotation asking the mount path to run a filesystem restore
    pub restore_required: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_group_keys() {
        let keys = SchemaGroup::Current.keys();
        assert_eq!(keys.finalizer, "topolvm.io/logicalvolume");
        assert_eq!(keys.pending_deletion, "topolvm.io/pendingdeletion");
        assert_eq!(keys.restore_required, "topolvm.io/restore-required");
    }

    #[test]
    fn legacy_group_keys_and_resource() {
        let keys = SchemaGroup::Legacy.keys();
        assert_eq!(keys.finalizer, "topolvm.cybozu.com/logicalvolume");

        let ar = SchemaGroup::Legacy.api_resource();
        assert_eq!(ar.api_version, "topolvm.cybozu.com/v1");
        assert_eq!(ar.kind, "LogicalVolume");
        assert_eq!(ar.plural, "logicalvolumes");
    }

    #[test]
    fn parses_from_flag_values() {
        assert_eq!(
            "legacy".parse::<SchemaGroup>().unwrap(),
            SchemaGroup::Legacy
        );
        assert_eq!(
            "topolvm.io".parse::<SchemaGroup>().unwrap(),
            SchemaGroup::Current
        );
        assert!("v2".parse::<SchemaGroup>().is_err());
    }
}
