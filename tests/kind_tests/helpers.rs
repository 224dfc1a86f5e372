//! Shared setup for kind integration tests

use std::time::Duration;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;

use lvm_operator::controller::FIELD_MANAGER;
use lvm_operator::crd::{crd_for, SchemaGroup};

/// Connect to the test cluster and make sure the LogicalVolume CRD is served
pub async fn ensure_test_cluster() -> anyhow::Result<Client> {
    let client = Client::try_default().await?;
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let crd = crd_for(SchemaGroup::Current);
    let name = crd.metadata.name.clone().unwrap_or_default();

    crds.patch(
        &name,
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&crd),
    )
    .await?;

    // Wait for the API server to start serving the new resource
    for _ in 0..30 {
        let established = crds
            .get(&name)
            .await?
            .status
            .and_then(|s| s.conditions)
            .unwrap_or_default()
            .iter()
            .any(|c| c.type_ == "Established" && c.status == "True");
        if established {
            return Ok(client);
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    anyhow::bail!("CRD {} was not established in time", name)
}
