//! The `FloatingIPPool` custom resource.

use std::collections::BTreeMap;
use std::time::Duration;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A set of Hetzner floating IPs kept spread over the nodes matching
/// `node_selector`.
#[derive(CustomResource, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "hcloud.zenjoy.be",
    version = "v1alpha1",
    kind = "FloatingIPPool",
    plural = "floatingippools"
)]
#[serde(rename_all = "camelCase")]
pub struct FloatingIPPoolSpec {
    /// Floating IPs from Hetzner that will be assigned to nodes matching the
    /// node selector.
    pub ips: Vec<String>,

    /// Labels a node must carry to receive one of the IPs. Empty selects every node.
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,

    /// Seconds between two reconciliation passes.
    #[serde(default)]
    pub interval_seconds: i64,
}

impl FloatingIPPoolSpec {
    /// The interval actually waited between passes, never shorter than `floor`.
    pub fn effective_interval(&self, floor: Duration) -> Duration {
        let configured = u64::try_from(self.interval_seconds)
            .map(Duration::from_secs)
            .unwrap_or(Duration::ZERO);
        configured.max(floor)
    }
}
