//! Resolves the nodes a pool may assign its IPs to.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::Api;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Error, Result};

/// A cluster node eligible to hold a floating IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

/// Equality-based label predicate. An empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector(BTreeMap<String, String>);

impl LabelSelector {
    pub fn new(labels: BTreeMap<String, String>) -> Self {
        Self(labels)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Client-side equivalent of the server-side node selection.
    #[cfg(test)]
    pub(crate) fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0.iter().all(|(key, value)| labels.get(key) == Some(value))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}

#[async_trait]
pub trait MachineSource: Send + Sync {
    async fn list_machines(&self, selector: &LabelSelector) -> Result<Vec<Machine>>;
}

/// Lists Kubernetes nodes using a server side label selector.
#[derive(Clone)]
pub struct KubeMachineSource {
    nodes: Api<Node>,
}

impl KubeMachineSource {
    pub fn new(nodes: Api<Node>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl MachineSource for KubeMachineSource {
    async fn list_machines(&self, selector: &LabelSelector) -> Result<Vec<Machine>> {
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(&selector.to_string());
        }
        let nodes = self.nodes.list(&params).await?;

        Ok(nodes
            .into_iter()
            .filter_map(|node| {
                let name = node.metadata.name?;
                Some(Machine {
                    name,
                    labels: node.metadata.labels.unwrap_or_default(),
                })
            })
            .collect())
    }
}

/// Shuffled targets of one pass, with their names in the same order.
#[derive(Debug, Clone, Default)]
pub struct Targets {
    pub machines: Vec<Machine>,
    pub names: Vec<String>,
}

impl Targets {
    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }
}

/// Puts the machines in a random order, so that when IPs are scarce the
/// skipped nodes differ from one pass to the next.
pub fn shuffle_targets<R: Rng + ?Sized>(mut machines: Vec<Machine>, rng: &mut R) -> Targets {
    machines.shuffle(rng);
    let names = machines.iter().map(|m| m.name.clone()).collect();
    Targets { machines, names }
}

pub async fn select_targets<R: Rng + ?Sized>(
    source: &dyn MachineSource,
    pool: &str,
    selector: &LabelSelector,
    rng: &mut R,
) -> Result<Targets> {
    let machines = source.list_machines(selector).await?;
    if machines.is_empty() {
        return Err(Error::EmptyTargetSet {
            pool: pool.to_string(),
        });
    }
    Ok(shuffle_targets(machines, rng))
}
