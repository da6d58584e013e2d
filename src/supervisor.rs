//! Keeps exactly one running assigner per floating IP pool.

use std::collections::{HashMap, HashSet};

use kube::ResourceExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::assigner::{AssignerContext, PoolAssigner};
use crate::crd::{FloatingIPPool, FloatingIPPoolSpec};
use crate::error::Result;

pub struct PoolSupervisor {
    ctx: AssignerContext,
    assigners: Mutex<HashMap<String, PoolAssigner>>,
}

impl PoolSupervisor {
    pub fn new(ctx: AssignerContext) -> Self {
        Self {
            ctx,
            assigners: Mutex::new(HashMap::new()),
        }
    }

    /// Makes sure an assigner for `name` runs with `spec`. A changed spec
    /// replaces the running assigner.
    pub async fn ensure(&self, name: &str, spec: &FloatingIPPoolSpec) -> Result<()> {
        let mut assigners = self.assigners.lock().await;

        if let Some(existing) = assigners.get(name) {
            if existing.spec_equals(spec) {
                return Ok(());
            }
        }
        if let Some(outdated) = assigners.remove(name) {
            info!("{} pool spec changed, restarting its ip assigner", name);
            outdated.stop();
        }

        let assigner = PoolAssigner::new(name, spec.clone(), self.ctx.clone());
        assigner.start()?;
        assigners.insert(name.to_string(), assigner);
        Ok(())
    }

    pub async fn remove(&self, name: &str) {
        if let Some(assigner) = self.assigners.lock().await.remove(name) {
            assigner.stop();
        }
    }

    /// Brings the running assigners in line with a full listing of pools:
    /// listed pools are ensured, every other assigner is removed.
    pub async fn resync(&self, pools: &[FloatingIPPool]) -> Result<()> {
        let listed: HashSet<String> = pools.iter().map(|pool| pool.name_any()).collect();

        let stale: Vec<String> = self
            .assigners
            .lock()
            .await
            .keys()
            .filter(|name| !listed.contains(*name))
            .cloned()
            .collect();
        for name in stale {
            info!("{} pool no longer exists", name);
            self.remove(&name).await;
        }

        for pool in pools {
            self.ensure(&pool.name_any(), &pool.spec).await?;
        }
        Ok(())
    }

    /// Stops every assigner.
    pub async fn shutdown(&self) {
        for (_, assigner) in self.assigners.lock().await.drain() {
            assigner.stop();
        }
    }

    #[cfg(test)]
    pub(crate) async fn pool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.assigners.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    #[cfg(test)]
    pub(crate) async fn is_running(&self, name: &str) -> bool {
        self.assigners
            .lock()
            .await
            .get(name)
            .map_or(false, PoolAssigner::is_running)
    }
}
