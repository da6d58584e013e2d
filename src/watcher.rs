//! Feeds `FloatingIPPool` add/delete events to the supervisor.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::{pin_mut, Stream, StreamExt};
use kube::api::ListParams;
use kube::runtime::watcher::{watcher, Event};
use kube::{Api, ResourceExt};
use tracing::{error, info, warn};

use crate::crd::FloatingIPPool;
use crate::error::{Error, Result};
use crate::supervisor::PoolSupervisor;

/// Pause before polling the watch again after it reported an error.
const WATCH_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Ensures an assigner runs for the pool. Lifecycle misuse is returned to the caller.
pub async fn on_pool_added(supervisor: &PoolSupervisor, pool: &FloatingIPPool) -> Result<()> {
    supervisor.ensure(&pool.name_any(), &pool.spec).await
}

pub async fn on_pool_deleted(supervisor: &PoolSupervisor, name: &str) {
    supervisor.remove(name).await;
}

/// Watches all pools. Watch errors are logged and the watch relists on the
/// next poll, so this only returns if the stream itself ends.
pub async fn watch_pools(api: Api<FloatingIPPool>, supervisor: Arc<PoolSupervisor>) -> Result<()> {
    info!("starting FloatingIPPool watcher");
    let stream = watcher(api, ListParams::default());
    drive_pool_events(stream, &supervisor, WATCH_RETRY_DELAY).await
}

async fn drive_pool_events<S, E>(
    stream: S,
    supervisor: &PoolSupervisor,
    retry_delay: Duration,
) -> Result<()>
where
    S: Stream<Item = std::result::Result<Event<FloatingIPPool>, E>>,
    E: fmt::Display,
{
    pin_mut!(stream);

    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => handle_event(supervisor, event).await,
            Err(e) => {
                warn!("FloatingIPPool watch failed, retrying in {:?}: {}", retry_delay, e);
                tokio::time::sleep(retry_delay).await;
            }
        }
    }

    Err(Error::Watch("FloatingIPPool watch stream ended".to_string()))
}

async fn handle_event(supervisor: &PoolSupervisor, event: Event<FloatingIPPool>) {
    match event {
        Event::Applied(pool) => {
            if let Err(e) = on_pool_added(supervisor, &pool).await {
                error!("failed to ensure ip assigner for {}: {}", pool.name_any(), e);
            }
        }
        Event::Deleted(pool) => {
            info!("FloatingIPPool deleted: {}", pool.name_any());
            on_pool_deleted(supervisor, &pool.name_any()).await;
        }
        Event::Restarted(pools) => {
            info!("FloatingIPPool watcher (re)listed {} pools", pools.len());
            if let Err(e) = supervisor.resync(&pools).await {
                error!("failed to resync ip assigners: {}", e);
            }
        }
    }
}
