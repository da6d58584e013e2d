use std::sync::Arc;

use dotenv::dotenv;
use hcloud_fip_pool_controller::assigner::AssignerContext;
use hcloud_fip_pool_controller::config::Config;
use hcloud_fip_pool_controller::provider::HcloudProvider;
use hcloud_fip_pool_controller::selector::KubeMachineSource;
use hcloud_fip_pool_controller::{watcher, Error, FloatingIPPool, PoolSupervisor};
use k8s_openapi::api::core::v1::Node as KubeNode;
use kube::{Api, Client as KubeClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!(
        "starting floating ip pool controller, minimal interval {:?}",
        config.min_interval
    );

    let kube_client = KubeClient::try_default().await?;
    let nodes_api = Api::<KubeNode>::all(kube_client.clone());
    let pools_api = Api::<FloatingIPPool>::all(kube_client);

    let provider = HcloudProvider::new(config.hcloud_token, config.hcloud_endpoint);
    let ctx = AssignerContext::new(Arc::new(KubeMachineSource::new(nodes_api)), Arc::new(provider))
        .with_min_interval(config.min_interval);
    let supervisor = Arc::new(PoolSupervisor::new(ctx));

    let result = tokio::select! {
        result = watcher::watch_pools(pools_api, supervisor.clone()) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
            Ok(())
        }
    };

    supervisor.shutdown().await;
    result
}
