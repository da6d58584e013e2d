//! Hetzner Cloud access: floating IPs, servers and IP assignment.

use std::fmt;
use std::future::Future;
use std::net::IpAddr;

use async_trait::async_trait;
use hcloud::apis::configuration::Configuration;
use hcloud::apis::floating_ips_api::{self, AssignFloatingIpToServerParams, ListFloatingIpsParams};
use hcloud::apis::servers_api::{self, ListServersParams};
use hcloud::models::{AssignFloatingIpToServerRequest, Meta};
use tracing::warn;

use crate::error::{Error, Result};

/// A floating IP as seen by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatingIp {
    pub id: i64,
    pub ip: IpAddr,
    /// Id of the server the IP is currently routed to.
    pub server: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub id: i64,
    pub name: String,
}

/// The provider operations a reconciliation pass needs.
#[async_trait]
pub trait FloatingIpProvider: Send + Sync {
    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>>;

    async fn list_servers(&self) -> Result<Vec<Server>>;

    async fn assign_floating_ip(&self, floating_ip: &FloatingIp, server: &Server) -> Result<()>;
}

pub struct HcloudProvider {
    configuration: Configuration,
}

impl fmt::Debug for HcloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HcloudProvider")
            .field("base_path", &self.configuration.base_path)
            .finish_non_exhaustive()
    }
}

impl HcloudProvider {
    pub fn new(token: String, endpoint: Option<String>) -> Self {
        let mut configuration = Configuration::new();
        configuration.bearer_access_token = Some(token);
        if let Some(endpoint) = endpoint {
            configuration.base_path = endpoint;
        }
        Self { configuration }
    }
}

/// Hetzner reports IPv6 floating IPs as a network (`2001:db8::/64`); only
/// the address part is kept.
fn parse_provider_ip(raw: &str) -> Option<IpAddr> {
    raw.split('/').next()?.parse().ok()
}

/// Largest page the API hands out.
const PAGE_SIZE: i32 = 50;

/// Fetches pages starting at 1 until the API reports no next page.
async fn collect_pages<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(i32) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<i32>)>>,
{
    let mut items = Vec::new();
    let mut page = 1;
    loop {
        let (batch, next_page) = fetch_page(page).await?;
        items.extend(batch);
        match next_page {
            Some(next) if next > page => page = next,
            _ => return Ok(items),
        }
    }
}

fn next_page(meta: Option<Box<Meta>>) -> Option<i32> {
    meta.and_then(|meta| meta.pagination.next_page)
}

fn to_i32(id: i64) -> Result<i32> {
    i32::try_from(id).map_err(|_| Error::Provider(format!("id {id} out of range")))
}

#[async_trait]
impl FloatingIpProvider for HcloudProvider {
    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>> {
        let fips = collect_pages(|page| async move {
            let response = floating_ips_api::list_floating_ips(
                &self.configuration,
                ListFloatingIpsParams {
                    page: Some(page),
                    per_page: Some(PAGE_SIZE),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;
            Ok::<_, Error>((response.floating_ips, next_page(response.meta)))
        })
        .await?;

        Ok(fips
            .into_iter()
            .filter_map(|fip| match parse_provider_ip(&fip.ip) {
                Some(ip) => Some(FloatingIp {
                    id: i64::from(fip.id),
                    ip,
                    server: fip.server.map(i64::from),
                }),
                None => {
                    warn!("skipping floating ip {} with unparsable address {}", fip.id, fip.ip);
                    None
                }
            })
            .collect())
    }

    async fn list_servers(&self) -> Result<Vec<Server>> {
        let servers = collect_pages(|page| async move {
            let response = servers_api::list_servers(
                &self.configuration,
                ListServersParams {
                    page: Some(page),
                    per_page: Some(PAGE_SIZE),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;
            Ok::<_, Error>((response.servers, next_page(response.meta)))
        })
        .await?;

        Ok(servers
            .into_iter()
            .map(|server| Server {
                id: i64::from(server.id),
                name: server.name,
            })
            .collect())
    }

    async fn assign_floating_ip(&self, floating_ip: &FloatingIp, server: &Server) -> Result<()> {
        floating_ips_api::assign_floating_ip_to_server(
            &self.configuration,
            AssignFloatingIpToServerParams {
                id: to_i32(floating_ip.id)?,
                assign_floating_ip_to_server_request: Some(AssignFloatingIpToServerRequest {
                    server: to_i32(server.id)?,
                }),
            },
        )
        .await
        .map_err(|e| Error::Provider(e.to_string()))?;
        Ok(())
    }
}
