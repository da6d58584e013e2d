//! In-memory collaborators for unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::clock::Clock;
use crate::crd::FloatingIPPoolSpec;
use crate::error::{Error, Result};
use crate::provider::{FloatingIp, FloatingIpProvider, Server};
use crate::selector::{LabelSelector, Machine, MachineSource, Targets};

pub fn fip(id: i64, ip: &str, server: Option<i64>) -> FloatingIp {
    FloatingIp {
        id,
        ip: ip.parse().unwrap(),
        server,
    }
}

pub fn server(id: i64, name: &str) -> Server {
    Server {
        id,
        name: name.to_string(),
    }
}

pub fn machine(name: &str, labels: &[(&str, &str)]) -> Machine {
    Machine {
        name: name.to_string(),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

/// Targets in the given order, unshuffled.
pub fn targets(names: &[&str]) -> Targets {
    Targets {
        machines: names.iter().map(|n| machine(n, &[])).collect(),
        names: names.iter().map(|n| n.to_string()).collect(),
    }
}

pub fn spec(ips: &[&str], interval_seconds: i64) -> FloatingIPPoolSpec {
    FloatingIPPoolSpec {
        ips: ips.iter().map(|ip| ip.to_string()).collect(),
        node_selector: BTreeMap::new(),
        interval_seconds,
    }
}

#[derive(Default)]
struct ProviderState {
    floating_ips: Vec<FloatingIp>,
    servers: Vec<Server>,
    assignments: Vec<(i64, i64)>,
    assign_calls: usize,
    fail_on_call: Option<usize>,
    floating_ip_listings: usize,
    server_listings: usize,
}

/// Provider keeping floating IPs in memory; assignments update the IPs.
#[derive(Default)]
pub struct MockProvider {
    state: Mutex<ProviderState>,
}

impl MockProvider {
    pub fn new(floating_ips: Vec<FloatingIp>, servers: Vec<Server>) -> Self {
        Self {
            state: Mutex::new(ProviderState {
                floating_ips,
                servers,
                ..Default::default()
            }),
        }
    }

    /// Makes the `call`-th assignment (1-based) fail.
    pub fn fail_assignment(&self, call: usize) {
        self.state.lock().unwrap().fail_on_call = Some(call);
    }

    /// Successful assignments as `(floating ip id, server id)`.
    pub fn assignments(&self) -> Vec<(i64, i64)> {
        self.state.lock().unwrap().assignments.clone()
    }

    /// Current server of every floating IP.
    pub fn holders(&self) -> Vec<Option<i64>> {
        self.state
            .lock()
            .unwrap()
            .floating_ips
            .iter()
            .map(|f| f.server)
            .collect()
    }

    pub fn floating_ip_listings(&self) -> usize {
        self.state.lock().unwrap().floating_ip_listings
    }

    pub fn server_listings(&self) -> usize {
        self.state.lock().unwrap().server_listings
    }
}

#[async_trait]
impl FloatingIpProvider for MockProvider {
    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>> {
        let mut state = self.state.lock().unwrap();
        state.floating_ip_listings += 1;
        Ok(state.floating_ips.clone())
    }

    async fn list_servers(&self) -> Result<Vec<Server>> {
        let mut state = self.state.lock().unwrap();
        state.server_listings += 1;
        Ok(state.servers.clone())
    }

    async fn assign_floating_ip(&self, floating_ip: &FloatingIp, server: &Server) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.assign_calls += 1;
        if state.fail_on_call == Some(state.assign_calls) {
            return Err(Error::Provider("server is locked".to_string()));
        }
        if let Some(fip) = state
            .floating_ips
            .iter_mut()
            .find(|f| f.id == floating_ip.id)
        {
            fip.server = Some(server.id);
        }
        state.assignments.push((floating_ip.id, server.id));
        Ok(())
    }
}

pub struct MockMachines {
    machines: Vec<Machine>,
}

impl MockMachines {
    pub fn new(machines: Vec<Machine>) -> Self {
        Self { machines }
    }
}

#[async_trait]
impl MachineSource for MockMachines {
    async fn list_machines(&self, selector: &LabelSelector) -> Result<Vec<Machine>> {
        Ok(self
            .machines
            .iter()
            .filter(|m| selector.matches(&m.labels))
            .cloned()
            .collect())
    }
}

/// Clock whose timers fire only when the test says so.
///
/// Every call to `after` is recorded; the returned future completes on the
/// next tick sent by the test.
pub struct ManualClock {
    sender: mpsc::UnboundedSender<()>,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<()>>>,
    requested: Arc<Mutex<Vec<Duration>>>,
    ticks: AtomicUsize,
}

impl ManualClock {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            requested: Arc::new(Mutex::new(Vec::new())),
            ticks: AtomicUsize::new(0),
        }
    }

    /// Durations passed to `after`, in call order.
    pub fn requested(&self) -> Vec<Duration> {
        self.requested.lock().unwrap().clone()
    }

    /// Fires one pending timer without waiting for anything.
    pub fn send_tick(&self) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        self.sender.send(()).unwrap();
    }

    /// Fires the timer of a single running assigner and waits until its pass
    /// is over, i.e. until it arms its next timer.
    pub async fn tick(&self) {
        let sent = self.ticks.load(Ordering::SeqCst);
        self.wait_for_waiters(sent + 1).await;
        self.send_tick();
        self.wait_for_waiters(sent + 2).await;
    }

    /// Waits until `after` has been called at least `count` times.
    pub async fn wait_for_waiters(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.requested.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("timer was never armed");
    }
}

impl Clock for ManualClock {
    fn after(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.requested.lock().unwrap().push(duration);
        let receiver = self.receiver.clone();
        async move {
            receiver.lock().await.recv().await;
        }
        .boxed()
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
