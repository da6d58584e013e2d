//! Periodic reconciliation of one floating IP pool.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::clock::{Clock, TokioClock};
use crate::crd::FloatingIPPoolSpec;
use crate::error::{Error, Result};
use crate::executor;
use crate::inventory::{self, ServerIndex};
use crate::planner;
use crate::provider::FloatingIpProvider;
use crate::selector::{self, LabelSelector, MachineSource};

/// Lower bound for the time between two passes of the same pool.
pub const MIN_INTERVAL: Duration = Duration::from_secs(5);

/// Everything an assigner needs from the outside world. Shared by all pools.
#[derive(Clone)]
pub struct AssignerContext {
    pub machines: Arc<dyn MachineSource>,
    pub provider: Arc<dyn FloatingIpProvider>,
    pub clock: Arc<dyn Clock>,
    pub min_interval: Duration,
    /// Fixed seed for target shuffling; entropy when unset.
    pub rng_seed: Option<u64>,
}

impl AssignerContext {
    pub fn new(machines: Arc<dyn MachineSource>, provider: Arc<dyn FloatingIpProvider>) -> Self {
        Self {
            machines,
            provider,
            clock: Arc::new(TokioClock),
            min_interval: MIN_INTERVAL,
            rng_seed: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    fn rng(&self) -> StdRng {
        match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

enum AssignerState {
    Idle,
    Running {
        cancel: CancellationToken,
        _task: JoinHandle<()>,
    },
}

/// Keeps one pool's IPs assigned, one pass per interval, on its own task.
pub struct PoolAssigner {
    name: String,
    spec: FloatingIPPoolSpec,
    ctx: AssignerContext,
    state: Mutex<AssignerState>,
}

impl PoolAssigner {
    pub fn new(name: impl Into<String>, spec: FloatingIPPoolSpec, ctx: AssignerContext) -> Self {
        Self {
            name: name.into(),
            spec,
            ctx,
            state: Mutex::new(AssignerState::Idle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec_equals(&self, spec: &FloatingIPPoolSpec) -> bool {
        self.spec == *spec
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lock_state(), AssignerState::Running { .. })
    }

    pub fn start(&self) -> Result<()> {
        let mut state = self.lock_state();
        if let AssignerState::Running { .. } = *state {
            return Err(Error::AlreadyRunning(self.name.clone()));
        }

        let cancel = CancellationToken::new();
        let reconciler = Reconciler {
            pool: self.name.clone(),
            spec: self.spec.clone(),
            rng: self.ctx.rng(),
            ctx: self.ctx.clone(),
        };
        let span = info_span!("ip_assigner", pool = %self.name);
        let task = tokio::spawn(reconciler.run(cancel.clone()).instrument(span));

        *state = AssignerState::Running {
            cancel,
            _task: task,
        };
        Ok(())
    }

    pub fn stop(&self) {
        let mut state = self.lock_state();
        if let AssignerState::Running { cancel, .. } = &*state {
            cancel.cancel();
            info!("stopped {} ip assigner", self.name);
        }
        *state = AssignerState::Idle;
    }

    fn lock_state(&self) -> MutexGuard<'_, AssignerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PoolAssigner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let AssignerState::Running { cancel, .. } = state {
            cancel.cancel();
        }
    }
}

struct Reconciler {
    pool: String,
    spec: FloatingIPPoolSpec,
    ctx: AssignerContext,
    rng: StdRng,
}

impl Reconciler {
    async fn run(mut self, cancel: CancellationToken) {
        info!("started {} ip assigner", self.pool);
        let interval = self.spec.effective_interval(self.ctx.min_interval);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = self.ctx.clock.after(interval) => {
                    if let Err(e) = self.run_pass().await {
                        error!("error assigning ip: {}", e);
                    }
                }
            }
        }
    }

    async fn run_pass(&mut self) -> Result<()> {
        let started = self.ctx.clock.now();
        run_pass(&self.ctx, &self.pool, &self.spec, &mut self.rng).await?;
        debug!(
            "{} pass finished in {:?}",
            self.pool,
            self.ctx.clock.now().saturating_duration_since(started)
        );
        Ok(())
    }
}

/// One full pass: select targets, resolve the pool's IPs and the servers,
/// plan, apply.
pub async fn run_pass(
    ctx: &AssignerContext,
    pool: &str,
    spec: &FloatingIPPoolSpec,
    rng: &mut StdRng,
) -> Result<()> {
    let selector = LabelSelector::new(spec.node_selector.clone());
    let targets = selector::select_targets(ctx.machines.as_ref(), pool, &selector, rng).await?;

    let ips = inventory::resolve_floating_ips(ctx.provider.as_ref(), &spec.ips).await?;
    let servers = ServerIndex::fetch(ctx.provider.as_ref()).await?;

    let plan = planner::plan_assignments(pool, &targets, ips, &servers)?;
    executor::apply_plan(ctx.provider.as_ref(), pool, &plan).await
}
