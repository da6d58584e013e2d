//! Decides which floating IP moves to which node.
//!
//! IPs that are unassigned or sit on a server outside the current targets are
//! queued for assignment. When enough IPs are already held by targets to give
//! each target one, IPs are taken away from targets holding several until
//! every target can be covered. Queued IPs go to uncovered targets first and
//! then round-robin over all targets.

use std::collections::{BTreeMap, VecDeque};

use tracing::info;

use crate::error::{Error, Result};
use crate::inventory::ServerIndex;
use crate::provider::{FloatingIp, Server};
use crate::selector::Targets;

/// Upper bound on scans over the held buckets while rebalancing. The scan
/// removes one surplus IP per over-full bucket per pass and always terminates
/// well before this; the cap only guards against a broken invariant.
pub const MAX_REBALANCE_PASSES: usize = 100;

/// One planned move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub floating_ip: FloatingIp,
    pub server: Server,
}

/// Where the pool's IPs currently stand relative to the targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// IPs held by a target, keyed by the target's position in the shuffled names.
    pub held: BTreeMap<usize, Vec<FloatingIp>>,
    /// IPs to (re)assign, in order.
    pub queued: Vec<FloatingIp>,
}

impl Classification {
    pub fn held_count(&self) -> usize {
        self.held.values().map(Vec::len).sum()
    }

    pub fn covered_targets(&self) -> usize {
        self.held.len()
    }
}

pub fn classify(
    pool: &str,
    target_names: &[String],
    ips: Vec<FloatingIp>,
    servers: &ServerIndex,
) -> Classification {
    let mut classification = Classification::default();

    for ip in ips {
        let Some(server_id) = ip.server else {
            info!("{} ip {} is not assigned to any node", pool, ip.ip);
            classification.queued.push(ip);
            continue;
        };

        let holder = servers
            .by_id(server_id)
            .and_then(|server| target_names.iter().position(|name| *name == server.name));

        match holder {
            Some(position) => classification.held.entry(position).or_default().push(ip),
            None => {
                info!("{} ip {} is assigned to unknown node", pool, ip.ip);
                classification.queued.push(ip);
            }
        }
    }

    classification
}

/// True when targets already hold enough IPs for one each, yet some target
/// holds none while another holds several.
pub fn needs_rebalance(classification: &Classification, target_count: usize) -> bool {
    let held = classification.held_count();
    let covered = classification.covered_targets();
    held >= target_count && covered < target_count && covered < held
}

/// Moves surplus IPs from over-full targets to the queue. Returns how many moved,
/// which is `held_count - covered_targets`.
pub fn rebalance(pool: &str, classification: &mut Classification) -> usize {
    let excess = classification.held_count() - classification.covered_targets();
    let mut moved = 0;
    let mut passes = 0;

    while moved < excess && passes < MAX_REBALANCE_PASSES {
        for bucket in classification.held.values_mut() {
            if bucket.len() > 1 {
                let ip = bucket.remove(0);
                info!("{} ip {} will be reassigned", pool, ip.ip);
                classification.queued.push(ip);
                moved += 1;
            }
            if moved >= excess {
                break;
            }
        }
        passes += 1;
    }

    moved
}

/// Target names holding no IP, in target order.
pub fn uncovered_targets(
    target_names: &[String],
    held: &BTreeMap<usize, Vec<FloatingIp>>,
) -> Vec<String> {
    target_names
        .iter()
        .enumerate()
        .filter(|(position, _)| !held.contains_key(position))
        .map(|(_, name)| name.clone())
        .collect()
}

pub fn plan_assignments(
    pool: &str,
    targets: &Targets,
    ips: Vec<FloatingIp>,
    servers: &ServerIndex,
) -> Result<Vec<Assignment>> {
    if targets.is_empty() {
        return Err(Error::NoTargets);
    }
    let names = &targets.names;

    let mut classification = classify(pool, names, ips, servers);
    let uncovered = uncovered_targets(names, &classification.held);

    if needs_rebalance(&classification, names.len()) {
        info!("{} ips are not equally spread over possible targets", pool);
        rebalance(pool, &mut classification);
    }

    let mut uncovered = VecDeque::from(uncovered);
    classification
        .queued
        .into_iter()
        .enumerate()
        .map(|(i, floating_ip)| {
            let name = uncovered
                .pop_front()
                .unwrap_or_else(|| names[i % names.len()].clone());
            let server = servers
                .by_name(&name)
                .cloned()
                .ok_or(Error::UnknownServer(name))?;
            Ok(Assignment {
                floating_ip,
                server,
            })
        })
        .collect()
}
