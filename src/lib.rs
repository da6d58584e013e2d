//! Keeps pools of Hetzner Cloud floating IPs spread over Kubernetes nodes.
//!
//! Every `FloatingIPPool` resource gets its own [`PoolAssigner`], a task that
//! periodically lists the nodes matching the pool's selector, looks up the
//! pool's floating IPs at Hetzner and moves IPs until each node holds at least
//! one (or, when IPs are scarce, until no IP sits on an ineligible server).
//! The [`PoolSupervisor`] starts, restarts and stops assigners as pool
//! resources come and go.

pub mod assigner;
pub mod clock;
pub mod config;
pub mod crd;
pub mod error;
pub mod executor;
pub mod inventory;
pub mod planner;
pub mod provider;
pub mod selector;
pub mod supervisor;
pub mod watcher;

#[cfg(test)]
mod test_utils;

pub use assigner::{AssignerContext, PoolAssigner};
pub use crd::{FloatingIPPool, FloatingIPPoolSpec};
pub use error::{Error, Result};
pub use supervisor::PoolSupervisor;
