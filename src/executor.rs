use tracing::info;

use crate::error::Result;
use crate::planner::Assignment;
use crate::provider::FloatingIpProvider;

/// Applies the plan in order, stopping at the first failed assignment.
/// Moves applied before the failure are left in place.
pub async fn apply_plan(
    provider: &dyn FloatingIpProvider,
    pool: &str,
    plan: &[Assignment],
) -> Result<()> {
    for assignment in plan {
        provider
            .assign_floating_ip(&assignment.floating_ip, &assignment.server)
            .await?;
        info!(
            "{} ip {} assigned to node {}",
            pool, assignment.floating_ip.ip, assignment.server.name
        );
    }
    Ok(())
}
