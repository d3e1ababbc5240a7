// ABOUTME: Polls a deployment's rollout status until ready, failed, or out of time.
// ABOUTME: Shared by every strategy's readiness step.

use tokio::time::Instant;

use super::deployment::Deployment;
use super::outcome::FailureReason;
use crate::ports::RolloutStatus;

impl<S> Deployment<'_, S> {
    /// Wait for `name` to report every replica ready.
    ///
    /// A reported rollout failure ends the wait at once. Query errors and
    /// unanswered queries are retried on the next poll until the rollout
    /// timeout or the run's deadline, whichever comes first.
    pub(crate) async fn wait_ready(&self, name: &str) -> Result<(), FailureReason> {
        let policy = self.env.policy;
        let timeout = policy.rollout_timeout;
        let deadline = Instant::now() + timeout;

        loop {
            let query = self.limited("rollout-status", self.env.cluster.rollout_status(name, self.namespace()));
            let Ok(status) = tokio::time::timeout_at(self.env.deadline, query).await else {
                return Err(self.deadline_exceeded());
            };
            match status {
                Ok(RolloutStatus::Ready) => {
                    tracing::info!(deployment = %name, "rollout ready");
                    return Ok(());
                }
                Ok(RolloutStatus::Failed(detail)) => {
                    return Err(FailureReason::HealthCheck(format!("{name}: {detail}")));
                }
                Ok(RolloutStatus::Progressing { ready, desired }) => {
                    tracing::debug!(deployment = %name, ready, desired, "rollout progressing");
                }
                Err(err) => {
                    tracing::debug!(deployment = %name, error = %err, "rollout status unavailable, retrying");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(FailureReason::Timeout { after: timeout });
            }
            if self.past_deadline() {
                return Err(self.deadline_exceeded());
            }
            let wake = (now + policy.poll_interval).min(deadline).min(self.env.deadline);
            tokio::time::sleep_until(wake).await;
        }
    }
}
