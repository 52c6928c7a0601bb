// src/coordinator/waiter.rs

//! Termination-wait poller.
//!
//! After conflicting runs have been told to stop, the launch must not
//! proceed until every same-type conflicting process has fully terminated
//! and no equivalent launch is still starting. This is checked on a fixed
//! cadence: one initial delay, then a steady re-check interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::coordinator::{CoordinatorEvent, CoordinatorOptions, RunRequest, StartingSet};
use crate::session::RunDescriptor;

/// Spawn the polling wait for one restart request.
///
/// Sends [`CoordinatorEvent::WaitSatisfied`] back into the loop once both
/// conditions hold; returns without sending anything when shutdown is
/// observed or the configured check budget is exhausted.
pub fn spawn_termination_waiter(
    request: RunRequest,
    same_type: Vec<Arc<RunDescriptor>>,
    starting: Arc<StartingSet>,
    options: CoordinatorOptions,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
    shutting_down: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        sleep(options.wait_initial_delay).await;

        let mut checks: u32 = 0;
        loop {
            if shutting_down.load(Ordering::SeqCst) {
                debug!("shutdown observed; abandoning termination wait");
                return;
            }

            checks += 1;

            let equivalent_starting = match &request.profile {
                Some(profile) => starting.contains(request.executor, &profile.id),
                None => false,
            };

            let all_terminated = same_type.iter().all(|descriptor| {
                match descriptor.process() {
                    Some(handle) => handle.is_terminated(),
                    None => true,
                }
            });

            if !equivalent_starting && all_terminated {
                debug!(
                    checks,
                    "conflicting processes terminated; proceeding to launch"
                );
                let _ = events.send(CoordinatorEvent::WaitSatisfied(request));
                return;
            }

            if let Some(max) = options.max_wait_checks {
                if checks >= max {
                    warn!(
                        checks,
                        profile = ?request.profile.as_ref().map(|p| &p.id),
                        "termination wait exceeded its check budget; abandoning restart"
                    );
                    return;
                }
            }

            sleep(options.wait_interval).await;
        }
    })
}
