//! Background health polling.

use super::Gateway;
use crate::tool_registry::ports::RegistryStore;
use mockable::Clock;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Stop signal and join handle of a running monitor task.
pub(super) struct MonitorHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub(super) fn spawn<S, C>(gateway: Weak<Gateway<S, C>>, interval: Duration) -> Self
    where
        S: RegistryStore + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let (stop, stopped) = watch::channel(false);
        let task = tokio::spawn(poll_health(gateway, interval, stopped));
        Self { stop, task }
    }

    /// Signals the task and waits for the pass in progress to finish.
    pub(super) async fn stop(self) {
        if self.stop.send(true).is_err() {
            debug!("health monitor already exited");
        }
        if let Err(err) = self.task.await {
            debug!(%err, "health monitor task ended abnormally");
        }
    }
}

async fn poll_health<S, C>(
    gateway: Weak<Gateway<S, C>>,
    interval: Duration,
    mut stopped: watch::Receiver<bool>,
) where
    S: RegistryStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    let period = interval.max(MIN_INTERVAL);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_ms = period.as_millis(), "health monitor started");

    loop {
        tokio::select! {
            changed = stopped.changed() => {
                if changed.is_err() || *stopped.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let Some(gateway) = gateway.upgrade() else {
                    break;
                };
                let checked = gateway.run_health_pass().await;
                debug!(checked, "health pass finished");
            }
        }
    }

    info!("health monitor stopped");
}
