use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::SessionManager;

/// Background task that periodically expires idle sessions
/// Dropping the handle cancels the task
pub struct Sweeper {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawn the sweep loop on the current runtime
    pub fn spawn(manager: Arc<SessionManager>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            // A zero period would make the interval panic
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = manager.sweep().await;
                        debug!("[] - [] Sweep pass done: {:?}", report);
                    }
                }
            }
            info!("[] - [] Session sweeper stopped");
        });

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Stop the loop and wait for it to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::session::{SessionManagerConfig, SessionState};

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_expires_idle_sessions() {
        let clock = ManualClock::default();
        let manager = Arc::new(SessionManager::with_clock(
            SessionManagerConfig {
                ttl: Duration::from_secs(60),
                ..Default::default()
            },
            Arc::new(clock.clone()),
        ));
        let id = manager.create_session().unwrap();

        let sweeper = Sweeper::spawn(manager.clone(), Duration::from_secs(10));
        clock.advance(chrono::Duration::seconds(61));
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(
            manager.get_session(&id).await.unwrap().state,
            SessionState::Expired
        );
        sweeper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_the_task() {
        let manager = Arc::new(SessionManager::new(SessionManagerConfig::default()));
        let sweeper = Sweeper::spawn(manager, Duration::from_secs(1));
        assert!(sweeper.is_running());
        sweeper.shutdown().await;
    }
}
