//! Readiness barrier for feature-dependent work.
//!
//! An external initializer owns the [`ReadinessHandle`] and marks it ready
//! once the initial data-store sync has completed. Readers hold a
//! [`ReadinessFlag`] and wait on it. The flag is monotonic: once ready it
//! stays ready for the lifetime of the process.

use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use crate::ConditionError;

/// Shortest cadence for the "waiting for controller to sync" log.
pub const MIN_LOG_INTERVAL: Duration = Duration::from_millis(1);

/// Create a linked writer/reader pair, initially not ready.
pub fn readiness_channel() -> (ReadinessHandle, ReadinessFlag) {
    let (tx, rx) = watch::channel(false);
    (ReadinessHandle { tx }, ReadinessFlag { rx })
}

/// Writer side, held by whoever performs the initial sync.
#[derive(Debug)]
pub struct ReadinessHandle {
    tx: watch::Sender<bool>,
}

impl ReadinessHandle {
    /// Signal readiness. Calling this more than once has no further effect.
    pub fn mark_ready(&self) {
        self.tx.send_if_modified(|ready| !std::mem::replace(ready, true));
    }

    /// Another reader for the same flag.
    pub fn flag(&self) -> ReadinessFlag {
        ReadinessFlag {
            rx: self.tx.subscribe(),
        }
    }
}

/// Reader side of the readiness signal.
#[derive(Debug, Clone)]
pub struct ReadinessFlag {
    rx: watch::Receiver<bool>,
}

impl ReadinessFlag {
    /// A flag that is already ready.
    pub fn ready() -> Self {
        let (tx, rx) = watch::channel(true);
        drop(tx);
        Self { rx }
    }

    /// Current value, read fresh on every call.
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the flag is ready.
    ///
    /// Logs "waiting for controller to sync" every `log_interval` while
    /// pending. Returns as soon as the writer signals, not on the next tick.
    pub async fn wait(&self, log_interval: Duration) -> Result<(), ConditionError> {
        let mut rx = self.rx.clone();
        if *rx.borrow_and_update() {
            return Ok(());
        }

        // A zero period is rejected by `interval`.
        let mut ticker = tokio::time::interval(log_interval.max(MIN_LOG_INTERVAL));

        loop {
            if *rx.borrow_and_update() {
                return Ok(());
            }

            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return if *rx.borrow() {
                            Ok(())
                        } else {
                            Err(ConditionError::ReadinessAbandoned)
                        };
                    }
                }
                _ = ticker.tick() => {
                    info!("waiting for controller to sync");
                }
            }
        }
    }

    /// Like [`ReadinessFlag::wait`], but gives up when `shutdown` flips true.
    pub async fn wait_or_shutdown(
        &self,
        log_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ConditionError> {
        if *shutdown.borrow() {
            return Err(ConditionError::Cancelled);
        }

        let wait = self.wait(log_interval);
        tokio::pin!(wait);

        loop {
            tokio::select! {
                result = &mut wait => return result,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Shutdown can no longer be signalled; keep waiting.
                        return wait.await;
                    }
                    if *shutdown.borrow() {
                        return Err(ConditionError::Cancelled);
                    }
                }
            }
        }
    }

    /// Like [`ReadinessFlag::wait`], but fails once `deadline` has elapsed.
    pub async fn wait_with_deadline(
        &self,
        log_interval: Duration,
        deadline: Duration,
    ) -> Result<(), ConditionError> {
        tokio::time::timeout(deadline, self.wait(log_interval))
            .await
            .map_err(|_| ConditionError::ReadinessTimeout(deadline))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG_INTERVAL: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_ready_flag_returns_immediately() {
        let flag = ReadinessFlag::ready();
        assert!(flag.is_ready());
        flag.wait(LOG_INTERVAL).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_returns_after_flip() {
        let (handle, flag) = readiness_channel();
        assert!(!flag.is_ready());

        let waiter = tokio::spawn({
            let flag = flag.clone();
            async move { flag.wait(LOG_INTERVAL).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        handle.mark_ready();

        // Far less than one log interval.
        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish right after the flip")
            .unwrap();
        assert!(result.is_ok());
        assert!(flag.is_ready());
    }

    #[tokio::test]
    async fn test_mark_ready_is_idempotent() {
        let (handle, flag) = readiness_channel();
        handle.mark_ready();
        handle.mark_ready();

        assert!(flag.is_ready());
        assert!(handle.flag().is_ready());
    }

    #[tokio::test]
    async fn test_wait_abandoned_writer() {
        let (handle, flag) = readiness_channel();
        drop(handle);

        let err = flag.wait(LOG_INTERVAL).await.unwrap_err();
        assert_eq!(err, ConditionError::ReadinessAbandoned);
    }

    #[tokio::test]
    async fn test_ready_before_writer_dropped() {
        let (handle, flag) = readiness_channel();
        handle.mark_ready();
        drop(handle);

        flag.wait(LOG_INTERVAL).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_cancelled_by_shutdown() {
        let (_handle, flag) = readiness_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let waiter = tokio::spawn(async move { flag.wait_or_shutdown(LOG_INTERVAL, shutdown_rx).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown_tx.send(true).unwrap();

        let err = waiter.await.unwrap().unwrap_err();
        assert_eq!(err, ConditionError::Cancelled);
    }

    #[tokio::test]
    async fn test_zero_log_interval_when_ready() {
        let (handle, flag) = readiness_channel();
        handle.mark_ready();

        flag.wait(Duration::ZERO).await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_log_interval_while_pending() {
        let (handle, flag) = readiness_channel();

        let waiter = tokio::spawn({
            let flag = flag.clone();
            async move { flag.wait(Duration::ZERO).await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        handle.mark_ready();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish right after the flip")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_with_deadline_times_out() {
        let (_handle, flag) = readiness_channel();
        let deadline = Duration::from_millis(20);

        let err = flag.wait_with_deadline(LOG_INTERVAL, deadline).await.unwrap_err();
        assert_eq!(err, ConditionError::ReadinessTimeout(deadline));
    }
}
