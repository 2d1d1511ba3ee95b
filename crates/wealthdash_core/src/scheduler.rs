use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Local, NaiveDateTime, NaiveTime};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info};

/// Next occurrence of `at` strictly after `now`: today if still ahead, else tomorrow
pub fn next_run(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        now.date()
            .checked_add_days(Days::new(1))
            .map(|d| d.and_time(at))
            .unwrap_or(today)
    }
}

fn delay_until_next(at: NaiveTime) -> Duration {
    let now = Local::now().naive_local();
    (next_run(now, at) - now).to_std().unwrap_or_default()
}

/// Runs one job every day at a fixed local time.
///
/// At most one loop is active at a time; starting an active scheduler is a
/// no-op.
pub struct DailyScheduler {
    running: Arc<AtomicBool>,
    shutdown_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl DailyScheduler {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the daily loop. Returns `false` if it was already running.
    pub async fn start<F, Fut>(&self, run_at: NaiveTime, job: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        info!(run_at = %run_at.format("%H:%M"), "starting daily scheduler");
        self.spawn_loop(move || delay_until_next(run_at), job).await
    }

    async fn spawn_loop<D, F, Fut>(&self, next_delay: D, job: F) -> bool
    where
        D: Fn() -> Duration + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("scheduler already running");
            return false;
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        *self.shutdown_tx.lock().await = Some(shutdown_tx);
        // `stop` owns clearing the flag; the loop only ends through it
        tokio::spawn(async move {
            loop {
                let delay = next_delay();
                debug!(seconds = delay.as_secs(), "next scheduled run");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => job().await,
                    _ = &mut shutdown_rx => {
                        debug!("scheduler shutting down");
                        break;
                    }
                }
            }
        });

        true
    }

    pub async fn stop(&self) {
        if let Some(tx) = self.shutdown_tx.lock().await.take() {
            let _ = tx.send(());
        }
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for DailyScheduler {
    fn default() -> Self {
        Self::new()
    }
}
