//! The repeating refresh timer. The first tick lands one full period after
//! `start`; the immediate poll on startup belongs to bootstrap.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(30);

#[derive(Default)]
pub struct Scheduler {
    running: Option<(watch::Sender<bool>, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `on_tick` every `period` until stopped. Restarting replaces the
    /// previous timer.
    pub fn start<F>(&mut self, handle: &Handle, period: Duration, on_tick: F)
    where
        F: Fn() + Send + 'static,
    {
        self.stop();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join = handle.spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => on_tick(),
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });
        log_debug!("refresh timer started ({}s period)", period.as_secs());
        self.running = Some((shutdown_tx, join));
    }

    pub fn stop(&mut self) {
        if let Some((shutdown_tx, join)) = self.running.take() {
            let _ = shutdown_tx.send(true);
            join.abort();
            log_debug!("refresh timer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|(_, join)| !join.is_finished())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> impl Fn() + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_every_period_until_stopped() {
        let period = Duration::from_secs(30);
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.start(&Handle::current(), period, counting(&counter));
        assert!(scheduler.is_running());

        time::sleep(period / 2).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        time::sleep(period * 3).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        scheduler.stop();
        assert!(!scheduler.is_running());
        time::sleep(period * 4).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_timer() {
        let period = Duration::from_secs(10);
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.start(&Handle::current(), period, counting(&counter));
        scheduler.start(&Handle::current(), period, counting(&counter));

        time::sleep(period + period / 2).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
