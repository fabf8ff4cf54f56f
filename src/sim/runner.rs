use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::context::GameContext;
use super::job::BackgroundJob;
use crate::db::Store;

/// Owns the background jobs and stops them together.
///
/// Each job gets its own task and interval; a tick error is logged and the
/// job keeps its schedule.
pub struct Supervisor<S: Store> {
    ctx: GameContext<S>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl<S: Store> Supervisor<S> {
    pub fn new(ctx: GameContext<S>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            ctx,
            shutdown,
            tasks: Vec::new(),
        }
    }

    pub fn job_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn spawn<J: BackgroundJob<S>>(&mut self, mut job: J) {
        let ctx = self.ctx.clone();
        let mut stop = self.shutdown.subscribe();
        let name = job.name();
        let period = job.period(&ctx.config);
        let run_on_start = job.run_on_start();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick of a tokio interval completes immediately
            if !run_on_start {
                interval.tick().await;
            }
            tracing::info!(job = name, period_secs = period.as_secs(), "job started");
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = job.tick(&ctx).await {
                            tracing::warn!(job = name, error = %e, "job tick failed");
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!(job = name, "job stopped");
        });
        self.tasks.push((name, handle));
    }

    /// Signal every job to stop and wait for them. A tick in flight finishes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                tracing::error!(job = name, error = %e, "job task panicked");
            }
        }
    }
}
