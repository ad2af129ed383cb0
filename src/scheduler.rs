// src/scheduler.rs
//! One independent periodic trigger per feed. Triggers never await the
//! refresh they start: a tick spawns the run and returns to waiting, and
//! the job's own skip-if-busy guard handles overlap. A slow weather fetch
//! therefore never delays the market ticker.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::counter;
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::feed::FeedId;
use crate::refresh::RefreshJob;

/// Static per-feed schedule, read-only after startup. Jitter delays only
/// the first tick, to de-synchronize feeds that share an interval.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleSpec {
    pub feed: FeedId,
    pub interval: Duration,
    pub jitter: Option<Duration>,
}

pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    tickers: Vec<JoinHandle<()>>,
    in_flight: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Scheduler {
    /// Spawn one ticker task per (spec, job) pair. The first tick fires
    /// right away (after jitter, if any), so feeds are populated at startup
    /// without waiting a full interval.
    pub fn start(entries: Vec<(ScheduleSpec, Arc<RefreshJob>)>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let in_flight: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));

        let tickers = entries
            .into_iter()
            .map(|(spec, job)| {
                let mut shutdown_rx = shutdown_tx.subscribe();
                let in_flight = in_flight.clone();
                tokio::spawn(async move {
                    if let Some(jitter) = spec.jitter {
                        let delay_ms = rand::rng().random_range(0..=jitter.as_millis() as u64);
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }

                    let mut ticker = tokio::time::interval(spec.interval);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                    loop {
                        tokio::select! {
                            _ = ticker.tick() => {
                                counter!("scheduler_ticks_total", "feed" => spec.feed.as_str())
                                    .increment(1);
                                let job = job.clone();
                                let handle = tokio::spawn(async move {
                                    let _ = job.run().await;
                                });
                                let mut runs =
                                    in_flight.lock().expect("scheduler run registry poisoned");
                                runs.retain(|h| !h.is_finished());
                                runs.push(handle);
                            }
                            _ = shutdown_rx.changed() => {
                                tracing::info!(feed = %spec.feed, "ticker stopped");
                                break;
                            }
                        }
                    }
                })
            })
            .collect();

        Self {
            shutdown_tx,
            tickers,
            in_flight,
        }
    }

    /// Stop issuing triggers immediately, then give in-flight runs a
    /// bounded grace window. Runs still going after the window are aborted;
    /// an aborted run never publishes, so partial results are discarded.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown_tx.send(true);
        for t in self.tickers {
            let _ = t.await;
        }

        let runs: Vec<JoinHandle<()>> = {
            let mut guard = self.in_flight.lock().expect("scheduler run registry poisoned");
            guard.drain(..).collect()
        };

        let deadline = tokio::time::Instant::now() + grace;
        for mut run in runs {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if tokio::time::timeout(remaining, &mut run).await.is_err() {
                tracing::warn!("in-flight refresh exceeded shutdown grace, aborting");
                run.abort();
            }
        }
        tracing::info!("scheduler stopped");
    }
}
