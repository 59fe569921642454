//! Polling of the IDA search and notification of new events.
//!
//! Every cycle fetches the current events, picks those whose links were never seen,
//! saves them as seen and only then notifies about them. A crash between saving and
//! sending loses that email instead of repeating it.

use crate::email::notifier::{Notifier, NotifyError};
use crate::ida::api::{EventSource, FetchError};
use crate::ida::model::Event;
use crate::seen_store::{SeenSet, SeenStore};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub struct Watcher<S, N> {
    source: S,
    notifier: N,
    store: SeenStore,
    seen: SeenSet,
    poll_interval: Duration,
}

/// Outcome of a successful cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub new: usize,
}

impl<S, N> Watcher<S, N>
where
    S: EventSource,
    N: Notifier,
{
    /// Loads the seen events from the store
    pub fn new(source: S, notifier: N, store: SeenStore, poll_interval: Duration) -> Self {
        let seen = store.load();

        info!("Starting with {} seen events", seen.len());

        Self {
            source,
            notifier,
            store,
            seen,
            poll_interval,
        }
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Fetch, diff, persist and notify.
    /// Without new events nothing is saved nor sent.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, WatchError> {
        let events = self.source.fetch_events().await?;
        let fetched = events.len();
        let new_events: Vec<Event> = events
            .into_iter()
            .filter(|event| !self.seen.contains(&event.link))
            .collect();

        if new_events.is_empty() {
            info!("No new events among {}", fetched);
            return Ok(CycleReport { fetched, new: 0 });
        }

        info!("Found {} new events among {}", new_events.len(), fetched);

        self.seen.extend(new_events.iter().map(|event| event.link.clone()));
        self.persist();

        self.notifier.notify(&new_events).await?;

        Ok(CycleReport {
            fetched,
            new: new_events.len(),
        })
    }

    /// Runs a cycle, logging instead of returning its failure
    pub async fn tick(&mut self) -> Option<CycleReport> {
        let span = info_span!("cycle", cycle_id = %Uuid::new_v4());

        match self.run_cycle().instrument(span).await {
            Ok(report) => Some(report),
            Err(err) => {
                error!("Cycle failed: {}", err);
                None
            }
        }
    }

    /// Saves the seen set, a failure only risks a repeated email later on
    pub fn persist(&self) {
        if let Err(err) = self.store.save(&self.seen) {
            error!("Could not save seen events: {}", err);
        }
    }

    /// Cycles right away and then every poll interval until `stop` resolves,
    /// after which the seen set is saved one last time.
    ///
    /// Cycles never overlap: a tick due while one is running is skipped.
    pub async fn run_until<F>(mut self, stop: F) -> Self
    where
        F: std::future::Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = interval.tick() => {}
            }

            tokio::select! {
                _ = &mut stop => {
                    warn!("Stopping in the middle of a cycle");
                    break;
                }
                _ = self.tick() => {}
            }
        }

        info!("Stopping, saving seen events");
        self.persist();

        self
    }
}

impl<S, N> Watcher<S, N>
where
    S: EventSource + 'static,
    N: Notifier + 'static,
{
    /// Spawns the polling loop
    pub fn start(self) -> WatcherHandle<S, N> {
        let (stop_sender, stop_receiver) = oneshot::channel::<()>();

        info!(
            "Starting IDA watcher. Interval: {} min.",
            self.poll_interval.as_secs() / 60
        );

        let task = tokio::spawn(self.run_until(async {
            // a dropped handle stops the loop too
            let _ = stop_receiver.await;
        }));

        WatcherHandle { stop_sender, task }
    }
}

pub struct WatcherHandle<S, N> {
    stop_sender: oneshot::Sender<()>,
    task: JoinHandle<Watcher<S, N>>,
}

impl<S, N> WatcherHandle<S, N> {
    /// Cancels the timer and waits for the final save
    pub async fn stop(self) -> Result<Watcher<S, N>, WatchError> {
        let _ = self.stop_sender.send(());

        Ok(self.task.await?)
    }
}

/// Sends every current event once, ignoring and not touching the seen events
pub async fn send_now<S, N>(source: &S, notifier: &N) -> Result<usize, WatchError>
where
    S: EventSource,
    N: Notifier,
{
    let events = source.fetch_events().await?;

    if events.is_empty() {
        info!("No events to send");
        return Ok(0);
    }

    notifier.notify(&events).await?;
    info!("One-off email sent with {} events", events.len());

    Ok(events.len())
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Fetching events failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("Notifying failed: {0}")]
    Notify(#[from] NotifyError),
    #[error("Watcher task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
