//! Agent message polling
//!
//! At most one poll loop runs per [`Poller`]. The loop stops on its own
//! after a failed fetch; the owner re-arms it with [`Poller::sync`] once the
//! session is connected again.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::ChatApi;
use crate::session::{Completion, Sequencer};
use crate::state::View;

struct PollLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pub struct Poller<T> {
    api: ChatApi,
    view: View,
    sequencer: Sequencer,
    interval: Duration,
    tx: mpsc::UnboundedSender<T>,
    active: Option<PollLoop>,
    starts: u64,
}

impl<T> Poller<T>
where
    T: From<Completion> + Send + 'static,
{
    pub fn new(
        api: ChatApi,
        view: View,
        sequencer: Sequencer,
        interval: Duration,
        tx: mpsc::UnboundedSender<T>,
    ) -> Self {
        Self {
            api,
            view,
            sequencer,
            interval,
            tx,
            active: None,
            starts: 0,
        }
    }

    /// True while a loop is alive. A loop that ended after a failure is not.
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }

    /// Number of loops started so far
    pub fn starts(&self) -> u64 {
        self.starts
    }

    /// Start or stop the loop to match `wanted`. Returns true if a loop was
    /// started or stopped.
    pub fn sync(&mut self, wanted: bool) -> bool {
        if wanted {
            if self.is_active() {
                return false;
            }
            self.start();
            true
        } else {
            self.stop()
        }
    }

    /// Cancel the running loop, if any
    pub fn stop(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                let was_running = !active.handle.is_finished();
                if was_running {
                    tracing::info!(view = self.view.as_str(), "stopping agent polling");
                }
                drop(active);
                was_running
            }
            None => false,
        }
    }

    fn start(&mut self) {
        tracing::info!(
            view = self.view.as_str(),
            interval_ms = self.interval.as_millis() as u64,
            "starting agent polling"
        );
        let token = CancellationToken::new();
        let handle = tokio::spawn(run(
            self.api.clone(),
            self.view,
            self.sequencer.clone(),
            self.interval,
            token.clone(),
            self.tx.clone(),
        ));
        self.active = Some(PollLoop { token, handle });
        self.starts += 1;
    }
}

async fn run<T>(
    api: ChatApi,
    view: View,
    sequencer: Sequencer,
    period: Duration,
    token: CancellationToken,
    tx: mpsc::UnboundedSender<T>,
) where
    T: From<Completion> + Send + 'static,
{
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }

        let ticket = sequencer.next();
        let result = tokio::select! {
            _ = token.cancelled() => break,
            result = api.messages(view) => result,
        };

        let failed = result.is_err();
        if tx.send(Completion::Poll { ticket, result }.into()).is_err() {
            break;
        }
        if failed {
            tracing::debug!(ticket = ticket.value(), "poll loop ending after failure");
            break;
        }
    }
}
