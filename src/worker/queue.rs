//! Bounded hand-off between webhook handlers and the analyzer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::analyzer::Analyzer;
use crate::channels::MessageSink;
use crate::core::models::NormalizedMessage;

/// Sending side of the dispatch queue. Cloned into every webhook handler.
#[derive(Clone)]
pub struct DispatchQueue {
    sender: mpsc::Sender<NormalizedMessage>,
}

impl DispatchQueue {
    /// Queue a message without waiting. Returns `false` when it was dropped.
    pub fn enqueue(&self, message: NormalizedMessage) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                warn!(
                    channel = %message.channel_type,
                    external_ref = %message.external_ref,
                    "Dispatch queue full, dropping message"
                );
                false
            }
            Err(TrySendError::Closed(message)) => {
                warn!(
                    channel = %message.channel_type,
                    external_ref = %message.external_ref,
                    "Dispatch queue closed, dropping message"
                );
                false
            }
        }
    }
}

impl MessageSink for DispatchQueue {
    fn deliver(&self, message: NormalizedMessage) {
        self.enqueue(message);
    }
}

/// Handle on the running dispatcher loop.
pub struct Dispatcher {
    handle: JoinHandle<()>,
}

impl Dispatcher {
    /// Wait for queued and in-flight messages to finish once every
    /// [`DispatchQueue`] clone has been dropped. Returns `false` on timeout.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        if let Ok(joined) = tokio::time::timeout(timeout, self.handle).await {
            if let Err(e) = joined {
                warn!(error = %e, "Dispatcher task ended abnormally");
            }
            info!("Dispatcher drained");
            true
        } else {
            warn!(?timeout, "Dispatcher did not drain before shutdown timeout");
            false
        }
    }
}

/// Start the dispatcher: one loop pulling from a queue of `capacity`,
/// running each message on its own task with at most `workers` in flight.
#[must_use]
pub fn spawn_dispatcher(analyzer: Arc<Analyzer>, capacity: usize, workers: usize) -> (DispatchQueue, Dispatcher) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(run(receiver, analyzer, workers.max(1)));
    info!(capacity, workers, "Dispatcher started");
    (DispatchQueue { sender }, Dispatcher { handle })
}

async fn run(mut receiver: mpsc::Receiver<NormalizedMessage>, analyzer: Arc<Analyzer>, workers: usize) {
    let permits = Arc::new(Semaphore::new(workers));
    let mut in_flight = JoinSet::new();

    while let Some(message) = receiver.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let analyzer = Arc::clone(&analyzer);
        in_flight.spawn(async move {
            let outcome = analyzer.handle_message(message).await;
            debug!(?outcome, "Dispatch finished");
            drop(permit);
        });
        while let Some(joined) = in_flight.try_join_next() {
            if let Err(e) = joined {
                warn!(error = %e, "Dispatch task panicked");
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Dispatch task panicked");
        }
    }
}
