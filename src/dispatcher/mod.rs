//! Request coordination
//!
//! The [`Dispatcher`] is a handle to a single processor task that owns every
//! live hunter. Submissions for a key that already has a hunter attach to it
//! instead of starting new work; attempts run as separate tasks and report
//! back over the same channel.

mod processor;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::cache::ImageCache;
use crate::config::DispatcherConfig;
use crate::handlers::HandlerRegistry;
use crate::hunter::{Consumer, ConsumerId, Delivery, HuntError, HuntReporter, JobId};
use crate::request::Request;
use crate::stats::Stats;
use crate::transform::TransformOptions;
use processor::{Outcome, Processor};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher is shut down")]
    Closed,
}

pub(crate) enum Message {
    Submit {
        request: Request,
        consumer: Consumer,
    },
    Cancel {
        key: String,
        consumer: ConsumerId,
    },
    Outcome {
        job: JobId,
        outcome: Outcome,
    },
    /// Backoff elapsed for the hunter with this sequence
    Requeue {
        key: String,
        sequence: u64,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Forwards attempt outcomes to the processor
pub(crate) struct ChannelReporter {
    tx: mpsc::Sender<Message>,
}

impl ChannelReporter {
    async fn send(&self, job: JobId, outcome: Outcome) {
        // A closed channel means the dispatcher is gone and nobody is waiting
        let _ = self.tx.send(Message::Outcome { job, outcome }).await;
    }
}

#[async_trait]
impl HuntReporter for ChannelReporter {
    async fn report_complete(&self, job: JobId, delivery: Delivery) {
        self.send(job, Outcome::Complete(delivery)).await;
    }

    async fn report_failed(&self, job: JobId, error: HuntError) {
        self.send(job, Outcome::Failed(error)).await;
    }

    async fn report_retry(&self, job: JobId, error: HuntError) {
        self.send(job, Outcome::Retry(error)).await;
    }
}

/// Handle to the coordinating task
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<Message>,
}

impl Dispatcher {
    /// Start the processor on the current runtime.
    pub fn spawn(
        config: DispatcherConfig,
        registry: HandlerRegistry,
        cache: Arc<dyn ImageCache>,
        stats: Arc<dyn Stats>,
        transform: TransformOptions,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.channel_size);
        let processor =
            Processor::new(rx, tx.downgrade(), config, registry, cache, stats, transform);
        let task = tokio::spawn(processor.run());
        (Self { tx }, task)
    }

    /// Hand a stamped request to the processor. The outcome arrives on the
    /// consumer's reply channel.
    pub async fn submit(&self, request: Request, consumer: Consumer) -> Result<(), DispatchError> {
        self.send(Message::Submit { request, consumer }).await
    }

    /// Detach one consumer from the hunter for `key`. The hunter itself is
    /// cancelled once nobody is attached.
    pub async fn cancel(&self, key: String, consumer: ConsumerId) -> Result<(), DispatchError> {
        self.send(Message::Cancel { key, consumer }).await
    }

    /// Fail every attached consumer with [`HuntError::Shutdown`] and stop.
    pub async fn shutdown(&self) -> Result<(), DispatchError> {
        let (done, rx) = oneshot::channel();
        self.send(Message::Shutdown { done }).await?;
        rx.await.map_err(|_| DispatchError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, message: Message) -> Result<(), DispatchError> {
        self.tx.send(message).await.map_err(|_| DispatchError::Closed)
    }
}
