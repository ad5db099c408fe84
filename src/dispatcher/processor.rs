use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{ChannelReporter, Message};
use crate::cache::ImageCache;
use crate::config::DispatcherConfig;
use crate::handlers::HandlerRegistry;
use crate::hunter::{
    Consumer, ConsumerId, Delivery, HuntError, HuntResult, HuntState, Hunter, JobId,
};
use crate::request::Request;
use crate::stats::Stats;
use crate::transform::TransformOptions;

/// Reported result of one attempt
pub(crate) enum Outcome {
    Complete(Delivery),
    Failed(HuntError),
    Retry(HuntError),
}

/// Single owner of every hunter.
///
/// All lookups, attaches, detaches and fan-outs happen on this task, so
/// "is there a hunter for this key" and "attach to it" cannot interleave
/// with another submission.
pub(crate) struct Processor {
    rx: mpsc::Receiver<Message>,
    tx: mpsc::WeakSender<Message>,
    config: DispatcherConfig,
    registry: HandlerRegistry,
    cache: Arc<dyn ImageCache>,
    stats: Arc<dyn Stats>,
    transform: TransformOptions,
    hunters: HashMap<String, Hunter>,
    /// Hunters waiting for a worker slot
    ready: HashSet<String>,
    /// Attempts in flight, each holding a worker slot
    jobs: HashMap<JobId, String>,
    next_job: u64,
}

impl Processor {
    pub(crate) fn new(
        rx: mpsc::Receiver<Message>,
        tx: mpsc::WeakSender<Message>,
        config: DispatcherConfig,
        registry: HandlerRegistry,
        cache: Arc<dyn ImageCache>,
        stats: Arc<dyn Stats>,
        transform: TransformOptions,
    ) -> Self {
        Self {
            rx,
            tx,
            config,
            registry,
            cache,
            stats,
            transform,
            hunters: HashMap::new(),
            ready: HashSet::new(),
            jobs: HashMap::new(),
            next_job: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(workers = self.config.workers, "Dispatcher started");

        while let Some(message) = self.rx.recv().await {
            match message {
                Message::Submit { request, consumer } => self.on_submit(request, consumer),
                Message::Cancel { key, consumer } => self.on_cancel(&key, consumer),
                Message::Outcome { job, outcome } => self.on_outcome(job, outcome),
                Message::Requeue { key, sequence } => self.on_requeue(key, sequence),
                Message::Shutdown { done } => {
                    self.on_shutdown();
                    self.rx.close();
                    let _ = done.send(());
                    break;
                }
            }
            self.schedule();
        }

        info!("Dispatcher stopped");
    }

    fn on_submit(&mut self, request: Request, consumer: Consumer) {
        let key = request.key();
        let log_id = request.log_id();

        match self.hunters.entry(key.clone()) {
            Entry::Occupied(mut existing) => {
                let hunter = existing.get_mut();
                hunter.attach(consumer);
                self.stats.coalesced();
                debug!(
                    request = %log_id,
                    consumers = hunter.consumer_count(),
                    priority = %hunter.priority(),
                    "Joined"
                );
            }
            Entry::Vacant(entry) => {
                let handler = self.registry.resolve(&request);
                if handler.is_none() {
                    debug!(request = %log_id, "No handler accepts request");
                }
                let mut hunter = Hunter::new(request, handler);
                hunter.attach(consumer);
                debug!(request = %log_id, sequence = hunter.sequence(), "Created hunter");
                entry.insert(hunter);
                self.ready.insert(key);
            }
        }
    }

    fn on_cancel(&mut self, key: &str, id: ConsumerId) {
        let Some(hunter) = self.hunters.get_mut(key) else {
            return;
        };

        if let Some(consumer) = hunter.detach(id) {
            debug!(key, consumer = %id, "Removed");
            consumer.deliver(Err(HuntError::Cancelled));
        }

        if !hunter.has_consumers() && hunter.cancel() {
            info!(key, "Canceled");
            self.hunters.remove(key);
            self.ready.remove(key);
        }
    }

    fn on_outcome(&mut self, job: JobId, outcome: Outcome) {
        let Some(key) = self.jobs.remove(&job) else {
            return;
        };
        // The hunter may have been cancelled while this attempt ran
        let Some(hunter) = self.hunters.get_mut(&key) else {
            return;
        };
        if hunter.job() != Some(job) {
            return;
        }

        match outcome {
            Outcome::Complete(delivery) => {
                hunter.finish(HuntState::Succeeded);
                self.stats.completed();
                self.fan_out(&key, Ok(delivery));
            }
            Outcome::Failed(err) => {
                hunter.finish(HuntState::Failed);
                self.stats.failed();
                self.fan_out(&key, Err(err));
            }
            Outcome::Retry(err) => {
                hunter.finish(HuntState::RetryRequested);
                if !hunter.has_consumers() {
                    // Everyone left after the attempt finished
                    debug!(key = %key, error = %err, "Dropping retry, no consumers");
                    self.hunters.remove(&key);
                    self.ready.remove(&key);
                } else if hunter.should_retry(self.config.max_retries) {
                    hunter.prepare_retry();
                    self.stats.retried();
                    let attempt = hunter.retry_count();
                    let sequence = hunter.sequence();
                    let delay = self.config.backoff(attempt);
                    info!(
                        request = %hunter.request().log_id(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying"
                    );
                    self.requeue_after(key, sequence, delay);
                } else {
                    let err = if hunter.handler().is_some_and(|h| h.retryable()) {
                        HuntError::RetriesExhausted {
                            attempts: hunter.retry_count() + 1,
                            last: err.to_string(),
                        }
                    } else {
                        err
                    };
                    hunter.finish(HuntState::Failed);
                    self.stats.failed();
                    self.fan_out(&key, Err(err));
                }
            }
        }
    }

    fn on_requeue(&mut self, key: String, sequence: u64) {
        let Some(hunter) = self.hunters.get(&key) else {
            return;
        };
        if hunter.sequence() == sequence && hunter.state() == HuntState::Created {
            self.ready.insert(key);
        }
    }

    fn on_shutdown(&mut self) {
        info!(hunters = self.hunters.len(), "Shutting down dispatcher");
        for (_, mut hunter) in self.hunters.drain() {
            for consumer in hunter.take_consumers() {
                consumer.deliver(Err(HuntError::Shutdown));
            }
            hunter.cancel();
        }
        self.ready.clear();
    }

    /// Deliver to everyone attached right now and retire the hunter.
    fn fan_out(&mut self, key: &str, result: HuntResult) {
        let Some(mut hunter) = self.hunters.remove(key) else {
            return;
        };
        self.ready.remove(key);

        let consumers = hunter.take_consumers();
        debug!(
            request = %hunter.request().log_id(),
            state = %hunter.state(),
            consumers = consumers.len(),
            "Delivering"
        );
        for consumer in consumers {
            consumer.deliver(result.clone());
        }
    }

    fn requeue_after(&self, key: String, sequence: u64, delay: Duration) {
        let Some(tx) = self.tx.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Message::Requeue { key, sequence }).await;
        });
    }

    /// Start ready hunters while worker slots are free, highest priority
    /// first and oldest first among equals.
    fn schedule(&mut self) {
        while self.jobs.len() < self.config.workers {
            let Some(key) = self.next_ready() else {
                break;
            };
            self.ready.remove(&key);
            self.start(key);
        }
    }

    fn next_ready(&self) -> Option<String> {
        self.ready
            .iter()
            .filter_map(|key| self.hunters.get(key))
            .max_by(|a, b| {
                a.priority()
                    .cmp(&b.priority())
                    .then_with(|| b.sequence().cmp(&a.sequence()))
            })
            .map(|hunter| hunter.key().to_string())
    }

    fn start(&mut self, key: String) {
        let Some(tx) = self.tx.upgrade() else {
            warn!(key = %key, "Dispatcher channel closed, dropping hunter");
            return;
        };
        let Some(hunter) = self.hunters.get_mut(&key) else {
            return;
        };

        let job = JobId(self.next_job);
        self.next_job += 1;

        let (work, handle) = hunter.start(job, self.cache.clone(), self.stats.clone(), self.transform);
        debug!(
            request = %hunter.request().log_id(),
            job = %job,
            priority = %hunter.priority(),
            attempt = hunter.retry_count() + 1,
            "Scheduled"
        );
        self.jobs.insert(job, key);

        let reporter = ChannelReporter { tx };
        tokio::spawn(async move {
            work.run(handle, &reporter).await;
        });
    }
}
