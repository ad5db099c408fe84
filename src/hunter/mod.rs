//! Hunters: one coalesced unit of work per request fingerprint
//!
//! A [`Hunter`] is owned by the dispatcher. It tracks the consumers waiting
//! on a fingerprint, their aggregate priority, a FIFO sequence number and
//! the execution handle of the current attempt. The work itself is a
//! [`HuntJob`], which reports back through a [`HuntReporter`] and never
//! touches consumer state.

mod consumer;
mod error;
mod handle;
mod job;

pub use consumer::{Consumer, ConsumerId, Delivery, HuntResult, Priority};
pub use error::HuntError;
pub use handle::ExecutionHandle;
pub use job::{HuntJob, HuntReporter, JobId};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::ImageCache;
use crate::handlers::RequestHandler;
use crate::request::Request;
use crate::stats::Stats;
use crate::transform::TransformOptions;

/// Process-wide hunter sequence; the only global besides the request id.
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// State of the current execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuntState {
    Created,
    Running,
    Succeeded,
    Failed,
    RetryRequested,
    Cancelled,
}

impl HuntState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, HuntState::Created | HuntState::Running)
    }
}

impl fmt::Display for HuntState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HuntState::Created => "created",
            HuntState::Running => "running",
            HuntState::Succeeded => "succeeded",
            HuntState::Failed => "failed",
            HuntState::RetryRequested => "retry-requested",
            HuntState::Cancelled => "cancelled",
        })
    }
}

pub struct Hunter {
    key: String,
    request: Request,
    handler: Option<Arc<dyn RequestHandler>>,
    primary: Option<Consumer>,
    secondaries: HashMap<ConsumerId, Consumer>,
    sequence: u64,
    handle: ExecutionHandle,
    state: HuntState,
    retry_count: u32,
    job: Option<JobId>,
}

impl Hunter {
    /// `handler` is `None` when resolution found nothing; the first attempt
    /// then fails as an unrecognized request.
    pub fn new(request: Request, handler: Option<Arc<dyn RequestHandler>>) -> Self {
        Self {
            key: request.key(),
            request,
            handler,
            primary: None,
            secondaries: HashMap::new(),
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            handle: ExecutionHandle::new(),
            state: HuntState::Created,
            retry_count: 0,
            job: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn handler(&self) -> Option<&Arc<dyn RequestHandler>> {
        self.handler.as_ref()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn state(&self) -> HuntState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Job id of the attempt in flight, if any.
    pub fn job(&self) -> Option<JobId> {
        self.job
    }

    /// The first consumer becomes primary, later ones are secondaries.
    pub fn attach(&mut self, consumer: Consumer) {
        if self.primary.is_none() {
            self.primary = Some(consumer);
        } else {
            self.secondaries.insert(consumer.id(), consumer);
        }
    }

    /// Remove a consumer. A secondary is never promoted to primary.
    pub fn detach(&mut self, id: ConsumerId) -> Option<Consumer> {
        if self.primary.as_ref().is_some_and(|c| c.id() == id) {
            return self.primary.take();
        }
        self.secondaries.remove(&id)
    }

    pub fn primary(&self) -> Option<&Consumer> {
        self.primary.as_ref()
    }

    pub fn secondaries(&self) -> impl Iterator<Item = &Consumer> {
        self.secondaries.values()
    }

    pub fn has_consumers(&self) -> bool {
        self.primary.is_some() || !self.secondaries.is_empty()
    }

    pub fn consumer_count(&self) -> usize {
        usize::from(self.primary.is_some()) + self.secondaries.len()
    }

    /// Everyone attached right now, for fan-out.
    pub fn take_consumers(&mut self) -> Vec<Consumer> {
        self.primary
            .take()
            .into_iter()
            .chain(self.secondaries.drain().map(|(_, c)| c))
            .collect()
    }

    /// Highest priority among attached consumers, `Low` when there are none.
    pub fn priority(&self) -> Priority {
        self.primary
            .iter()
            .chain(self.secondaries.values())
            .map(Consumer::priority)
            .max()
            .unwrap_or(Priority::Low)
    }

    /// Cancel the current attempt. Refused while any consumer is attached,
    /// or when the attempt already finished.
    pub fn cancel(&mut self) -> bool {
        if self.has_consumers() {
            return false;
        }
        let cancelled = self.handle.cancel();
        if cancelled {
            self.state = HuntState::Cancelled;
        }
        cancelled
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// Mark the hunter running under `job` and build the work for it.
    pub fn start(
        &mut self,
        job: JobId,
        memory_cache: Arc<dyn ImageCache>,
        stats: Arc<dyn Stats>,
        transform: TransformOptions,
    ) -> (HuntJob, ExecutionHandle) {
        self.state = HuntState::Running;
        self.job = Some(job);
        let work = HuntJob::new(
            job,
            self.request.clone(),
            self.handler.clone(),
            memory_cache,
            stats,
            transform,
        );
        (work, self.handle.clone())
    }

    /// Record the reported outcome of the current attempt.
    pub fn finish(&mut self, state: HuntState) {
        self.state = state;
        self.job = None;
    }

    /// Whether a transient failure may be retried under `max_retries`.
    pub fn should_retry(&self, max_retries: u32) -> bool {
        self.retry_count < max_retries && self.handler.as_ref().is_some_and(|h| h.retryable())
    }

    /// Prepare a fresh attempt of the same unit, keeping its sequence.
    pub fn prepare_retry(&mut self) {
        self.retry_count += 1;
        self.state = HuntState::Created;
        self.handle = ExecutionHandle::new();
        self.job = None;
    }
}

impl fmt::Debug for Hunter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hunter")
            .field("key", &self.key)
            .field("sequence", &self.sequence)
            .field("state", &self.state)
            .field("consumers", &self.consumer_count())
            .field("priority", &self.priority())
            .field("retry_count", &self.retry_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{HandlerError, LoadResult};
    use crate::request::RequestBuilder;
    use async_trait::async_trait;

    struct Network;

    #[async_trait]
    impl RequestHandler for Network {
        fn name(&self) -> &'static str {
            "network"
        }

        fn can_handle(&self, _request: &Request) -> bool {
            true
        }

        async fn load(&self, _request: &Request) -> Result<LoadResult, HandlerError> {
            Err(HandlerError::Network("unreachable".into()))
        }

        fn retryable(&self) -> bool {
            true
        }
    }

    fn hunter() -> Hunter {
        let request = RequestBuilder::parse_uri("http://example.com/1.png")
            .unwrap()
            .build()
            .unwrap();
        Hunter::new(request, Some(Arc::new(Network)))
    }

    fn consumer(id: u64, priority: Priority) -> Consumer {
        Consumer::new(ConsumerId::new(id), priority).0
    }

    #[test]
    fn test_first_consumer_is_primary() {
        let mut hunter = hunter();
        hunter.attach(consumer(1, Priority::Normal));
        hunter.attach(consumer(2, Priority::Normal));

        assert_eq!(hunter.primary().unwrap().id(), ConsumerId::new(1));
        assert_eq!(hunter.secondaries().count(), 1);
        assert_eq!(hunter.consumer_count(), 2);
    }

    #[test]
    fn test_detach_never_promotes_secondary() {
        let mut hunter = hunter();
        hunter.attach(consumer(1, Priority::Normal));
        hunter.attach(consumer(2, Priority::Normal));

        assert!(hunter.detach(ConsumerId::new(1)).is_some());
        assert!(hunter.primary().is_none());
        assert_eq!(hunter.secondaries().count(), 1);
        assert!(hunter.has_consumers());

        assert!(hunter.detach(ConsumerId::new(2)).is_some());
        assert!(!hunter.has_consumers());
        assert!(hunter.detach(ConsumerId::new(2)).is_none());
    }

    #[test]
    fn test_cancel_refused_while_attached() {
        let mut hunter = hunter();
        hunter.attach(consumer(1, Priority::Normal));
        hunter.attach(consumer(2, Priority::Normal));

        assert!(!hunter.cancel());
        assert!(!hunter.is_cancelled());

        hunter.detach(ConsumerId::new(1));
        assert!(!hunter.cancel());

        hunter.detach(ConsumerId::new(2));
        assert!(hunter.cancel());
        assert!(hunter.is_cancelled());
        assert_eq!(hunter.state(), HuntState::Cancelled);
    }

    #[test]
    fn test_priority_without_consumers_is_low() {
        assert_eq!(hunter().priority(), Priority::Low);
    }

    #[test]
    fn test_priority_is_max_of_consumers() {
        let mut hunter = hunter();
        hunter.attach(consumer(1, Priority::Normal));
        assert_eq!(hunter.priority(), Priority::Normal);

        hunter.attach(consumer(2, Priority::High));
        assert_eq!(hunter.priority(), Priority::High);

        hunter.detach(ConsumerId::new(2));
        assert_eq!(hunter.priority(), Priority::Normal);
    }

    #[test]
    fn test_priority_follows_secondaries_after_primary_leaves() {
        let mut hunter = hunter();
        hunter.attach(consumer(1, Priority::High));
        hunter.attach(consumer(2, Priority::Low));
        hunter.detach(ConsumerId::new(1));
        assert_eq!(hunter.priority(), Priority::Low);
    }

    #[test]
    fn test_sequence_increments() {
        let first = hunter();
        let second = hunter();
        assert!(second.sequence() > first.sequence());
    }

    #[test]
    fn test_take_consumers_drains_everyone() {
        let mut hunter = hunter();
        hunter.attach(consumer(1, Priority::Normal));
        hunter.attach(consumer(2, Priority::High));
        hunter.attach(consumer(3, Priority::Low));

        let taken = hunter.take_consumers();
        assert_eq!(taken.len(), 3);
        assert!(!hunter.has_consumers());
    }

    #[test]
    fn test_retry_bookkeeping() {
        let mut hunter = hunter();
        let sequence = hunter.sequence();
        assert!(hunter.should_retry(2));

        hunter.prepare_retry();
        hunter.prepare_retry();
        assert_eq!(hunter.retry_count(), 2);
        assert!(!hunter.should_retry(2));
        assert_eq!(hunter.sequence(), sequence);
        assert_eq!(hunter.state(), HuntState::Created);
    }

    #[test]
    fn test_no_retry_without_retryable_handler() {
        let request = RequestBuilder::from_resource(1).unwrap().build().unwrap();
        let hunter = Hunter::new(request, None);
        assert!(!hunter.should_retry(5));
    }
}
