//! Engine facade
//!
//! [`Engine`] wires the handler registry, cache, stats and dispatcher
//! together. Build one with [`Engine::builder`] inside a tokio runtime:
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use snapfetch::{Engine, Priority, RequestBuilder};
//!
//! let engine = Engine::builder().build()?;
//! let request = RequestBuilder::parse_uri("https://example.com/cat.jpg")?
//!     .resize(128, 128)?
//!     .center_crop()?
//!     .build()?;
//! let ticket = engine.submit(request, Priority::High).await?;
//! let delivery = ticket.wait().await?;
//! println!("{}x{}", delivery.image.width(), delivery.image.height());
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

use bon::bon;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{ImageCache, MemoryCache};
use crate::config::{Config, ValidationError};
use crate::dispatcher::Dispatcher;
use crate::handlers::{HandlerRegistry, RegistryError, RequestHandler, ResourceTable};
use crate::hunter::{Consumer, ConsumerId, Delivery, HuntError, HuntResult, Priority};
use crate::request::Request;
use crate::stats::{EngineStats, Stats, StatsSnapshot};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("engine must be created inside a tokio runtime")]
    NoRuntime,

    #[error("engine is shut down")]
    Shutdown,

    #[error(transparent)]
    Hunt(#[from] HuntError),
}

/// Pending result of one submission
#[derive(Debug)]
pub struct Ticket {
    request_id: u64,
    key: String,
    consumer: ConsumerId,
    reply: oneshot::Receiver<HuntResult>,
}

impl Ticket {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Fingerprint of the submitted request
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn consumer_id(&self) -> ConsumerId {
        self.consumer
    }

    /// Wait for the outcome. A dispatcher that went away reads as shutdown.
    pub async fn wait(self) -> HuntResult {
        self.reply.await.unwrap_or(Err(HuntError::Shutdown))
    }
}

pub struct Engine {
    config: Config,
    dispatcher: Dispatcher,
    registry: HandlerRegistry,
    cache: Arc<dyn ImageCache>,
    stats: Arc<dyn Stats>,
    resources: ResourceTable,
    next_consumer: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[bon]
impl Engine {
    /// Validate `config`, register the built-in handlers followed by
    /// `handlers`, and start the dispatcher.
    #[builder]
    pub fn new(
        #[builder(default)] config: Config,
        #[builder(default)] handlers: Vec<Arc<dyn RequestHandler>>,
        cache: Option<Arc<dyn ImageCache>>,
        stats: Option<Arc<dyn Stats>>,
        #[builder(default)] resources: ResourceTable,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        let mut registry = HandlerRegistry::with_builtins(&config, resources.clone())?;
        for handler in handlers {
            registry.register(handler);
        }

        let cache = cache.unwrap_or_else(|| {
            Arc::new(MemoryCache::new(config.cache.memory_bytes.as_u64()))
        });
        let stats = stats.unwrap_or_else(|| Arc::new(EngineStats::new(cache.clone())));

        let (dispatcher, task) = Dispatcher::spawn(
            config.dispatcher.clone(),
            registry.clone(),
            cache.clone(),
            stats.clone(),
            config.transform_options(),
        );

        info!(
            workers = config.dispatcher.workers,
            cache = %config.cache.memory_bytes,
            handlers = ?registry.names(),
            "Engine started"
        );

        Ok(Self {
            config,
            dispatcher,
            registry,
            cache,
            stats,
            resources,
            next_consumer: AtomicU64::new(1),
            task: Mutex::new(Some(task)),
        })
    }
}

impl Engine {
    /// Stamp `request` and hand it to the dispatcher.
    pub async fn submit(&self, mut request: Request, priority: Priority) -> Result<Ticket, EngineError> {
        request.stamp();
        let request_id = request.id();
        let key = request.key();
        let consumer = ConsumerId::new(self.next_consumer.fetch_add(1, Ordering::Relaxed));
        let (attachment, reply) = Consumer::new(consumer, priority);

        debug!(request = %request.log_id(), %priority, %consumer, "Submitting {request}");
        self.dispatcher
            .submit(request, attachment)
            .await
            .map_err(|_| EngineError::Shutdown)?;

        Ok(Ticket {
            request_id,
            key,
            consumer,
            reply,
        })
    }

    /// Detach the ticket's consumer. Its `wait` resolves to
    /// [`HuntError::Cancelled`] unless the result was already delivered.
    pub async fn cancel(&self, ticket: &Ticket) -> Result<(), EngineError> {
        self.dispatcher
            .cancel(ticket.key.clone(), ticket.consumer)
            .await
            .map_err(|_| EngineError::Shutdown)
    }

    /// Submit at normal priority and wait for the result.
    pub async fn load(&self, request: Request) -> Result<Delivery, EngineError> {
        let ticket = self.submit(request, Priority::Normal).await?;
        Ok(ticket.wait().await?)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<dyn ImageCache> {
        &self.cache
    }

    /// Table behind `resource://` ids; blobs can be added at any time.
    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    /// Handler names in probe order
    pub fn handlers(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    /// Fail outstanding work with [`HuntError::Shutdown`] and stop the
    /// dispatcher. Later submissions fail with [`EngineError::Shutdown`].
    pub async fn shutdown(&self) {
        if self.dispatcher.shutdown().await.is_err() {
            debug!("Dispatcher already stopped");
        }

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Dispatcher task ended abnormally");
            }
        }
        info!("Engine stopped");
    }
}
