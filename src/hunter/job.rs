use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::consumer::Delivery;
use super::error::HuntError;
use super::handle::ExecutionHandle;
use crate::cache::ImageCache;
use crate::handlers::{LoadedFrom, RequestHandler};
use crate::request::Request;
use crate::stats::Stats;
use crate::transform::{self, TransformOptions};

/// Identity of one execution attempt, unique within a dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(pub(crate) u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "J{}", self.0)
    }
}

/// Receives exactly one outcome per execution attempt
#[async_trait]
pub trait HuntReporter: Send + Sync {
    async fn report_complete(&self, job: JobId, delivery: Delivery);

    async fn report_failed(&self, job: JobId, error: HuntError);

    /// The attempt hit a transient failure; whether to retry is up to the reporter.
    async fn report_retry(&self, job: JobId, error: HuntError);
}

enum Outcome {
    Complete(Delivery),
    Failed(HuntError),
    Retry(HuntError),
}

/// The work of one attempt: cache lookup, load, transform, cache write.
///
/// Holds no consumer state; results go through a [`HuntReporter`].
pub struct HuntJob {
    id: JobId,
    key: String,
    request: Request,
    handler: Option<Arc<dyn RequestHandler>>,
    memory_cache: Arc<dyn ImageCache>,
    disk_cache: Option<Arc<dyn ImageCache>>,
    stats: Arc<dyn Stats>,
    transform: TransformOptions,
}

impl HuntJob {
    pub fn new(
        id: JobId,
        request: Request,
        handler: Option<Arc<dyn RequestHandler>>,
        memory_cache: Arc<dyn ImageCache>,
        stats: Arc<dyn Stats>,
        transform: TransformOptions,
    ) -> Self {
        let memory_cache = request.memory_cache().cloned().unwrap_or(memory_cache);
        let disk_cache = request.disk_cache().cloned();
        Self {
            id,
            key: request.key(),
            request,
            handler,
            memory_cache,
            disk_cache,
            stats,
            transform,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Execute the attempt and report its outcome.
    ///
    /// Cancelling `handle` abandons the attempt at its next await point and
    /// reports [`HuntError::Cancelled`].
    pub async fn run(&self, handle: ExecutionHandle, reporter: &dyn HuntReporter) {
        let outcome = tokio::select! {
            biased;
            _ = handle.cancelled() => Outcome::Failed(HuntError::Cancelled),
            outcome = self.hunt() => outcome,
        };
        handle.mark_finished();

        match outcome {
            Outcome::Complete(delivery) => {
                debug!(request = %self.request.log_id(), from = %delivery.loaded_from, "Completed");
                reporter.report_complete(self.id, delivery).await;
            }
            Outcome::Retry(err) => {
                warn!(request = %self.request.log_id(), error = %err, "Errored, retry requested");
                reporter.report_retry(self.id, err).await;
            }
            Outcome::Failed(err) => {
                warn!(request = %self.request.log_id(), error = %err, "Errored");
                reporter.report_failed(self.id, err).await;
            }
        }
    }

    async fn hunt(&self) -> Outcome {
        if let Some(delivery) = self.cached() {
            self.stats.cache_hit();
            return Outcome::Complete(delivery);
        }
        self.stats.cache_miss();

        let Some(handler) = &self.handler else {
            return Outcome::Failed(HuntError::UnrecognizedRequest(self.request.to_string()));
        };

        debug!(request = %self.request.log_id(), handler = handler.name(), "Executing");
        let loaded = match handler.load(&self.request).await {
            Ok(loaded) => loaded,
            Err(err) => return self.fail(HuntError::classify(&err)),
        };
        let Some(image) = loaded.image else {
            return Outcome::Failed(HuntError::ContractViolation(format!(
                "handler '{}' returned no image",
                handler.name()
            )));
        };
        self.stats.decoded();
        debug!(
            request = %self.request.log_id(),
            width = image.width(),
            height = image.height(),
            "Decoded"
        );

        let image = if self.request.needs_transformation() || loaded.exif_rotation != 0 {
            let request = self.request.clone();
            let exif_rotation = loaded.exif_rotation;
            let options = self.transform;
            let transformed = tokio::task::spawn_blocking(move || {
                transform::apply(image, &request, exif_rotation, &options)
            })
            .await;

            match transformed {
                Ok(Ok(image)) => {
                    self.stats.transformed();
                    debug!(request = %self.request.log_id(), "Transformed");
                    image
                }
                Ok(Err(err)) => return self.fail(err.into()),
                Err(join) => {
                    return self.fail(HuntError::Failed(format!("transform task failed: {join}")));
                }
            }
        } else {
            image
        };

        self.memory_cache.put(&self.key, image.clone());
        if let Some(disk) = &self.disk_cache {
            disk.put(&self.key, image.clone());
        }

        Outcome::Complete(Delivery {
            image,
            loaded_from: loaded.loaded_from,
        })
    }

    /// Memory first, then the request's disk cache, promoting disk hits.
    fn cached(&self) -> Option<Delivery> {
        if let Some(image) = self.memory_cache.get(&self.key) {
            return Some(Delivery {
                image,
                loaded_from: LoadedFrom::Memory,
            });
        }
        let image = self.disk_cache.as_ref()?.get(&self.key)?;
        self.memory_cache.put(&self.key, image.clone());
        Some(Delivery {
            image,
            loaded_from: LoadedFrom::Disk,
        })
    }

    fn fail(&self, err: HuntError) -> Outcome {
        if err.is_retryable() {
            return Outcome::Retry(err);
        }
        if err.is_resource_exhaustion() {
            let snapshot = self.stats.snapshot();
            error!(request = %self.request.log_id(), ?snapshot, "Resource exhausted");
        }
        Outcome::Failed(err)
    }
}
