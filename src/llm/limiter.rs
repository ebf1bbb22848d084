use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::ModelError;

use super::{ChatModel, ModelRequest, ModelStream};

/// Bounds concurrent model streams across all runs.
/// A permit is held until the returned stream is dropped.
pub struct ConcurrencyLimitedModel {
    inner: Arc<dyn ChatModel>,
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimitedModel {
    pub fn new(inner: Arc<dyn ChatModel>, max_concurrent: usize) -> Self {
        Self {
            inner,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[async_trait]
impl ChatModel for ConcurrencyLimitedModel {
    fn model_name(&self, thinking: bool) -> String {
        self.inner.model_name(thinking)
    }

    async fn stream(&self, request: ModelRequest<'_>) -> Result<ModelStream, ModelError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ModelError::LimiterClosed)?;
        debug!("[LLM] Acquired permit, {} slots remaining", self.semaphore.available_permits());

        let stream = self.inner.stream(request).await?;
        Ok(stream
            .map(move |item| {
                let _held = &permit;
                item
            })
            .boxed())
    }
}
