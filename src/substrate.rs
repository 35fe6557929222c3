//! Process-wide handle bundling the breaker registry, retry defaults and the
//! atomic writer. Built once at startup and passed to every skill.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use crate::config::SubstrateConfig;
use crate::error::BreakerError;
use crate::persistence::AtomicWriter;
use crate::resilience::{BreakerRegistry, RetryPolicy};

#[derive(Debug, Clone)]
pub struct Substrate {
    breakers: Arc<BreakerRegistry>,
    retry: RetryPolicy,
    writer: AtomicWriter,
}

impl Substrate {
    pub fn new(breakers: Arc<BreakerRegistry>, retry: RetryPolicy, writer: AtomicWriter) -> Self {
        Self { breakers, retry, writer }
    }

    pub fn from_config(config: &SubstrateConfig) -> Self {
        Self::new(
            Arc::new(BreakerRegistry::from_config(config)),
            (&config.retry).into(),
            AtomicWriter::new((&config.persistence).into()),
        )
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn writer(&self) -> &AtomicWriter {
        &self.writer
    }

    /// Run `operation` with retries inside the breaker for `dependency`.
    ///
    /// An exhausted retry counts as one breaker failure.
    pub async fn guarded_call<T, E, F, Fut>(&self, dependency: &str, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let breaker = self.breakers.get(dependency);
        let retry = self.retry;
        breaker.call(|| async move { retry.run(operation).await }).await
    }
}

impl Default for Substrate {
    fn default() -> Self {
        Self::from_config(&SubstrateConfig::default())
    }
}
