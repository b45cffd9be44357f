use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reported by the query execution engine.
///
/// The engine's own error is kept intact as the source so callers can
/// downcast it.
#[derive(Debug, Error)]
#[error("query execution failed: {source}")]
pub struct ExecutionError {
    #[source]
    source: BoxError,
}

impl ExecutionError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn get_ref(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }

    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.downcast_ref::<E>()
    }

    pub fn into_inner(self) -> BoxError {
        self.source
    }
}

/// Failure reported by a cache backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend unavailable: {message}")]
    Unavailable { message: String },
    #[error("store does not support tagged scopes")]
    TagsUnsupported,
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryCacheError {
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("cache store `{store}` failed during {op}")]
    StoreUnavailable {
        store: String,
        op: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("invalid cache configuration for `{key}`: {reason}")]
    Configuration { key: &'static str, reason: String },
    #[error("failed to serialize query bindings: {0}")]
    KeyDerivation(#[from] serde_json::Error),
}

impl QueryCacheError {
    pub fn store(store: impl Into<String>, op: &'static str, source: StoreError) -> Self {
        Self::StoreUnavailable {
            store: store.into(),
            op,
            source,
        }
    }

    pub fn configuration(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            key,
            reason: reason.into(),
        }
    }

    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[derive(Debug, Error)]
    #[error("connection reset")]
    struct ConnectionReset;

    #[test]
    fn execution_error_keeps_engine_error() {
        let error = QueryCacheError::from(ExecutionError::new(ConnectionReset));

        let QueryCacheError::Execution(inner) = &error else {
            panic!("expected execution error, got {error:?}");
        };
        assert!(inner.downcast_ref::<ConnectionReset>().is_some());
        assert_eq!(error.to_string(), "query execution failed: connection reset");
    }

    #[test]
    fn store_error_chain_is_preserved() {
        let error = QueryCacheError::store(
            "redis",
            "read",
            StoreError::unavailable("connection refused"),
        );

        assert!(error.is_store_unavailable());
        assert_eq!(error.to_string(), "cache store `redis` failed during read");
        assert_eq!(
            error.source().map(ToString::to_string).as_deref(),
            Some("store backend unavailable: connection refused")
        );
    }
}
