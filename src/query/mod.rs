//! Query descriptions and the execution seam.
//!
//! The cache never interprets statement semantics. It reads the rendered
//! statement text, the bound parameters and the target table, and hands the
//! descriptor back to a [`QueryExecutor`] on a miss.

mod select;
mod value;

use async_trait::async_trait;

use crate::error::ExecutionError;

pub use select::{Direction, Projection, SelectQuery};
pub use value::{ResultSet, Value};

/// Structural description of a pending query.
pub trait QueryDescriptor: Send + Sync {
    /// Normalized statement text for the given projection.
    fn statement(&self, projection: &Projection) -> String;

    /// Bound parameters in placeholder order.
    fn bindings(&self) -> &[Value];

    /// Logical resource the query reads from. Used as the invalidation tag.
    fn target(&self) -> &str;
}

/// The engine that actually runs queries.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(
        &self,
        query: &dyn QueryDescriptor,
        projection: &Projection,
    ) -> Result<ResultSet, ExecutionError>;
}
