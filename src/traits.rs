//! The storage boundary consumed by the resolver.

pub use futures::future::BoxFuture;

use crate::error::StorageError;
use crate::filter::Filter;
use crate::resolve::JoinPlan;
use crate::row::RowSet;

/// A storage backend able to execute a join plan.
///
/// The engine does not prescribe whether an implementation issues one SQL
/// statement with all joins flattened ([`JoinPlan::to_sql`] renders that
/// form) or a sequence of statements; it only requires the [`RowSet`]
/// contract documented on [`crate::row::Row`]. This is the engine's only
/// suspension point; failures propagate unchanged, with no retry.
pub trait QueryExecutor {
    /// Execute the plan, narrowing root rows with `root_filter`.
    fn execute<'a>(
        &'a self,
        plan: &'a JoinPlan,
        root_filter: &'a Filter,
    ) -> BoxFuture<'a, Result<RowSet, StorageError>>;
}
