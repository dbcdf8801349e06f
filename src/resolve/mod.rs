//! The eager-load resolution pipeline.
//!
//! This module turns a caller's nested include specification into executable
//! work and back into nested objects:
//!
//! 1. [`IncludeSpec`] describes which associations to traverse.
//! 2. [`ValidatedTree`] checks the specification against the association
//!    graph and fixes node identities.
//! 3. [`AliasAllocator`] assigns a collision-free alias to every node
//!    instance, including through entities.
//! 4. [`PlanBuilder`] emits ordered [`JoinClause`]s with association scopes
//!    and caller filters attached.
//! 5. [`Hydrator`] folds the executed rows back into deduplicated,
//!    correctly-shaped graphs.
//!
//! Stage 4's output goes to a [`crate::traits::QueryExecutor`]; everything
//! else is pure computation over immutable inputs.

mod alias;
mod hydrate;
mod include;
mod plan;
mod tree;

pub use alias::{AliasAllocator, AliasMap, AliasStyle, DEFAULT_MAX_IDENTIFIER_LEN};
pub use hydrate::{HydratedObject, HydratedSet, Hydrator, KeyValue, ObjectId, ObjectKey, Slot};
pub use include::{IncludeSpec, include};
pub use plan::{JoinClause, JoinKind, JoinPlan, MAX_JOIN_DEPTH, PlanBuilder, Selection};
pub use tree::{IncludeNode, NodeId, ValidatedTree};
