//! # arbor-query
//!
//! Eager-load resolution engine for the Arbor ORM.
//!
//! Given a static association graph over entity definitions and a nested
//! include specification, this crate produces an ordered join plan for a
//! storage backend and hydrates the flat rows that come back into nested,
//! deduplicated object graphs, including when the include tree revisits the
//! same table at several depths, and when branches mix required (inner-join)
//! and optional (outer-join) semantics.
//!
//! Connection management, SQL dialect details beyond placeholder style, and
//! migrations live behind the [`QueryExecutor`] boundary; this crate is pure
//! computation on both sides of that call.
//!
//! ## Defining the graph
//!
//! ```rust
//! use arbor_query::filter::Filter;
//! use arbor_query::graph::{AssociationDef, AssociationGraph, ColumnType, Entity};
//!
//! let mut graph = AssociationGraph::new();
//! graph.define_entity(
//!     Entity::new("Customer", "customers")
//!         .column("id", ColumnType::Integer)
//!         .column("name", ColumnType::Text)
//!         .primary_key(["id"]),
//! )?;
//! graph.define_entity(
//!     Entity::new("Location", "locations")
//!         .column("id", ColumnType::Integer)
//!         .column("name", ColumnType::Text)
//!         .primary_key(["id"]),
//! )?;
//! graph.define_entity(
//!     Entity::new("CustomerLocation", "customer_locations")
//!         .column("customerId", ColumnType::Integer)
//!         .column("locationId", ColumnType::Integer)
//!         .column("endAt", ColumnType::Timestamp)
//!         .primary_key(["customerId", "locationId"]),
//! )?;
//!
//! // Defining Customer -> locations also registers Location -> customers.
//! graph.define_association(
//!     "Customer",
//!     AssociationDef::belongs_to_many("locations", "Location")
//!         .through("CustomerLocation", "customerId", "locationId")
//!         .scope(Filter::is_null("endAt"))
//!         .inverse("customers"),
//! )?;
//! assert!(graph.association("Location", "customers").is_some());
//! # Ok::<(), arbor_query::error::GraphError>(())
//! ```
//!
//! ## Planning an include tree
//!
//! ```rust
//! # use arbor_query::filter::Filter;
//! # use arbor_query::graph::{AssociationDef, AssociationGraph, ColumnType, Entity};
//! use arbor_query::resolve::{
//!     AliasAllocator, AliasStyle, JoinKind, PlanBuilder, ValidatedTree, include,
//! };
//! # let mut graph = AssociationGraph::new();
//! # graph.define_entity(Entity::new("Customer", "customers")
//! #     .column("id", ColumnType::Integer).primary_key(["id"])).unwrap();
//! # graph.define_entity(Entity::new("Location", "locations")
//! #     .column("id", ColumnType::Integer).primary_key(["id"])).unwrap();
//! # graph.define_entity(Entity::new("CustomerLocation", "customer_locations")
//! #     .column("customerId", ColumnType::Integer)
//! #     .column("locationId", ColumnType::Integer)
//! #     .column("endAt", ColumnType::Timestamp)
//! #     .primary_key(["customerId", "locationId"])).unwrap();
//! # graph.define_association("Customer",
//! #     AssociationDef::belongs_to_many("locations", "Location")
//! #         .through("CustomerLocation", "customerId", "locationId")
//! #         .scope(Filter::is_null("endAt"))
//! #         .inverse("customers")).unwrap();
//!
//! let includes = [include("locations").required(true)];
//! let tree = ValidatedTree::validate(&graph, "Customer", &includes)?;
//! let aliases = AliasAllocator::new(AliasStyle::Verbose).assign(&tree, &graph);
//! let plan = PlanBuilder::new(&graph).build(&tree, &aliases)?;
//!
//! // One clause through the join table (carrying the scope), one to the target.
//! assert_eq!(plan.clauses.len(), 2);
//! assert!(plan.clauses.iter().all(|c| c.kind == JoinKind::Inner));
//! # Ok::<(), arbor_query::error::ResolveError>(())
//! ```
//!
//! Executing a plan and hydrating its rows is composed by
//! [`resolver::resolve_includes`]; see `tests/resolve_integration.rs` for an
//! end-to-end in-memory backend.

pub mod error;
pub mod filter;
pub mod graph;
pub mod logging;
pub mod resolve;
pub mod resolver;
pub mod row;
pub mod sql;
pub mod traits;

pub use error::{
    GraphError, HydrationError, PlanError, ResolveError, ResolveResult, StorageError,
    ValidationError,
};
pub use filter::{Filter, FilterValue};
pub use graph::{Association, AssociationDef, AssociationGraph, AssociationKind, ColumnType, Entity};
pub use resolve::{
    AliasAllocator, AliasMap, AliasStyle, HydratedObject, HydratedSet, Hydrator, IncludeSpec,
    JoinClause, JoinKind, JoinPlan, ObjectId, PlanBuilder, Slot, ValidatedTree, include,
};
pub use resolver::{ResolveOptions, resolve_by_pk, resolve_includes};
pub use row::{Row, RowSet};
pub use sql::{DatabaseType, SqlBuilder};
pub use traits::{BoxFuture, QueryExecutor};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ResolveError, ResolveResult, StorageError};
    pub use crate::filter::{Filter, FilterValue};
    pub use crate::graph::{AssociationDef, AssociationGraph, ColumnType, Entity};
    pub use crate::resolve::{AliasStyle, HydratedSet, IncludeSpec, JoinPlan, include};
    pub use crate::resolver::{ResolveOptions, resolve_by_pk, resolve_includes};
    pub use crate::row::{Row, RowSet};
    pub use crate::traits::{BoxFuture, QueryExecutor};
}
