//! Error types for graph definition, include resolution, and hydration.
//!
//! Each pipeline stage owns its error enum; [`ResolveError`] is the umbrella
//! returned by the resolver facade. Errors carry the association path or the
//! offending identifiers so a caller can locate the mistake in a deep include
//! tree without re-running anything.

use miette::Diagnostic;
use thiserror::Error;

/// Result type for the full resolution pipeline.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors raised while defining entities and associations.
///
/// These are definition-time failures: they surface once at startup and are
/// never recovered from at request time.
#[derive(Error, Debug, Diagnostic)]
pub enum GraphError {
    /// Referenced entity has not been defined.
    #[error("unknown entity `{entity}`")]
    #[diagnostic(code(arbor::graph::unknown_entity))]
    UnknownEntity { entity: String },

    /// Entity name already registered.
    #[error("duplicate entity `{entity}`")]
    #[diagnostic(code(arbor::graph::duplicate_entity))]
    DuplicateEntity { entity: String },

    /// A primary-key column is not among the entity's declared columns.
    #[error("primary key column `{column}` is not a column of `{entity}`")]
    #[diagnostic(code(arbor::graph::unknown_primary_key_column))]
    UnknownPrimaryKeyColumn { entity: String, column: String },

    /// Association name already used on the owning entity.
    #[error("duplicate association `{entity}.{association}`")]
    #[diagnostic(code(arbor::graph::duplicate_association))]
    DuplicateAssociation { entity: String, association: String },

    /// The inverse name collides with an association already on the target.
    #[error("inverse name `{association}` collides with an existing association on `{entity}`")]
    #[diagnostic(code(arbor::graph::inverse_collision))]
    InverseCollision { entity: String, association: String },

    /// An association was declared without an inverse name.
    #[error("association `{association}` is missing an inverse name")]
    #[diagnostic(code(arbor::graph::missing_inverse))]
    MissingInverse { association: String },

    /// A declared foreign key does not reference an existing column.
    #[error("foreign key `{column}` is not a column of `{entity}`")]
    #[diagnostic(code(arbor::graph::unknown_foreign_key))]
    UnknownForeignKey { entity: String, column: String },

    /// A through-association scope references a column the through entity lacks.
    #[error("scope column `{column}` is not a column of through entity `{through}`")]
    #[diagnostic(code(arbor::graph::unknown_scope_column))]
    UnknownScopeColumn { through: String, column: String },

    /// The referenced side of an association has a composite primary key.
    #[error("association references `{entity}`, which has a composite primary key")]
    #[diagnostic(code(arbor::graph::composite_key_reference))]
    CompositeKeyReference { entity: String },

    /// A many-to-many association is missing its through entity or keys.
    #[error("association `{association}` needs a through entity with both foreign keys")]
    #[diagnostic(code(arbor::graph::incomplete_through))]
    IncompleteThrough { association: String },
}

/// Errors raised while validating an include tree against the graph.
///
/// Request-scoped: reported to the caller and never retried. The `path` is
/// the full chain of association names from the root.
#[derive(Error, Debug, Diagnostic)]
pub enum ValidationError {
    /// The root entity is not defined in the graph.
    #[error("unknown root entity `{entity}`")]
    #[diagnostic(code(arbor::validate::unknown_entity))]
    UnknownEntity { entity: String },

    /// An include node names an association its parent's target lacks.
    #[error("unknown association at `{path}`")]
    #[diagnostic(code(arbor::validate::unknown_association))]
    UnknownAssociation { path: String },

    /// A `where` predicate references a column the target entity lacks.
    #[error("unknown column `{column}` in filter at `{path}`")]
    #[diagnostic(code(arbor::validate::unknown_column))]
    UnknownColumn { path: String, column: String },

    /// The same association appears twice under one parent node.
    #[error("association included twice under one parent at `{path}`")]
    #[diagnostic(code(arbor::validate::duplicate_include))]
    DuplicateInclude { path: String },

    /// A primary-key lookup was requested on an entity with a composite key.
    #[error("entity `{entity}` has a composite primary key; filter on its columns explicitly")]
    #[diagnostic(code(arbor::validate::ambiguous_primary_key))]
    AmbiguousPrimaryKey { entity: String },
}

/// Internal invariant violations during join-plan construction.
///
/// These indicate a defect, not caller error; they are surfaced and never
/// retried.
#[derive(Error, Debug, Diagnostic)]
pub enum PlanError {
    /// The include tree exceeds the defensive depth bound.
    #[error("include tree at `{path}` exceeds maximum join depth ({depth} > {max})")]
    #[diagnostic(code(arbor::plan::depth_exceeded))]
    DepthExceeded {
        path: String,
        depth: usize,
        max: usize,
    },

    /// The tree references an entity the graph no longer resolves.
    #[error("validated tree references entity `{entity}` missing from the graph")]
    #[diagnostic(code(arbor::plan::graph_mismatch))]
    GraphMismatch { entity: String },
}

/// Errors raised while reassembling nested objects from flat rows.
#[derive(Error, Debug, Diagnostic)]
pub enum HydrationError {
    /// Two different values arrived for one parent's singular slot.
    #[error("conflicting values for singular association `{parent}.{association}`")]
    #[diagnostic(code(arbor::hydrate::conflicting_singular))]
    ConflictingSingular { parent: String, association: String },

    /// The row set omitted a column the plan requires for an alias.
    #[error("row is missing column `{column}` for alias `{alias}`")]
    #[diagnostic(code(arbor::hydrate::missing_column))]
    MissingColumn { alias: String, column: String },

    /// A primary-key column held a value that cannot serve as a map key.
    #[error("column `{column}` of alias `{alias}` holds a value unusable as a primary key")]
    #[diagnostic(code(arbor::hydrate::unsupported_key))]
    UnsupportedKey { alias: String, column: String },

    /// The tree references an entity the graph no longer resolves.
    #[error("hydration references entity `{entity}` missing from the graph")]
    #[diagnostic(code(arbor::hydrate::graph_mismatch))]
    GraphMismatch { entity: String },
}

/// Opaque failure from the storage backend executing a join plan.
///
/// The engine performs no retries; whatever the backend reports is wrapped
/// here and propagated unchanged.
#[derive(Error, Debug, Diagnostic)]
#[error("storage backend error: {message}")]
#[diagnostic(code(arbor::storage::backend))]
pub struct StorageError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    /// Create a storage error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying backend error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The backend-reported message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Umbrella error for one `resolve_includes` call.
///
/// Stage errors are surfaced verbatim; no partial results accompany any
/// variant.
#[derive(Error, Debug, Diagnostic)]
pub enum ResolveError {
    /// Include tree failed validation.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    /// Join plan construction hit an internal invariant.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Plan(#[from] PlanError),

    /// The storage backend failed; propagated unchanged.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Storage(#[from] StorageError),

    /// Flat rows could not be reassembled into a nested graph.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Hydration(#[from] HydrationError),
}
