//! The composed resolution entry points.

use tracing::debug;

use crate::error::{ResolveResult, ValidationError};
use crate::filter::{Filter, FilterValue};
use crate::graph::AssociationGraph;
use crate::resolve::{
    AliasAllocator, AliasStyle, DEFAULT_MAX_IDENTIFIER_LEN, HydratedSet, Hydrator, IncludeSpec,
    PlanBuilder, ValidatedTree,
};
use crate::traits::QueryExecutor;

/// Caller options for one resolution.
///
/// The alias style changes generated identifiers only, never plan semantics.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    /// Identifier style for generated aliases.
    pub alias_style: AliasStyle,
    /// Identifier length limit of the target backend.
    pub max_identifier_length: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            alias_style: AliasStyle::Verbose,
            max_identifier_length: DEFAULT_MAX_IDENTIFIER_LEN,
        }
    }
}

impl ResolveOptions {
    /// Create the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the alias style.
    pub fn with_alias_style(mut self, style: AliasStyle) -> Self {
        self.alias_style = style;
        self
    }

    /// Set the identifier length limit.
    pub fn with_max_identifier_length(mut self, max: usize) -> Self {
        self.max_identifier_length = max;
        self
    }
}

/// Resolve a nested include specification against a storage backend.
///
/// Composes validate → assign aliases → build plan → execute → hydrate.
/// Errors from each stage surface verbatim; no partial results are returned
/// on any failure.
pub async fn resolve_includes<E: QueryExecutor>(
    executor: &E,
    graph: &AssociationGraph,
    root_entity: &str,
    includes: &[IncludeSpec],
    root_filter: Filter,
    options: &ResolveOptions,
) -> ResolveResult<HydratedSet> {
    let tree = ValidatedTree::validate(graph, root_entity, includes)?;
    let aliases = AliasAllocator::new(options.alias_style)
        .with_max_len(options.max_identifier_length)
        .assign(&tree, graph);
    let plan = PlanBuilder::new(graph).build(&tree, &aliases)?;
    debug!(
        root = root_entity,
        nodes = tree.len(),
        style = ?options.alias_style,
        "resolving includes"
    );

    let rows = executor.execute(&plan, &root_filter).await?;
    let set = Hydrator::new(graph, &tree, &aliases).hydrate(&rows)?;
    Ok(set)
}

/// Resolve includes for the root row with the given primary-key value.
///
/// Convenience over [`resolve_includes`] for single-column primary keys;
/// composite-keyed roots must filter on their columns explicitly.
pub async fn resolve_by_pk<E: QueryExecutor>(
    executor: &E,
    graph: &AssociationGraph,
    root_entity: &str,
    pk: impl Into<FilterValue>,
    includes: &[IncludeSpec],
    options: &ResolveOptions,
) -> ResolveResult<HydratedSet> {
    let pk_column = graph
        .entity(root_entity)
        .ok_or_else(|| ValidationError::UnknownEntity {
            entity: root_entity.to_string(),
        })?
        .single_primary_key()
        .ok_or_else(|| ValidationError::AmbiguousPrimaryKey {
            entity: root_entity.to_string(),
        })?
        .clone();
    let filter = Filter::equals(pk_column.as_str(), pk);
    resolve_includes(executor, graph, root_entity, includes, filter, options).await
}
