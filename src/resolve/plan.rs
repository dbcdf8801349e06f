//! Join plan construction from a validated tree and its alias map.
//!
//! The builder walks the tree depth-first and emits one clause per
//! belongs-to/has-many node and two per through node. Emission follows tree
//! pre-order, so every clause references only previously-introduced aliases;
//! this is why clauses cannot be collected level by level.

use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::error::PlanError;
use crate::filter::{Filter, FilterValue};
use crate::graph::{AssociationGraph, AssociationKind, Entity};
use crate::sql::{DatabaseType, SqlBuilder, escape_identifier, qualify};

use super::alias::AliasMap;
use super::tree::{IncludeNode, ValidatedTree};

/// Defensive bound on include-tree depth.
///
/// Cycles are expressed as repeated-but-finite tree nodes, never as literal
/// graph cycles, so any walk past this bound is a defect.
pub const MAX_JOIN_DEPTH: usize = 64;

/// Join kind of one clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Filtering join: unmatched source rows are dropped.
    Inner,
    /// Preserving join: unmatched source rows carry a null segment.
    Left,
}

impl JoinKind {
    /// SQL keyword for this join kind.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT OUTER JOIN",
        }
    }

    /// Check if this is a filtering join.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner)
    }
}

/// One ordered entry of a join plan.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    /// Alias the join condition reads from; introduced by an earlier clause
    /// or the root.
    pub source: SmolStr,
    /// Join kind.
    pub kind: JoinKind,
    /// Target table name.
    pub table: SmolStr,
    /// Alias introduced for the target.
    pub alias: SmolStr,
    /// Equality pairs (source column, target column), ANDed together.
    pub conditions: SmallVec<[(SmolStr, SmolStr); 1]>,
    /// Extra predicate over the target alias (association scope or caller
    /// `where`); [`Filter::None`] when absent.
    pub predicate: Filter,
}

/// Columns to select for one alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// The alias these columns belong to.
    pub alias: SmolStr,
    /// Entity behind the alias.
    pub entity: SmolStr,
    /// All of the entity's columns, in declaration order.
    pub columns: Vec<SmolStr>,
    /// The entity's primary-key columns.
    pub primary_key: SmallVec<[SmolStr; 1]>,
}

/// An ordered join plan over one validated tree.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinPlan {
    /// Root entity's table.
    pub root_table: SmolStr,
    /// Root alias.
    pub root_alias: SmolStr,
    /// Per-alias selections: root first, then emission order.
    pub selections: Vec<Selection>,
    /// Join clauses in emission order.
    pub clauses: Vec<JoinClause>,
}

impl JoinPlan {
    /// All aliases in the plan, root first.
    pub fn aliases(&self) -> impl Iterator<Item = &SmolStr> {
        self.selections.iter().map(|s| &s.alias)
    }

    /// Look up the selection for an alias.
    pub fn selection(&self, alias: &str) -> Option<&Selection> {
        self.selections.iter().find(|s| s.alias == alias)
    }

    /// Render the plan as one flattened SELECT statement.
    ///
    /// Output columns are named `"alias.column"` so a backend can map them
    /// straight into [`crate::row::Row`] segments. `root_filter` is
    /// qualified with the root alias. Returns the SQL and bound parameters.
    pub fn to_sql(&self, root_filter: &Filter, db: DatabaseType) -> (String, Vec<FilterValue>) {
        let mut builder = SqlBuilder::new(db);
        builder.push("SELECT ");
        let mut first = true;
        for selection in &self.selections {
            for column in &selection.columns {
                if !first {
                    builder.push(", ");
                }
                first = false;
                builder.push(qualify(&selection.alias, column));
                builder.push(" AS ");
                builder.push(escape_identifier(&format!(
                    "{}.{}",
                    selection.alias, column
                )));
            }
        }

        builder.push(" FROM ");
        builder.push_identifier(&self.root_table);
        builder.push(" AS ");
        builder.push_identifier(&self.root_alias);

        for clause in &self.clauses {
            builder.push(" ");
            builder.push(clause.kind.as_sql());
            builder.push(" ");
            builder.push_identifier(&clause.table);
            builder.push(" AS ");
            builder.push_identifier(&clause.alias);
            builder.push(" ON ");
            let on: Vec<_> = clause
                .conditions
                .iter()
                .map(|(source, target)| {
                    format!(
                        "{} = {}",
                        qualify(&clause.source, source),
                        qualify(&clause.alias, target)
                    )
                })
                .collect();
            builder.push(on.join(" AND "));
            if !clause.predicate.is_none() {
                builder.push(" AND ");
                let (sql, params) =
                    clause
                        .predicate
                        .to_sql(Some(clause.alias.as_str()), db, builder.param_count());
                builder.push_fragment(sql, params);
            }
        }

        if !root_filter.is_none() {
            builder.push(" WHERE ");
            let (sql, params) =
                root_filter.to_sql(Some(self.root_alias.as_str()), db, builder.param_count());
            builder.push_fragment(sql, params);
        }

        builder.build()
    }
}

/// Builds join plans against one immutable graph.
#[derive(Debug, Clone, Copy)]
pub struct PlanBuilder<'g> {
    graph: &'g AssociationGraph,
}

impl<'g> PlanBuilder<'g> {
    /// Create a builder over the graph.
    pub fn new(graph: &'g AssociationGraph) -> Self {
        Self { graph }
    }

    /// Build the ordered join plan for `tree` under `aliases`.
    pub fn build(&self, tree: &ValidatedTree, aliases: &AliasMap) -> Result<JoinPlan, PlanError> {
        let root = self.entity(tree.root())?;
        let mut selections = vec![selection_for(aliases.root().clone(), root)];
        let mut clauses = Vec::new();

        for node in tree.nodes() {
            if node.depth > MAX_JOIN_DEPTH {
                return Err(PlanError::DepthExceeded {
                    path: node.path_string(),
                    depth: node.depth,
                    max: MAX_JOIN_DEPTH,
                });
            }
            self.emit(node, aliases, &mut selections, &mut clauses)?;
        }

        let plan = JoinPlan {
            root_table: root.table().clone(),
            root_alias: aliases.root().clone(),
            selections,
            clauses,
        };
        tracing::debug!(
            root = %plan.root_table,
            clauses = plan.clauses.len(),
            aliases = plan.selections.len(),
            "built join plan"
        );
        Ok(plan)
    }

    fn emit(
        &self,
        node: &IncludeNode,
        aliases: &AliasMap,
        selections: &mut Vec<Selection>,
        clauses: &mut Vec<JoinClause>,
    ) -> Result<(), PlanError> {
        let parent_alias = match node.parent {
            Some(parent) => aliases.alias(parent).clone(),
            None => aliases.root().clone(),
        };
        // Required affects only this node's own join(s).
        let kind = if node.required {
            JoinKind::Inner
        } else {
            JoinKind::Left
        };
        let source_entity = self.entity(node.association.source())?;
        let target_entity = self.entity(node.association.target())?;
        let target_alias = aliases.alias(node.id).clone();
        let caller_filter = node.filter.clone().unwrap_or_default();

        match node.association.kind() {
            AssociationKind::BelongsTo { foreign_key } => {
                clauses.push(JoinClause {
                    source: parent_alias,
                    kind,
                    table: target_entity.table().clone(),
                    alias: target_alias.clone(),
                    conditions: SmallVec::from_iter([(
                        foreign_key.clone(),
                        self.single_key(target_entity)?,
                    )]),
                    predicate: caller_filter,
                });
            }
            AssociationKind::HasMany { foreign_key } => {
                clauses.push(JoinClause {
                    source: parent_alias,
                    kind,
                    table: target_entity.table().clone(),
                    alias: target_alias.clone(),
                    conditions: SmallVec::from_iter([(
                        self.single_key(source_entity)?,
                        foreign_key.clone(),
                    )]),
                    predicate: caller_filter,
                });
            }
            AssociationKind::BelongsToManyThrough {
                through,
                foreign_key,
                other_key,
                scope,
            } => {
                let through_entity = self.entity(through)?;
                let through_alias = aliases
                    .through_alias(node.id)
                    .ok_or_else(|| PlanError::GraphMismatch {
                        entity: through.to_string(),
                    })?
                    .clone();
                // The association scope rides on the through leg; the caller
                // filter rides on the target leg. Both legs take the node's
                // kind.
                clauses.push(JoinClause {
                    source: parent_alias,
                    kind,
                    table: through_entity.table().clone(),
                    alias: through_alias.clone(),
                    conditions: SmallVec::from_iter([(
                        self.single_key(source_entity)?,
                        foreign_key.clone(),
                    )]),
                    predicate: scope.clone(),
                });
                selections.push(selection_for(through_alias.clone(), through_entity));
                clauses.push(JoinClause {
                    source: through_alias,
                    kind,
                    table: target_entity.table().clone(),
                    alias: target_alias.clone(),
                    conditions: SmallVec::from_iter([(
                        other_key.clone(),
                        self.single_key(target_entity)?,
                    )]),
                    predicate: caller_filter,
                });
            }
        }
        selections.push(selection_for(target_alias, target_entity));
        Ok(())
    }

    fn entity(&self, name: &str) -> Result<&'g Entity, PlanError> {
        self.graph
            .entity(name)
            .ok_or_else(|| PlanError::GraphMismatch {
                entity: name.to_string(),
            })
    }

    fn single_key(&self, entity: &Entity) -> Result<SmolStr, PlanError> {
        entity
            .single_primary_key()
            .cloned()
            .ok_or_else(|| PlanError::GraphMismatch {
                entity: entity.name().to_string(),
            })
    }
}

fn selection_for(alias: SmolStr, entity: &Entity) -> Selection {
    Selection {
        alias,
        entity: entity.name().clone(),
        columns: entity.columns().map(|(name, _)| name.clone()).collect(),
        primary_key: entity.primary_key_columns().iter().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AssociationDef, ColumnType, Entity};
    use crate::resolve::alias::{AliasAllocator, AliasStyle};
    use crate::resolve::include::include;
    use crate::resolve::tree::ValidatedTree;

    fn fixture() -> AssociationGraph {
        let mut graph = AssociationGraph::new();
        graph
            .define_entity(
                Entity::new("Customer", "customers")
                    .column("id", ColumnType::Integer)
                    .column("name", ColumnType::Text)
                    .primary_key(["id"]),
            )
            .unwrap();
        graph
            .define_entity(
                Entity::new("Location", "locations")
                    .column("id", ColumnType::Integer)
                    .column("name", ColumnType::Text)
                    .primary_key(["id"]),
            )
            .unwrap();
        graph
            .define_entity(
                Entity::new("System", "systems")
                    .column("id", ColumnType::Integer)
                    .column("name", ColumnType::Text)
                    .column("locationId", ColumnType::Integer)
                    .primary_key(["id"]),
            )
            .unwrap();
        graph
            .define_entity(
                Entity::new("CustomerLocation", "customer_locations")
                    .column("customerId", ColumnType::Integer)
                    .column("locationId", ColumnType::Integer)
                    .column("endAt", ColumnType::Timestamp)
                    .primary_key(["customerId", "locationId"]),
            )
            .unwrap();
        graph
            .define_association(
                "Location",
                AssociationDef::has_many("systems", "System", "locationId").inverse("location"),
            )
            .unwrap();
        graph
            .define_association(
                "Customer",
                AssociationDef::belongs_to_many("locations", "Location")
                    .through("CustomerLocation", "customerId", "locationId")
                    .scope(Filter::is_null("endAt"))
                    .inverse("customers"),
            )
            .unwrap();
        graph
    }

    fn plan_for(graph: &AssociationGraph, includes: &[crate::resolve::IncludeSpec]) -> JoinPlan {
        let tree = ValidatedTree::validate(graph, "Customer", includes).unwrap();
        let aliases = AliasAllocator::new(AliasStyle::Verbose).assign(&tree, graph);
        PlanBuilder::new(graph).build(&tree, &aliases).unwrap()
    }

    #[test]
    fn test_through_emits_two_clauses_with_scope_first() {
        let graph = fixture();
        let plan = plan_for(&graph, &[include("locations")]);

        assert_eq!(plan.clauses.len(), 2);
        let through = &plan.clauses[0];
        assert_eq!(through.table, "customer_locations");
        assert_eq!(through.predicate, Filter::is_null("endAt"));
        assert_eq!(
            through.conditions.as_slice(),
            &[("id".into(), "customerId".into())]
        );

        let target = &plan.clauses[1];
        assert_eq!(target.table, "locations");
        assert_eq!(target.source, through.alias);
        assert_eq!(
            target.conditions.as_slice(),
            &[("locationId".into(), "id".into())]
        );
        assert_eq!(target.predicate, Filter::None);
    }

    #[test]
    fn test_sources_previously_introduced() {
        let graph = fixture();
        let plan = plan_for(
            &graph,
            &[include("locations")
                .include(include("systems"))
                .include(include("customers"))],
        );

        let mut seen = vec![plan.root_alias.clone()];
        for clause in &plan.clauses {
            assert!(
                seen.contains(&clause.source),
                "clause for `{}` references alias `{}` before it exists",
                clause.alias,
                clause.source
            );
            seen.push(clause.alias.clone());
        }
    }

    #[test]
    fn test_required_sets_only_own_kind() {
        let graph = fixture();
        // Optional locations wrapping a required systems leaf.
        let plan = plan_for(
            &graph,
            &[include("locations").include(include("systems").required(true))],
        );

        assert_eq!(plan.clauses[0].kind, JoinKind::Left);
        assert_eq!(plan.clauses[1].kind, JoinKind::Left);
        assert_eq!(plan.clauses[2].kind, JoinKind::Inner);
    }

    #[test]
    fn test_required_through_inners_both_legs() {
        let graph = fixture();
        let plan = plan_for(&graph, &[include("locations").required(true)]);
        assert!(plan.clauses[0].kind.is_inner());
        assert!(plan.clauses[1].kind.is_inner());
    }

    #[test]
    fn test_where_rides_target_leg_without_forcing_inner() {
        let graph = fixture();
        let plan = plan_for(
            &graph,
            &[include("locations").r#where(Filter::equals("name", "Rural Depot"))],
        );

        assert_eq!(plan.clauses[1].kind, JoinKind::Left);
        assert_eq!(
            plan.clauses[1].predicate,
            Filter::equals("name", "Rural Depot")
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let graph = fixture();
        let includes = [include("locations").include(include("systems"))];
        let a = plan_for(&graph, &includes);
        let b = plan_for(&graph, &includes);
        assert_eq!(a, b);
    }

    #[test]
    fn test_depth_bound() {
        let graph = fixture();
        // Alternate locations/customers past the depth bound.
        let mut spec = include("locations");
        for level in 0..MAX_JOIN_DEPTH {
            let name = if level % 2 == 0 { "customers" } else { "locations" };
            spec = include(name).include(spec);
        }
        let tree = ValidatedTree::validate(&graph, "Customer", &[spec]).unwrap();
        let aliases = AliasAllocator::new(AliasStyle::Minified).assign(&tree, &graph);
        let err = PlanBuilder::new(&graph).build(&tree, &aliases).unwrap_err();
        assert!(matches!(err, PlanError::DepthExceeded { .. }));
    }

    #[test]
    fn test_to_sql_shape() {
        let graph = fixture();
        let plan = plan_for(&graph, &[include("locations").required(true)]);
        let (sql, params) = plan.to_sql(&Filter::equals("id", 1i64), DatabaseType::PostgreSQL);

        assert!(sql.starts_with("SELECT "));
        assert!(sql.contains("FROM customers AS customers"));
        assert!(sql.contains("INNER JOIN customer_locations"));
        assert!(sql.contains("endAt IS NULL"));
        assert!(sql.contains("WHERE customers.id = $1"));
        assert_eq!(params, vec![FilterValue::Int(1)]);
    }

    #[test]
    fn test_selections_cover_every_alias() {
        let graph = fixture();
        let plan = plan_for(&graph, &[include("locations").include(include("systems"))]);

        // Root, through, locations, systems.
        assert_eq!(plan.selections.len(), 4);
        for clause in &plan.clauses {
            assert!(plan.selection(&clause.alias).is_some());
        }
    }
}
