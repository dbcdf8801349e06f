//! The association graph: entities and the declared edges between them.
//!
//! The graph is built once at model-definition time through
//! [`AssociationGraph::define_entity`] and
//! [`AssociationGraph::define_association`], validated as it is built, and
//! read-only afterwards. Every later stage (include validation, alias
//! assignment, plan building, hydration) only queries it for structural
//! facts.

use indexmap::IndexMap;
use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::error::GraphError;
use crate::filter::Filter;

/// Column type of an entity attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Integer column.
    Integer,
    /// Floating-point column.
    Float,
    /// Text column.
    Text,
    /// Boolean column.
    Boolean,
    /// Timestamp column.
    Timestamp,
    /// JSON column.
    Json,
}

/// A named relation with typed columns and a primary key.
#[derive(Debug, Clone)]
pub struct Entity {
    name: SmolStr,
    table: SmolStr,
    columns: IndexMap<SmolStr, ColumnType>,
    primary_key: SmallVec<[SmolStr; 1]>,
    associations: IndexMap<SmolStr, Association>,
}

impl Entity {
    /// Create an entity with the given model name and table name.
    pub fn new(name: impl Into<SmolStr>, table: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: IndexMap::new(),
            primary_key: SmallVec::new(),
            associations: IndexMap::new(),
        }
    }

    /// Add a typed column.
    pub fn column(mut self, name: impl Into<SmolStr>, ty: ColumnType) -> Self {
        self.columns.insert(name.into(), ty);
        self
    }

    /// Set the primary key columns.
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// The model name.
    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    /// The table name.
    pub fn table(&self) -> &SmolStr {
        &self.table
    }

    /// Ordered columns with their types.
    pub fn columns(&self) -> impl Iterator<Item = (&SmolStr, ColumnType)> {
        self.columns.iter().map(|(name, ty)| (name, *ty))
    }

    /// Check whether a column is declared.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// The primary key columns.
    pub fn primary_key_columns(&self) -> &[SmolStr] {
        &self.primary_key
    }

    /// The primary key column, when it is a single column.
    pub fn single_primary_key(&self) -> Option<&SmolStr> {
        match self.primary_key.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Look up an association by name.
    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations.get(name)
    }

    /// Ordered associations declared or synthesized on this entity.
    pub fn associations(&self) -> impl Iterator<Item = &Association> {
        self.associations.values()
    }
}

/// The kind of a declared association.
///
/// A closed tagged variant: the plan builder switches exhaustively over it
/// rather than dispatching through kind-specific behavior.
#[derive(Debug, Clone, PartialEq)]
pub enum AssociationKind {
    /// Owner holds a foreign key referencing the target's primary key.
    BelongsTo {
        /// Foreign key column on the owner.
        foreign_key: SmolStr,
    },
    /// Target holds a foreign key referencing the owner's primary key.
    HasMany {
        /// Foreign key column on the target.
        foreign_key: SmolStr,
    },
    /// Owner and target are linked through a third entity holding both keys.
    BelongsToManyThrough {
        /// The through entity's model name.
        through: SmolStr,
        /// Through column referencing the owner's primary key.
        foreign_key: SmolStr,
        /// Through column referencing the target's primary key.
        other_key: SmolStr,
        /// Fixed predicate over through columns, ANDed into every use.
        scope: Filter,
    },
}

/// A directed, named edge from an owner entity to a target entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    name: SmolStr,
    source: SmolStr,
    target: SmolStr,
    kind: AssociationKind,
    inverse: SmolStr,
}

impl Association {
    /// The association name, unique on the owning entity.
    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    /// The owning entity.
    pub fn source(&self) -> &SmolStr {
        &self.source
    }

    /// The target entity.
    pub fn target(&self) -> &SmolStr {
        &self.target
    }

    /// The association kind.
    pub fn kind(&self) -> &AssociationKind {
        &self.kind
    }

    /// The name of the reverse edge on the target entity.
    pub fn inverse(&self) -> &SmolStr {
        &self.inverse
    }

    /// Check if traversal yields a sequence of targets.
    pub fn is_plural(&self) -> bool {
        matches!(
            self.kind,
            AssociationKind::HasMany { .. } | AssociationKind::BelongsToManyThrough { .. }
        )
    }

    /// Check if traversal yields at most one target.
    pub fn is_singular(&self) -> bool {
        !self.is_plural()
    }
}

#[derive(Debug, Clone)]
enum DefKind {
    BelongsTo {
        foreign_key: SmolStr,
    },
    HasMany {
        foreign_key: SmolStr,
    },
    BelongsToMany {
        through: Option<SmolStr>,
        foreign_key: Option<SmolStr>,
        other_key: Option<SmolStr>,
        scope: Filter,
    },
}

/// Builder for an association definition.
///
/// ```
/// use arbor_query::graph::AssociationDef;
/// use arbor_query::filter::Filter;
///
/// let systems = AssociationDef::has_many("systems", "System", "locationId")
///     .inverse("location");
/// let locations = AssociationDef::belongs_to_many("locations", "Location")
///     .through("CustomerLocation", "customerId", "locationId")
///     .scope(Filter::is_null("endAt"))
///     .inverse("customers");
/// # let _ = (systems, locations);
/// ```
#[derive(Debug, Clone)]
pub struct AssociationDef {
    name: SmolStr,
    target: SmolStr,
    kind: DefKind,
    inverse: Option<SmolStr>,
}

impl AssociationDef {
    /// Declare a belongs-to association; `foreign_key` is on the owner.
    pub fn belongs_to(
        name: impl Into<SmolStr>,
        target: impl Into<SmolStr>,
        foreign_key: impl Into<SmolStr>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind: DefKind::BelongsTo {
                foreign_key: foreign_key.into(),
            },
            inverse: None,
        }
    }

    /// Declare a has-many association; `foreign_key` is on the target.
    pub fn has_many(
        name: impl Into<SmolStr>,
        target: impl Into<SmolStr>,
        foreign_key: impl Into<SmolStr>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind: DefKind::HasMany {
                foreign_key: foreign_key.into(),
            },
            inverse: None,
        }
    }

    /// Declare a many-to-many association resolved via [`Self::through`].
    pub fn belongs_to_many(name: impl Into<SmolStr>, target: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind: DefKind::BelongsToMany {
                through: None,
                foreign_key: None,
                other_key: None,
                scope: Filter::None,
            },
            inverse: None,
        }
    }

    /// Set the through entity and its two foreign keys.
    ///
    /// `foreign_key` references the owner, `other_key` the target. Only
    /// meaningful on a [`Self::belongs_to_many`] definition.
    pub fn through(
        mut self,
        through: impl Into<SmolStr>,
        foreign_key: impl Into<SmolStr>,
        other_key: impl Into<SmolStr>,
    ) -> Self {
        if let DefKind::BelongsToMany {
            through: t,
            foreign_key: fk,
            other_key: ok,
            ..
        } = &mut self.kind
        {
            *t = Some(through.into());
            *fk = Some(foreign_key.into());
            *ok = Some(other_key.into());
        }
        self
    }

    /// Attach a fixed scope predicate over the through entity's columns.
    pub fn scope(mut self, scope: Filter) -> Self {
        if let DefKind::BelongsToMany { scope: s, .. } = &mut self.kind {
            *s = scope;
        }
        self
    }

    /// Name of the reverse edge registered on the target.
    pub fn inverse(mut self, name: impl Into<SmolStr>) -> Self {
        self.inverse = Some(name.into());
        self
    }
}

/// Registry of entities and the associations between them.
#[derive(Debug, Clone, Default)]
pub struct AssociationGraph {
    entities: IndexMap<SmolStr, Entity>,
}

impl AssociationGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity.
    ///
    /// Fails when the name is already taken or a primary-key column is not
    /// among the declared columns.
    pub fn define_entity(&mut self, entity: Entity) -> Result<(), GraphError> {
        if self.entities.contains_key(&entity.name) {
            return Err(GraphError::DuplicateEntity {
                entity: entity.name.to_string(),
            });
        }
        for pk in &entity.primary_key {
            if !entity.columns.contains_key(pk) {
                return Err(GraphError::UnknownPrimaryKeyColumn {
                    entity: entity.name.to_string(),
                    column: pk.to_string(),
                });
            }
        }
        self.entities.insert(entity.name.clone(), entity);
        Ok(())
    }

    /// Register an association on `owner` and its synthesized inverse on the
    /// target, so that defining A→B also makes B→A addressable.
    pub fn define_association(
        &mut self,
        owner: &str,
        def: AssociationDef,
    ) -> Result<(), GraphError> {
        let inverse = def.inverse.clone().ok_or_else(|| GraphError::MissingInverse {
            association: def.name.to_string(),
        })?;

        let owner_entity = self
            .entities
            .get(owner)
            .ok_or_else(|| GraphError::UnknownEntity {
                entity: owner.to_string(),
            })?;
        let target_entity =
            self.entities
                .get(&def.target)
                .ok_or_else(|| GraphError::UnknownEntity {
                    entity: def.target.to_string(),
                })?;

        if owner_entity.associations.contains_key(&def.name) {
            return Err(GraphError::DuplicateAssociation {
                entity: owner.to_string(),
                association: def.name.to_string(),
            });
        }
        let self_referential = owner == def.target.as_str();
        if target_entity.associations.contains_key(&inverse)
            || (self_referential && inverse == def.name)
        {
            return Err(GraphError::InverseCollision {
                entity: def.target.to_string(),
                association: inverse.to_string(),
            });
        }

        let (forward_kind, inverse_kind) = match def.kind {
            DefKind::BelongsTo { foreign_key } => {
                self.check_column(owner, &foreign_key)?;
                self.check_single_key(&def.target)?;
                (
                    AssociationKind::BelongsTo {
                        foreign_key: foreign_key.clone(),
                    },
                    AssociationKind::HasMany { foreign_key },
                )
            }
            DefKind::HasMany { foreign_key } => {
                self.check_column(&def.target, &foreign_key)?;
                self.check_single_key(owner)?;
                (
                    AssociationKind::HasMany {
                        foreign_key: foreign_key.clone(),
                    },
                    AssociationKind::BelongsTo { foreign_key },
                )
            }
            DefKind::BelongsToMany {
                through,
                foreign_key,
                other_key,
                scope,
            } => {
                let (through, foreign_key, other_key) = match (through, foreign_key, other_key) {
                    (Some(t), Some(fk), Some(ok)) => (t, fk, ok),
                    _ => {
                        return Err(GraphError::IncompleteThrough {
                            association: def.name.to_string(),
                        });
                    }
                };
                let through_entity =
                    self.entities
                        .get(&through)
                        .ok_or_else(|| GraphError::UnknownEntity {
                            entity: through.to_string(),
                        })?;
                for key in [&foreign_key, &other_key] {
                    if !through_entity.has_column(key) {
                        return Err(GraphError::UnknownForeignKey {
                            entity: through.to_string(),
                            column: key.to_string(),
                        });
                    }
                }
                for col in scope.referenced_columns() {
                    if !through_entity.has_column(col) {
                        return Err(GraphError::UnknownScopeColumn {
                            through: through.to_string(),
                            column: col.to_string(),
                        });
                    }
                }
                self.check_single_key(owner)?;
                self.check_single_key(&def.target)?;
                (
                    AssociationKind::BelongsToManyThrough {
                        through: through.clone(),
                        foreign_key: foreign_key.clone(),
                        other_key: other_key.clone(),
                        scope: scope.clone(),
                    },
                    AssociationKind::BelongsToManyThrough {
                        through,
                        foreign_key: other_key,
                        other_key: foreign_key,
                        scope,
                    },
                )
            }
        };

        let forward = Association {
            name: def.name.clone(),
            source: SmolStr::new(owner),
            target: def.target.clone(),
            kind: forward_kind,
            inverse: inverse.clone(),
        };
        let reverse = Association {
            name: inverse.clone(),
            source: def.target.clone(),
            target: SmolStr::new(owner),
            kind: inverse_kind,
            inverse: def.name.clone(),
        };

        // Two lookups because owner and target may be the same entity.
        if let Some(entity) = self.entities.get_mut(owner) {
            entity.associations.insert(def.name, forward);
        }
        if let Some(entity) = self.entities.get_mut(&def.target) {
            entity.associations.insert(inverse, reverse);
        }
        Ok(())
    }

    /// Look up an entity by model name.
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// Look up an association by owning entity and name.
    pub fn association(&self, owner: &str, name: &str) -> Option<&Association> {
        self.entities.get(owner)?.association(name)
    }

    /// Ordered entities in definition order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    fn check_column(&self, entity: &str, column: &SmolStr) -> Result<(), GraphError> {
        let found = self
            .entities
            .get(entity)
            .is_some_and(|e| e.has_column(column));
        if found {
            Ok(())
        } else {
            Err(GraphError::UnknownForeignKey {
                entity: entity.to_string(),
                column: column.to_string(),
            })
        }
    }

    fn check_single_key(&self, entity: &str) -> Result<(), GraphError> {
        let single = self
            .entities
            .get(entity)
            .is_some_and(|e| e.single_primary_key().is_some());
        if single {
            Ok(())
        } else {
            Err(GraphError::CompositeKeyReference {
                entity: entity.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> AssociationGraph {
        let mut graph = AssociationGraph::new();
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
                Entity::new("Customer", "customers")
                    .column("id", ColumnType::Integer)
                    .column("name", ColumnType::Text)
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
    }

    #[test]
    fn test_define_entity_rejects_bad_primary_key() {
        let mut graph = AssociationGraph::new();
        let err = graph
            .define_entity(
                Entity::new("Ghost", "ghosts")
                    .column("id", ColumnType::Integer)
                    .primary_key(["uuid"]),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownPrimaryKeyColumn { .. }));
    }

    #[test]
    fn test_duplicate_entity() {
        let mut graph = sample_graph();
        let err = graph
            .define_entity(Entity::new("Customer", "customers_v2").column("id", ColumnType::Integer))
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateEntity { .. }));
    }

    #[test]
    fn test_duplicate_association_on_owner() {
        let mut graph = sample_graph();
        graph
            .define_association(
                "Location",
                AssociationDef::has_many("systems", "System", "locationId").inverse("location"),
            )
            .unwrap();
        let err = graph
            .define_association(
                "Location",
                AssociationDef::has_many("systems", "System", "locationId").inverse("site"),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateAssociation { .. }));
    }

    #[test]
    fn test_symmetric_registration() {
        let mut graph = sample_graph();
        graph
            .define_association(
                "Location",
                AssociationDef::has_many("systems", "System", "locationId").inverse("location"),
            )
            .unwrap();

        let forward = graph.association("Location", "systems").unwrap();
        assert!(forward.is_plural());
        assert_eq!(forward.inverse(), "location");

        let reverse = graph.association("System", "location").unwrap();
        assert!(reverse.is_singular());
        assert_eq!(reverse.target(), "Location");
        assert_eq!(
            reverse.kind(),
            &AssociationKind::BelongsTo {
                foreign_key: "locationId".into()
            }
        );
    }

    #[test]
    fn test_through_inverse_swaps_keys() {
        let mut graph = sample_graph();
        graph
            .define_association(
                "Customer",
                AssociationDef::belongs_to_many("locations", "Location")
                    .through("CustomerLocation", "customerId", "locationId")
                    .scope(Filter::is_null("endAt"))
                    .inverse("customers"),
            )
            .unwrap();

        let reverse = graph.association("Location", "customers").unwrap();
        match reverse.kind() {
            AssociationKind::BelongsToManyThrough {
                through,
                foreign_key,
                other_key,
                scope,
            } => {
                assert_eq!(through, "CustomerLocation");
                assert_eq!(foreign_key, "locationId");
                assert_eq!(other_key, "customerId");
                assert_eq!(scope, &Filter::is_null("endAt"));
            }
            other => panic!("expected through kind, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_foreign_key() {
        let mut graph = sample_graph();
        let err = graph
            .define_association(
                "Location",
                AssociationDef::has_many("systems", "System", "siteId").inverse("location"),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownForeignKey { .. }));
    }

    #[test]
    fn test_inverse_collision() {
        let mut graph = sample_graph();
        graph
            .define_association(
                "Location",
                AssociationDef::has_many("systems", "System", "locationId").inverse("location"),
            )
            .unwrap();
        let err = graph
            .define_association(
                "Customer",
                AssociationDef::belongs_to_many("systems2", "System")
                    .through("CustomerLocation", "customerId", "locationId")
                    .inverse("location"),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::InverseCollision { .. }));
    }

    #[test]
    fn test_missing_inverse() {
        let mut graph = sample_graph();
        let err = graph
            .define_association(
                "Location",
                AssociationDef::has_many("systems", "System", "locationId"),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::MissingInverse { .. }));
    }

    #[test]
    fn test_incomplete_through() {
        let mut graph = sample_graph();
        let err = graph
            .define_association(
                "Customer",
                AssociationDef::belongs_to_many("locations", "Location").inverse("customers"),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::IncompleteThrough { .. }));
    }

    #[test]
    fn test_scope_column_must_exist_on_through() {
        let mut graph = sample_graph();
        let err = graph
            .define_association(
                "Customer",
                AssociationDef::belongs_to_many("locations", "Location")
                    .through("CustomerLocation", "customerId", "locationId")
                    .scope(Filter::is_null("archivedAt"))
                    .inverse("customers"),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownScopeColumn { .. }));
    }

    #[test]
    fn test_composite_key_reference_rejected() {
        let mut graph = sample_graph();
        // CustomerLocation has a composite primary key; belongs-to cannot
        // reference it.
        let err = graph
            .define_association(
                "System",
                AssociationDef::belongs_to("membership", "CustomerLocation", "locationId")
                    .inverse("systems"),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::CompositeKeyReference { .. }));
    }
}
