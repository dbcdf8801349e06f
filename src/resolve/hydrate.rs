//! Reassembly of flat joined rows into nested object graphs.
//!
//! Joins multiply rows (fan-out), so the hydrator keeps one identity map per
//! alias from primary-key tuple to the materialized object; a row segment
//! seen again resolves to the same [`ObjectId`] and is shared by every
//! parent slot pointing at it. An all-null key segment means the association
//! is absent for that row, which is how a left-join "no match" is told apart
//! from "not yet visited".

use std::collections::HashMap;

use indexmap::IndexMap;
use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::error::HydrationError;
use crate::filter::FilterValue;
use crate::graph::{AssociationGraph, Entity};
use crate::row::{Row, RowSet};

use super::alias::AliasMap;
use super::tree::{NodeId, ValidatedTree};

/// Handle to one materialized object within a [`HydratedSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(usize);

/// A primary-key component usable as an identity-map key.
///
/// Floats are keyed by bit pattern; Json and List values cannot identify a
/// row and are rejected during hydration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    /// Null component (possible in partially-null composite keys).
    Null,
    /// Boolean component.
    Bool(bool),
    /// Integer component.
    Int(i64),
    /// Float component, by bit pattern.
    Float(u64),
    /// String component.
    Str(String),
}

/// A primary-key tuple.
pub type ObjectKey = SmallVec<[KeyValue; 2]>;

/// One association slot on a materialized object.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Singular association: unset until a child row arrives, set-once after.
    One(Option<ObjectId>),
    /// Plural association: duplicate-free children in first-seen row order.
    Many(Vec<ObjectId>),
}

impl Slot {
    /// The single child, for singular slots.
    pub fn as_one(&self) -> Option<ObjectId> {
        match self {
            Self::One(child) => *child,
            Self::Many(_) => None,
        }
    }

    /// The child sequence, for plural slots.
    pub fn as_many(&self) -> &[ObjectId] {
        match self {
            Self::One(_) => &[],
            Self::Many(children) => children,
        }
    }
}

/// One materialized entity row with its association slots.
#[derive(Debug, Clone, PartialEq)]
pub struct HydratedObject {
    /// Entity the object belongs to.
    pub entity: SmolStr,
    /// Primary-key tuple identifying the object within its alias.
    pub key: ObjectKey,
    /// Attribute values in column declaration order.
    pub attributes: IndexMap<SmolStr, FilterValue>,
    /// Association slots keyed by association name, one per child include.
    pub slots: IndexMap<SmolStr, Slot>,
}

impl HydratedObject {
    /// Get an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&FilterValue> {
        self.attributes.get(name)
    }

    /// Get an association slot.
    pub fn slot(&self, association: &str) -> Option<&Slot> {
        self.slots.get(association)
    }
}

/// The nested graphs produced by one hydration call.
#[derive(Debug, Clone, PartialEq)]
pub struct HydratedSet {
    objects: Vec<HydratedObject>,
    roots: Vec<ObjectId>,
}

impl HydratedSet {
    /// Root objects in first-seen row order.
    pub fn roots(&self) -> &[ObjectId] {
        &self.roots
    }

    /// Number of root objects.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Check if no roots were produced.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Resolve an object handle.
    pub fn object(&self, id: ObjectId) -> &HydratedObject {
        &self.objects[id.0]
    }

    /// Iterate root objects in order.
    pub fn root_objects(&self) -> impl Iterator<Item = &HydratedObject> {
        self.roots.iter().map(|id| &self.objects[id.0])
    }

    /// The singular child of an object, if set.
    pub fn one(&self, id: ObjectId, association: &str) -> Option<&HydratedObject> {
        let child = self.object(id).slot(association)?.as_one()?;
        Some(self.object(child))
    }

    /// The plural children of an object, in first-seen order.
    pub fn many(&self, id: ObjectId, association: &str) -> Vec<&HydratedObject> {
        self.many_ids(id, association)
            .iter()
            .map(|child| self.object(*child))
            .collect()
    }

    /// Handles of the plural children, for identity comparisons.
    pub fn many_ids(&self, id: ObjectId, association: &str) -> &[ObjectId] {
        self.object(id)
            .slot(association)
            .map(Slot::as_many)
            .unwrap_or(&[])
    }
}

struct HydrationState {
    objects: Vec<HydratedObject>,
    roots: Vec<ObjectId>,
    /// Identity map per alias slot: 0 is the root, node `i` is `i + 1`.
    identity: Vec<HashMap<ObjectKey, ObjectId>>,
}

/// Rebuilds nested graphs from the flat rows of one plan execution.
#[derive(Debug, Clone, Copy)]
pub struct Hydrator<'a> {
    graph: &'a AssociationGraph,
    tree: &'a ValidatedTree,
    aliases: &'a AliasMap,
}

impl<'a> Hydrator<'a> {
    /// Create a hydrator for one (tree, alias map) pair.
    pub fn new(graph: &'a AssociationGraph, tree: &'a ValidatedTree, aliases: &'a AliasMap) -> Self {
        Self {
            graph,
            tree,
            aliases,
        }
    }

    /// Hydrate the row set into root graphs, deduplicating fan-out.
    pub fn hydrate(&self, rows: &RowSet) -> Result<HydratedSet, HydrationError> {
        let root_entity = self.entity(self.tree.root())?;
        let slots = self.tree.len() + 1;
        let mut state = HydrationState {
            objects: Vec::new(),
            roots: Vec::new(),
            identity: vec![HashMap::new(); slots],
        };
        // The object each alias resolved to in the row being processed.
        let mut row_objects: Vec<Option<ObjectId>> = vec![None; slots];
        let root_alias = self.aliases.root();

        for row in rows.iter() {
            row_objects.fill(None);

            let Some(root_key) = extract_key(row, root_alias, root_entity.primary_key_columns())?
            else {
                continue;
            };
            let (root_id, created) = self.materialize(
                &mut state,
                0,
                root_entity,
                root_alias,
                root_key,
                row,
                self.tree.top_level(),
            )?;
            if created {
                state.roots.push(root_id);
            }
            row_objects[0] = Some(root_id);

            for node in self.tree.nodes() {
                let parent_slot = node.parent.map(|p| p.index() + 1).unwrap_or(0);
                let Some(parent_id) = row_objects[parent_slot] else {
                    continue;
                };
                let alias = self.aliases.alias(node.id);
                let target = self.entity(node.association.target())?;
                let Some(key) = extract_key(row, alias, target.primary_key_columns())? else {
                    // Left-joined branch with no match: the slot stays empty
                    // for this parent.
                    continue;
                };
                let (child_id, _) = self.materialize(
                    &mut state,
                    node.id.index() + 1,
                    target,
                    alias,
                    key,
                    row,
                    &node.children,
                )?;
                self.attach(&mut state, parent_id, node.id, child_id)?;
                row_objects[node.id.index() + 1] = Some(child_id);
            }
        }

        tracing::debug!(
            rows = rows.len(),
            roots = state.roots.len(),
            objects = state.objects.len(),
            "hydrated row set"
        );
        Ok(HydratedSet {
            objects: state.objects,
            roots: state.roots,
        })
    }

    /// Look up or create the object for (alias slot, key).
    fn materialize(
        &self,
        state: &mut HydrationState,
        slot: usize,
        entity: &Entity,
        alias: &SmolStr,
        key: ObjectKey,
        row: &Row,
        children: &[NodeId],
    ) -> Result<(ObjectId, bool), HydrationError> {
        if let Some(&existing) = state.identity[slot].get(&key) {
            return Ok((existing, false));
        }

        let mut attributes = IndexMap::new();
        for (column, _) in entity.columns() {
            let value =
                row.get(alias, column)
                    .ok_or_else(|| HydrationError::MissingColumn {
                        alias: alias.to_string(),
                        column: column.to_string(),
                    })?;
            attributes.insert(column.clone(), value.clone());
        }

        let mut slots = IndexMap::new();
        for child in children {
            let association = &self.tree.node(*child).association;
            let empty = if association.is_plural() {
                Slot::Many(Vec::new())
            } else {
                Slot::One(None)
            };
            slots.insert(association.name().clone(), empty);
        }

        let id = ObjectId(state.objects.len());
        state.objects.push(HydratedObject {
            entity: entity.name().clone(),
            key: key.clone(),
            attributes,
            slots,
        });
        state.identity[slot].insert(key, id);
        Ok((id, true))
    }

    /// Attach a child to its parent's slot for the node's association.
    fn attach(
        &self,
        state: &mut HydrationState,
        parent: ObjectId,
        node: NodeId,
        child: ObjectId,
    ) -> Result<(), HydrationError> {
        let node = self.tree.node(node);
        let association = node.association.name();
        let parent_entity = state.objects[parent.0].entity.clone();
        let slot = state.objects[parent.0]
            .slots
            .get_mut(association)
            .ok_or_else(|| HydrationError::GraphMismatch {
                entity: parent_entity.to_string(),
            })?;

        match slot {
            Slot::One(current) => match current {
                None => *current = Some(child),
                Some(existing) if *existing != child => {
                    return Err(HydrationError::ConflictingSingular {
                        parent: parent_entity.to_string(),
                        association: association.to_string(),
                    });
                }
                Some(_) => {}
            },
            Slot::Many(children) => {
                // Identity-mapped, so handle equality is key equality;
                // duplicates from unrelated fan-out collapse here.
                if !children.contains(&child) {
                    children.push(child);
                }
            }
        }
        Ok(())
    }

    fn entity(&self, name: &str) -> Result<&'a Entity, HydrationError> {
        self.graph
            .entity(name)
            .ok_or_else(|| HydrationError::GraphMismatch {
                entity: name.to_string(),
            })
    }
}

/// Extract the key tuple for an alias, or `None` when every component is
/// null (the association is absent for this row).
fn extract_key(
    row: &Row,
    alias: &str,
    primary_key: &[SmolStr],
) -> Result<Option<ObjectKey>, HydrationError> {
    let mut key = ObjectKey::new();
    let mut all_null = true;
    for column in primary_key {
        let value = row
            .get(alias, column)
            .ok_or_else(|| HydrationError::MissingColumn {
                alias: alias.to_string(),
                column: column.to_string(),
            })?;
        if !value.is_null() {
            all_null = false;
        }
        key.push(key_value(value, alias, column)?);
    }
    Ok(if all_null { None } else { Some(key) })
}

fn key_value(value: &FilterValue, alias: &str, column: &str) -> Result<KeyValue, HydrationError> {
    match value {
        FilterValue::Null => Ok(KeyValue::Null),
        FilterValue::Bool(b) => Ok(KeyValue::Bool(*b)),
        FilterValue::Int(i) => Ok(KeyValue::Int(*i)),
        FilterValue::Float(f) => Ok(KeyValue::Float(f.to_bits())),
        FilterValue::String(s) => Ok(KeyValue::Str(s.clone())),
        FilterValue::Json(_) | FilterValue::List(_) => Err(HydrationError::UnsupportedKey {
            alias: alias.to_string(),
            column: column.to_string(),
        }),
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
            .define_association(
                "Location",
                AssociationDef::has_many("systems", "System", "locationId").inverse("location"),
            )
            .unwrap();
        graph
    }

    struct Harness {
        graph: AssociationGraph,
        tree: ValidatedTree,
        aliases: AliasMap,
    }

    fn harness(root: &str, includes: &[crate::resolve::IncludeSpec]) -> Harness {
        let graph = fixture();
        let tree = ValidatedTree::validate(&graph, root, includes).unwrap();
        let aliases = AliasAllocator::new(AliasStyle::Verbose).assign(&tree, &graph);
        Harness {
            graph,
            tree,
            aliases,
        }
    }

    fn location_row(
        id: i64,
        name: &str,
        sys_id: impl Into<FilterValue>,
        sys_name: impl Into<FilterValue>,
    ) -> Row {
        let sys_id = sys_id.into();
        let sys_location = if sys_id.is_null() {
            FilterValue::Null
        } else {
            FilterValue::Int(id)
        };
        Row::new()
            .set("locations", "id", id)
            .set("locations", "name", name)
            .set("systems", "id", sys_id)
            .set("systems", "name", sys_name)
            .set("systems", "locationId", sys_location)
    }

    #[test]
    fn test_fan_out_deduplicates_and_orders() {
        let h = harness("Location", &[include("systems")]);
        let rows: RowSet = vec![
            location_row(1, "Rural Depot", 10i64, "Alpha"),
            location_row(1, "Rural Depot", 11i64, "Beta"),
            location_row(1, "Rural Depot", 10i64, "Alpha"),
        ]
        .into();

        let set = Hydrator::new(&h.graph, &h.tree, &h.aliases)
            .hydrate(&rows)
            .unwrap();

        assert_eq!(set.len(), 1);
        let root = set.roots()[0];
        let systems = set.many(root, "systems");
        let names: Vec<_> = systems
            .iter()
            .map(|s| s.attribute("name").cloned())
            .collect();
        assert_eq!(
            names,
            vec![
                Some(FilterValue::String("Alpha".into())),
                Some(FilterValue::String("Beta".into()))
            ]
        );
    }

    #[test]
    fn test_all_null_segment_is_empty_not_missing() {
        let h = harness("Location", &[include("systems")]);
        let rows: RowSet = vec![location_row(
            2,
            "Empty Yard",
            FilterValue::Null,
            FilterValue::Null,
        )]
        .into();

        let set = Hydrator::new(&h.graph, &h.tree, &h.aliases)
            .hydrate(&rows)
            .unwrap();

        assert_eq!(set.len(), 1);
        let root = set.roots()[0];
        assert!(set.many(root, "systems").is_empty());
        // The slot exists even though no child ever arrived.
        assert!(set.object(root).slot("systems").is_some());
    }

    #[test]
    fn test_identity_map_shares_objects() {
        let h = harness("System", &[include("location")]);
        let row = |sys: i64| {
            Row::new()
                .set("systems", "id", sys)
                .set("systems", "name", format!("S{}", sys))
                .set("systems", "locationId", 1i64)
                .set("location", "id", 1i64)
                .set("location", "name", "Shared")
        };
        let rows: RowSet = vec![row(1), row(2)].into();

        let set = Hydrator::new(&h.graph, &h.tree, &h.aliases)
            .hydrate(&rows)
            .unwrap();

        assert_eq!(set.len(), 2);
        let first = set.object(set.roots()[0]).slot("location").unwrap().as_one();
        let second = set.object(set.roots()[1]).slot("location").unwrap().as_one();
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[test]
    fn test_conflicting_singular_is_an_error() {
        let h = harness("System", &[include("location")]);
        let rows: RowSet = vec![
            Row::new()
                .set("systems", "id", 1i64)
                .set("systems", "name", "S1")
                .set("systems", "locationId", 1i64)
                .set("location", "id", 1i64)
                .set("location", "name", "A"),
            Row::new()
                .set("systems", "id", 1i64)
                .set("systems", "name", "S1")
                .set("systems", "locationId", 1i64)
                .set("location", "id", 2i64)
                .set("location", "name", "B"),
        ]
        .into();

        let err = Hydrator::new(&h.graph, &h.tree, &h.aliases)
            .hydrate(&rows)
            .unwrap_err();
        match err {
            HydrationError::ConflictingSingular {
                parent,
                association,
            } => {
                assert_eq!(parent, "System");
                assert_eq!(association, "location");
            }
            other => panic!("expected ConflictingSingular, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let h = harness("Location", &[include("systems")]);
        let rows: RowSet = vec![Row::new().set("locations", "id", 1i64)].into();

        let err = Hydrator::new(&h.graph, &h.tree, &h.aliases)
            .hydrate(&rows)
            .unwrap_err();
        assert!(matches!(err, HydrationError::MissingColumn { .. }));
    }

    #[test]
    fn test_unsupported_key_value() {
        let err = key_value(
            &FilterValue::Json(serde_json::json!({"id": 1})),
            "locations",
            "id",
        )
        .unwrap_err();
        assert!(matches!(err, HydrationError::UnsupportedKey { .. }));
    }

    #[test]
    fn test_hydrate_is_idempotent_per_key() {
        let h = harness("Location", &[include("systems")]);
        let rows: RowSet = vec![
            location_row(1, "Depot", 10i64, "Alpha"),
            location_row(1, "Depot", 10i64, "Alpha"),
        ]
        .into();

        let set = Hydrator::new(&h.graph, &h.tree, &h.aliases)
            .hydrate(&rows)
            .unwrap();
        // One root, one system: re-encounters never create a second object.
        assert_eq!(set.roots().len(), 1);
        assert_eq!(set.many_ids(set.roots()[0], "systems").len(), 1);
    }
}
