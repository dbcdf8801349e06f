//! Validation of an include tree against the association graph.
//!
//! The validated form is a flat pre-order arena: each node knows its parent,
//! children, resolved association, and the association-name path from the
//! root. Self-referential recursion is just distinct nodes that happen to
//! name the same target entity; there are no back-pointers and no cycles.

use std::collections::HashSet;

use smol_str::SmolStr;

use crate::error::ValidationError;
use crate::filter::Filter;
use crate::graph::{Association, AssociationGraph};

use super::include::IncludeSpec;

/// Identity of one include node inside a validated tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in pre-order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One validated traversal of an association.
#[derive(Debug, Clone)]
pub struct IncludeNode {
    /// Node identity, equal to the pre-order position.
    pub id: NodeId,
    /// Parent node; `None` for nodes hanging off the root entity.
    pub parent: Option<NodeId>,
    /// The resolved association this node traverses.
    pub association: Association,
    /// Inner-join this node's own join(s) when true.
    pub required: bool,
    /// Caller predicate over the target entity's columns.
    pub filter: Option<Filter>,
    /// Child nodes in declaration order.
    pub children: Vec<NodeId>,
    /// Association names from the root down to this node.
    pub path: Vec<SmolStr>,
    /// Distance from the root entity (direct includes are depth 1).
    pub depth: usize,
}

impl IncludeNode {
    /// The path rendered for error messages.
    pub fn path_string(&self) -> String {
        self.path
            .iter()
            .map(SmolStr::as_str)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// An include tree checked against the graph, in pre-order.
#[derive(Debug, Clone)]
pub struct ValidatedTree {
    root: SmolStr,
    nodes: Vec<IncludeNode>,
    top: Vec<NodeId>,
}

impl ValidatedTree {
    /// Validate `includes` rooted at `root_entity`.
    ///
    /// Any invalid node fails the whole tree. The error carries the full
    /// association-name path so the mistake can be located in a deep tree.
    pub fn validate(
        graph: &AssociationGraph,
        root_entity: &str,
        includes: &[IncludeSpec],
    ) -> Result<Self, ValidationError> {
        let root = graph
            .entity(root_entity)
            .ok_or_else(|| ValidationError::UnknownEntity {
                entity: root_entity.to_string(),
            })?;

        let mut nodes = Vec::new();
        let mut top = Vec::new();
        let mut seen = HashSet::new();
        for spec in includes {
            if !seen.insert(spec.association.clone()) {
                return Err(ValidationError::DuplicateInclude {
                    path: spec.association.to_string(),
                });
            }
            top.push(Self::visit(graph, root.name(), spec, None, &[], 1, &mut nodes)?);
        }

        Ok(Self {
            root: root.name().clone(),
            nodes,
            top,
        })
    }

    fn visit(
        graph: &AssociationGraph,
        parent_target: &str,
        spec: &IncludeSpec,
        parent: Option<NodeId>,
        parent_path: &[SmolStr],
        depth: usize,
        nodes: &mut Vec<IncludeNode>,
    ) -> Result<NodeId, ValidationError> {
        let mut path = parent_path.to_vec();
        path.push(spec.association.clone());
        let path_string = || {
            path.iter()
                .map(SmolStr::as_str)
                .collect::<Vec<_>>()
                .join(" -> ")
        };

        let association = graph
            .association(parent_target, &spec.association)
            .ok_or_else(|| ValidationError::UnknownAssociation { path: path_string() })?;
        let target = graph
            .entity(association.target())
            .ok_or_else(|| ValidationError::UnknownEntity {
                entity: association.target().to_string(),
            })?;

        if let Some(filter) = &spec.filter {
            for column in filter.referenced_columns() {
                if !target.has_column(column) {
                    return Err(ValidationError::UnknownColumn {
                        path: path_string(),
                        column: column.to_string(),
                    });
                }
            }
        }

        let id = NodeId(nodes.len());
        nodes.push(IncludeNode {
            id,
            parent,
            association: association.clone(),
            required: spec.required,
            filter: spec.filter.clone(),
            children: Vec::new(),
            path: path.clone(),
            depth,
        });

        let mut seen = HashSet::new();
        let mut children = Vec::with_capacity(spec.children.len());
        for child in &spec.children {
            if !seen.insert(child.association.clone()) {
                let mut child_path = path.clone();
                child_path.push(child.association.clone());
                return Err(ValidationError::DuplicateInclude {
                    path: child_path
                        .iter()
                        .map(SmolStr::as_str)
                        .collect::<Vec<_>>()
                        .join(" -> "),
                });
            }
            children.push(Self::visit(
                graph,
                target.name().as_str(),
                child,
                Some(id),
                &path,
                depth + 1,
                nodes,
            )?);
        }
        nodes[id.0].children = children;
        Ok(id)
    }

    /// The root entity's model name.
    pub fn root(&self) -> &SmolStr {
        &self.root
    }

    /// Nodes hanging directly off the root entity.
    pub fn top_level(&self) -> &[NodeId] {
        &self.top
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> &IncludeNode {
        &self.nodes[id.0]
    }

    /// Iterate nodes in pre-order.
    pub fn nodes(&self) -> impl Iterator<Item = &IncludeNode> {
        self.nodes.iter()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree has no include nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
