//! Include specifications for eager loading associations.

use smol_str::SmolStr;

use crate::filter::Filter;

/// One requested association traversal, possibly nested.
///
/// `required` defaults to false and is orthogonal to filtering: a `where`
/// predicate on an optional node still left-joins, carrying null children
/// for unmatched rows instead of excluding the parent.
#[derive(Debug, Clone, Default)]
pub struct IncludeSpec {
    /// Name of the association to traverse.
    pub association: SmolStr,
    /// Force inner-join (filtering) semantics for this node's own join only.
    pub required: bool,
    /// Predicate over the target entity's columns.
    pub filter: Option<Filter>,
    /// Nested includes, in declaration order.
    pub children: Vec<IncludeSpec>,
}

impl IncludeSpec {
    /// Create an include for an association.
    pub fn new(association: impl Into<SmolStr>) -> Self {
        Self {
            association: association.into(),
            ..Self::default()
        }
    }

    /// Mark this node required (inner join) or optional (left join).
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Add a filter over the target entity's columns.
    pub fn r#where(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Include a nested association.
    pub fn include(mut self, child: IncludeSpec) -> Self {
        self.children.push(child);
        self
    }

    /// Include several nested associations.
    pub fn include_many(mut self, children: impl IntoIterator<Item = IncludeSpec>) -> Self {
        self.children.extend(children);
        self
    }

    /// Check if there are nested includes.
    pub fn has_nested(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Helper function to create an include spec.
pub fn include(association: impl Into<SmolStr>) -> IncludeSpec {
    IncludeSpec::new(association)
}
