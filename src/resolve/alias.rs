//! Alias assignment for every node instance in a validated tree.
//!
//! Aliases are computed once per compiled plan and discarded with it. The
//! walk is pre-order, left-to-right, and the allocator holds no ambient
//! state, so identical trees always produce identical maps. A through entity
//! is aliased per occurrence, never per association definition, so a tree
//! that revisits the same table keeps every join leg distinguishable.

use std::collections::HashSet;

use smol_str::SmolStr;

use crate::graph::{AssociationGraph, AssociationKind};

use super::tree::{NodeId, ValidatedTree};

/// Identifier style for generated aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AliasStyle {
    /// Path-derived identifiers, truncated and hashed past the length bound.
    #[default]
    Verbose,
    /// Short sequential identifiers (base-36 counters).
    Minified,
}

/// Identifier length limit applied by default (the PostgreSQL maximum).
pub const DEFAULT_MAX_IDENTIFIER_LEN: usize = 63;

/// Aliases assigned to one validated tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasMap {
    root: SmolStr,
    nodes: Vec<SmolStr>,
    through: Vec<Option<SmolStr>>,
}

impl AliasMap {
    /// Alias of the root entity.
    pub fn root(&self) -> &SmolStr {
        &self.root
    }

    /// Alias of a node's target entity.
    pub fn alias(&self, id: NodeId) -> &SmolStr {
        &self.nodes[id.index()]
    }

    /// Alias of a node's through entity, for through associations.
    pub fn through_alias(&self, id: NodeId) -> Option<&SmolStr> {
        self.through[id.index()].as_ref()
    }

    /// All aliases in the map: root, then per node its through alias (if
    /// any) followed by its target alias.
    pub fn iter(&self) -> impl Iterator<Item = &SmolStr> {
        std::iter::once(&self.root).chain(
            self.nodes
                .iter()
                .zip(self.through.iter())
                .flat_map(|(node, through)| through.iter().chain(std::iter::once(node))),
        )
    }

    /// Total number of aliases.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Check if only the root alias exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Allocator for collision-free, length-bounded aliases.
#[derive(Debug)]
pub struct AliasAllocator {
    style: AliasStyle,
    max_len: usize,
    used: HashSet<SmolStr>,
    counter: usize,
}

impl AliasAllocator {
    /// Create an allocator for the given style.
    pub fn new(style: AliasStyle) -> Self {
        Self {
            style,
            max_len: DEFAULT_MAX_IDENTIFIER_LEN,
            used: HashSet::new(),
            counter: 0,
        }
    }

    /// Override the identifier length bound.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Assign aliases to every node instance of `tree`, pre-order.
    pub fn assign(mut self, tree: &ValidatedTree, graph: &AssociationGraph) -> AliasMap {
        let root = match self.style {
            AliasStyle::Verbose => {
                let table = graph
                    .entity(tree.root())
                    .map(|e| e.table().to_string())
                    .unwrap_or_else(|| tree.root().to_string());
                self.claim(table)
            }
            AliasStyle::Minified => self.next_counter(),
        };

        let mut nodes = vec![SmolStr::default(); tree.len()];
        let mut through = vec![None; tree.len()];
        for node in tree.nodes() {
            // The through leg joins before the target leg, so its alias is
            // allocated first to keep minified counters in emission order.
            if let AssociationKind::BelongsToManyThrough { through: t, .. } =
                node.association.kind()
            {
                let alias = match self.style {
                    AliasStyle::Verbose => {
                        let table = graph
                            .entity(t)
                            .map(|e| e.table().to_string())
                            .unwrap_or_else(|| t.to_string());
                        self.claim(format!("{}_{}", join_path(&node.path), table))
                    }
                    AliasStyle::Minified => self.next_counter(),
                };
                through[node.id.index()] = Some(alias);
            }
            nodes[node.id.index()] = match self.style {
                AliasStyle::Verbose => self.claim(join_path(&node.path)),
                AliasStyle::Minified => self.next_counter(),
            };
        }

        AliasMap {
            root,
            nodes,
            through,
        }
    }

    /// Reserve a unique, length-bounded alias derived from `base`.
    fn claim(&mut self, base: String) -> SmolStr {
        let mut seed = 0usize;
        loop {
            let candidate = if base.len() <= self.max_len && seed == 0 {
                SmolStr::new(&base)
            } else {
                SmolStr::new(truncate_hashed(&base, self.max_len, seed))
            };
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            seed += 1;
        }
    }

    fn next_counter(&mut self) -> SmolStr {
        let alias = SmolStr::new(format!("t{}", to_base36(self.counter)));
        self.counter += 1;
        self.used.insert(alias.clone());
        alias
    }
}

fn join_path(path: &[SmolStr]) -> String {
    path.iter()
        .map(SmolStr::as_str)
        .collect::<Vec<_>>()
        .join("_")
}

/// Truncate `base` under `max_len` and suffix a deterministic hash so
/// distinct long names stay distinct.
fn truncate_hashed(base: &str, max_len: usize, seed: usize) -> String {
    let hash = fnv1a(base.as_bytes(), seed as u64);
    let suffix = format!("_{:08x}", (hash & 0xffff_ffff) as u32);
    let keep = max_len.saturating_sub(suffix.len());
    let mut out: String = base.chars().take(keep).collect();
    out.push_str(&suffix);
    out
}

fn fnv1a(bytes: &[u8], seed: u64) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64 ^ seed;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn to_base36(mut n: usize) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[n % 36]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
