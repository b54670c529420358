//! The versioned node store (component A): a node's immutable fields plus
//! its per-field histories.

use crate::{history::VersionedField, Color, Version};

/// A handle into the tree's node arena.
///
/// `NodeId` never refers to NIL; absent children/parents are represented as
/// `Option<NodeId> = None` at the call sites, not as a sentinel value of
/// this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// One key's full history: the fields fixed at creation, and the versioned
/// fields that change as the tree is rebalanced around it.
#[derive(Debug, Clone)]
pub struct Node {
    pub key: i64,
    pub birth_version: Version,
    color: VersionedField<Color>,
    left: VersionedField<Option<NodeId>>,
    right: VersionedField<Option<NodeId>>,
    parent: VersionedField<Option<NodeId>>,
    death_version: Option<Version>,
}

impl Node {
    /// Creates a node for `key`, born RED with no children or parent at
    /// `birth_version`. Newly inserted nodes are always colored RED; the
    /// insertion fixup either keeps that color or later recolors it.
    pub(crate) fn new(key: i64, birth_version: Version) -> Self {
        Self {
            key,
            birth_version,
            color: VersionedField::new(birth_version, Color::Red),
            left: VersionedField::new(birth_version, None),
            right: VersionedField::new(birth_version, None),
            parent: VersionedField::new(birth_version, None),
            death_version: None,
        }
    }

    pub fn color(&self, v: Version) -> Color {
        self.color.get(v)
    }

    pub fn left(&self, v: Version) -> Option<NodeId> {
        self.left.get(v)
    }

    pub fn right(&self, v: Version) -> Option<NodeId> {
        self.right.get(v)
    }

    pub fn parent(&self, v: Version) -> Option<NodeId> {
        self.parent.get(v)
    }

    pub(crate) fn set_color(&mut self, v: Version, color: Color) {
        self.color.set(v, color);
    }

    pub(crate) fn set_left(&mut self, v: Version, child: Option<NodeId>) {
        self.left.set(v, child);
    }

    pub(crate) fn set_right(&mut self, v: Version, child: Option<NodeId>) {
        self.right.set(v, child);
    }

    pub(crate) fn set_parent(&mut self, v: Version, parent: Option<NodeId>) {
        self.parent.set(v, parent);
    }

    /// Marks this node as logically absent from `v` onward.
    ///
    /// # Panics
    /// In debug builds, if this node has already been killed. A node's
    /// `death_version`, once set, never changes (invariant 6); attempting to
    /// kill it twice would only follow from a bug in the deletion algorithm.
    pub(crate) fn kill(&mut self, v: Version) {
        debug_assert!(self.death_version.is_none(), "a node cannot die twice");
        self.death_version = Some(v);
    }

    /// Returns whether this node is present at version `v`.
    ///
    /// The tree's own structural walks never need to consult this: a dead
    /// node is always fully unlinked from the structure at the version it
    /// dies, so anything reachable from a version's root is live at that
    /// version by construction. This is exposed for diagnostics and
    /// invariant checking.
    pub fn is_live(&self, v: Version) -> bool {
        v >= self.birth_version && self.death_version.map_or(true, |death| v < death)
    }
}
