//! A partially persistent red-black tree over `i64` keys.
//!
//! Every mutation ([`PersistentRbTree::insert`], [`PersistentRbTree::delete`])
//! allocates a new *version* and leaves every earlier version exactly as
//! queryable as it always was: only the latest version is ever mutable.
//! This is achieved by storing, for every field of every node, the full
//! history of values that field has held (see the [`history`] module),
//! rather than overwriting fields in place.
//!
//! # Example
//!
//! ```rust
//! use persistent_rb_tree::PersistentRbTree;
//!
//! let mut tree = PersistentRbTree::new();
//!
//! let v1 = tree.insert(50).unwrap();
//! let v2 = tree.insert(25).unwrap();
//! let v3 = tree.insert(75).unwrap();
//!
//! // The latest version reflects every insertion so far.
//! let keys: Vec<_> = tree.inorder(v3).unwrap().map(|(key, _, _)| key).collect();
//! assert_eq!(keys, vec![25, 50, 75]);
//!
//! // Earlier versions are untouched by later mutations.
//! let keys_at_v1: Vec<_> = tree.inorder(v1).unwrap().map(|(key, _, _)| key).collect();
//! assert_eq!(keys_at_v1, vec![50]);
//!
//! assert_eq!(tree.successor(50, v2).unwrap(), None);
//! assert_eq!(tree.successor(50, v3).unwrap(), Some(75));
//! ```

mod color;
mod error;
mod history;
mod node;
mod tree;

pub use color::Color;
pub use error::TreeError;
pub use tree::{InorderIter, PersistentRbTree, TreeConfig};

/// A monotonically increasing integer labelling a snapshot of the tree.
/// Version 0 is always the empty tree; version v is produced by the v-th
/// successful mutation.
pub type Version = u64;
