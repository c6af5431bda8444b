//! Nested user-level structures and their flattened form.
//!
//! The IR only deals with flat lists of values. A [`TreeDef`] records how such
//! a flat list maps back to the nested structure a traced function returned,
//! so control-flow nodes can hand the same structure back to the caller.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{TraceError, TraceResult};

/// A nested structure with leaves of type `T`.
#[derive(Clone, Debug, PartialEq)]
pub enum Tree<T> {
    /// No value at all, as returned by a function without outputs.
    None,
    /// A single value.
    Leaf(T),
    /// An ordered collection of subtrees.
    Tuple(Vec<Tree<T>>),
}

/// The shape of a [`Tree`], without its leaves.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TreeDef {
    /// Shape of [`Tree::None`].
    None,
    /// Shape of [`Tree::Leaf`].
    Leaf,
    /// Shape of [`Tree::Tuple`].
    Tuple(Vec<TreeDef>),
}

impl<T> Tree<T> {
    /// A tuple of leaves.
    pub fn leaves(values: impl IntoIterator<Item = T>) -> Self {
        Tree::Tuple(values.into_iter().map(Tree::Leaf).collect())
    }

    /// Split the tree into its leaves, in depth-first order, and its shape.
    pub fn flatten(self) -> (Vec<T>, TreeDef) {
        let mut leaves = Vec::new();
        let def = self.flatten_into(&mut leaves);
        (leaves, def)
    }

    fn flatten_into(self, leaves: &mut Vec<T>) -> TreeDef {
        match self {
            Tree::None => TreeDef::None,
            Tree::Leaf(v) => {
                leaves.push(v);
                TreeDef::Leaf
            }
            Tree::Tuple(children) => TreeDef::Tuple(
                children
                    .into_iter()
                    .map(|c| c.flatten_into(leaves))
                    .collect(),
            ),
        }
    }

    /// Apply a function to every leaf.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Tree<U> {
        self.map_inner(&mut f)
    }

    fn map_inner<U>(self, f: &mut impl FnMut(T) -> U) -> Tree<U> {
        match self {
            Tree::None => Tree::None,
            Tree::Leaf(v) => Tree::Leaf(f(v)),
            Tree::Tuple(children) => {
                Tree::Tuple(children.into_iter().map(|c| c.map_inner(f)).collect())
            }
        }
    }

    /// The single leaf of a [`Tree::Leaf`].
    pub fn into_leaf(self) -> Option<T> {
        match self {
            Tree::Leaf(v) => Some(v),
            _ => None,
        }
    }

    /// All leaves in order, dropping the structure.
    pub fn into_leaves(self) -> Vec<T> {
        self.flatten().0
    }
}

impl<T> From<T> for Tree<T> {
    fn from(value: T) -> Self {
        Tree::Leaf(value)
    }
}

impl<T> From<Vec<T>> for Tree<T> {
    fn from(values: Vec<T>) -> Self {
        Tree::leaves(values)
    }
}

impl TreeDef {
    /// Number of leaves described by this shape.
    pub fn num_leaves(&self) -> usize {
        match self {
            TreeDef::None => 0,
            TreeDef::Leaf => 1,
            TreeDef::Tuple(children) => children.iter().map(TreeDef::num_leaves).sum(),
        }
    }

    /// Whether this is the shape of a single leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeDef::Leaf)
    }

    /// Rebuild a tree of this shape from its flat leaves.
    ///
    /// Fails if the number of leaves does not match.
    pub fn unflatten<T>(&self, leaves: impl IntoIterator<Item = T>) -> TraceResult<Tree<T>> {
        let mut leaves = leaves.into_iter();
        let tree = self.build(&mut leaves)?;
        match leaves.next() {
            None => Ok(tree),
            Some(_) => Err(TraceError::internal(format!(
                "Too many leaves to rebuild a tree of shape {self}."
            ))),
        }
    }

    fn build<T>(&self, leaves: &mut impl Iterator<Item = T>) -> TraceResult<Tree<T>> {
        Ok(match self {
            TreeDef::None => Tree::None,
            TreeDef::Leaf => Tree::Leaf(leaves.next().ok_or_else(|| {
                TraceError::internal("Not enough leaves to rebuild the output tree.")
            })?),
            TreeDef::Tuple(children) => Tree::Tuple(
                children
                    .iter()
                    .map(|c| c.build(leaves))
                    .collect::<TraceResult<_>>()?,
            ),
        })
    }
}

impl fmt::Display for TreeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeDef::None => f.write_str("None"),
            TreeDef::Leaf => f.write_str("*"),
            TreeDef::Tuple(children) => write!(f, "({})", children.iter().join(", ")),
        }
    }
}

#[cfg(test)]
mod test {
    use cool_asserts::assert_matches;

    use super::*;

    #[test]
    fn flatten_nested() {
        let tree = Tree::Tuple(vec![
            Tree::Leaf(1),
            Tree::Tuple(vec![Tree::Leaf(2), Tree::None, Tree::Leaf(3)]),
        ]);
        let (leaves, def) = tree.clone().flatten();
        assert_eq!(leaves, vec![1, 2, 3]);
        assert_eq!(def.num_leaves(), 3);
        assert_eq!(def.to_string(), "(*, (*, None, *))");
        assert_eq!(def.unflatten(leaves).unwrap(), tree);
    }

    #[test]
    fn none_and_empty_tuple_differ() {
        let (_, none) = Tree::<u8>::None.flatten();
        let (_, empty) = Tree::<u8>::Tuple(vec![]).flatten();
        assert_eq!(none.num_leaves(), empty.num_leaves());
        assert_ne!(none, empty);
    }

    #[test]
    fn unflatten_wrong_count() {
        assert_matches!(
            TreeDef::Leaf.unflatten(Vec::<u8>::new()),
            Err(TraceError::InternalConsistency { .. })
        );
        assert_matches!(
            TreeDef::None.unflatten([1]),
            Err(TraceError::InternalConsistency { .. })
        );
    }
}
