//! Frozen decision tree and forest representation.
//!
//! Trees here are immutable prediction structures: flat node arrays with
//! raw-value thresholds, produced by the trainer and serialized as part of
//! the model artifact. Tree *construction* lives in [`crate::training`].

use serde::{Deserialize, Serialize};

// =============================================================================
// Nodes
// =============================================================================

/// Split condition for a decision node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitCondition {
    /// Feature column to test.
    pub feature: u32,
    /// Raw threshold; values strictly below it go left.
    pub threshold: f32,
    /// Direction taken when the feature value is NaN.
    pub default_left: bool,
}

impl SplitCondition {
    /// Which way a feature value goes: true for left, false for right.
    #[inline]
    pub fn go_left(&self, value: f32) -> bool {
        if value.is_nan() {
            self.default_left
        } else {
            value < self.threshold
        }
    }
}

/// A node in a frozen tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Internal split node with child indices into the node array.
    Split {
        condition: SplitCondition,
        left: u32,
        right: u32,
    },
    /// Terminal node carrying the leaf weight.
    Leaf { value: f32 },
}

// =============================================================================
// Tree
// =============================================================================

/// An immutable regression tree.
///
/// Node 0 is the root. Child indices always point forward in the array.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Create a tree from its node array.
    ///
    /// # Panics
    ///
    /// Panics if the node array is empty or a child index is out of bounds.
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        assert!(!nodes.is_empty(), "tree must have at least a root node");
        for node in &nodes {
            if let Node::Split { left, right, .. } = node {
                assert!(
                    (*left as usize) < nodes.len() && (*right as usize) < nodes.len(),
                    "child index out of bounds"
                );
            }
        }
        Self { nodes }
    }

    /// A single-leaf tree.
    pub fn leaf(value: f32) -> Self {
        Self {
            nodes: vec![Node::Leaf { value }],
        }
    }

    /// Number of nodes.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaves.
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// The node array.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Traverse the tree for one feature row and return the leaf weight.
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        let mut index = 0usize;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    condition,
                    left,
                    right,
                } => {
                    let value = features
                        .get(condition.feature as usize)
                        .copied()
                        .unwrap_or(f32::NAN);
                    index = if condition.go_left(value) {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
            }
        }
    }
}

// =============================================================================
// Forest
// =============================================================================

/// An additive ensemble of regression trees.
///
/// Predictions are `base_score + Σ tree(x)`; leaf weights already carry the
/// learning-rate shrinkage applied at training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    base_score: f32,
    trees: Vec<Tree>,
}

impl Forest {
    /// Create an empty forest with the given base score.
    pub fn new(base_score: f32) -> Self {
        Self {
            base_score,
            trees: Vec::new(),
        }
    }

    /// Append a tree.
    pub fn push_tree(&mut self, tree: Tree) {
        self.trees.push(tree);
    }

    /// Base score added to every prediction.
    pub fn base_score(&self) -> f32 {
        self.base_score
    }

    /// Number of trees.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// The trees.
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Drop all trees past `n_trees`, keeping the first `n_trees`.
    pub fn truncate(&mut self, n_trees: usize) {
        self.trees.truncate(n_trees);
    }

    /// Predict a single feature row.
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.predict_row(features))
    }

    /// Highest feature index referenced by any split, if the forest splits.
    pub fn max_feature_index(&self) -> Option<u32> {
        self.trees
            .iter()
            .flat_map(|t| t.nodes())
            .filter_map(|n| match n {
                Node::Split { condition, .. } => Some(condition.feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }

    /// Split count per feature, a cheap importance measure.
    pub fn feature_split_counts(&self, n_features: usize) -> Vec<u32> {
        let mut counts = vec![0u32; n_features];
        for node in self.trees.iter().flat_map(|t| t.nodes()) {
            if let Node::Split { condition, .. } = node {
                if let Some(slot) = counts.get_mut(condition.feature as usize) {
                    *slot += 1;
                }
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// x0 < 0.5 → 1.0; else x1 < 0.3 → 2.0; else 3.0
    fn two_level_tree() -> Tree {
        Tree::from_nodes(vec![
            Node::Split {
                condition: SplitCondition {
                    feature: 0,
                    threshold: 0.5,
                    default_left: true,
                },
                left: 1,
                right: 2,
            },
            Node::Leaf { value: 1.0 },
            Node::Split {
                condition: SplitCondition {
                    feature: 1,
                    threshold: 0.3,
                    default_left: false,
                },
                left: 3,
                right: 4,
            },
            Node::Leaf { value: 2.0 },
            Node::Leaf { value: 3.0 },
        ])
    }

    #[test]
    fn traversal_follows_thresholds() {
        let tree = two_level_tree();
        assert_eq!(tree.predict_row(&[0.3, 0.9]), 1.0);
        assert_eq!(tree.predict_row(&[0.7, 0.1]), 2.0);
        assert_eq!(tree.predict_row(&[0.7, 0.9]), 3.0);
        // Threshold is exclusive on the left side.
        assert_eq!(tree.predict_row(&[0.5, 0.3]), 3.0);
    }

    #[test]
    fn missing_values_use_default_direction() {
        let tree = two_level_tree();
        assert_eq!(tree.predict_row(&[f32::NAN, 0.0]), 1.0); // default left at root
        assert_eq!(tree.predict_row(&[0.7, f32::NAN]), 3.0); // default right below
    }

    #[test]
    fn forest_sums_trees_over_base() {
        let mut forest = Forest::new(0.5);
        forest.push_tree(two_level_tree());
        forest.push_tree(Tree::leaf(0.25));
        assert_eq!(forest.predict_row(&[0.3, 0.9]), 0.5 + 1.0 + 0.25);
        assert_eq!(forest.n_trees(), 2);
    }

    #[test]
    fn truncate_keeps_prefix() {
        let mut forest = Forest::new(0.0);
        forest.push_tree(Tree::leaf(1.0));
        forest.push_tree(Tree::leaf(2.0));
        forest.push_tree(Tree::leaf(4.0));
        forest.truncate(2);
        assert_eq!(forest.n_trees(), 2);
        assert_eq!(forest.predict_row(&[]), 3.0);
    }

    #[test]
    fn max_feature_and_split_counts() {
        let mut forest = Forest::new(0.0);
        forest.push_tree(two_level_tree());
        assert_eq!(forest.max_feature_index(), Some(1));
        assert_eq!(forest.feature_split_counts(3), vec![1, 1, 0]);

        let leaves_only = Forest::new(1.0);
        assert_eq!(leaves_only.max_feature_index(), None);
    }

    #[test]
    fn serde_roundtrip() {
        let mut forest = Forest::new(2.5);
        forest.push_tree(two_level_tree());
        let json = serde_json::to_string(&forest).unwrap();
        let back: Forest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, forest);
    }
}
