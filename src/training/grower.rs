//! Depth-wise tree growing.
//!
//! A tree starts as a single root leaf holding all rows. Each level, every
//! frontier leaf gets a histogram and a best split; leaves that find an
//! admissible split are expanded and their rows partitioned into the
//! children. Growth stops at `max_depth` or when no leaf can improve.

use super::buffer::GradientBuffer;
use super::histogram::NodeHistogram;
use super::quantize::{BinCuts, BinnedMatrix};
use super::split::{find_best_split, leaf_weight, GainParams, SplitInfo};
use crate::trees::{Node, SplitCondition, Tree};

/// Parameters for growing a single tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    /// Maximum tree depth (root = depth 0).
    pub max_depth: u32,
    /// Shrinkage applied to leaf weights when the tree joins the ensemble.
    pub learning_rate: f32,
    /// Minimum rows on each side of a split.
    pub min_samples_leaf: u32,
    /// L2 regularization on leaf weights.
    pub reg_lambda: f32,
    /// Minimum gain for a split to be accepted.
    pub min_split_gain: f32,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 6,
            learning_rate: 0.3,
            min_samples_leaf: 1,
            reg_lambda: 1.0,
            min_split_gain: 0.0,
        }
    }
}

impl TreeParams {
    fn gain_params(&self) -> GainParams {
        GainParams {
            reg_lambda: self.reg_lambda,
            min_split_gain: self.min_split_gain,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

// =============================================================================
// BuildingTree
// =============================================================================

/// A node under construction.
#[derive(Debug, Clone)]
pub struct BuildingNode {
    /// Split taken at this node; `None` while it is a leaf.
    pub split: Option<SplitInfo>,
    /// Children indices (`u32::MAX` while a leaf).
    pub left: u32,
    pub right: u32,
    /// Depth below the root.
    pub depth: u32,
    /// Leaf weight (meaningful while `is_leaf`).
    pub weight: f32,
    /// Whether this node is currently a leaf.
    pub is_leaf: bool,
}

impl BuildingNode {
    fn new_leaf(weight: f32, depth: u32) -> Self {
        Self {
            split: None,
            left: u32::MAX,
            right: u32::MAX,
            depth,
            weight,
            is_leaf: true,
        }
    }
}

/// A mutable tree being grown; freezes into [`Tree`] when done.
#[derive(Debug, Clone)]
pub struct BuildingTree {
    nodes: Vec<BuildingNode>,
}

impl BuildingTree {
    /// A single root leaf.
    pub fn new(root_weight: f32) -> Self {
        Self {
            nodes: vec![BuildingNode::new_leaf(root_weight, 0)],
        }
    }

    /// Number of nodes.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Borrow a node.
    pub fn node(&self, index: u32) -> &BuildingNode {
        &self.nodes[index as usize]
    }

    /// Turn a leaf into a split node; returns the new child indices.
    pub fn expand(&mut self, index: u32, split: SplitInfo) -> (u32, u32) {
        debug_assert!(self.nodes[index as usize].is_leaf, "cannot expand a split node");
        let depth = self.nodes[index as usize].depth;

        let left = self.nodes.len() as u32;
        let right = left + 1;
        self.nodes.push(BuildingNode::new_leaf(split.weight_left, depth + 1));
        self.nodes.push(BuildingNode::new_leaf(split.weight_right, depth + 1));

        let node = &mut self.nodes[index as usize];
        node.split = Some(split);
        node.left = left;
        node.right = right;
        node.is_leaf = false;
        (left, right)
    }

    /// Multiply every leaf weight by the learning rate.
    pub fn apply_learning_rate(&mut self, learning_rate: f32) {
        for node in &mut self.nodes {
            if node.is_leaf {
                node.weight *= learning_rate;
            }
        }
    }

    /// Leaf weight for one binned row (used for in-loop prediction updates).
    pub fn predict_binned(&self, binned: &BinnedMatrix, row: usize) -> f32 {
        let mut index = 0u32;
        loop {
            let node = &self.nodes[index as usize];
            if node.is_leaf {
                return node.weight;
            }
            let split = node.split.as_ref().expect("split node without split info");
            let bin = binned.bin(row, split.feature as usize) as u32;
            let go_left = if bin == 0 { split.default_left } else { bin <= split.bin };
            index = if go_left { node.left } else { node.right };
        }
    }

    /// Convert into the immutable prediction tree.
    ///
    /// Node indices are preserved, so children keep pointing forward.
    pub fn freeze(&self) -> Tree {
        let nodes = self
            .nodes
            .iter()
            .map(|node| {
                if node.is_leaf {
                    Node::Leaf { value: node.weight }
                } else {
                    let split = node.split.as_ref().expect("split node without split info");
                    Node::Split {
                        condition: SplitCondition {
                            feature: split.feature,
                            threshold: split.threshold,
                            default_left: split.default_left,
                        },
                        left: node.left,
                        right: node.right,
                    }
                }
            })
            .collect();
        Tree::from_nodes(nodes)
    }
}

// =============================================================================
// TreeGrower
// =============================================================================

/// Grows one tree per boosting round, depth-wise.
#[derive(Debug, Clone)]
pub struct TreeGrower {
    params: TreeParams,
}

impl TreeGrower {
    /// Create a grower with the given tree parameters.
    pub fn new(params: TreeParams) -> Self {
        Self { params }
    }

    /// Grow a tree over all rows of the binned matrix.
    pub fn grow(
        &self,
        binned: &BinnedMatrix,
        cuts: &BinCuts,
        buffer: &GradientBuffer,
    ) -> BuildingTree {
        let gain_params = self.params.gain_params();
        let all_rows: Vec<u32> = (0..binned.n_rows() as u32).collect();

        let (root_g, root_h, _) = buffer.totals(&all_rows);
        let mut tree = BuildingTree::new(leaf_weight(root_g, root_h, self.params.reg_lambda));

        // Frontier of expandable leaves with their row sets.
        let mut frontier = vec![(0u32, all_rows)];

        for _depth in 0..self.params.max_depth {
            let mut next = Vec::new();

            for (node_id, rows) in frontier {
                if (rows.len() as u32) < 2 * self.params.min_samples_leaf {
                    continue;
                }

                let histogram = NodeHistogram::build(binned, cuts, buffer, &rows);
                let Some(split) = find_best_split(&histogram, cuts, &gain_params) else {
                    continue;
                };

                let (left_rows, right_rows) = partition_rows(binned, &rows, &split);
                let (left_id, right_id) = tree.expand(node_id, split);
                next.push((left_id, left_rows));
                next.push((right_id, right_rows));
            }

            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        tree
    }
}

/// Route a node's rows into left/right child sets.
fn partition_rows(binned: &BinnedMatrix, rows: &[u32], split: &SplitInfo) -> (Vec<u32>, Vec<u32>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for &row in rows {
        let bin = binned.bin(row as usize, split.feature as usize) as u32;
        let go_left = if bin == 0 { split.default_left } else { bin <= split.bin };
        if go_left {
            left.push(row);
        } else {
            right.push(row);
        }
    }
    (left, right)
}
