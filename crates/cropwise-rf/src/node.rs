use std::fmt;

use serde::{Deserialize, Serialize};

/// Zero-based feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the column position.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a node inside a tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the arena position.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node impurity under whichever criterion grew the tree.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Impurity(f64);

impl Impurity {
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// A node in a decision tree arena.
///
/// Children are referenced by [`NodeIndex`] into the owning tree's
/// `Vec<Node>`. Every node, split or leaf, keeps the normalized class
/// distribution of the training samples that reached it; contributions
/// are computed from the change in that distribution along a decision path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    /// Interior node: `sample[feature] <= threshold` goes left.
    Split {
        /// Column tested.
        feature: FeatureIndex,
        /// Decision boundary.
        threshold: f64,
        /// Left child.
        left: NodeIndex,
        /// Right child.
        right: NodeIndex,
        /// Class distribution before splitting.
        distribution: Vec<f64>,
        /// Impurity before splitting.
        impurity: Impurity,
        /// Training samples reaching this node.
        n_samples: usize,
        /// Weighted impurity decrease (`n * I - n_l * I_l - n_r * I_r`).
        impurity_decrease: f64,
    },
    /// Terminal node.
    Leaf {
        /// Majority class.
        prediction: usize,
        /// Class distribution of the leaf.
        distribution: Vec<f64>,
        /// Leaf impurity.
        impurity: Impurity,
        /// Training samples in the leaf.
        n_samples: usize,
    },
}

impl Node {
    /// Return the impurity at this node.
    #[must_use]
    pub fn impurity(&self) -> Impurity {
        match self {
            Node::Split { impurity, .. } | Node::Leaf { impurity, .. } => *impurity,
        }
    }

    /// Return the number of training samples that reached this node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    /// Return the class distribution at this node.
    #[must_use]
    pub fn distribution(&self) -> &[f64] {
        match self {
            Node::Split { distribution, .. } | Node::Leaf { distribution, .. } => distribution,
        }
    }

    /// Return `true` for terminal nodes.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Feature tested at a split node, `None` for a leaf.
    #[must_use]
    pub fn split_feature(&self) -> Option<FeatureIndex> {
        match self {
            Node::Split { feature, .. } => Some(*feature),
            Node::Leaf { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FeatureIndex, Impurity, Node, NodeIndex};

    fn leaf() -> Node {
        Node::Leaf {
            prediction: 2,
            distribution: vec![0.1, 0.2, 0.7],
            impurity: Impurity::new(0.46),
            n_samples: 10,
        }
    }

    fn split() -> Node {
        Node::Split {
            feature: FeatureIndex::new(5),
            threshold: 6.5,
            left: NodeIndex::new(1),
            right: NodeIndex::new(2),
            distribution: vec![0.5, 0.25, 0.25],
            impurity: Impurity::new(0.625),
            n_samples: 40,
            impurity_decrease: 9.0,
        }
    }

    #[test]
    fn index_newtypes_display_raw_value() {
        assert_eq!(FeatureIndex::new(3).to_string(), "3");
        assert_eq!(NodeIndex::new(17).to_string(), "17");
        assert!(NodeIndex::new(1) < NodeIndex::new(2));
    }

    #[test]
    fn impurity_displays_six_decimals() {
        assert_eq!(Impurity::new(0.5).to_string(), "0.500000");
        assert!(Impurity::new(0.1) < Impurity::new(0.2));
    }

    #[test]
    fn accessors_cover_both_variants() {
        assert!(leaf().is_leaf());
        assert!(!split().is_leaf());
        assert_eq!(leaf().n_samples(), 10);
        assert_eq!(split().n_samples(), 40);
        assert!((split().impurity().value() - 0.625).abs() < f64::EPSILON);
        assert_eq!(split().distribution(), &[0.5, 0.25, 0.25]);
        assert_eq!(leaf().distribution().len(), 3);
    }
}
