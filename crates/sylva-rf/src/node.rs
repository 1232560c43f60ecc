use std::fmt;

/// Zero-based feature column index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    /// Create a new feature index from a zero-based column position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based feature column index.
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

/// Index into a `Vec<Node>` arena, identifying a specific node in a regression tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// Create a new node index from a zero-based arena position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
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

/// Target variance at a node (mean squared deviation from the node mean).
#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd,
    serde::Serialize, serde::Deserialize,
)]
pub struct Variance(f64);

impl Variance {
    /// Create a new variance value.
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw variance value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Variance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// A node in a regression tree arena.
///
/// Trees are stored as `Vec<Node>` where children are referenced by
/// [`NodeIndex`] rather than pointers, which is cache-friendly and
/// trivially serializable.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// An interior split node.
    Split {
        /// Feature used for the split.
        feature: FeatureIndex,
        /// Threshold value: samples with feature <= threshold go left.
        threshold: f64,
        /// Index of the left child node.
        left: NodeIndex,
        /// Index of the right child node.
        right: NodeIndex,
        /// Target variance at this node before splitting.
        variance: Variance,
        /// Number of training samples that reached this node.
        n_samples: usize,
        /// Decrease in sum of squared errors from this split.
        sse_decrease: f64,
    },
    /// A terminal leaf node.
    Leaf {
        /// Predicted value (mean of targets that reached this leaf).
        prediction: f64,
        /// Target variance at this leaf.
        variance: Variance,
        /// Number of training samples in this leaf.
        n_samples: usize,
    },
}

impl Node {
    /// Return the target variance at this node (before splitting for interior nodes).
    #[must_use]
    pub fn variance(&self) -> Variance {
        match self {
            Node::Split { variance, .. } | Node::Leaf { variance, .. } => *variance,
        }
    }

    /// Return the number of training samples that reached this node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::{FeatureIndex, Node, NodeIndex, Variance};

    fn make_leaf() -> Node {
        Node::Leaf {
            prediction: 4.2,
            variance: Variance::new(0.32),
            n_samples: 10,
        }
    }

    fn make_split() -> Node {
        Node::Split {
            feature: FeatureIndex::new(2),
            threshold: 3.5,
            left: NodeIndex::new(1),
            right: NodeIndex::new(2),
            variance: Variance::new(0.48),
            n_samples: 20,
            sse_decrease: 0.16,
        }
    }

    #[test]
    fn feature_index_roundtrip() {
        let fi = FeatureIndex::new(7);
        assert_eq!(fi.index(), 7);
        assert_eq!(format!("{fi}"), "7");
    }

    #[test]
    fn node_index_roundtrip() {
        let ni = NodeIndex::new(42);
        assert_eq!(ni.index(), 42);
    }

    #[test]
    fn node_index_ordering() {
        assert!(NodeIndex::new(10) < NodeIndex::new(20));
    }

    #[test]
    fn variance_roundtrip() {
        let v = Variance::new(0.5);
        assert!((v.value() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn variance_display() {
        assert_eq!(format!("{}", Variance::new(0.333333)), "0.333333");
    }

    #[test]
    fn leaf_is_leaf() {
        assert!(make_leaf().is_leaf());
        assert!(!make_split().is_leaf());
    }

    #[test]
    fn node_n_samples() {
        assert_eq!(make_leaf().n_samples(), 10);
        assert_eq!(make_split().n_samples(), 20);
    }

    #[test]
    fn node_variance() {
        assert!((make_leaf().variance().value() - 0.32).abs() < f64::EPSILON);
        assert!((make_split().variance().value() - 0.48).abs() < f64::EPSILON);
    }
}
