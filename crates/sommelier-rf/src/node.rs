use std::fmt;

/// Zero-based position of a feature in a model's feature schema.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    /// Create a new feature index from a zero-based schema position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based schema position.
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

/// Node impurity (mean squared error of the node's targets).
#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd,
    serde::Serialize, serde::Deserialize,
)]
pub struct Impurity(f64);

impl Impurity {
    /// Create a new impurity value.
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw impurity value.
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

/// Deepest subtree accepted when decoding a model artifact.
pub(crate) const MAX_DECODE_DEPTH: usize = 4096;

/// A node in a regression tree.
///
/// Each `Split` owns exactly two boxed children, so a tree is acyclic and
/// exclusively owns its nodes.
///
/// On the wire a subtree is a flat pre-order sequence of [`EncodedNode`]s:
/// a split is followed by its left subtree, then its right subtree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An interior split node.
    Split {
        /// Feature used for the split.
        feature: FeatureIndex,
        /// Threshold value: examples with feature <= threshold go left.
        threshold: f64,
        /// Left subtree (feature <= threshold).
        left: Box<Node>,
        /// Right subtree (feature > threshold).
        right: Box<Node>,
        /// Impurity at this node before splitting.
        impurity: Impurity,
        /// Number of training examples that reached this node.
        n_examples: usize,
        /// `impurity - (n_left/n)·impurity_left - (n_right/n)·impurity_right`.
        impurity_decrease: f64,
    },
    /// A terminal leaf node.
    Leaf {
        /// Mean target value of the examples that reached this leaf.
        value: f64,
        /// Impurity at this leaf.
        impurity: Impurity,
        /// Number of training examples in this leaf.
        n_examples: usize,
    },
}

impl Node {
    /// Return the impurity at this node (before splitting for interior nodes).
    #[must_use]
    pub fn impurity(&self) -> Impurity {
        match self {
            Node::Split { impurity, .. } | Node::Leaf { impurity, .. } => *impurity,
        }
    }

    /// Return the number of training examples that reached this node.
    #[must_use]
    pub fn n_examples(&self) -> usize {
        match self {
            Node::Split { n_examples, .. } | Node::Leaf { n_examples, .. } => *n_examples,
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Return the number of nodes in this subtree, including itself.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => 1 + left.n_nodes() + right.n_nodes(),
        }
    }

    /// Return the number of leaves in this subtree.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }

    /// Return the depth of this subtree. A lone leaf has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// One pre-order record of a serialized subtree. Children are implicit.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub(crate) enum EncodedNode {
    Split {
        feature: FeatureIndex,
        threshold: f64,
        impurity: Impurity,
        n_examples: usize,
        impurity_decrease: f64,
    },
    Leaf {
        value: f64,
        impurity: Impurity,
        n_examples: usize,
    },
}

/// A decoded split still waiting for its children.
struct PendingSplit {
    feature: FeatureIndex,
    threshold: f64,
    impurity: Impurity,
    n_examples: usize,
    impurity_decrease: f64,
    left: Option<Node>,
}

impl Node {
    /// Flatten this subtree into pre-order records without recursing.
    pub(crate) fn to_preorder(&self) -> Vec<EncodedNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    impurity,
                    n_examples,
                    impurity_decrease,
                } => {
                    out.push(EncodedNode::Split {
                        feature: *feature,
                        threshold: *threshold,
                        impurity: *impurity,
                        n_examples: *n_examples,
                        impurity_decrease: *impurity_decrease,
                    });
                    stack.push(right);
                    stack.push(left);
                }
                Node::Leaf {
                    value,
                    impurity,
                    n_examples,
                } => out.push(EncodedNode::Leaf {
                    value: *value,
                    impurity: *impurity,
                    n_examples: *n_examples,
                }),
            }
        }
        out
    }

    /// Rebuild a subtree from pre-order records without recursing.
    ///
    /// Fails if the records do not describe exactly one complete subtree, or
    /// if it is deeper than [`MAX_DECODE_DEPTH`].
    pub(crate) fn from_preorder(records: Vec<EncodedNode>) -> Result<Node, String> {
        let mut records = records.into_iter();
        let mut stack: Vec<PendingSplit> = Vec::new();

        'records: loop {
            let Some(record) = records.next() else {
                return Err(if stack.is_empty() {
                    "empty node sequence".to_string()
                } else {
                    "node sequence ends inside a split".to_string()
                });
            };

            let mut done = match record {
                EncodedNode::Split {
                    feature,
                    threshold,
                    impurity,
                    n_examples,
                    impurity_decrease,
                } => {
                    if stack.len() >= MAX_DECODE_DEPTH {
                        return Err(format!("tree deeper than {MAX_DECODE_DEPTH} levels"));
                    }
                    stack.push(PendingSplit {
                        feature,
                        threshold,
                        impurity,
                        n_examples,
                        impurity_decrease,
                        left: None,
                    });
                    continue;
                }
                EncodedNode::Leaf {
                    value,
                    impurity,
                    n_examples,
                } => Node::Leaf {
                    value,
                    impurity,
                    n_examples,
                },
            };

            // Hang the finished subtree on its parent, closing every split
            // whose right child this completes.
            while let Some(mut parent) = stack.pop() {
                match parent.left.take() {
                    None => {
                        parent.left = Some(done);
                        stack.push(parent);
                        continue 'records;
                    }
                    Some(left) => {
                        done = Node::Split {
                            feature: parent.feature,
                            threshold: parent.threshold,
                            left: Box::new(left),
                            right: Box::new(done),
                            impurity: parent.impurity,
                            n_examples: parent.n_examples,
                            impurity_decrease: parent.impurity_decrease,
                        };
                    }
                }
            }

            if records.next().is_some() {
                return Err("trailing nodes after a complete tree".to_string());
            }
            return Ok(done);
        }
    }
}

impl serde::Serialize for Node {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.to_preorder(), serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Node {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let records = <Vec<EncodedNode> as serde::Deserialize>::deserialize(deserializer)?;
        Node::from_preorder(records).map_err(<D::Error as serde::de::Error>::custom)
    }
}
