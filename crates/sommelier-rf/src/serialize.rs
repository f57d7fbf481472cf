//! Model serialization and deserialization via bincode.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::RfError;
use crate::forest::RandomForest;
use crate::node::Node;

/// Leading bytes of every model artifact.
const MAGIC: [u8; 4] = *b"SMRF";

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// Fixed-size prefix, decoded before the body so foreign or future
/// artifacts are rejected without touching the forest encoding.
#[derive(serde::Deserialize)]
struct EnvelopeHeader {
    magic: [u8; 4],
    format_version: u32,
}

/// Versioned envelope for the serialized model.
#[derive(serde::Serialize)]
struct ModelEnvelopeRef<'a> {
    magic: [u8; 4],
    format_version: u32,
    n_trees: u64,
    forest: &'a RandomForest,
}

#[derive(serde::Deserialize)]
struct ModelEnvelope {
    #[allow(dead_code)]
    magic: [u8; 4],
    #[allow(dead_code)]
    format_version: u32,
    n_trees: u64,
    forest: RandomForest,
}

/// Encode a forest into an opaque, versioned artifact.
///
/// # Errors
///
/// Returns [`RfError::SerializeModel`] if bincode encoding fails.
pub fn serialize(forest: &RandomForest) -> Result<Vec<u8>, RfError> {
    let envelope = ModelEnvelopeRef {
        magic: MAGIC,
        format_version: FORMAT_VERSION,
        n_trees: forest.trees.len() as u64,
        forest,
    };
    bincode::serialize(&envelope).map_err(|source| RfError::SerializeModel { source })
}

/// Decode an artifact produced by [`serialize`].
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`RfError::DecodeModel`] | bytes are truncated, not a bincode envelope, or a tree is malformed or too deep |
/// | [`RfError::CorruptArtifact`] | wrong magic, or the decoded forest is inconsistent |
/// | [`RfError::IncompatibleModelVersion`] | format version mismatch |
pub fn deserialize(bytes: &[u8]) -> Result<RandomForest, RfError> {
    let header: EnvelopeHeader =
        bincode::deserialize(bytes).map_err(|source| RfError::DecodeModel { source })?;
    if header.magic != MAGIC {
        return Err(RfError::CorruptArtifact {
            reason: "not a sommelier model (bad magic bytes)".to_string(),
        });
    }
    if header.format_version != FORMAT_VERSION {
        return Err(RfError::IncompatibleModelVersion {
            expected: FORMAT_VERSION,
            found: header.format_version,
        });
    }

    let envelope: ModelEnvelope =
        bincode::deserialize(bytes).map_err(|source| RfError::DecodeModel { source })?;
    validate_forest(&envelope.forest, envelope.n_trees)
        .map_err(|reason| RfError::CorruptArtifact { reason })?;

    debug!(
        n_trees = envelope.n_trees,
        n_features = envelope.forest.feature_names.len(),
        n_dimensions = envelope.forest.target_names.len(),
        "model decoded"
    );

    Ok(envelope.forest)
}

/// Check the structural invariants a trained forest always satisfies.
fn validate_forest(forest: &RandomForest, n_trees: u64) -> Result<(), String> {
    if forest.trees.is_empty() {
        return Err("model has no trees".to_string());
    }
    if forest.trees.len() as u64 != n_trees {
        return Err(format!(
            "header declares {n_trees} trees, body holds {}",
            forest.trees.len()
        ));
    }
    if forest.feature_names.is_empty() || forest.target_names.is_empty() {
        return Err("model has an empty feature or target schema".to_string());
    }
    let n_features = forest.feature_names.len();
    for (tree_index, tree) in forest.trees.iter().enumerate() {
        if tree.feature_names != forest.feature_names {
            return Err(format!("tree {tree_index} has a different feature schema"));
        }
        if tree.roots.len() != forest.target_names.len() {
            return Err(format!(
                "tree {tree_index} has {} roots for {} dimensions",
                tree.roots.len(),
                forest.target_names.len()
            ));
        }
        for root in &tree.roots {
            validate_node(root, n_features).map_err(|e| format!("tree {tree_index}: {e}"))?;
        }
    }
    Ok(())
}

fn validate_node(node: &Node, n_features: usize) -> Result<(), String> {
    match node {
        Node::Leaf { value, .. } => {
            if !value.is_finite() {
                return Err("non-finite leaf value".to_string());
            }
            Ok(())
        }
        Node::Split {
            feature,
            threshold,
            left,
            right,
            ..
        } => {
            if feature.index() >= n_features {
                return Err(format!(
                    "split on feature {feature} outside schema of {n_features}"
                ));
            }
            if !threshold.is_finite() {
                return Err("non-finite split threshold".to_string());
            }
            validate_node(left, n_features)?;
            validate_node(right, n_features)
        }
    }
}

impl RandomForest {
    /// Save the model to a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::SerializeModel`] | bincode encoding failed |
    /// | [`RfError::WriteModel`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RfError> {
        let path = path.as_ref();
        let bytes = serialize(self)?;

        std::fs::write(path, &bytes).map_err(|e| RfError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(
            size_bytes = bytes.len(),
            n_trees = self.trees.len(),
            "model saved"
        );

        Ok(())
    }

    /// Load a model from a binary file written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// [`RfError::ReadModel`] if the file cannot be read, otherwise any
    /// error from [`deserialize`].
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RfError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|e| RfError::ReadModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        let forest = deserialize(&bytes)?;
        info!(n_trees = forest.trees.len(), "model loaded");
        Ok(forest)
    }
}
