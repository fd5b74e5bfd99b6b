//! Gradient-boosted tree adapter: Implementation of Classifier.
//!
//! Loads a binary tree ensemble exported as JSON by the training pipeline:
//!
//! ```json
//! {
//!   "objective": "binary",
//!   "classes": [0, 1],
//!   "feature_names": ["age", "..."],
//!   "init_score": -0.35,
//!   "trees": [{ "nodes": [
//!     { "split": { "feature": 7, "threshold": 30.0, "default_left": true, "left": 1, "right": 2 } },
//!     { "leaf": { "value": 0.62 } },
//!     { "leaf": { "value": -0.28 } }
//!   ]}]
//! }
//! ```
//!
//! The raw score is `init_score` plus one leaf value per tree and models the
//! log-odds of `classes[1]`. Splits go left when `x <= threshold`; a missing
//! value (`NaN`) follows `default_left`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::AlignedRow;
use crate::ports::{Classifier, ModelError};

/// Ensemble parameters exported by the training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedForest {
    pub objective: String,
    pub classes: Vec<i64>,
    pub feature_names: Vec<String>,
    pub init_score: f64,
    pub trees: Vec<Tree>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        default_left: bool,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

impl Tree {
    /// Walk from the root to a leaf.
    ///
    /// Children always have a larger index than their parent (checked at
    /// load), so the walk terminates.
    fn leaf_value(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    default_left,
                    left,
                    right,
                } => {
                    let v = x[*feature];
                    let go_left = if v.is_nan() { *default_left } else { v <= *threshold };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }
}

/// Binary gradient-boosted tree classifier.
#[derive(Debug, Clone)]
pub struct GbdtClassifier {
    forest: ExportedForest,
}

impl GbdtClassifier {
    /// Load and check a forest from a JSON file.
    ///
    /// # Errors
    /// Returns [`ModelError::Invalid`] if the file is unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ModelError::Invalid(format!("{}: {e}", path.display())))?;
        let model = Self::from_json(&content)?;

        tracing::info!(
            "Loaded model from {:?} (trees={}, n_features={}, classes={:?})",
            path,
            model.forest.trees.len(),
            model.forest.feature_names.len(),
            model.forest.classes
        );
        Ok(model)
    }

    /// Parse and check a forest from JSON text.
    ///
    /// # Errors
    /// Returns [`ModelError::Invalid`] if the JSON or the tree structure is
    /// malformed.
    pub fn from_json(content: &str) -> Result<Self, ModelError> {
        let forest: ExportedForest =
            serde_json::from_str(content).map_err(|e| ModelError::Invalid(e.to_string()))?;
        Self::new(forest)
    }

    /// # Errors
    /// Returns [`ModelError::Invalid`] if the forest fails a sanity check.
    pub fn new(forest: ExportedForest) -> Result<Self, ModelError> {
        if forest.objective != "binary" {
            return Err(ModelError::Invalid(format!(
                "unsupported objective {:?}, expected \"binary\"",
                forest.objective
            )));
        }
        if forest.classes.len() != 2 || forest.classes[0] == forest.classes[1] {
            return Err(ModelError::Invalid(format!(
                "binary model needs two distinct classes, got {:?}",
                forest.classes
            )));
        }
        let n_features = forest.feature_names.len();
        if n_features == 0 {
            return Err(ModelError::Invalid("model has no features".into()));
        }
        if !forest.init_score.is_finite() {
            return Err(ModelError::Invalid("init_score is not finite".into()));
        }

        for (t, tree) in forest.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(ModelError::Invalid(format!("tree {t} has no nodes")));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                match node {
                    Node::Leaf { value } if !value.is_finite() => {
                        return Err(ModelError::Invalid(format!(
                            "tree {t} node {i}: leaf value is not finite"
                        )));
                    }
                    Node::Leaf { .. } => {}
                    Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                        ..
                    } => {
                        if *feature >= n_features {
                            return Err(ModelError::Invalid(format!(
                                "tree {t} node {i}: feature {feature} out of range"
                            )));
                        }
                        if threshold.is_nan() {
                            return Err(ModelError::Invalid(format!(
                                "tree {t} node {i}: threshold is NaN"
                            )));
                        }
                        for child in [*left, *right] {
                            if child <= i || child >= tree.nodes.len() {
                                return Err(ModelError::Invalid(format!(
                                    "tree {t} node {i}: child {child} out of order or range"
                                )));
                            }
                        }
                    }
                }
            }
        }

        Ok(Self { forest })
    }

    fn raw_score(&self, x: &[f64]) -> f64 {
        self.forest
            .trees
            .iter()
            .fold(self.forest.init_score, |acc, tree| acc + tree.leaf_value(x))
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }
}

impl Classifier for GbdtClassifier {
    fn classes(&self) -> &[i64] {
        &self.forest.classes
    }

    fn feature_names(&self) -> &[String] {
        &self.forest.feature_names
    }

    fn predict_proba(&self, row: &AlignedRow) -> Result<Vec<f64>, ModelError> {
        let expected = self.forest.feature_names.len();
        if row.len() != expected {
            return Err(ModelError::FeatureCount {
                expected,
                actual: row.len(),
            });
        }
        if let Some((index, (want, got))) = self
            .forest
            .feature_names
            .iter()
            .zip(row.columns())
            .enumerate()
            .find(|(_, (want, got))| want != got)
        {
            return Err(ModelError::FeatureName {
                index,
                expected: want.clone(),
                actual: got.clone(),
            });
        }

        let p = Self::sigmoid(self.raw_score(row.values()));
        Ok(vec![1.0 - p, p])
    }
}
