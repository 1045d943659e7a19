//! Isolation forest scorer, evaluated natively from its JSON artifact.
//!
//! A point's path length in one tree is the depth of the leaf it reaches
//! plus the expected depth `c(n)` of an unbuilt subtree over the `n` training
//! samples left in that leaf. Averaged over the forest and normalized by
//! `c(max_samples)`, this gives the usual score `-2^(-E[h] / c(psi))` in
//! `[-1, 0]`. Subtracting `offset`, the training-time cut for the configured
//! contamination rate, yields the decision score handed to detectors: in
//! `[-1, 1]`, negative exactly when the point is an outlier.

use serde::Deserialize;

use crate::detect::ComputationError;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Scores a scaled feature vector. More negative = more anomalous.
pub trait AnomalyScorer: Send + Sync {
    fn n_features(&self) -> usize;

    /// Continuous anomaly score in `[-1, 1]`, centered on the outlier cut.
    fn score(&self, scaled: &[f64]) -> Result<f64, ComputationError>;

    fn is_outlier(&self, scaled: &[f64]) -> Result<bool, ComputationError>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// One tree, nodes stored flat with the root at index 0.
#[derive(Debug, Clone, Deserialize)]
pub struct IsolationTree {
    pub nodes: Vec<Node>,
}

impl IsolationTree {
    fn path_length(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }

    /// Every child index must point forward, which rules out cycles.
    fn check(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                threshold,
                left,
                right,
            } = node
            {
                if *feature >= n_features {
                    return Err(format!("node {} splits on feature {}", i, feature));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {} has a non-finite threshold", i));
                }
                for child in [left, right] {
                    if *child <= i || *child >= self.nodes.len() {
                        return Err(format!("node {} has invalid child {}", i, child));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Expected path length of an unsuccessful search in a binary tree of `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Isolation forest artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct IsolationForest {
    pub n_features: usize,
    pub max_samples: usize,
    /// Expected outlier share the offset was calibrated for.
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    pub offset: f64,
    pub trees: Vec<IsolationTree>,
}

fn default_contamination() -> f64 {
    0.05
}

impl IsolationForest {
    /// Checks the artifact is internally consistent.
    pub fn check(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".into());
        }
        if self.max_samples < 2 {
            return Err(format!("max_samples must be at least 2, got {}", self.max_samples));
        }
        if !self.offset.is_finite() {
            return Err("offset is not finite".into());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.check(self.n_features)
                .map_err(|e| format!("tree {}: {}", i, e))?;
        }
        Ok(())
    }

    /// Uncentered isolation score in `[-1, 0]`.
    pub fn raw_score(&self, scaled: &[f64]) -> Result<f64, ComputationError> {
        self.ensure_dims(scaled)?;
        let mean_path = self
            .trees
            .iter()
            .map(|t| t.path_length(scaled))
            .sum::<f64>()
            / self.trees.len() as f64;
        Ok(-(2f64).powf(-mean_path / average_path_length(self.max_samples)))
    }

    fn ensure_dims(&self, scaled: &[f64]) -> Result<(), ComputationError> {
        if scaled.len() != self.n_features {
            return Err(ComputationError::DimensionMismatch {
                component: "scorer",
                expected: self.n_features,
                actual: scaled.len(),
            });
        }
        Ok(())
    }
}

impl AnomalyScorer for IsolationForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn score(&self, scaled: &[f64]) -> Result<f64, ComputationError> {
        Ok(self.raw_score(scaled)? - self.offset)
    }

    fn is_outlier(&self, scaled: &[f64]) -> Result<bool, ComputationError> {
        Ok(self.score(scaled)? < 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two-feature forest: one tree isolates large values of feature 0 quickly.
    fn tiny_forest() -> IsolationForest {
        serde_json::from_str(
            r#"{
                "n_features": 2,
                "max_samples": 8,
                "offset": -0.6,
                "trees": [
                    {"nodes": [
                        {"split": {"feature": 0, "threshold": 3.0, "left": 1, "right": 2}},
                        {"leaf": {"size": 7}},
                        {"leaf": {"size": 1}}
                    ]}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_average_path_length_known_values() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(8) = 2(ln 7 + gamma) - 14/8
        let expected = 2.0 * (7f64.ln() + EULER_GAMMA) - 1.75;
        assert!((average_path_length(8) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_isolated_point_scores_lower() {
        let forest = tiny_forest();
        forest.check().unwrap();
        let inlier = forest.raw_score(&[0.0, 0.0]).unwrap();
        let outlier = forest.raw_score(&[10.0, 0.0]).unwrap();
        assert!(outlier < inlier);
        assert!((-1.0..=0.0).contains(&inlier));
        assert!((-1.0..=0.0).contains(&outlier));

        // Decision score is the raw score shifted by the offset.
        let decision = forest.score(&[10.0, 0.0]).unwrap();
        assert!((decision - (outlier + 0.6)).abs() < 1e-12);
    }

    #[test]
    fn test_outlier_call_uses_offset() {
        let forest = tiny_forest();
        // Depth 1 + c(1) = 1 => raw = -2^(-1 / c(8)) ~ -0.81
        assert!(forest.is_outlier(&[10.0, 0.0]).unwrap());
        assert!(forest.score(&[10.0, 0.0]).unwrap() < 0.0);
        // Depth 1 + c(7) ~ 4.02 => raw ~ -0.43
        assert!(!forest.is_outlier(&[0.0, 0.0]).unwrap());
        assert!(forest.score(&[0.0, 0.0]).unwrap() > 0.0);
    }

    #[test]
    fn test_wrong_dimension_is_an_error() {
        let forest = tiny_forest();
        let err = forest.score(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            ComputationError::DimensionMismatch { expected: 2, actual: 3, .. }
        ));
    }

    #[test]
    fn test_check_rejects_bad_trees() {
        let mut forest = tiny_forest();
        forest.trees[0].nodes[0] = Node::Split {
            feature: 5,
            threshold: 0.0,
            left: 1,
            right: 2,
        };
        assert!(forest.check().unwrap_err().contains("feature 5"));

        let mut forest = tiny_forest();
        forest.trees[0].nodes[0] = Node::Split {
            feature: 0,
            threshold: 0.0,
            left: 0,
            right: 9,
        };
        assert!(forest.check().is_err());

        let mut forest = tiny_forest();
        forest.trees.clear();
        assert!(forest.check().is_err());
    }

    #[test]
    fn test_contamination_defaults() {
        assert_eq!(tiny_forest().contamination, 0.05);
    }
}
