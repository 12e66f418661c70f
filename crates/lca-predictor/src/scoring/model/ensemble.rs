//! Boosted-tree ensemble decoded from XGBoost's native JSON model format.

use serde::Deserialize;

use super::InferenceError;
use crate::scoring::artifacts::ArtifactError;
use crate::scoring::features::FeatureVector;

/// How the summed margin is turned into the model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    Logistic,
    RawMargin,
}

impl Objective {
    fn from_name(name: &str) -> Self {
        match name {
            "binary:logistic" | "reg:logistic" => Objective::Logistic,
            _ => Objective::RawMargin,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Node {
    pub left: Option<usize>,
    pub right: Option<usize>,
    pub feature: usize,
    /// Split threshold for internal nodes, leaf value for leaves.
    pub value: f64,
    pub default_left: bool,
    pub cover: f64,
    pub gain: f64,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.left.is_none()
    }

    /// Child taken by `x`; missing values follow the default direction.
    pub fn next(&self, x: f64) -> Option<usize> {
        let go_left = if x.is_nan() {
            self.default_left
        } else {
            x < self.value
        };
        if go_left {
            self.left
        } else {
            self.right
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    fn leaf_value(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            let node = &self.nodes[index];
            match node.next(row.get(node.feature).copied().unwrap_or(f64::NAN)) {
                Some(child) => index = child,
                None => return node.value,
            }
        }
    }
}

/// Gradient-boosted trees plus the learner parameters needed to score them.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    pub(crate) trees: Vec<Tree>,
    feature_names: Vec<String>,
    num_features: usize,
    base_score: f64,
    objective: Objective,
}

impl TreeEnsemble {
    /// Decode an `xgb_final.json` document.
    pub fn from_xgboost_json(document: serde_json::Value) -> Result<Self, ArtifactError> {
        let document: ModelDocument = serde_json::from_value(document)
            .map_err(|err| ArtifactError::Model(format!("unexpected layout: {err}")))?;
        let learner = document.learner;

        let booster = learner.gradient_booster.name.as_deref().unwrap_or("gbtree");
        if booster != "gbtree" {
            return Err(ArtifactError::Model(format!(
                "unsupported booster '{booster}'"
            )));
        }

        let base_score = parse_param(&learner.learner_model_param.base_score)
            .ok_or_else(|| ArtifactError::Model("base_score is not numeric".to_string()))?;

        let trees = learner
            .gradient_booster
            .model
            .trees
            .into_iter()
            .enumerate()
            .map(|(index, tree)| tree.into_tree(index))
            .collect::<Result<Vec<_>, _>>()?;

        let declared = learner
            .learner_model_param
            .num_feature
            .as_deref()
            .and_then(parse_param)
            .map(|count| count as usize)
            .unwrap_or(0);
        let num_features = declared
            .max(features_used(&trees))
            .max(learner.feature_names.len());

        let objective = learner
            .objective
            .map(|objective| Objective::from_name(&objective.name))
            .unwrap_or(Objective::Logistic);

        Ok(Self {
            trees,
            feature_names: learner.feature_names,
            num_features,
            base_score,
            objective,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        trees: Vec<Tree>,
        feature_names: Vec<String>,
        base_score: f64,
        objective: Objective,
    ) -> Self {
        Self {
            num_features: features_used(&trees).max(feature_names.len()),
            trees,
            feature_names,
            base_score,
            objective,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Numeric row for `vector`, checked against the model's expectations.
    pub fn align(&self, vector: &FeatureVector) -> Result<Vec<f64>, InferenceError> {
        if !self.feature_names.is_empty() && vector.columns() != self.feature_names.as_slice() {
            let missing = self
                .feature_names
                .iter()
                .filter(|name| !vector.columns().contains(name))
                .take(5)
                .cloned()
                .collect();
            return Err(InferenceError::FeatureMismatch {
                expected: self.feature_names.len(),
                found: vector.len(),
                missing,
            });
        }
        if vector.len() < self.num_features {
            return Err(InferenceError::TooNarrow {
                expected: self.num_features,
                found: vector.len(),
            });
        }
        Ok(vector.numeric())
    }

    pub fn base_margin(&self) -> f64 {
        match self.objective {
            Objective::Logistic => logit(self.base_score),
            Objective::RawMargin => self.base_score,
        }
    }

    pub fn margin(&self, row: &[f64]) -> f64 {
        self.base_margin()
            + self
                .trees
                .iter()
                .map(|tree| tree.leaf_value(row))
                .sum::<f64>()
    }

    /// Model output for an aligned row: a probability for logistic objectives.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let margin = self.margin(row);
        match self.objective {
            Objective::Logistic => sigmoid(margin),
            Objective::RawMargin => margin,
        }
    }
}

/// One past the highest feature index any split reads.
fn features_used(trees: &[Tree]) -> usize {
    trees
        .iter()
        .flat_map(|tree| tree.nodes.iter())
        .filter(|node| !node.is_leaf())
        .map(|node| node.feature + 1)
        .max()
        .unwrap_or(0)
}

pub(crate) fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

fn logit(probability: f64) -> f64 {
    let clamped = probability.clamp(1e-15, 1.0 - 1e-15);
    (clamped / (1.0 - clamped)).ln()
}

/// XGBoost writes scalar params as strings, newer releases wrap them in brackets.
fn parse_param(raw: &str) -> Option<f64> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

#[derive(Debug, Deserialize)]
struct ModelDocument {
    learner: LearnerDocument,
}

#[derive(Debug, Deserialize)]
struct LearnerDocument {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: BoosterDocument,
    learner_model_param: LearnerParams,
    #[serde(default)]
    objective: Option<ObjectiveDocument>,
}

#[derive(Debug, Deserialize)]
struct LearnerParams {
    #[serde(default = "default_base_score")]
    base_score: String,
    #[serde(default)]
    num_feature: Option<String>,
}

fn default_base_score() -> String {
    "0.5".to_string()
}

#[derive(Debug, Deserialize)]
struct ObjectiveDocument {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BoosterDocument {
    #[serde(default)]
    name: Option<String>,
    model: BoosterModel,
}

#[derive(Debug, Deserialize)]
struct BoosterModel {
    trees: Vec<TreeDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DefaultLeft {
    Flag(bool),
    Int(i64),
}

impl DefaultLeft {
    fn is_left(&self) -> bool {
        match self {
            DefaultLeft::Flag(flag) => *flag,
            DefaultLeft::Int(value) => *value != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TreeDocument {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f64>,
    default_left: Vec<DefaultLeft>,
    #[serde(default)]
    sum_hessian: Vec<f64>,
    #[serde(default)]
    loss_changes: Vec<f64>,
}

impl TreeDocument {
    fn into_tree(self, tree: usize) -> Result<Tree, ArtifactError> {
        let count = self.left_children.len();
        let inconsistent = |what: &str| {
            ArtifactError::Model(format!("tree {tree}: {what}"))
        };

        if count == 0 {
            return Err(inconsistent("has no nodes"));
        }
        if self.right_children.len() != count
            || self.split_indices.len() != count
            || self.split_conditions.len() != count
            || self.default_left.len() != count
        {
            return Err(inconsistent("node arrays differ in length"));
        }
        if (!self.sum_hessian.is_empty() && self.sum_hessian.len() != count)
            || (!self.loss_changes.is_empty() && self.loss_changes.len() != count)
        {
            return Err(inconsistent("statistics arrays differ in length"));
        }

        let child = |index: usize, raw: i64| -> Result<Option<usize>, ArtifactError> {
            if raw < 0 {
                return Ok(None);
            }
            let raw = raw as usize;
            // Children always follow their parent, which also rules out cycles.
            if raw <= index || raw >= count {
                return Err(inconsistent(&format!("node {index} has invalid child {raw}")));
            }
            Ok(Some(raw))
        };

        let mut nodes = Vec::with_capacity(count);
        for index in 0..count {
            let left = child(index, self.left_children[index])?;
            let right = child(index, self.right_children[index])?;
            if left.is_some() != right.is_some() {
                return Err(inconsistent(&format!("node {index} has a single child")));
            }
            let feature = usize::try_from(self.split_indices[index])
                .map_err(|_| inconsistent(&format!("node {index} has a negative split index")))?;

            nodes.push(Node {
                left,
                right,
                feature,
                value: self.split_conditions[index],
                default_left: self.default_left[index].is_left(),
                cover: self.sum_hessian.get(index).copied().unwrap_or(0.0),
                gain: self.loss_changes.get(index).copied().unwrap_or(0.0),
            });
        }

        Ok(Tree { nodes })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::features::FeatureValue;
    use serde_json::json;

    fn xgboost_document() -> serde_json::Value {
        json!({
            "learner": {
                "feature_names": ["WAGE_RATE_OF_PAY_FROM", "FULL_TIME_POSITION"],
                "learner_model_param": {"base_score": "[5E-1]", "num_class": "0", "num_feature": "2"},
                "objective": {"name": "binary:logistic", "reg_loss_param": {"scale_pos_weight": "1"}},
                "gradient_booster": {
                    "name": "gbtree",
                    "model": {
                        "gbtree_model_param": {"num_trees": "2"},
                        "trees": [
                            {
                                "left_children": [1, -1, -1],
                                "right_children": [2, -1, -1],
                                "split_indices": [0, 0, 0],
                                "split_conditions": [80000.0, -0.4, 0.6],
                                "default_left": [true, false, false],
                                "sum_hessian": [10.0, 4.0, 6.0],
                                "loss_changes": [3.0, 0.0, 0.0]
                            },
                            {
                                "left_children": [1, -1, -1],
                                "right_children": [2, -1, -1],
                                "split_indices": [1, 0, 0],
                                "split_conditions": [0.5, -0.2, 0.3],
                                "default_left": [0, 0, 0],
                                "sum_hessian": [10.0, 2.0, 8.0],
                                "loss_changes": [1.0, 0.0, 0.0]
                            }
                        ]
                    }
                }
            }
        })
    }

    fn vector(columns: &[&str], values: &[f64]) -> FeatureVector {
        FeatureVector::new(
            columns.iter().map(|column| column.to_string()).collect(),
            values.iter().copied().map(FeatureValue::Number).collect(),
        )
    }

    #[test]
    fn decodes_native_json_and_scores() {
        let model = TreeEnsemble::from_xgboost_json(xgboost_document()).expect("model decodes");
        assert_eq!(model.tree_count(), 2);
        assert_eq!(model.num_features(), 2);
        assert_eq!(model.objective(), Objective::Logistic);
        assert!(model.base_margin().abs() < 1e-12);

        let row = model
            .align(&vector(&["WAGE_RATE_OF_PAY_FROM", "FULL_TIME_POSITION"], &[95000.0, 1.0]))
            .expect("aligned");
        let expected = sigmoid(0.6 + 0.3);
        assert!((model.predict(&row) - expected).abs() < 1e-12);

        let row = [50000.0, 0.0];
        assert!((model.predict(&row) - sigmoid(-0.6)).abs() < 1e-12);
    }

    #[test]
    fn missing_values_follow_default_direction() {
        let model = TreeEnsemble::from_xgboost_json(xgboost_document()).expect("model decodes");
        let margin = model.margin(&[f64::NAN, f64::NAN]);
        assert!((margin - (-0.4 + 0.3)).abs() < 1e-12);
    }

    #[test]
    fn align_rejects_mismatched_columns() {
        let model = TreeEnsemble::from_xgboost_json(xgboost_document()).expect("model decodes");
        let error = model
            .align(&vector(&["FULL_TIME_POSITION", "WAGE_RATE_OF_PAY_FROM"], &[1.0, 95000.0]))
            .expect_err("order matters");
        assert!(matches!(error, InferenceError::FeatureMismatch { .. }));
    }

    #[test]
    fn align_rejects_narrow_vectors_without_names() {
        let model = fixtures::stump(Vec::new());
        let error = model.align(&vector(&[], &[])).expect_err("too narrow");
        assert!(matches!(error, InferenceError::TooNarrow { expected: 1, found: 0 }));
    }

    #[test]
    fn rejects_inconsistent_trees() {
        let mut document = xgboost_document();
        document["learner"]["gradient_booster"]["model"]["trees"][0]["left_children"] =
            json!([0, -1, -1]);
        let error = TreeEnsemble::from_xgboost_json(document).expect_err("cycle rejected");
        assert!(matches!(error, ArtifactError::Model(message) if message.contains("invalid child")));
    }

    #[test]
    fn rejects_other_boosters() {
        let mut document = xgboost_document();
        document["learner"]["gradient_booster"]["name"] = json!("gblinear");
        assert!(TreeEnsemble::from_xgboost_json(document).is_err());
    }
}
