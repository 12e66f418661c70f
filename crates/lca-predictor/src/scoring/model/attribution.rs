//! Per-feature attribution for a single prediction.
//!
//! The primary path is path-dependent TreeSHAP (Lundberg et al., Algorithm 2)
//! using node covers as the background distribution. When that cannot run the
//! engine falls back to split-gain importance, and to an all-zero map when no
//! model is loaded at all.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use super::ensemble::{Tree, TreeEnsemble};
use super::InferenceError;
use crate::scoring::features::FeatureVector;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AttributionError {
    #[error("no model loaded")]
    MissingModel,
    #[error(transparent)]
    Input(#[from] InferenceError),
    #[error("tree {tree} node {node} has zero cover")]
    ZeroCover { tree: usize, node: usize },
}

/// Where an attribution map came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionSource {
    TreeShap,
    GainImportance,
    Zero,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub feature: String,
    pub weight: f64,
}

/// Feature contributions sorted by descending weight, ties in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AttributionMap {
    entries: Vec<Contribution>,
}

impl AttributionMap {
    pub fn from_weights<I>(weights: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut entries: Vec<Contribution> = weights
            .into_iter()
            .map(|(feature, weight)| Contribution {
                feature,
                weight: if weight.is_finite() { weight.abs() } else { 0.0 },
            })
            .collect();
        entries.sort_by(|left, right| right.weight.total_cmp(&left.weight));
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contribution> {
        self.entries.iter()
    }

    pub fn get(&self, feature: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| entry.feature == feature)
            .map(|entry| entry.weight)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    pub source: AttributionSource,
    pub contributions: AttributionMap,
}

/// Explains predictions of the shared ensemble. Never fails.
#[derive(Debug, Clone, Default)]
pub struct AttributionEngine {
    model: Option<Arc<TreeEnsemble>>,
}

impl AttributionEngine {
    pub fn new(model: Option<Arc<TreeEnsemble>>) -> Self {
        Self { model }
    }

    pub fn explain(&self, vector: &FeatureVector) -> Attribution {
        match self.tree_shap(vector) {
            Ok(contributions) => Attribution {
                source: AttributionSource::TreeShap,
                contributions,
            },
            Err(err) => {
                warn!(error = %err, "tree attribution unavailable; using fallback");
                self.fallback(vector)
            }
        }
    }

    /// Signed TreeSHAP values, one per vector column.
    pub fn shap_values(&self, vector: &FeatureVector) -> Result<Vec<f64>, AttributionError> {
        let model = self.model.as_deref().ok_or(AttributionError::MissingModel)?;
        let row = model.align(vector)?;
        let mut phi = vec![0.0; row.len()];

        for (index, tree) in model.trees.iter().enumerate() {
            check_cover(tree, index)?;
            let mut walker = ShapWalker {
                tree,
                row: &row,
                phi: &mut phi,
            };
            walker.recurse(0, Vec::new(), 1.0, 1.0, None);
        }

        Ok(phi)
    }

    fn tree_shap(&self, vector: &FeatureVector) -> Result<AttributionMap, AttributionError> {
        let phi = self.shap_values(vector)?;
        Ok(AttributionMap::from_weights(
            vector.columns().iter().cloned().zip(phi),
        ))
    }

    fn fallback(&self, vector: &FeatureVector) -> Attribution {
        match self.model.as_deref() {
            Some(model) => Attribution {
                source: AttributionSource::GainImportance,
                contributions: gain_importance(model, vector),
            },
            None => Attribution {
                source: AttributionSource::Zero,
                contributions: AttributionMap::from_weights(
                    vector.columns().iter().map(|column| (column.clone(), 0.0)),
                ),
            },
        }
    }
}

fn check_cover(tree: &Tree, index: usize) -> Result<(), AttributionError> {
    match tree
        .nodes
        .iter()
        .position(|node| !(node.cover > 0.0 && node.cover.is_finite()))
    {
        Some(node) => Err(AttributionError::ZeroCover { tree: index, node }),
        None => Ok(()),
    }
}

/// Average split gain per feature, limited to features the model splits on.
fn gain_importance(model: &TreeEnsemble, vector: &FeatureVector) -> AttributionMap {
    let names: &[String] = if model.feature_names().is_empty() {
        vector.columns()
    } else {
        model.feature_names()
    };

    let mut totals = vec![(0.0f64, 0usize); model.num_features().max(names.len())];
    for node in model
        .trees
        .iter()
        .flat_map(|tree| tree.nodes.iter())
        .filter(|node| !node.is_leaf())
    {
        if let Some(slot) = totals.get_mut(node.feature) {
            slot.0 += node.gain;
            slot.1 += 1;
        }
    }

    AttributionMap::from_weights(totals.into_iter().enumerate().filter_map(
        |(index, (gain, splits))| {
            let name = names.get(index)?;
            (splits > 0).then(|| (name.clone(), gain / splits as f64))
        },
    ))
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

struct ShapWalker<'a> {
    tree: &'a Tree,
    row: &'a [f64],
    phi: &'a mut [f64],
}

impl ShapWalker<'_> {
    fn recurse(
        &mut self,
        index: usize,
        mut path: Vec<PathElement>,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        extend(&mut path, zero_fraction, one_fraction, feature);
        let tree = self.tree;
        let node = &tree.nodes[index];

        let (Some(left), Some(right)) = (node.left, node.right) else {
            for position in 1..path.len() {
                let element = path[position];
                let Some(feature) = element.feature else {
                    continue;
                };
                if let Some(slot) = self.phi.get_mut(feature) {
                    *slot += unwound_sum(&path, position)
                        * (element.one_fraction - element.zero_fraction)
                        * node.value;
                }
            }
            return;
        };

        let x = self.row.get(node.feature).copied().unwrap_or(f64::NAN);
        let hot = node.next(x).unwrap_or(left);
        let cold = if hot == left { right } else { left };
        let hot_zero = tree.nodes[hot].cover / node.cover;
        let cold_zero = tree.nodes[cold].cover / node.cover;

        let mut incoming_zero = 1.0;
        let mut incoming_one = 1.0;
        if let Some(previous) = path
            .iter()
            .position(|element| element.feature == Some(node.feature))
        {
            incoming_zero = path[previous].zero_fraction;
            incoming_one = path[previous].one_fraction;
            unwind(&mut path, previous);
        }

        self.recurse(
            hot,
            path.clone(),
            hot_zero * incoming_zero,
            incoming_one,
            Some(node.feature),
        );
        self.recurse(cold, path, cold_zero * incoming_zero, 0.0, Some(node.feature));
    }
}

fn extend(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let scale = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / scale;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / scale;
    }
}

fn unwind(path: &mut Vec<PathElement>, position: usize) {
    let depth = path.len() - 1;
    let PathElement {
        zero_fraction,
        one_fraction,
        ..
    } = path[position];
    let scale = (depth + 1) as f64;
    let mut next_one = path[depth].weight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let previous = path[i].weight;
            path[i].weight = next_one * scale / ((i + 1) as f64 * one_fraction);
            next_one = previous - path[i].weight * zero_fraction * (depth - i) as f64 / scale;
        } else {
            path[i].weight = path[i].weight * scale / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in position..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of the path with `position` removed.
fn unwound_sum(path: &[PathElement], position: usize) -> f64 {
    let depth = path.len() - 1;
    let PathElement {
        zero_fraction,
        one_fraction,
        ..
    } = path[position];
    let scale = (depth + 1) as f64;
    let mut next_one = path[depth].weight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let share = next_one * scale / ((i + 1) as f64 * one_fraction);
            total += share;
            next_one = path[i].weight - share * zero_fraction * (depth - i) as f64 / scale;
        } else if zero_fraction != 0.0 {
            total += path[i].weight / zero_fraction / ((depth - i) as f64 / scale);
        }
    }

    total
}
