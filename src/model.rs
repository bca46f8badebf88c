use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

use crate::{
    config::ServerConfig,
    encoder::{encode, FeatureVector, RawInput},
    error::{InferenceError, PredictError},
    schema::Schema,
    types::PredictionOut,
};

/// Opaque severity classifier: one feature row in, one numeric class out.
pub trait Classifier: Send + Sync {
    /// Input width the classifier was fitted on, when the artifact records it.
    fn n_features(&self) -> Option<usize>;

    fn predict(&self, features: &[f32]) -> Result<i64, InferenceError>;

    /// Class labels the classifier can emit; empty when unknown.
    fn classes(&self) -> Vec<i64> {
        Vec::new()
    }

    fn backend(&self) -> &'static str;
}

// ---------- Tree ensemble (scikit-learn tree_ arrays dumped to JSON) ----------

#[derive(Deserialize)]
struct ForestJson {
    classes: Vec<i64>,
    n_features: usize,
    trees: Vec<TreeJson>,
}

#[derive(Deserialize)]
struct TreeJson {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    /// Per-node class weights, `[n_nodes][n_classes]`.
    value: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        proba: Vec<f64>,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_json(t: TreeJson, n_features: usize, n_classes: usize) -> Result<Self> {
        let n = t.children_left.len();
        if n == 0 {
            bail!("tree has no nodes");
        }
        if t.children_right.len() != n
            || t.feature.len() != n
            || t.threshold.len() != n
            || t.value.len() != n
        {
            bail!("tree arrays have mismatched lengths");
        }

        let child = |c: i64| -> Result<usize> {
            usize::try_from(c)
                .ok()
                .filter(|c| *c < n)
                .with_context(|| format!("child index {} out of range (nodes={})", c, n))
        };

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (l, r) = (t.children_left[i], t.children_right[i]);
            let node = if l == -1 {
                if r != -1 {
                    bail!("node {} has a right child but no left child", i);
                }
                let row = &t.value[i];
                if row.len() != n_classes {
                    bail!("node {} has {} class weights, expected {}", i, row.len(), n_classes);
                }
                let total: f64 = row.iter().sum();
                if total.is_nan() || total <= 0.0 {
                    bail!("leaf {} has no positive class weight", i);
                }
                Node::Leaf {
                    proba: row.iter().map(|w| w / total).collect(),
                }
            } else {
                let feature = usize::try_from(t.feature[i])
                    .ok()
                    .filter(|f| *f < n_features)
                    .with_context(|| format!("node {} splits on invalid feature {}", i, t.feature[i]))?;
                Node::Split {
                    feature,
                    threshold: t.threshold[i],
                    left: child(l)?,
                    right: child(r)?,
                }
            };
            nodes.push(node);
        }
        Ok(Self { nodes })
    }

    fn leaf(&self, x: &[f32]) -> Result<&[f64], InferenceError> {
        let mut i = 0;
        // a well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..self.nodes.len() {
            match &self.nodes[i] {
                Node::Leaf { proba } => return Ok(proba),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if f64::from(x[*feature]) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
        Err(InferenceError::Classifier("tree traversal did not reach a leaf".into()))
    }
}

/// Decision tree / random forest classifier evaluated in pure Rust.
///
/// Prediction averages each tree's normalized leaf distribution and returns
/// the class with the highest mean probability (first one on ties).
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    classes: Vec<i64>,
    n_features: usize,
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn load(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .with_context(|| format!("failed to read model at {}", path.display()))?;
        Self::from_json(&txt).with_context(|| format!("invalid tree model in {}", path.display()))
    }

    pub fn from_json(txt: &str) -> Result<Self> {
        let raw: ForestJson = serde_json::from_str(txt).context("failed to parse model JSON")?;
        if raw.classes.is_empty() {
            bail!("model declares no classes");
        }
        if raw.trees.is_empty() {
            bail!("model has no trees");
        }
        let n_classes = raw.classes.len();
        let trees = raw
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                Tree::from_json(t, raw.n_features, n_classes).with_context(|| format!("tree {}", i))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            classes: raw.classes,
            n_features: raw.n_features,
            trees,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for TreeEnsemble {
    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn predict(&self, x: &[f32]) -> Result<i64, InferenceError> {
        if x.len() != self.n_features {
            return Err(InferenceError::DimensionMismatch {
                got: x.len(),
                expected: self.n_features,
            });
        }
        let mut mean = vec![0.0f64; self.classes.len()];
        for tree in &self.trees {
            for (acc, p) in mean.iter_mut().zip(tree.leaf(x)?) {
                *acc += p;
            }
        }
        let mut best = 0;
        for (i, p) in mean.iter().enumerate() {
            if *p > mean[best] {
                best = i;
            }
        }
        Ok(self.classes[best])
    }

    fn classes(&self) -> Vec<i64> {
        self.classes.clone()
    }

    fn backend(&self) -> &'static str {
        "tree-ensemble"
    }
}

// ---------- Inference adapter ----------

/// Run the classifier on an encoded row and decode the class label.
///
/// The row is passed exactly as the encoder laid it out, which is schema order.
pub fn infer(
    vector: &FeatureVector<'_>,
    schema: &Schema,
    classifier: &dyn Classifier,
) -> Result<PredictionOut, InferenceError> {
    if schema.is_empty() {
        return Err(InferenceError::EmptySchema);
    }
    if vector.len() != schema.len() {
        return Err(InferenceError::DimensionMismatch {
            got: vector.len(),
            expected: schema.len(),
        });
    }
    let class = classifier.predict(vector.as_slice())?;
    Ok(PredictionOut::from_class(class))
}

// ---------- Process-wide model state ----------

pub struct LoadedModel {
    pub classifier: Box<dyn Classifier>,
    pub schema: Schema,
}

/// Classifier + schema, loaded once at startup and read-only afterwards.
///
/// A failed load leaves the state `Unavailable`; the server keeps running
/// and `/predict` answers with a model-unavailable error.
pub enum ModelState {
    Ready(LoadedModel),
    Unavailable { reason: String },
}

impl ModelState {
    pub fn ready(classifier: Box<dyn Classifier>, schema: Schema) -> Result<Self> {
        if let Some(n) = classifier.n_features() {
            if n != schema.len() {
                bail!(
                    "classifier expects {} features but schema has {} columns",
                    n,
                    schema.len()
                );
            }
        }
        Ok(ModelState::Ready(LoadedModel { classifier, schema }))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        ModelState::Unavailable {
            reason: reason.into(),
        }
    }

    /// Load both artifacts; never fails, degrades instead.
    pub fn load(cfg: &ServerConfig) -> Self {
        match Self::try_load(&cfg.model_path, &cfg.schema_path) {
            Ok(state) => {
                if let ModelState::Ready(m) = &state {
                    tracing::info!(
                        backend = m.classifier.backend(),
                        n_features = m.schema.len(),
                        classes = ?m.classifier.classes(),
                        "model and columns loaded"
                    );
                }
                state
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                tracing::error!(error = %reason, "failed to load model or columns");
                tracing::warn!("server is running, but /predict will fail");
                Self::unavailable(reason)
            }
        }
    }

    pub fn try_load(model_path: &Path, schema_path: &Path) -> Result<Self> {
        let schema = Schema::load(schema_path)?;
        let classifier = load_classifier(model_path, schema.len())?;
        Self::ready(classifier, schema)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ModelState::Ready(_))
    }

    pub fn n_features(&self) -> usize {
        match self {
            ModelState::Ready(m) => m.schema.len(),
            ModelState::Unavailable { .. } => 0,
        }
    }

    /// encode → infer → decode for one request.
    pub fn predict(&self, raw: &RawInput, log_predictions: bool) -> Result<PredictionOut, PredictError> {
        let m = match self {
            ModelState::Ready(m) => m,
            ModelState::Unavailable { .. } => return Err(PredictError::ModelUnavailable),
        };
        let vector = encode(raw, &m.schema)?;
        let out = infer(&vector, &m.schema, m.classifier.as_ref())?;

        if log_predictions {
            let hot: Vec<&str> = vector
                .iter()
                .filter(|(c, v)| *v == 1.0 && is_one_hot_column(c))
                .map(|(c, _)| c)
                .collect();
            tracing::info!(
                in_dim = vector.len(),
                nonzero = vector.nonzero(),
                hot = ?hot,
                defaulted = ?vector.defaulted(),
                prediction = out.prediction,
                label = %out.prediction_label,
                "prediction"
            );
        }
        Ok(out)
    }
}

fn is_one_hot_column(c: &str) -> bool {
    ["DoW_", "Weather_", "RT_", "LC_", "JD_", "vg_", "CH_"]
        .iter()
        .any(|p| c.starts_with(p))
        || c == "High_Wind"
}

/// Pick a backend by file extension: `.pt` is TorchScript, anything else the JSON tree dump.
///
/// `in_dim` is the schema width; only TorchScript needs it, tree dumps record their own.
pub fn load_classifier(path: &Path, in_dim: usize) -> Result<Box<dyn Classifier>> {
    let is_torchscript = path.extension().and_then(|e| e.to_str()) == Some("pt");
    if is_torchscript {
        #[cfg(feature = "torch")]
        {
            return Ok(Box::new(crate::torch::TorchClassifier::load(path, in_dim)?));
        }
        #[cfg(not(feature = "torch"))]
        {
            let _ = in_dim;
            bail!(
                "{} is a TorchScript model but this build lacks the `torch` feature",
                path.display()
            );
        }
    }
    let forest = TreeEnsemble::load(path)?;
    tracing::debug!(trees = forest.n_trees(), "tree ensemble parsed");
    Ok(Box::new(forest))
}
