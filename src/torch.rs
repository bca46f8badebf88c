use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use std::path::Path;
use tch::{kind::Kind, CModule, Device, Tensor};

use crate::{error::InferenceError, model::Classifier};

/// TorchScript severity model. Output is `[1, C]` class scores for labels 1..=C.
pub struct TorchClassifier {
    // forward calls are serialized; one inference is sub-millisecond
    model: Mutex<CModule>,
    device: Device,
    in_dim: usize,
    n_classes: i64,
}

impl TorchClassifier {
    /// `in_dim` comes from the schema; the module is probed at that width.
    pub fn load(model_path: &Path, in_dim: usize) -> Result<Self> {
        let device = Device::Cpu;
        let model = CModule::load_on_device(model_path, device)
            .with_context(|| format!("failed to load TorchScript {}", model_path.display()))?;

        // Probe output shape with a dummy forward, expect [B=1, C]
        let dummy = Tensor::zeros([1, in_dim as i64], (Kind::Float, device));
        let t = model.forward_ts(&[dummy])?;
        let sz = t.size();
        if sz.len() != 2 || sz[0] != 1 || sz[1] < 1 {
            bail!("unexpected model output size: {:?}", sz);
        }

        Ok(Self {
            model: Mutex::new(model),
            device,
            in_dim,
            n_classes: sz[1],
        })
    }
}

impl Classifier for TorchClassifier {
    fn n_features(&self) -> Option<usize> {
        Some(self.in_dim)
    }

    fn predict(&self, x: &[f32]) -> Result<i64, InferenceError> {
        if x.len() != self.in_dim {
            return Err(InferenceError::DimensionMismatch {
                got: x.len(),
                expected: self.in_dim,
            });
        }
        let input = Tensor::from_slice(x)
            .reshape([1, self.in_dim as i64])
            .to_device(self.device);

        let scores = self
            .model
            .lock()
            .forward_ts(&[input])
            .map_err(|e| InferenceError::Classifier(e.to_string()))?;

        let idx = scores.argmax(-1, false).int64_value(&[0]);
        Ok(idx + 1)
    }

    fn classes(&self) -> Vec<i64> {
        (1..=self.n_classes).collect()
    }

    fn backend(&self) -> &'static str {
        "torchscript"
    }
}
