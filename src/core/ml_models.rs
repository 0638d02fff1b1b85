// Learned phase models and the on-disk model cache
// A model is an opaque capability: the engine only needs predict / predict_proba

use crate::models::exercise::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Pretrained probabilistic classifier over a fixed label set
pub trait PhaseModel: Send + Sync {
    /// Most probable class label
    fn predict(&self, features: &[f32]) -> EngineResult<String>;

    /// Probability per class, aligned with `classes()`
    fn predict_proba(&self, features: &[f32]) -> EngineResult<Vec<f32>>;

    /// Class labels in probability order
    fn classes(&self) -> &[String];

    /// Number of features the model was trained on
    fn input_arity(&self) -> usize;
}

// ==============================================================================
// Softmax (multinomial logistic) model
// ==============================================================================

/// Linear classifier with a softmax output layer.
///
/// `weights[k]` holds the coefficients of class `k`; every row has
/// `input_arity()` entries. Deserialization goes through the same checks as
/// `new`, so a model that exists is always well formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SoftmaxArtifact", into = "SoftmaxArtifact")]
pub struct SoftmaxModel {
    classes: Vec<String>,
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

/// On-disk layout of a softmax model, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SoftmaxArtifact {
    classes: Vec<String>,
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

impl TryFrom<SoftmaxArtifact> for SoftmaxModel {
    type Error = EngineError;

    fn try_from(artifact: SoftmaxArtifact) -> Result<Self, Self::Error> {
        SoftmaxModel::new(artifact.classes, artifact.weights, artifact.bias)
    }
}

impl From<SoftmaxModel> for SoftmaxArtifact {
    fn from(model: SoftmaxModel) -> Self {
        Self {
            classes: model.classes,
            weights: model.weights,
            bias: model.bias,
        }
    }
}

impl SoftmaxModel {
    pub fn new(classes: Vec<String>, weights: Vec<Vec<f32>>, bias: Vec<f32>) -> EngineResult<Self> {
        let model = Self {
            classes,
            weights,
            bias,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn validate(&self) -> EngineResult<()> {
        if self.classes.len() < 2 {
            return Err(EngineError::ModelLoadFailed(format!(
                "Model needs at least 2 classes, has {}",
                self.classes.len()
            )));
        }

        if self.weights.len() != self.classes.len() || self.bias.len() != self.classes.len() {
            return Err(EngineError::ModelLoadFailed(format!(
                "Model has {} classes but {} weight rows and {} biases",
                self.classes.len(),
                self.weights.len(),
                self.bias.len()
            )));
        }

        let arity = self.input_arity();
        if arity == 0 || self.weights.iter().any(|row| row.len() != arity) {
            return Err(EngineError::ModelLoadFailed(
                "Weight rows must be non-empty and equally sized".to_string(),
            ));
        }

        Ok(())
    }

    fn check_arity(&self, features: &[f32]) -> EngineResult<()> {
        if features.len() != self.input_arity() {
            return Err(EngineError::FeatureShape {
                expected: self.input_arity(),
                actual: features.len(),
            });
        }
        Ok(())
    }
}

impl PhaseModel for SoftmaxModel {
    fn predict(&self, features: &[f32]) -> EngineResult<String> {
        let probabilities = self.predict_proba(features)?;
        let best = probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);
        self.classes.get(best).cloned().ok_or_else(|| {
            EngineError::ModelLoadFailed(format!("No class for output {}", best))
        })
    }

    fn predict_proba(&self, features: &[f32]) -> EngineResult<Vec<f32>> {
        self.check_arity(features)?;

        let logits: Vec<f32> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(features).map(|(w, x)| w * x).sum::<f32>() + b)
            .collect();

        // Shift by the max logit to keep exp() finite
        let max_logit = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|l| (l - max_logit).exp()).collect();
        let total: f32 = exps.iter().sum();

        Ok(exps.into_iter().map(|e| e / total).collect())
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn input_arity(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }
}

// ==============================================================================
// Model Manager
// ==============================================================================

/// Model manager for caching and loading phase models
pub struct ModelManager {
    cache_dir: PathBuf,
}

impl ModelManager {
    /// Create a new model manager with cache directory
    pub fn new(cache_dir: PathBuf) -> EngineResult<Self> {
        fs::create_dir_all(&cache_dir).map_err(|e| {
            EngineError::ModelLoadFailed(format!(
                "Cannot create model directory {:?}: {}",
                cache_dir, e
            ))
        })?;
        Ok(Self { cache_dir })
    }

    /// Get the cache directory path
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get the local path for a model
    pub fn get_model_path(&self, model_name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", model_name))
    }

    /// Check if a model is cached
    pub fn is_cached(&self, model_name: &str) -> bool {
        self.get_model_path(model_name).exists()
    }

    /// Copy a model file into the cache, validating it first
    pub fn install(&self, model_name: &str, source: &Path) -> EngineResult<PathBuf> {
        let contents = fs::read_to_string(source).map_err(|e| {
            EngineError::ModelLoadFailed(format!("Cannot read {:?}: {}", source, e))
        })?;
        SoftmaxModel::from_json(&contents)?;

        let model_path = self.get_model_path(model_name);
        fs::write(&model_path, contents).map_err(|e| {
            EngineError::ModelLoadFailed(format!("Cannot write {:?}: {}", model_path, e))
        })?;

        tracing::info!("Installed model {} at {:?}", model_name, model_path);
        Ok(model_path)
    }

    /// Load a cached model
    pub fn load(&self, model_name: &str) -> EngineResult<Arc<dyn PhaseModel>> {
        let model_path = self.get_model_path(model_name);
        if !model_path.exists() {
            return Err(EngineError::ModelLoadFailed(format!(
                "Model {} not found at {:?}",
                model_name, model_path
            )));
        }

        let contents = fs::read_to_string(&model_path).map_err(|e| {
            EngineError::ModelLoadFailed(format!("Cannot read {:?}: {}", model_path, e))
        })?;
        let model = SoftmaxModel::from_json(&contents)?;

        tracing::debug!(
            "Loaded model {} ({} classes, {} inputs)",
            model_name,
            model.classes().len(),
            model.input_arity()
        );
        Ok(Arc::new(model))
    }

    /// Clear the model cache
    pub fn clear_cache(&self) -> EngineResult<()> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir)
                .and_then(|_| fs::create_dir_all(&self.cache_dir))
                .map_err(|e| EngineError::ModelLoadFailed(e.to_string()))?;
        }
        Ok(())
    }

    /// Get cache size in bytes
    pub fn get_cache_size(&self) -> EngineResult<u64> {
        let mut total_size = 0u64;

        if self.cache_dir.exists() {
            let entries = fs::read_dir(&self.cache_dir)
                .map_err(|e| EngineError::ModelLoadFailed(e.to_string()))?;
            for entry in entries {
                let metadata = entry
                    .and_then(|e| e.metadata())
                    .map_err(|e| EngineError::ModelLoadFailed(e.to_string()))?;
                if metadata.is_file() {
                    total_size += metadata.len();
                }
            }
        }

        Ok(total_size)
    }
}
