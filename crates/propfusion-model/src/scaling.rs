//! Learned per-column affine rescaling of the encoded tabular vector.
//!
//! The parameters come from the scaler fitted at training time, exported as
//! JSON:
//!
//! ```json
//! { "kind": "standard", "columns": ["Kamar Tidur", ...], "mean": [...], "scale": [...] }
//! { "kind": "min_max",  "columns": ["Kamar Tidur", ...], "min":  [...], "scale": [...] }
//! ```
//!
//! `standard` computes `(x - mean) / scale`; `min_max` computes `x * scale + min`.
//! The artifact must list the 17 columns in training order. Arithmetic is done
//! in `f64`.

use std::path::Path;

use propfusion_core::{feature_names, PropFusionError, Result, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

/// Per-column affine parameters, validated on load and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalingParameters {
    /// Standardisation: `(x - mean) / scale`.
    Standard {
        columns: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    },
    /// Range scaling: `x * scale + min`.
    MinMax {
        columns: Vec<String>,
        min: Vec<f64>,
        scale: Vec<f64>,
    },
}

impl ScalingParameters {
    /// Standardisation parameters over the training column order.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::Config`] if the arrays are malformed.
    pub fn standard(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        let params = Self::Standard {
            columns: training_columns(),
            mean,
            scale,
        };
        params.validate()?;
        Ok(params)
    }

    /// Parameters that leave every column unchanged.
    #[must_use]
    pub fn identity() -> Self {
        Self::Standard {
            columns: training_columns(),
            mean: vec![0.0; FEATURE_COUNT],
            scale: vec![1.0; FEATURE_COUNT],
        }
    }

    /// Load and validate a JSON scaling artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PropFusionError::Config(format!(
                "Failed to read scaling artifact {}: {e}",
                path.display()
            ))
        })?;
        let params = Self::from_json(&contents)?;
        tracing::info!(path = %path.display(), kind = params.kind(), "Scaling parameters loaded");
        Ok(params)
    }

    /// Parse and validate a JSON scaling artifact.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::Serialization`] for invalid JSON and
    /// [`PropFusionError::Config`] for structurally invalid parameters.
    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Check column order, array lengths, and value finiteness.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let (columns, offsets, scale) = self.parts();
        let expected = feature_names();
        if columns.len() != FEATURE_COUNT
            || columns.iter().zip(expected.iter()).any(|(a, b)| a != b)
        {
            return Err(PropFusionError::Config(format!(
                "scaling artifact columns {columns:?} do not match the training order {expected:?}"
            )));
        }
        for (name, values) in [("offset", offsets), ("scale", scale)] {
            if values.len() != FEATURE_COUNT {
                return Err(PropFusionError::Config(format!(
                    "scaling artifact {name} has {} values, expected {FEATURE_COUNT}",
                    values.len()
                )));
            }
            if let Some(i) = values.iter().position(|v| !v.is_finite()) {
                return Err(PropFusionError::Config(format!(
                    "scaling artifact {name} for column '{}' is not finite",
                    expected[i]
                )));
            }
        }
        if let Self::Standard { scale, .. } = self {
            if let Some(i) = scale.iter().position(|v| *v == 0.0) {
                return Err(PropFusionError::Config(format!(
                    "scaling artifact scale for column '{}' is zero",
                    expected[i]
                )));
            }
        }
        Ok(())
    }

    /// Apply the transform column-wise in training order.
    #[must_use]
    pub fn transform(&self, encoded: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        match self {
            Self::Standard { mean, scale, .. } => {
                std::array::from_fn(|i| (encoded[i] - mean[i]) / scale[i])
            }
            Self::MinMax { min, scale, .. } => {
                std::array::from_fn(|i| encoded[i] * scale[i] + min[i])
            }
        }
    }

    /// Short name of the scaler variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Standard { .. } => "standard",
            Self::MinMax { .. } => "min_max",
        }
    }

    fn parts(&self) -> (&[String], &[f64], &[f64]) {
        match self {
            Self::Standard {
                columns,
                mean,
                scale,
            } => (columns.as_slice(), mean.as_slice(), scale.as_slice()),
            Self::MinMax {
                columns,
                min,
                scale,
            } => (columns.as_slice(), min.as_slice(), scale.as_slice()),
        }
    }
}

fn training_columns() -> Vec<String> {
    feature_names().iter().map(|s| (*s).to_string()).collect()
}
