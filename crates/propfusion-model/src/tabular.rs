//! Structured-attribute preprocessing for the tabular branch.
//!
//! Turns a raw property record into the fixed 17-column numeric vector the
//! network was trained on. The steps run in a fixed order:
//!
//! 1. **Validate** that all 17 keys are present (the only fallible step).
//! 2. **Impute** missing numeric and count values with training medians/modes,
//!    and missing free-text categories with `"Unknown"`.
//! 3. **Correct** `Orientasi Bangunan` values `"1"`..`"4"` to `"Unknown"`.
//! 4. **Encode** the six categorical columns through their tables.
//! 5. **Sweep** anything still without a number: default code for categorical
//!    columns, `0` otherwise.
//! 6. **Scale** with the fitted affine parameters.

use std::collections::BTreeMap;
use std::path::Path;

use propfusion_core::{
    Feature, FeatureKind, FeatureValue, RawRecord, Result, TabularRecord, FEATURE_COUNT,
};

use crate::encoding::{CategoryEncodings, UNKNOWN_LABEL};
use crate::scaling::ScalingParameters;

/// Orientation labels the training data cleaner folded into `"Unknown"`.
const ORIENTATION_NUMERIC_LABELS: [&str; 4] = ["1", "2", "3", "4"];

// ---------------------------------------------------------------------------
// Imputation
// ---------------------------------------------------------------------------

/// Constants substituted for missing values before encoding.
#[derive(Debug, Clone)]
pub struct ImputationTable {
    /// Medians for numeric columns and modes for count columns.
    numeric: BTreeMap<Feature, f64>,
    /// Categorical columns whose missing values become [`UNKNOWN_LABEL`].
    unknown_filled: Vec<Feature>,
}

impl ImputationTable {
    /// Constants computed on the training corpus.
    #[must_use]
    pub fn training() -> Self {
        let numeric = BTreeMap::from([
            (Feature::LuasBangunan, 138.0),
            (Feature::LuasTanah, 120.0),
            (Feature::DayaListrik, 2200.0),
            (Feature::TahunDibangun, 2021.0),
            (Feature::Latitude, -7.294_603),
            (Feature::Longitude, 112.769_703),
            (Feature::KamarTidur, 3.0),
            (Feature::KamarMandi, 2.0),
            (Feature::Carpots, 1.0),
            (Feature::Garasi, 1.0),
            (Feature::JumlahLantai, 2.0),
        ]);
        Self {
            numeric,
            unknown_filled: vec![
                Feature::Interior,
                Feature::OrientasiBangunan,
                Feature::NamaPerumahan,
            ],
        }
    }

    /// Constant for a numeric or count column.
    #[must_use]
    pub fn numeric_fill(&self, feature: Feature) -> Option<f64> {
        self.numeric.get(&feature).copied()
    }

    /// Whether a missing value of `feature` becomes the `"Unknown"` label.
    #[must_use]
    pub fn fills_unknown(&self, feature: Feature) -> bool {
        self.unknown_filled.contains(&feature)
    }

    /// Replacement for a missing value of `feature`, if any.
    #[must_use]
    pub fn fill(&self, feature: Feature) -> Option<FeatureValue> {
        if let Some(v) = self.numeric_fill(feature) {
            Some(FeatureValue::Float(v))
        } else if self.fills_unknown(feature) {
            Some(FeatureValue::from(UNKNOWN_LABEL))
        } else {
            None
        }
    }
}

impl Default for ImputationTable {
    fn default() -> Self {
        Self::training()
    }
}

// ---------------------------------------------------------------------------
// TabularPreprocessor
// ---------------------------------------------------------------------------

/// Deterministic raw-record to scaled-vector transform.
///
/// Holds only read-only tables, so a single instance can be shared across
/// concurrent inference calls.
///
/// # Example
///
/// ```
/// use propfusion_model::{ScalingParameters, TabularPreprocessor};
///
/// let preprocessor = TabularPreprocessor::new(ScalingParameters::identity());
/// let record: propfusion_core::RawRecord = serde_json::from_value(serde_json::json!({
///     "Kamar Tidur": 3, "Kamar Mandi": 2, "Luas Tanah": 50.0, "Luas Bangunan": 68.0,
///     "Nama Perumahan": "Pakuwon City", "Sertifikat": "SHM", "Carpots": 1,
///     "Daya Listrik": null, "Interior": "Semi Furnished", "Jumlah Lantai": 1,
///     "Orientasi Bangunan": "Selatan", "Tahun Dibangun": 2021, "Garasi": 1,
///     "Latitude": -7.3132, "Longitude": 112.7672, "City": "Surabaya",
///     "District": "Pakuwon City"
/// })).unwrap();
/// let vector = preprocessor.process(&record).unwrap();
/// assert_eq!(vector.len(), 17);
/// assert_eq!(vector[7], 2200.0);
/// ```
#[derive(Debug, Clone)]
pub struct TabularPreprocessor {
    encodings: CategoryEncodings,
    imputation: ImputationTable,
    scaling: ScalingParameters,
}

impl TabularPreprocessor {
    /// Create a preprocessor with the training tables and the given scaler.
    #[must_use]
    pub fn new(scaling: ScalingParameters) -> Self {
        Self::with_tables(
            CategoryEncodings::training(),
            ImputationTable::training(),
            scaling,
        )
    }

    #[must_use]
    pub fn with_tables(
        encodings: CategoryEncodings,
        imputation: ImputationTable,
        scaling: ScalingParameters,
    ) -> Self {
        Self {
            encodings,
            imputation,
            scaling,
        }
    }

    /// Create a preprocessor whose scaler is loaded from a JSON artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the scaling artifact cannot be loaded.
    pub fn from_scaler_file(path: &Path) -> Result<Self> {
        Ok(Self::new(ScalingParameters::load(path)?))
    }

    /// Validate and transform one raw record.
    ///
    /// # Errors
    ///
    /// Returns [`propfusion_core::PropFusionError::MissingFeature`] if a
    /// required key is absent. No later step can fail.
    pub fn process(&self, raw: &RawRecord) -> Result<[f32; FEATURE_COUNT]> {
        let record = TabularRecord::from_raw(raw)?;
        Ok(self.transform(&record))
    }

    /// Validate every record first, then transform them in order.
    ///
    /// # Errors
    ///
    /// Returns the first [`propfusion_core::PropFusionError::MissingFeature`]
    /// found; nothing is transformed in that case.
    pub fn process_batch(&self, raws: &[RawRecord]) -> Result<Vec<[f32; FEATURE_COUNT]>> {
        let records = raws
            .iter()
            .map(TabularRecord::from_raw)
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(batch_size = records.len(), "Preprocessing tabular batch");
        Ok(records.iter().map(|r| self.transform(r)).collect())
    }

    /// Transform a validated record into the scaled network input.
    #[must_use]
    pub fn transform(&self, record: &TabularRecord) -> [f32; FEATURE_COUNT] {
        let scaled = self.scaling.transform(&self.encode(record));
        scaled.map(|v| v as f32)
    }

    /// Impute, correct, encode, and sweep; the unscaled 17-column vector.
    #[must_use]
    pub fn encode(&self, record: &TabularRecord) -> [f64; FEATURE_COUNT] {
        let imputed = self.impute(record);
        let mut encoded = [None; FEATURE_COUNT];
        for (feature, value) in imputed.iter() {
            encoded[feature.index()] = match feature.kind() {
                FeatureKind::Categorical => self.encode_category(feature, value),
                FeatureKind::Numeric | FeatureKind::Count => value.as_f64(),
            };
        }
        self.sweep(encoded)
    }

    /// Replace missing values with their imputation constants.
    #[must_use]
    pub fn impute(&self, record: &TabularRecord) -> TabularRecord {
        record
            .iter()
            .filter(|(_, value)| value.is_missing())
            .filter_map(|(feature, _)| self.imputation.fill(feature).map(|v| (feature, v)))
            .fold(record.clone(), |acc, (feature, fill)| acc.with(feature, fill))
    }

    fn encode_category(&self, feature: Feature, value: &FeatureValue) -> Option<f64> {
        let mut label = value.to_label();
        if feature == Feature::OrientasiBangunan
            && ORIENTATION_NUMERIC_LABELS.contains(&label.as_str())
        {
            label = UNKNOWN_LABEL.to_string();
        }
        self.encodings
            .encode(feature, &label)
            .map(f64::from)
    }

    /// Final fill for any column that still has no numeric value.
    fn sweep(&self, encoded: [Option<f64>; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        std::array::from_fn(|i| {
            let feature = Feature::ALL[i];
            encoded[i].unwrap_or_else(|| match self.encodings.default_code(feature) {
                Some(code) => f64::from(code),
                None => {
                    tracing::warn!(
                        feature = %feature,
                        "Non-numeric value left after imputation, filling with 0"
                    );
                    0.0
                }
            })
        })
    }
}
