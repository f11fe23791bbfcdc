//! Core types, configuration, and errors for propfusion
//!
//! This crate contains the foundational types shared by the model crate and the
//! command-line front end: the fixed 17-column tabular schema, raw and validated
//! property records, prediction results, configuration sections, and the error
//! taxonomy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Tabular schema
// ---------------------------------------------------------------------------

/// Number of structured attributes consumed by the tabular branch.
pub const FEATURE_COUNT: usize = 17;

/// How a raw column is treated before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    /// Continuous measurement imputed with a median.
    Numeric,
    /// Small integer count imputed with a mode.
    Count,
    /// String label resolved through an encoding table.
    Categorical,
}

/// One of the 17 structured property attributes.
///
/// Declaration order is the column order used at training time and by the
/// scaling artifact; [`Feature::index`] relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    KamarTidur,
    KamarMandi,
    LuasTanah,
    LuasBangunan,
    NamaPerumahan,
    Sertifikat,
    Carpots,
    DayaListrik,
    Interior,
    JumlahLantai,
    OrientasiBangunan,
    TahunDibangun,
    Garasi,
    Latitude,
    Longitude,
    City,
    District,
}

impl Feature {
    /// All features in training column order.
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Self::KamarTidur,
        Self::KamarMandi,
        Self::LuasTanah,
        Self::LuasBangunan,
        Self::NamaPerumahan,
        Self::Sertifikat,
        Self::Carpots,
        Self::DayaListrik,
        Self::Interior,
        Self::JumlahLantai,
        Self::OrientasiBangunan,
        Self::TahunDibangun,
        Self::Garasi,
        Self::Latitude,
        Self::Longitude,
        Self::City,
        Self::District,
    ];

    /// The six features resolved through encoding tables.
    pub const CATEGORICAL: [Feature; 6] = [
        Self::Sertifikat,
        Self::Interior,
        Self::OrientasiBangunan,
        Self::City,
        Self::District,
        Self::NamaPerumahan,
    ];

    /// Column name as it appears in raw records and in the scaling artifact.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::KamarTidur => "Kamar Tidur",
            Self::KamarMandi => "Kamar Mandi",
            Self::LuasTanah => "Luas Tanah",
            Self::LuasBangunan => "Luas Bangunan",
            Self::NamaPerumahan => "Nama Perumahan",
            Self::Sertifikat => "Sertifikat",
            Self::Carpots => "Carpots",
            Self::DayaListrik => "Daya Listrik",
            Self::Interior => "Interior",
            Self::JumlahLantai => "Jumlah Lantai",
            Self::OrientasiBangunan => "Orientasi Bangunan",
            Self::TahunDibangun => "Tahun Dibangun",
            Self::Garasi => "Garasi",
            Self::Latitude => "Latitude",
            Self::Longitude => "Longitude",
            Self::City => "City",
            Self::District => "District",
        }
    }

    /// Position of this feature in the 17-column vector.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn kind(self) -> FeatureKind {
        match self {
            Self::LuasTanah
            | Self::LuasBangunan
            | Self::DayaListrik
            | Self::TahunDibangun
            | Self::Latitude
            | Self::Longitude => FeatureKind::Numeric,
            Self::KamarTidur
            | Self::KamarMandi
            | Self::Carpots
            | Self::Garasi
            | Self::JumlahLantai => FeatureKind::Count,
            Self::NamaPerumahan
            | Self::Sertifikat
            | Self::Interior
            | Self::OrientasiBangunan
            | Self::City
            | Self::District => FeatureKind::Categorical,
        }
    }

    /// Look a feature up by its column name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Column names in training order.
#[must_use]
pub fn feature_names() -> [&'static str; FEATURE_COUNT] {
    Feature::ALL.map(Feature::name)
}

// ---------------------------------------------------------------------------
// Raw values and records
// ---------------------------------------------------------------------------

/// A raw attribute value as supplied by the caller.
///
/// JSON `null` deserializes to [`FeatureValue::Missing`]; integral JSON numbers
/// keep their integer form so that label conversion matches the training data
/// (`3` and `3.0` are different labels).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Missing,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FeatureValue {
    /// `true` for an explicit missing value or a NaN float.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Float(v) => v.is_nan(),
            Self::Integer(_) | Self::Text(_) => false,
        }
    }

    /// Numeric reading of the value; text is parsed after trimming.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Missing => None,
            Self::Integer(v) => Some(*v as f64),
            Self::Float(v) if v.is_nan() => None,
            Self::Float(v) => Some(*v),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|v| !v.is_nan()),
        }
    }

    /// String form used for category lookup.
    ///
    /// Floats render the way the training pipeline stringified them, so an
    /// integral float keeps its `.0` suffix.
    #[must_use]
    pub fn to_label(&self) -> String {
        match self {
            Self::Missing => "nan".to_string(),
            Self::Integer(v) => v.to_string(),
            Self::Float(v) => float_label(*v),
            Self::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FeatureValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

fn float_label(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v == f64::INFINITY {
        "inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-inf".to_string()
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

/// An unvalidated record keyed by column name, as received from a caller.
pub type RawRecord = BTreeMap<String, FeatureValue>;

/// A structurally validated record holding exactly one value per feature.
///
/// Values may still be missing; only the presence of every key is enforced.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularRecord {
    values: [FeatureValue; FEATURE_COUNT],
}

impl TabularRecord {
    /// Validate a raw record.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::MissingFeature`] naming the first absent
    /// column (in training order). Extra keys are ignored.
    pub fn from_raw(raw: &RawRecord) -> Result<Self> {
        let mut values: [FeatureValue; FEATURE_COUNT] =
            std::array::from_fn(|_| FeatureValue::Missing);
        for feature in Feature::ALL {
            let value = raw
                .get(feature.name())
                .ok_or_else(|| PropFusionError::MissingFeature {
                    feature: feature.name().to_string(),
                })?;
            values[feature.index()] = if value.is_missing() {
                FeatureValue::Missing
            } else {
                value.clone()
            };
        }
        Ok(Self { values })
    }

    /// Build a record directly from values in column order.
    #[must_use]
    pub fn from_values(values: [FeatureValue; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn get(&self, feature: Feature) -> &FeatureValue {
        &self.values[feature.index()]
    }

    /// Replace one value, returning the record for chaining.
    #[must_use]
    pub fn with(mut self, feature: Feature, value: impl Into<FeatureValue>) -> Self {
        self.values[feature.index()] = value.into();
        self
    }

    /// Iterate `(feature, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (Feature, &FeatureValue)> {
        Feature::ALL.into_iter().zip(self.values.iter())
    }
}

// ---------------------------------------------------------------------------
// Prediction results
// ---------------------------------------------------------------------------

/// Currency label attached to predictions when none is configured.
pub const DEFAULT_CURRENCY: &str = "IDR";

/// Factor from the training-time output unit to the reporting currency unit.
pub const DEFAULT_UNIT_MULTIPLIER: f64 = 1_000_000.0;

/// Price estimate for one input record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePrediction {
    /// Network output in the training-time unit.
    pub raw_output: f32,
    /// `raw_output` converted to the reporting currency unit.
    pub price: f64,
    pub currency: String,
}

impl PricePrediction {
    #[must_use]
    pub fn new(raw_output: f32, unit_multiplier: f64, currency: impl Into<String>) -> Self {
        Self {
            raw_output,
            price: f64::from(raw_output) * unit_multiplier,
            currency: currency.into(),
        }
    }
}

impl std::fmt::Display for PricePrediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = if self.currency == DEFAULT_CURRENCY {
            "Rp"
        } else {
            self.currency.as_str()
        };
        write!(f, "{symbol} {}", group_thousands(self.price))
    }
}

/// Render with two decimals and comma thousands separators.
fn group_thousands(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value.is_sign_negative() && value != 0.0 {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{frac_part}")
}

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

/// Top-level predictor configuration, loaded from YAML by the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Safetensors export of the trained fusion network.
    #[serde(default = "default_weights_path")]
    pub weights_path: PathBuf,
    /// JSON export of the fitted column scaler.
    #[serde(default = "default_scaler_path")]
    pub scaler_path: PathBuf,
    /// Input dimensions of the embedding branches.
    #[serde(default)]
    pub dimensions: ModelDimensions,
    /// Multiplier applied to every raw network output.
    #[serde(default = "default_unit_multiplier")]
    pub unit_multiplier: f64,
    /// Currency label reported with predictions.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Compute device preference.
    #[serde(default)]
    pub device: DevicePreference,
    /// Text encoder configuration.
    #[serde(default)]
    pub text_encoder: TextEncoderConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_weights_path() -> PathBuf {
    PathBuf::from("model/best_model.safetensors")
}

fn default_scaler_path() -> PathBuf {
    PathBuf::from("model/scaler.json")
}

fn default_unit_multiplier() -> f64 {
    DEFAULT_UNIT_MULTIPLIER
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            weights_path: default_weights_path(),
            scaler_path: default_scaler_path(),
            dimensions: ModelDimensions::default(),
            unit_multiplier: default_unit_multiplier(),
            currency: default_currency(),
            device: DevicePreference::default(),
            text_encoder: TextEncoderConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PredictorConfig {
    /// Check values that serde cannot constrain.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::Config`] for zero dimensions or a
    /// non-finite unit multiplier.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions.image == 0 || self.dimensions.text == 0 {
            return Err(PropFusionError::Config(format!(
                "embedding dimensions must be non-zero (image={}, text={})",
                self.dimensions.image, self.dimensions.text
            )));
        }
        if !self.unit_multiplier.is_finite() {
            return Err(PropFusionError::Config(
                "unit_multiplier must be finite".to_string(),
            ));
        }
        if self.text_encoder.max_length == 0 {
            return Err(PropFusionError::Config(
                "text_encoder.max_length must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Branch input dimensions. The tabular branch is always [`FEATURE_COUNT`] wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDimensions {
    #[serde(default = "default_embedding_dim")]
    pub image: usize,
    #[serde(default = "default_embedding_dim")]
    pub text: usize,
}

fn default_embedding_dim() -> usize {
    1024
}

impl Default for ModelDimensions {
    fn default() -> Self {
        Self {
            image: default_embedding_dim(),
            text: default_embedding_dim(),
        }
    }
}

impl ModelDimensions {
    #[must_use]
    pub fn tabular(&self) -> usize {
        FEATURE_COUNT
    }
}

/// Where tensors are allocated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Always run on the CPU.
    #[default]
    Cpu,
    /// CUDA, then Metal, then CPU, subject to compiled features.
    Auto,
}

/// Configuration for the text embedding collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextEncoderConfig {
    /// HuggingFace model ID used when `model_dir` is not set.
    #[serde(default = "default_text_model_id")]
    pub model_id: String,
    /// Cache directory for hub downloads.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Local directory holding `config.json`, `tokenizer.json` and `model.safetensors`.
    #[serde(default)]
    pub model_dir: Option<PathBuf>,
    /// Token limit applied before encoding.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Prefix prepended to normalised text.
    #[serde(default = "default_passage_prefix")]
    pub passage_prefix: String,
    /// Optional stop-word list, one word per line.
    #[serde(default)]
    pub stopwords_path: Option<PathBuf>,
    /// Optional root-word dictionary for the stemmer, one word per line.
    #[serde(default)]
    pub root_words_path: Option<PathBuf>,
}

fn default_text_model_id() -> String {
    "intfloat/multilingual-e5-large".to_string()
}

fn default_max_length() -> usize {
    512
}

fn default_passage_prefix() -> String {
    "passage: ".to_string()
}

impl Default for TextEncoderConfig {
    fn default() -> Self {
        Self {
            model_id: default_text_model_id(),
            cache_dir: None,
            model_dir: None,
            max_length: default_max_length(),
            passage_prefix: default_passage_prefix(),
            stopwords_path: None,
            root_words_path: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: `text` (human-readable) or `json` (structured).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Core error types.
#[derive(thiserror::Error, Debug)]
pub enum PropFusionError {
    /// A required tabular column is absent from the record.
    #[error("Missing required feature: {feature}")]
    MissingFeature {
        /// Name of the absent column.
        feature: String,
    },

    /// An embedding collaborator failed to produce a usable vector.
    #[error("Embedding error ({source_name}): {message}")]
    Embedding {
        /// Which collaborator failed (`image`, `text`, ...).
        source_name: String,
        /// Failure description.
        message: String,
    },

    /// Forward evaluation was requested before weights were bound.
    #[error("Fusion model is not initialized: weights must be loaded before forward evaluation")]
    UninitializedModel,

    /// Numeric backend or weight artifact failure.
    #[error("Model error: {0}")]
    Model(String),

    /// The network produced a NaN or infinite output.
    #[error("Non-finite model output for row {row}")]
    NonFiniteOutput {
        /// Batch row whose output was not finite.
        row: usize,
    },

    /// Configuration or artifact error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization / deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PropFusionError {
    /// Shorthand for an [`PropFusionError::Embedding`] error.
    pub fn embedding(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Embedding {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias for `std::result::Result<T, PropFusionError>`.
pub type Result<T> = std::result::Result<T, PropFusionError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn full_raw_record() -> RawRecord {
        let json = serde_json::json!({
            "Kamar Tidur": 3,
            "Kamar Mandi": 2,
            "Luas Tanah": 50.0,
            "Luas Bangunan": 68.0,
            "Nama Perumahan": "Pakuwon City",
            "Sertifikat": "SHM",
            "Carpots": 1,
            "Daya Listrik": null,
            "Interior": "Semi Furnished",
            "Jumlah Lantai": 1,
            "Orientasi Bangunan": "Selatan",
            "Tahun Dibangun": 2021,
            "Garasi": 1,
            "Latitude": -7.3132,
            "Longitude": 112.7672,
            "City": "Surabaya",
            "District": "Pakuwon City"
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_feature_order_matches_training_columns() {
        let names = feature_names();
        assert_eq!(names.len(), FEATURE_COUNT);
        assert_eq!(names[0], "Kamar Tidur");
        assert_eq!(names[4], "Nama Perumahan");
        assert_eq!(names[10], "Orientasi Bangunan");
        assert_eq!(names[16], "District");
        for (i, feature) in Feature::ALL.iter().enumerate() {
            assert_eq!(feature.index(), i);
            assert_eq!(Feature::from_name(feature.name()), Some(*feature));
        }
    }

    #[test]
    fn test_feature_kinds_partition_columns() {
        let count = |kind| Feature::ALL.iter().filter(|f| f.kind() == kind).count();
        assert_eq!(count(FeatureKind::Numeric), 6);
        assert_eq!(count(FeatureKind::Count), 5);
        assert_eq!(count(FeatureKind::Categorical), 6);
        for f in Feature::CATEGORICAL {
            assert_eq!(f.kind(), FeatureKind::Categorical);
        }
    }

    #[test]
    fn test_feature_value_deserialization() {
        let raw = full_raw_record();
        assert_eq!(raw["Kamar Tidur"], FeatureValue::Integer(3));
        assert_eq!(raw["Luas Tanah"], FeatureValue::Float(50.0));
        assert_eq!(raw["Daya Listrik"], FeatureValue::Missing);
        assert_eq!(raw["Sertifikat"], FeatureValue::Text("SHM".to_string()));
    }

    #[test]
    fn test_feature_value_labels() {
        assert_eq!(FeatureValue::Integer(3).to_label(), "3");
        assert_eq!(FeatureValue::Float(3.0).to_label(), "3.0");
        assert_eq!(FeatureValue::Float(-7.25).to_label(), "-7.25");
        assert_eq!(FeatureValue::Missing.to_label(), "nan");
        assert_eq!(FeatureValue::from("Hook").to_label(), "Hook");
    }

    #[test]
    fn test_feature_value_numeric_reading() {
        assert_eq!(FeatureValue::Integer(2).as_f64(), Some(2.0));
        assert_eq!(FeatureValue::from(" 120.5 ").as_f64(), Some(120.5));
        assert_eq!(FeatureValue::from("luas").as_f64(), None);
        assert_eq!(FeatureValue::Float(f64::NAN).as_f64(), None);
        assert!(FeatureValue::Float(f64::NAN).is_missing());
    }

    #[test]
    fn test_record_from_raw_accepts_complete_record() {
        let record = TabularRecord::from_raw(&full_raw_record()).unwrap();
        assert_eq!(
            record.get(Feature::City),
            &FeatureValue::Text("Surabaya".to_string())
        );
        assert!(record.get(Feature::DayaListrik).is_missing());
        assert_eq!(record.iter().count(), FEATURE_COUNT);
    }

    #[test]
    fn test_record_from_raw_rejects_missing_key() {
        let mut raw = full_raw_record();
        raw.remove("District");
        let err = TabularRecord::from_raw(&raw).unwrap_err();
        match err {
            PropFusionError::MissingFeature { feature } => assert_eq!(feature, "District"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_record_from_raw_normalises_nan_to_missing() {
        let mut raw = full_raw_record();
        raw.insert("Luas Tanah".to_string(), FeatureValue::Float(f64::NAN));
        let record = TabularRecord::from_raw(&raw).unwrap();
        assert_eq!(record.get(Feature::LuasTanah), &FeatureValue::Missing);
    }

    #[test]
    fn test_price_prediction_conversion_and_display() {
        let prediction = PricePrediction::new(1.5, DEFAULT_UNIT_MULTIPLIER, DEFAULT_CURRENCY);
        assert_eq!(prediction.price, 1_500_000.0);
        assert_eq!(prediction.to_string(), "Rp 1,500,000.00");

        let small = PricePrediction::new(0.000_25, DEFAULT_UNIT_MULTIPLIER, "USD");
        assert!(small.to_string().starts_with("USD 250.0"));

        let negative = PricePrediction::new(-2.0, DEFAULT_UNIT_MULTIPLIER, DEFAULT_CURRENCY);
        assert_eq!(negative.to_string(), "Rp -2,000,000.00");
    }

    #[test]
    fn test_predictor_config_defaults_from_empty_yaml() {
        let config: PredictorConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.dimensions, ModelDimensions::default());
        assert_eq!(config.unit_multiplier, 1_000_000.0);
        assert_eq!(config.currency, "IDR");
        assert_eq!(config.device, DevicePreference::Cpu);
        assert_eq!(config.text_encoder.passage_prefix, "passage: ");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_predictor_config_validation() {
        let config = PredictorConfig {
            dimensions: ModelDimensions { image: 0, text: 1024 },
            ..PredictorConfig::default()
        };
        assert!(matches!(config.validate(), Err(PropFusionError::Config(_))));
    }

    #[test]
    fn test_error_display() {
        let err = PropFusionError::MissingFeature {
            feature: "District".to_string(),
        };
        assert_eq!(err.to_string(), "Missing required feature: District");
        let err = PropFusionError::embedding("text", "empty description");
        assert_eq!(err.to_string(), "Embedding error (text): empty description");
    }
}
