//! End-to-end price inference.
//!
//! [`PricePredictor`] validates and preprocesses the structured records,
//! gathers image and text embeddings from its collaborators, evaluates the
//! fusion network once over the batch, and converts raw outputs to prices.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use propfusion_core::{
    PredictorConfig, PricePrediction, PropFusionError, RawRecord, Result, TabularRecord,
    DEFAULT_CURRENCY, DEFAULT_UNIT_MULTIPLIER,
};
use serde::{Deserialize, Serialize};

use crate::device::select_device;
use crate::embedding::{check_dimension, EmbeddingSource};
use crate::fusion_network::FusionModel;
use crate::tabular::TabularPreprocessor;

/// One property to price: its attributes, its photo and its description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Raw attribute map keyed by training column name.
    pub record: RawRecord,
    /// Input handed to the image collaborator.
    pub image: PathBuf,
    /// Free-text listing description.
    pub description: String,
}

/// Multimodal price predictor.
///
/// All tables and weights are read-only after construction, so one
/// predictor can serve concurrent calls through a shared reference.
pub struct PricePredictor<I, T>
where
    I: EmbeddingSource<Input = Path>,
    T: EmbeddingSource<Input = str>,
{
    preprocessor: TabularPreprocessor,
    model: FusionModel,
    image: Arc<I>,
    text: Arc<T>,
    unit_multiplier: f64,
    currency: String,
}

impl<I, T> std::fmt::Debug for PricePredictor<I, T>
where
    I: EmbeddingSource<Input = Path>,
    T: EmbeddingSource<Input = str>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PricePredictor")
            .field("image", &self.image.name())
            .field("text", &self.text.name())
            .field("model_ready", &self.model.is_ready())
            .field("unit_multiplier", &self.unit_multiplier)
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

impl<I, T> PricePredictor<I, T>
where
    I: EmbeddingSource<Input = Path>,
    T: EmbeddingSource<Input = str>,
{
    /// Assemble a predictor from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::Config`] if a collaborator's dimension
    /// differs from the model's branch dimension.
    pub fn new(
        preprocessor: TabularPreprocessor,
        model: FusionModel,
        image: Arc<I>,
        text: Arc<T>,
    ) -> Result<Self> {
        let dims = model.dimensions();
        for (name, declared, expected) in [
            (image.name(), image.dimension(), dims.image),
            (text.name(), text.dimension(), dims.text),
        ] {
            if declared != expected {
                return Err(PropFusionError::Config(format!(
                    "{name} embedding source produces {declared} values but the model expects {expected}"
                )));
            }
        }
        Ok(Self {
            preprocessor,
            model,
            image,
            text,
            unit_multiplier: DEFAULT_UNIT_MULTIPLIER,
            currency: DEFAULT_CURRENCY.to_string(),
        })
    }

    /// Load the scaler and weights named in `config` and wire the collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an artifact
    /// cannot be loaded.
    pub fn from_config(config: &PredictorConfig, image: Arc<I>, text: Arc<T>) -> Result<Self> {
        config.validate()?;
        let device = select_device(config.device);
        let preprocessor = TabularPreprocessor::from_scaler_file(&config.scaler_path)?;
        let model = FusionModel::load(&config.weights_path, config.dimensions, &device)?;
        Ok(Self::new(preprocessor, model, image, text)?
            .with_unit(config.unit_multiplier, config.currency.clone()))
    }

    /// Override the output unit conversion.
    #[must_use]
    pub fn with_unit(mut self, unit_multiplier: f64, currency: impl Into<String>) -> Self {
        self.unit_multiplier = unit_multiplier;
        self.currency = currency.into();
        self
    }

    #[must_use]
    pub fn preprocessor(&self) -> &TabularPreprocessor {
        &self.preprocessor
    }

    #[must_use]
    pub fn model(&self) -> &FusionModel {
        &self.model
    }

    /// Price every request, preserving input order.
    ///
    /// All records are validated before any embedding is requested, so a
    /// missing column fails fast without touching the collaborators.
    ///
    /// # Errors
    ///
    /// - [`PropFusionError::MissingFeature`] for an absent column.
    /// - [`PropFusionError::Embedding`] when a collaborator fails or returns
    ///   a vector of the wrong length.
    /// - [`PropFusionError::UninitializedModel`] without bound weights.
    /// - [`PropFusionError::NonFiniteOutput`] if the network yields NaN or
    ///   an infinity.
    pub async fn predict(&self, requests: &[PredictionRequest]) -> Result<Vec<PricePrediction>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let records = requests
            .iter()
            .map(|r| TabularRecord::from_raw(&r.record))
            .collect::<Result<Vec<_>>>()?;
        let tabular: Vec<_> = records
            .iter()
            .map(|r| self.preprocessor.transform(r))
            .collect();

        let mut image_rows = Vec::with_capacity(requests.len());
        let mut text_rows = Vec::with_capacity(requests.len());
        for request in requests {
            let (image, text) = tokio::try_join!(
                self.image.embed(request.image.as_path()),
                self.text.embed(request.description.as_str())
            )?;
            check_dimension(self.image.as_ref(), &image)?;
            check_dimension(self.text.as_ref(), &text)?;
            image_rows.push(image);
            text_rows.push(text);
        }

        let raw = self.model.forward_rows(&tabular, &image_rows, &text_rows)?;
        let predictions = raw
            .into_iter()
            .enumerate()
            .map(|(row, output)| {
                if output.is_finite() {
                    Ok(PricePrediction::new(
                        output,
                        self.unit_multiplier,
                        self.currency.clone(),
                    ))
                } else {
                    Err(PropFusionError::NonFiniteOutput { row })
                }
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(batch_size = predictions.len(), "Prediction completed");
        Ok(predictions)
    }

    /// Price a single request.
    ///
    /// # Errors
    ///
    /// See [`PricePredictor::predict`].
    pub async fn predict_one(&self, request: &PredictionRequest) -> Result<PricePrediction> {
        self.predict(std::slice::from_ref(request))
            .await?
            .pop()
            .ok_or_else(|| PropFusionError::Model("prediction returned no rows".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use candle_core::Device;
    use propfusion_core::{FeatureValue, ModelDimensions};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::scaling::ScalingParameters;

    const DIMS: ModelDimensions = ModelDimensions { image: 8, text: 6 };

    struct CountingImage {
        dim: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingSource for CountingImage {
        type Input = Path;

        fn name(&self) -> &str {
            "image"
        }

        fn dimension(&self) -> usize {
            self.dim
        }

        async fn embed(&self, input: &Path) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if input.as_os_str().is_empty() {
                return Err(PropFusionError::embedding("image", "no image supplied"));
            }
            let seed = input.as_os_str().len() as f32;
            Ok((0..self.dim).map(|i| (seed + i as f32).cos()).collect())
        }
    }

    struct CountingText {
        dim: usize,
        /// Length actually produced; differs from `dim` to simulate a faulty encoder.
        emit: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingSource for CountingText {
        type Input = str;

        fn name(&self) -> &str {
            "text"
        }

        fn dimension(&self) -> usize {
            self.dim
        }

        async fn embed(&self, input: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let seed = input.len() as f32;
            Ok((0..self.emit).map(|i| (seed * 0.1 + i as f32).sin()).collect())
        }
    }

    fn counting_text(dim: usize) -> CountingText {
        CountingText {
            dim,
            emit: dim,
            calls: AtomicUsize::new(0),
        }
    }

    fn predictor() -> PricePredictor<CountingImage, CountingText> {
        let model = FusionModel::new_random(DIMS, &Device::Cpu).unwrap();
        PricePredictor {
            preprocessor: TabularPreprocessor::new(ScalingParameters::identity()),
            model,
            image: Arc::new(CountingImage {
                dim: DIMS.image,
                calls: AtomicUsize::new(0),
            }),
            text: Arc::new(counting_text(DIMS.text)),
            unit_multiplier: DEFAULT_UNIT_MULTIPLIER,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    fn full_record() -> RawRecord {
        serde_json::from_value(serde_json::json!({
            "Kamar Tidur": 3, "Kamar Mandi": 2, "Luas Tanah": 50.0, "Luas Bangunan": 68.0,
            "Nama Perumahan": "Pakuwon City", "Sertifikat": "SHM", "Carpots": 1,
            "Daya Listrik": 2200, "Interior": "Semi Furnished", "Jumlah Lantai": 1,
            "Orientasi Bangunan": "Selatan", "Tahun Dibangun": 2021, "Garasi": 1,
            "Latitude": -7.3132, "Longitude": 112.7672, "City": "Surabaya",
            "District": "Pakuwon City"
        }))
        .unwrap()
    }

    fn request(image: &str, description: &str) -> PredictionRequest {
        PredictionRequest {
            record: full_record(),
            image: PathBuf::from(image),
            description: description.to_string(),
        }
    }

    #[tokio::test]
    async fn test_predict_scales_raw_output() {
        let p = predictor();
        let req = request("house.jpg", "rumah baru");
        let prediction = p.predict_one(&req).await.unwrap();

        let tab = p.preprocessor.process(&req.record).unwrap();
        let img = p.image.embed(req.image.as_path()).await.unwrap();
        let text = p.text.embed(req.description.as_str()).await.unwrap();
        let raw = p.model.forward_rows(&[tab], &[img], &[text]).unwrap()[0];

        assert_eq!(prediction.raw_output, raw);
        assert_eq!(prediction.price, f64::from(raw) * 1_000_000.0);
        assert_eq!(prediction.currency, "IDR");
    }

    #[tokio::test]
    async fn test_missing_feature_skips_collaborators() {
        let p = predictor();
        let mut bad = request("house.jpg", "rumah");
        bad.record.remove("District");
        let requests = vec![request("a.jpg", "rumah"), bad];

        let err = p.predict(&requests).await.unwrap_err();
        match err {
            PropFusionError::MissingFeature { feature } => assert_eq!(feature, "District"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(p.image.calls.load(Ordering::SeqCst), 0);
        assert_eq!(p.text.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let p = predictor();
        let requests = vec![
            request("a.jpg", "rumah minimalis"),
            request("bb.jpg", "rumah mewah dekat tol"),
            request("ccc.jpg", "kos kosan"),
        ];
        let batch = p.predict(&requests).await.unwrap();
        assert_eq!(batch.len(), 3);
        for (req, got) in requests.iter().zip(&batch) {
            let single = p.predict_one(req).await.unwrap();
            let tolerance = 1e-5 * got.raw_output.abs().max(1.0);
            assert!((single.raw_output - got.raw_output).abs() <= tolerance);
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let p = predictor();
        assert!(p.predict(&[]).await.unwrap().is_empty());
        assert_eq!(p.image.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let p = predictor();
        let err = p.predict_one(&request("", "rumah")).await.unwrap_err();
        assert!(matches!(err, PropFusionError::Embedding { .. }));
    }

    #[tokio::test]
    async fn test_wrong_vector_length_is_embedding_error() {
        let mut p = predictor();
        p.text = Arc::new(CountingText {
            dim: DIMS.text,
            emit: DIMS.text - 1,
            calls: AtomicUsize::new(0),
        });
        let err = p.predict_one(&request("a.jpg", "rumah")).await.unwrap_err();
        assert!(matches!(err, PropFusionError::Embedding { .. }));
    }

    #[tokio::test]
    async fn test_uninitialized_model() {
        let mut p = predictor();
        p.model = FusionModel::uninitialized(DIMS, &Device::Cpu);
        let err = p.predict_one(&request("a.jpg", "rumah")).await.unwrap_err();
        assert!(matches!(err, PropFusionError::UninitializedModel));
    }

    #[test]
    fn test_new_checks_dimensions() {
        let model = FusionModel::new_random(DIMS, &Device::Cpu).unwrap();
        let result = PricePredictor::new(
            TabularPreprocessor::new(ScalingParameters::identity()),
            model,
            Arc::new(CountingImage {
                dim: 9,
                calls: AtomicUsize::new(0),
            }),
            Arc::new(counting_text(DIMS.text)),
        );
        assert!(matches!(result, Err(PropFusionError::Config(_))));
    }

    #[tokio::test]
    async fn test_custom_unit() {
        let p = predictor().with_unit(1.0, "USD");
        let prediction = p.predict_one(&request("a.jpg", "rumah")).await.unwrap();
        assert_eq!(prediction.price, f64::from(prediction.raw_output));
        assert_eq!(prediction.currency, "USD");
    }

    #[test]
    fn test_request_deserializes() {
        let json = serde_json::json!({
            "record": { "Kamar Tidur": 3, "Daya Listrik": null, "City": "Surabaya" },
            "image": "photos/1.jpg",
            "description": "Dijual cepat"
        });
        let req: PredictionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.record["Kamar Tidur"], FeatureValue::Integer(3));
        assert!(req.record["Daya Listrik"].is_missing());
        assert_eq!(req.image, PathBuf::from("photos/1.jpg"));
    }
}
