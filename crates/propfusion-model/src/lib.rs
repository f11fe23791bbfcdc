//! Multimodal fusion inference for propfusion
//!
//! This crate turns a raw property record, a precomputed image embedding and a
//! listing description into a price estimate. It provides the tabular
//! preprocessing tables, the embedding collaborators, the fusion network and
//! the orchestrating [`PricePredictor`].

pub mod device;
pub mod embedding;
pub mod encoding;
pub mod fusion_network;
pub mod layers;
pub mod predictor;
pub mod scaling;
pub mod stemmer;
pub mod tabular;
pub mod text_encoder;
pub mod text_normalise;

pub use device::select_device;
pub use embedding::{EmbeddingSource, SafetensorsEmbeddingSource};
pub use encoding::{CategoryEncodings, EncodingTable};
pub use fusion_network::{FusionModel, FusionNetwork};
pub use predictor::{PredictionRequest, PricePredictor};
pub use scaling::ScalingParameters;
pub use stemmer::{IndonesianStemmer, RootDictionary, Stemmer};
pub use tabular::{ImputationTable, TabularPreprocessor};
pub use text_encoder::TransformerTextEmbedder;
pub use text_normalise::TextNormaliser;
