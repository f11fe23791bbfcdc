//! YAML configuration loading for the command-line front end.
//!
//! Loads [`PredictorConfig`] from a YAML file on disk, falling back to
//! defaults when no file is specified.

use propfusion_core::PredictorConfig;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Load a [`PredictorConfig`] from a YAML file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the YAML is invalid, or the
/// values fail validation.
pub fn load_config(path: &Path) -> anyhow::Result<PredictorConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
    let config: PredictorConfig = serde_yaml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {}", e))?;
    config.validate()?;
    Ok(config)
}

/// Load the file at `path` if given, otherwise use defaults.
///
/// # Errors
///
/// See [`load_config`].
pub fn resolve_config(path: Option<&Path>) -> anyhow::Result<PredictorConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(PredictorConfig::default()),
    }
}

/// Read a JSON input file into `T`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not match `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read input file {}: {}", path.display(), e))?;
    serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse input JSON {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use propfusion_core::DevicePreference;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    /// Helper to write text to a temp file and return the handle.
    fn write_temp(text: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(text.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_load_config_full() {
        let yaml = r#"
weights_path: "/srv/model/best_model.safetensors"
scaler_path: "/srv/model/scaler.json"
dimensions:
  image: 768
  text: 1024
unit_multiplier: 1000.0
currency: "IDR"
device: auto
text_encoder:
  model_id: "intfloat/multilingual-e5-base"
  model_dir: "/srv/model/e5"
  max_length: 256
  passage_prefix: "passage: "
  stopwords_path: "/srv/model/stopwords.txt"
  root_words_path: "/srv/model/kata-dasar.txt"
logging:
  level: debug
  format: json
"#;
        let f = write_temp(yaml);
        let config = load_config(f.path()).unwrap();
        assert_eq!(
            config.weights_path,
            PathBuf::from("/srv/model/best_model.safetensors")
        );
        assert_eq!(config.dimensions.image, 768);
        assert_eq!(config.dimensions.text, 1024);
        assert_eq!(config.unit_multiplier, 1000.0);
        assert_eq!(config.device, DevicePreference::Auto);
        assert_eq!(config.text_encoder.max_length, 256);
        assert_eq!(
            config.text_encoder.model_dir,
            Some(PathBuf::from("/srv/model/e5"))
        );
        assert_eq!(
            config.text_encoder.root_words_path,
            Some(PathBuf::from("/srv/model/kata-dasar.txt"))
        );
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_load_config_minimal_uses_defaults() {
        let f = write_temp("currency: \"IDR\"\n");
        let config = load_config(f.path()).unwrap();
        assert_eq!(
            config.weights_path,
            PathBuf::from("model/best_model.safetensors")
        );
        assert_eq!(config.dimensions.image, 1024);
        assert_eq!(config.unit_multiplier, 1_000_000.0);
        assert_eq!(config.device, DevicePreference::Cpu);
        assert_eq!(config.text_encoder.passage_prefix, "passage: ");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/config.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_yaml() {
        let f = write_temp("not: [valid: yaml: {{{}}}");
        let result = load_config(f.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_rejects_zero_dimension() {
        let f = write_temp("dimensions:\n  image: 0\n  text: 1024\n");
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("dimensions"));
    }

    #[test]
    fn test_resolve_config_without_path() {
        let config = resolve_config(None).unwrap();
        assert_eq!(config.currency, "IDR");
    }

    #[test]
    fn test_read_json_records() {
        let f = write_temp(r#"[{"Kamar Tidur": 3, "City": "Surabaya"}]"#);
        let records: Vec<propfusion_core::RawRecord> = read_json(f.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].len(), 2);

        let bad = write_temp("{ nope");
        assert!(read_json::<Vec<propfusion_core::RawRecord>>(bad.path()).is_err());
    }
}
