//! Category-to-code tables for the six categorical property attributes.
//!
//! Each table maps a label to the integer code it received at training time.
//! Codes are the label's position in the table's sorted vocabulary. Labels that
//! are not in a table resolve to that table's default code; this is silent and
//! intentional, so inference keeps working for unseen categories.
//!
//! The defaults are the training pipeline's, including the ones that do not
//! point at an "unknown" slot (`City` and `District` default to code 0).

use std::collections::{BTreeMap, HashMap};

use propfusion_core::{Feature, FeatureKind};

/// Sentinel label substituted for missing free-text categories.
pub const UNKNOWN_LABEL: &str = "Unknown";

const SERTIFIKAT_LABELS: &[&str] = &["HGB", "Hak Pakai", "Lain-lain", "SHM", "Strata Title"];

const INTERIOR_LABELS: &[&str] = &["Full Furnished", "Semi Furnished", "Unfurnished", "Unknown"];

const ORIENTASI_LABELS: &[&str] = &[
    "Barat",
    "Barat Daya",
    "Barat Laut",
    "Hook",
    "Selatan",
    "Timur",
    "Timur Laut",
    "Unknown",
    "Utara",
];

const CITY_LABELS: &[&str] = &["Malang", "Sidoarjo", "Surabaya"];

const DISTRICT_LABELS: &[&str] = &[
    "Blimbing",
    "Dau",
    "Dinoyo",
    "Dukuh Pakis",
    "Gedangan",
    "Griya Shanta",
    "Gubeng",
    "Jatimulyo",
    "Kedungkandang",
    "Kenjeran",
    "Lowokwaru",
    "Malang Kota",
    "Merjosari",
    "Mojolangu",
    "Mulyorejo",
    "Pakis",
    "Pakuwon City",
    "Pakuwon Indah",
    "Permata Jingga",
    "Rungkut",
    "Sidoarjo",
    "Soekarno Hatta",
    "Sukolilo",
    "Sukun",
    "Surabaya Kota",
    "Tenggilis Mejoyo",
    "Tlogomas",
    "Wagir",
    "Waru",
];

const NAMA_PERUMAHAN_LABELS: &[&str] = &[
    "-",
    "Alana Regency Cemandi",
    "Amesta living",
    "Anggrek Residence",
    "Atrani Residence",
    "Babatan Pantai",
    "Barata Jaya",
    "Baruk Utara",
    "Bratang Binangun",
    "Citra Garden",
    "Citra Garden Sidoarjo",
    "Citra Harmoni",
    "Citra garden",
    "D'gardenia City",
    "DE IMPERIAL ESTATE",
    "Darmo Permai",
    "Dekat Taman Pinang Indah Sidoarjo",
    "Delta Mandala",
    "Deltasari Indah",
    "Dharma Husada Mas",
    "Dharmahusada Mas",
    "Dinoyo",
    "Dream Park Regency",
    "Dukuh Kupang",
    "Dukuh Kupang Timur soho",
    "Galaxy Bumi Permai",
    "Graha Sukolilo Regency",
    "Grand Delta Sari",
    "Grand Nature Residence",
    "Green Lake Natural Living",
    "Green Orchid Residence",
    "Griya Permata Gedangan",
    "Gunung Anyar Baru",
    "Gunung Anyar Utara",
    "Istana Mentari",
    "Jaya Maspion Permata",
    "Jemursari Regency",
    "Jl. Ngagel",
    "Joyo Grand",
    "KECIPIR REGENCY",
    "Kahuripan Nirwana",
    "Kalijudan",
    "Kendalsari",
    "Klampis Semolo",
    "Koala Regency",
    "Kosagrha",
    "Kresna Asri",
    "Kupang Baru",
    "Kutisari Indah Utara",
    "Kutisari Selatan",
    "Kutisari Selatan XIII",
    "Kutisri Indah",
    "Lebak Indah Town House",
    "Manyar",
    "Manyar Jaya",
    "Manyar Kertoadi",
    "Manyar Tirtoyoso",
    "Medayu",
    "Medayu Utara",
    "Medokan Ayu Tambak",
    "Medokan Sawah Timur Rungkut Surabaya",
    "Mojoklangru Kidul",
    "Mulyosari",
    "Mulyosari Utara",
    "Mutiara City",
    "Ngagel Wasana",
    "Nginden",
    "Nginden Intan Timur",
    "Nirwana Eksekutif",
    "Nirwana Eskekutif",
    "Omah View",
    "Pakisjajar",
    "Pakuwon City",
    "Pantai Mentari",
    "Park Regency Keputih",
    "Penjaringan Asri",
    "Penjaringan Sari",
    "Pepelegi Indah",
    "Perum Puri Surya Jaya Cluster Valencia Residence Gedangan Sidoarjo",
    "Perum perlian kencana sari",
    "Perumahan",
    "Perumahan Bluru Permai Blok C no 11",
    "Perumahan Dharma Husada Indah",
    "Perumahan Green Lake",
    "Perumahan Griya Amerta",
    "Perumahan Griya Galaxy",
    "Perumahan Griya Pesona Asri",
    "Perumahan Istana Safira DAU",
    "Perumahan Medokan Ayu Surabaya",
    "Perumahan Mutiara Regency",
    "Perumahan Puri Indah Sidoarjo Kota",
    "Perumahan Putra Bangsa",
    "Perumahan Royal Park Regency Rungkut",
    "Perumahan Rungkut Mapan",
    "Perumahan Rungkut Menanggal Harapan Surabaya",
    "Perumahan Semolowaru Elok",
    "Perumahan Semolowaru Indah 2",
    "Perumahan Taman Pinang Indah",
    "Perumahan Taman Puspa Anggaswangi",
    "Perumahan YKP",
    "Perumahan river viuw",
    "Pondok Candra",
    "Pondok Candra Indah Waru Rungkut Sidoarjo",
    "Pondok Chandra",
    "Pondok Jati",
    "Pondok Mutiara",
    "Pondok Tjandra",
    "Pondok Tjandra Indah",
    "Prapen indah Kec. Tenggilis Mejoyo Surabaya",
    "Puri Asri Regency",
    "Puri Gunung Anyar",
    "Puri Indah Lestari",
    "Puri Surya Jaya",
    "Putra Bangsa",
    "Rifera Townhouse",
    "Rungkut Asri",
    "Rungkut Asri Utara",
    "Rungkut Harapan",
    "Rungkut Mapan",
    "Rungkut Menanggal",
    "Saphire residence",
    "Semampir Tengah",
    "Semolowaru Elok",
    "Sentra Point",
    "Simpang Darmo Permai Selatan",
    "Springville Residence",
    "Sukolilo Dian Regency 2",
    "Sunan Kalijaga",
    "Sutorejo Prima",
    "Sutorejo Prima Indah",
    "Sutorejo Timur",
    "Sutorejo Utara",
    "TENGGILIS MEJOYO SELATAN",
    "Taman Pondok Legi 4",
    "Taman Rivera Regency",
    "Taman pondok indah",
    "Taman pondok legi",
    "Tambak Medokan Ayu",
    "Tambak medokan ayu VI C",
    "Tenggilis Mejoyo",
    "Unknown",
    "Valencia garden , gedangan",
    "Vbt",
    "Vila bukit tidar",
    "Villa Kalijudan Indah",
    "Wellington Park Residence",
    "Wisata Semanggi Mangrove",
    "Wisma Mukti",
    "Wisma Permai",
    "Wisma Permai Waru",
    "Wisma Tropodo",
    "Wisma permai tengah",
    "YKP Medokan Asri Rungkut Surabaya Timur",
    "klampis semolo",
    "kompleks mojoarum",
    "perum jaya maspion permata",
    "perum taman pinang indah sidoarjo",
    "regency one east point",
    "sukolilo Dian Regency",
];

/// Label-to-code lookup for a single categorical feature.
#[derive(Debug, Clone)]
pub struct EncodingTable {
    codes: HashMap<String, u32>,
    default_code: u32,
}

impl EncodingTable {
    /// Build a table where each label's code is its position in `labels`.
    #[must_use]
    pub fn from_labels(labels: &[&str], default_code: u32) -> Self {
        let codes = labels
            .iter()
            .zip(0u32..)
            .map(|(label, code)| ((*label).to_string(), code))
            .collect();
        Self {
            codes,
            default_code,
        }
    }

    /// Resolve a label, falling back to the default code.
    #[must_use]
    pub fn encode(&self, label: &str) -> u32 {
        self.code_of(label).unwrap_or(self.default_code)
    }

    /// Code for a label present in the table.
    #[must_use]
    pub fn code_of(&self, label: &str) -> Option<u32> {
        self.codes.get(label).copied()
    }

    #[must_use]
    pub fn default_code(&self) -> u32 {
        self.default_code
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// The full set of encoding tables, one per categorical feature.
///
/// Built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct CategoryEncodings {
    tables: BTreeMap<Feature, EncodingTable>,
}

impl CategoryEncodings {
    /// Tables and defaults exactly as fitted on the training corpus.
    #[must_use]
    pub fn training() -> Self {
        let tables = BTreeMap::from([
            (
                Feature::Sertifikat,
                EncodingTable::from_labels(SERTIFIKAT_LABELS, 3),
            ),
            (
                Feature::Interior,
                EncodingTable::from_labels(INTERIOR_LABELS, 3),
            ),
            (
                Feature::OrientasiBangunan,
                EncodingTable::from_labels(ORIENTASI_LABELS, 7),
            ),
            (Feature::City, EncodingTable::from_labels(CITY_LABELS, 0)),
            (
                Feature::District,
                EncodingTable::from_labels(DISTRICT_LABELS, 0),
            ),
            (
                Feature::NamaPerumahan,
                EncodingTable::from_labels(NAMA_PERUMAHAN_LABELS, 140),
            ),
        ]);
        Self { tables }
    }

    /// Replace the table for one categorical feature.
    ///
    /// Non-categorical features are ignored and the encodings are returned unchanged.
    #[must_use]
    pub fn with_table(mut self, feature: Feature, table: EncodingTable) -> Self {
        if feature.kind() == FeatureKind::Categorical {
            self.tables.insert(feature, table);
        }
        self
    }

    #[must_use]
    pub fn table(&self, feature: Feature) -> Option<&EncodingTable> {
        self.tables.get(&feature)
    }

    /// Resolve `label` for `feature`.
    ///
    /// Returns `None` only when `feature` is not categorical; unknown labels
    /// resolve to the feature's default code.
    #[must_use]
    pub fn encode(&self, feature: Feature, label: &str) -> Option<u32> {
        self.table(feature).map(|t| t.encode(label))
    }

    /// Default code for `feature`, if it is categorical.
    #[must_use]
    pub fn default_code(&self, feature: Feature) -> Option<u32> {
        self.table(feature).map(EncodingTable::default_code)
    }
}

impl Default for CategoryEncodings {
    fn default() -> Self {
        Self::training()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_categorical_feature_has_a_table() {
        let encodings = CategoryEncodings::training();
        for feature in Feature::CATEGORICAL {
            assert!(encodings.table(feature).is_some(), "no table for {feature}");
        }
        assert!(encodings.table(Feature::LuasTanah).is_none());
        assert_eq!(encodings.encode(Feature::Latitude, "x"), None);
    }

    #[test]
    fn test_table_sizes() {
        let encodings = CategoryEncodings::training();
        let len = |f| encodings.table(f).unwrap().len();
        assert_eq!(len(Feature::Sertifikat), 5);
        assert_eq!(len(Feature::Interior), 4);
        assert_eq!(len(Feature::OrientasiBangunan), 9);
        assert_eq!(len(Feature::City), 3);
        assert_eq!(len(Feature::District), 29);
        assert_eq!(len(Feature::NamaPerumahan), 159);
    }

    #[test]
    fn test_known_labels() {
        let encodings = CategoryEncodings::training();
        assert_eq!(encodings.encode(Feature::NamaPerumahan, "Pakuwon City"), Some(72));
        assert_eq!(encodings.encode(Feature::NamaPerumahan, "Unknown"), Some(140));
        assert_eq!(
            encodings.encode(Feature::NamaPerumahan, "sukolilo Dian Regency"),
            Some(158)
        );
        assert_eq!(
            encodings.encode(Feature::NamaPerumahan, "D'gardenia City"),
            Some(13)
        );
        assert_eq!(encodings.encode(Feature::Sertifikat, "SHM"), Some(3));
        assert_eq!(encodings.encode(Feature::Interior, "Semi Furnished"), Some(1));
        assert_eq!(encodings.encode(Feature::OrientasiBangunan, "Selatan"), Some(4));
        assert_eq!(encodings.encode(Feature::City, "Surabaya"), Some(2));
        assert_eq!(encodings.encode(Feature::District, "Pakuwon City"), Some(16));
        assert_eq!(encodings.encode(Feature::District, "Waru"), Some(28));
    }

    #[test]
    fn test_unknown_labels_use_training_defaults() {
        let encodings = CategoryEncodings::training();
        let cases = [
            (Feature::Sertifikat, 3),
            (Feature::Interior, 3),
            (Feature::OrientasiBangunan, 7),
            (Feature::City, 0),
            (Feature::District, 0),
            (Feature::NamaPerumahan, 140),
        ];
        for (feature, expected) in cases {
            assert_eq!(encodings.encode(feature, "Jakarta Selatan"), Some(expected));
            assert_eq!(encodings.encode(feature, ""), Some(expected));
            assert_eq!(encodings.encode(feature, "nan"), Some(expected));
            assert_eq!(encodings.default_code(feature), Some(expected));
        }
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let encodings = CategoryEncodings::training();
        assert_eq!(encodings.encode(Feature::NamaPerumahan, "Citra Garden"), Some(9));
        assert_eq!(encodings.encode(Feature::NamaPerumahan, "Citra garden"), Some(12));
        assert_eq!(encodings.encode(Feature::Sertifikat, "shm"), Some(3));
        assert_eq!(encodings.encode(Feature::City, "surabaya"), Some(0));
    }

    #[test]
    fn test_with_table_overrides_categorical_only() {
        let custom = EncodingTable::from_labels(&["Bogor", "Depok"], 1);
        let encodings = CategoryEncodings::training()
            .with_table(Feature::City, custom.clone())
            .with_table(Feature::Garasi, custom);
        assert_eq!(encodings.encode(Feature::City, "Depok"), Some(1));
        assert_eq!(encodings.encode(Feature::City, "Surabaya"), Some(1));
        assert!(encodings.table(Feature::Garasi).is_none());
    }
}
