//! Description normalisation applied before text embedding.
//!
//! The pipeline reproduces the preprocessing the text branch was trained on:
//!
//! 1. lower-case
//! 2. delete digit runs
//! 3. replace every character that is neither a word character nor
//!    whitespace with a space
//! 4. collapse whitespace and split into tokens
//! 5. drop Indonesian stop words
//! 6. stem each remaining token
//! 7. re-join with single spaces and prepend the passage prefix

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use propfusion_core::{PropFusionError, Result, TextEncoderConfig};
use regex::Regex;

use crate::stemmer::{IndonesianStemmer, RootDictionary, Stemmer};

static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("digits regex"));

static PUNCTUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("punctuation regex"));

/// Default passage prefix of the E5 embedding family.
pub const DEFAULT_PASSAGE_PREFIX: &str = "passage: ";

/// Prepares free-text descriptions for the text encoder.
pub struct TextNormaliser {
    stopwords: HashSet<String>,
    stemmer: Box<dyn Stemmer>,
    prefix: String,
}

impl std::fmt::Debug for TextNormaliser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextNormaliser")
            .field("stopwords", &self.stopwords.len())
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl Default for TextNormaliser {
    fn default() -> Self {
        Self::new(DEFAULT_PASSAGE_PREFIX)
    }
}

impl TextNormaliser {
    /// Built-in stop words and the Indonesian stemmer over its bundled roots.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            stopwords: INDONESIAN_STOPWORDS.iter().map(|w| (*w).to_string()).collect(),
            stemmer: Box::new(IndonesianStemmer::default()),
            prefix: prefix.into(),
        }
    }

    /// Build from the text encoder settings, loading the optional stop-word
    /// and root-word files.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::Config`] if a configured file cannot be read.
    pub fn from_config(config: &TextEncoderConfig) -> Result<Self> {
        let mut normaliser = Self::new(config.passage_prefix.clone());
        if let Some(path) = &config.stopwords_path {
            normaliser = normaliser.with_stopwords_file(path)?;
        }
        if let Some(path) = &config.root_words_path {
            let dictionary = RootDictionary::from_file(path)?;
            normaliser = normaliser.with_stemmer(Box::new(IndonesianStemmer::new(dictionary)));
        }
        Ok(normaliser)
    }

    /// Replace the stop-word list with one read from a file, one word per line.
    ///
    /// Blank lines and lines starting with `#` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::Config`] if the file cannot be read.
    pub fn with_stopwords_file(mut self, path: &Path) -> Result<Self> {
        self.stopwords = read_word_list(path, "stop-word list")?;
        Ok(self)
    }

    #[must_use]
    pub fn with_stemmer(mut self, stemmer: Box<dyn Stemmer>) -> Self {
        self.stemmer = stemmer;
        self
    }

    /// Cleaned, stop-word-filtered, stemmed tokens joined by single spaces.
    pub fn clean(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let no_digits = DIGITS_RE.replace_all(&lowered, "");
        let spaced = PUNCTUATION_RE.replace_all(&no_digits, " ");
        spaced
            .split_whitespace()
            .filter(|token| !self.stopwords.contains(*token))
            .map(|token| self.stemmer.stem(token))
            .filter(|token| !token.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Normalise a description into encoder input.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::Embedding`] if the description is empty
    /// after trimming.
    pub fn normalise(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(PropFusionError::embedding("text", "description is empty"));
        }
        Ok(format!("{}{}", self.prefix, self.clean(text)))
    }
}

/// Lower-cased words of a one-per-line file, skipping blanks and `#` comments.
pub(crate) fn read_word_list(path: &Path, what: &str) -> Result<HashSet<String>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        PropFusionError::Config(format!("Failed to read {what} {}: {e}", path.display()))
    })?;
    let words: HashSet<String> = contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_lowercase)
        .collect();
    tracing::info!(path = %path.display(), count = words.len(), "Loaded {what}");
    Ok(words)
}

/// Indonesian stop words.
const INDONESIAN_STOPWORDS: &[&str] = &[
    "ada", "adalah", "adanya", "adapun", "agak", "agaknya", "agar", "akan", "akankah", "akhir",
    "akhiri", "akhirnya", "aku", "akulah", "amat", "amatlah", "anda", "andalah", "antar", "antara",
    "antaranya", "apa", "apaan", "apabila", "apakah", "apalagi", "apatah", "artinya", "asal",
    "asalkan", "atas", "atau", "ataukah", "ataupun", "awal", "awalnya", "bagai", "bagaikan",
    "bagaimana", "bagaimanakah", "bagaimanapun", "bagi", "bagian", "bahkan", "bahwa", "bahwasanya",
    "baik", "bakal", "bakalan", "balik", "banyak", "bapak", "baru", "bawah", "beberapa", "begini",
    "beginian", "beginikah", "beginilah", "begitu", "begitukah", "begitulah", "begitupun",
    "bekerja", "belakang", "belakangan", "belum", "belumlah", "benar", "benarkah", "benarlah",
    "berada", "berakhir", "berakhirlah", "berakhirnya", "berapa", "berapakah", "berapalah",
    "berapapun", "berarti", "berawal", "berbagai", "berdatangan", "beri", "berikan", "berikut",
    "berikutnya", "berjumlah", "berkali-kali", "berkata", "berkehendak", "berkeinginan",
    "berkenaan", "berlainan", "berlalu", "berlangsung", "berlebihan", "bermacam",
    "bermacam-macam", "bermaksud", "bermula", "bersama", "bersama-sama", "bersiap",
    "bersiap-siap", "bertanya", "bertanya-tanya", "berturut", "berturut-turut", "bertutur",
    "berujar", "berupa", "besar", "betul", "betulkah", "biasa", "biasanya", "bila", "bilakah",
    "bisa", "bisakah", "boleh", "bolehkah", "bolehlah", "buat", "bukan", "bukankah", "bukanlah",
    "bukannya", "bulan", "bung", "cara", "caranya", "cukup", "cukupkah", "cukuplah", "cuma",
    "dahulu", "dalam", "dan", "dapat", "dari", "daripada", "datang", "dekat", "demi", "demikian",
    "demikianlah", "dengan", "depan", "di", "dia", "diakhiri", "diakhirinya", "dialah", "diantara",
    "diantaranya", "diberi", "diberikan", "diberikannya", "dibuat", "dibuatnya", "didapat",
    "didatangkan", "digunakan", "diibaratkan", "diibaratkannya", "diingat", "diingatkan",
    "diinginkan", "dijawab", "dijelaskan", "dijelaskannya", "dikarenakan", "dikatakan",
    "dikatakannya", "dikerjakan", "diketahui", "diketahuinya", "dikira", "dilakukan", "dilalui",
    "dilihat", "dimaksud", "dimaksudkan", "dimaksudkannya", "dimaksudnya", "diminta", "dimintai",
    "dimisalkan", "dimulai", "dimulailah", "dimulainya", "dimungkinkan", "dini", "dipastikan",
    "diperbuat", "diperbuatnya", "dipergunakan", "diperkirakan", "diperlihatkan", "diperlukan",
    "diperlukannya", "dipersoalkan", "dipertanyakan", "dipunyai", "diri", "dirinya",
    "disampaikan", "disebut", "disebutkan", "disebutkannya", "disini", "disinilah",
    "ditambahkan", "ditandaskan", "ditanya", "ditanyai", "ditanyakan", "ditegaskan", "ditujukan",
    "ditunjuk", "ditunjuki", "ditunjukkan", "ditunjukkannya", "ditunjuknya", "dituturkan",
    "dituturkannya", "diucapkan", "diucapkannya", "diungkapkan", "dong", "dua", "dulu", "empat",
    "enggak", "enggaknya", "entah", "entahlah", "guna", "gunakan", "hal", "hampir", "hanya",
    "hanyalah", "hari", "harus", "haruslah", "harusnya", "hendak", "hendaklah", "hendaknya",
    "hingga", "ia", "ialah", "ibarat", "ibaratkan", "ibaratnya", "ibu", "ikut", "ingat",
    "ingat-ingat", "ingin", "inginkah", "inginkan", "ini", "inikah", "inilah", "itu", "itukah",
    "itulah", "jadi", "jadilah", "jadinya", "jangan", "jangankan", "janganlah", "jauh", "jawab",
    "jawaban", "jawabnya", "jelas", "jelaskan", "jelaslah", "jelasnya", "jika", "jikalau", "juga",
    "jumlah", "jumlahnya", "justru", "kala", "kalau", "kalaulah", "kalaupun", "kalian", "kami",
    "kamilah", "kamu", "kamulah", "kan", "kapan", "kapankah", "kapanpun", "karena", "karenanya",
    "kasus", "kata", "katakan", "katakanlah", "katanya", "ke", "keadaan", "kebetulan", "kecil",
    "kedua", "keduanya", "keinginan", "kelamaan", "kelihatan", "kelihatannya", "kelima", "keluar",
    "kembali", "kemudian", "kemungkinan", "kemungkinannya", "kenapa", "kepada", "kepadanya",
    "kesampaian", "keseluruhan", "keseluruhannya", "keterlaluan", "ketika", "khususnya", "kini",
    "kinilah", "kira", "kira-kira", "kiranya", "kita", "kitalah", "kok", "kurang", "lagi",
    "lagian", "lah", "lain", "lainnya", "lalu", "lama", "lamanya", "lanjut", "lanjutnya", "lebih",
    "lewat", "lima", "luar", "macam", "maka", "makanya", "makin", "malah", "malahan", "mampu",
    "mampukah", "mana", "manakala", "manalagi", "masa", "masalah", "masalahnya", "masih",
    "masihkah", "masing", "masing-masing", "mau", "maupun", "melainkan", "melakukan", "melalui",
    "melihat", "melihatnya", "memang", "memastikan", "memberi", "memberikan", "membuat",
    "memerlukan", "memihak", "meminta", "memintakan", "memisalkan", "memperbuat",
    "mempergunakan", "memperkirakan", "memperlihatkan", "mempersiapkan", "mempersoalkan",
    "mempertanyakan", "mempunyai", "memulai", "memungkinkan", "menaiki", "menambahkan",
    "menandaskan", "menanti", "menanti-nanti", "menantikan", "menanya", "menanyai", "menanyakan",
    "mendapat", "mendapatkan", "mendatang", "mendatangi", "mendatangkan", "menegaskan",
    "mengakhiri", "mengapa", "mengatakan", "mengatakannya", "mengenai", "mengerjakan",
    "mengetahui", "menggunakan", "menghendaki", "mengibaratkan", "mengibaratkannya", "mengingat",
    "mengingatkan", "menginginkan", "mengira", "mengucapkan", "mengucapkannya", "mengungkapkan",
    "menjadi", "menjawab", "menjelaskan", "menuju", "menunjuk", "menunjuki", "menunjukkan",
    "menunjuknya", "menurut", "menuturkan", "menyampaikan", "menyangkut", "menyatakan",
    "menyebutkan", "menyeluruh", "menyiapkan", "merasa", "mereka", "merekalah", "merupakan",
    "meski", "meskipun", "meyakini", "meyakinkan", "minta", "mirip", "misal", "misalkan",
    "misalnya", "mula", "mulai", "mulailah", "mulanya", "mungkin", "mungkinkah", "nah", "naik",
    "namun", "nanti", "nantinya", "nyaris", "nyatanya", "oleh", "olehnya", "pada", "padahal",
    "padanya", "pak", "paling", "panjang", "pantas", "para", "pasti", "pastilah", "penting",
    "pentingnya", "per", "percuma", "perlu", "perlukah", "perlunya", "pernah", "persoalan",
    "pertama", "pertama-tama", "pertanyaan", "pertanyakan", "pihak", "pihaknya", "pukul", "pula",
    "pun", "punya", "rasa", "rasanya", "rata", "rupanya", "saat", "saatnya", "saja", "sajalah",
    "saling", "sama", "sama-sama", "sambil", "sampai", "sampai-sampai", "sampaikan", "sana",
    "sangat", "sangatlah", "satu", "saya", "sayalah", "se", "sebab", "sebabnya", "sebagai",
    "sebagaimana", "sebagainya", "sebagian", "sebaik", "sebaik-baiknya", "sebaiknya",
    "sebaliknya", "sebanyak", "sebegini", "sebegitu", "sebelum", "sebelumnya", "sebenarnya",
    "seberapa", "sebesar", "sebetulnya", "sebisanya", "sebuah", "sebut", "sebutlah", "sebutnya",
    "secara", "secukupnya", "sedang", "sedangkan", "sedemikian", "sedikit", "sedikitnya",
    "seenaknya", "segala", "segalanya", "segera", "seharusnya", "sehingga", "seingat", "sejak",
    "sejauh", "sejenak", "sejumlah", "sekadar", "sekadarnya", "sekali", "sekali-kali",
    "sekalian", "sekaligus", "sekalipun", "sekarang", "sekecil", "seketika", "sekiranya",
    "sekitar", "sekitarnya", "sekurang-kurangnya", "sekurangnya", "sela", "selain", "selaku",
    "selalu", "selama", "selama-lamanya", "selamanya", "selanjutnya", "seluruh", "seluruhnya",
    "semacam", "semakin", "semampu", "semampunya", "semasa", "semasih", "semata", "semata-mata",
    "semaunya", "sementara", "semisal", "semisalnya", "sempat", "semua", "semuanya", "semula",
    "sendiri", "sendirian", "sendirinya", "seolah", "seolah-olah", "seorang", "sepanjang",
    "sepantasnya", "sepantasnyalah", "seperlunya", "seperti", "sepertinya", "sepihak", "sering",
    "seringnya", "serta", "serupa", "sesaat", "sesama", "sesampai", "sesegera", "sesekali",
    "seseorang", "sesuatu", "sesuatunya", "sesudah", "sesudahnya", "setelah", "setempat",
    "setengah", "seterusnya", "setiap", "setiba", "setibanya", "setidak-tidaknya", "setidaknya",
    "setinggi", "seusai", "sewaktu", "siap", "siapa", "siapakah", "siapapun", "sini", "sinilah",
    "soal", "soalnya", "suatu", "sudah", "sudahkah", "sudahlah", "supaya", "tadi", "tadinya",
    "tahu", "tahun", "tak", "tambah", "tambahnya", "tampak", "tampaknya", "tandas", "tandasnya",
    "tanpa", "tanya", "tanyakan", "tanyanya", "tapi", "tegas", "tegasnya", "telah", "tempat",
    "tengah", "tentang", "tentu", "tentulah", "tentunya", "tepat", "terakhir", "terasa",
    "terbanyak", "terdahulu", "terdapat", "terdiri", "terhadap", "terhadapnya", "teringat",
    "teringat-ingat", "terjadi", "terjadilah", "terjadinya", "terkira", "terlalu", "terlebih",
    "terlihat", "termasuk", "ternyata", "tersampaikan", "tersebut", "tersebutlah", "tertentu",
    "tertuju", "terus", "terutama", "tetap", "tetapi", "tiap", "tiba", "tiba-tiba", "tidak",
    "tidakkah", "tidaklah", "tiga", "tinggi", "toh", "tunjuk", "turut", "tutur", "tuturnya",
    "ucap", "ucapnya", "ujar", "ujarnya", "umum", "umumnya", "ungkap", "ungkapnya", "untuk",
    "usah", "usai", "waduh", "wah", "wahai", "waktu", "waktunya", "walau", "walaupun", "wong",
    "yaitu", "yakin", "yakni", "yang",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_normalise_full_pipeline() {
        let normaliser = TextNormaliser::default();
        let out = normaliser
            .normalise("Dijual RUMAH di Pakuwon City, 3 kamar tidur!! Lokasi strategis.")
            .unwrap();
        assert_eq!(out, "passage: jual rumah pakuwon city kamar tidur lokasi strategis");
    }

    #[test]
    fn test_digits_and_punctuation_removed() {
        let normaliser = TextNormaliser::default();
        assert_eq!(normaliser.clean("LT120/LB138"), "lt lb");
        assert_eq!(normaliser.clean("   rumah\t\nmewah   "), "rumah mewah");
    }

    #[test]
    fn test_stopwords_dropped_before_stemming() {
        let normaliser = TextNormaliser::default();
        assert_eq!(normaliser.clean("yang dan rumahnya"), "rumah");
    }

    #[test]
    fn test_empty_description_is_embedding_error() {
        let normaliser = TextNormaliser::default();
        for text in ["", "   \n\t "] {
            match normaliser.normalise(text) {
                Err(PropFusionError::Embedding { source_name, .. }) => assert_eq!(source_name, "text"),
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[test]
    fn test_only_stopwords_still_prefixed() {
        let normaliser = TextNormaliser::new("query: ");
        assert_eq!(normaliser.normalise("yang dan 123").unwrap(), "query: ");
    }

    #[test]
    fn test_stopwords_from_file() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "# custom list\nrumah\n\nMEWAH").unwrap();
        let normaliser = TextNormaliser::default()
            .with_stopwords_file(f.path())
            .unwrap();
        assert_eq!(normaliser.clean("rumah mewah yang luas"), "yang luas");
    }

    #[test]
    fn test_missing_stopwords_file() {
        let result = TextNormaliser::default().with_stopwords_file(Path::new("/nonexistent/stop.txt"));
        assert!(matches!(result, Err(PropFusionError::Config(_))));
    }

    #[test]
    fn test_custom_stemmer() {
        struct Upper;
        impl Stemmer for Upper {
            fn stem(&self, word: &str) -> String {
                word.to_uppercase()
            }
        }
        let normaliser = TextNormaliser::default().with_stemmer(Box::new(Upper));
        assert_eq!(normaliser.clean("rumah baru"), "RUMAH");
    }

    #[test]
    fn test_listing_description_stems_to_roots() {
        let normaliser = TextNormaliser::default();
        assert_eq!(
            normaliser.clean("Perumahan asri, perabotannya lengkap, pemandangan indah"),
            "rumah asri perabot lengkap pandang indah"
        );
    }

    #[test]
    fn test_from_config_loads_word_files() {
        let mut stopwords = NamedTempFile::new().unwrap();
        writeln!(stopwords, "asri").unwrap();
        let mut roots = NamedTempFile::new().unwrap();
        writeln!(roots, "umah").unwrap();
        let config = TextEncoderConfig {
            passage_prefix: "query: ".to_string(),
            stopwords_path: Some(stopwords.path().to_path_buf()),
            root_words_path: Some(roots.path().to_path_buf()),
            ..TextEncoderConfig::default()
        };
        let normaliser = TextNormaliser::from_config(&config).unwrap();
        assert_eq!(
            normaliser.normalise("perumahan asri").unwrap(),
            "query: umah"
        );
    }

    #[test]
    fn test_from_config_missing_root_words() {
        let config = TextEncoderConfig {
            root_words_path: Some(std::path::PathBuf::from("/nonexistent/kata-dasar.txt")),
            ..TextEncoderConfig::default()
        };
        assert!(matches!(
            TextNormaliser::from_config(&config),
            Err(PropFusionError::Config(_))
        ));
    }
}
