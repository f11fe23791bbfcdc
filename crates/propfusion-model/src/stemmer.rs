//! Dictionary-backed Indonesian stemming.
//!
//! [`IndonesianStemmer`] implements enhanced confix stripping: inflectional
//! particles (`-lah`, `-kah`, `-tah`, `-pun`), possessive pronouns (`-ku`,
//! `-mu`, `-nya`) and derivational suffixes are removed, then up to three
//! rounds of prefix disambiguation are tried. Every candidate is checked
//! against a [`RootDictionary`]; a word whose stripped form is never found is
//! returned unchanged.
//!
//! Words matching a confix pattern (`be-lah`, `be-an`, `me-i`, `di-i`,
//! `pe-i`, `ter-i`) try prefixes before suffixes. When neither order reaches
//! a root, the removed suffixes are restored one by one and prefix stripping
//! is retried on each intermediate form.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use propfusion_core::Result;
use regex::{Captures, Regex};

use crate::text_normalise::read_word_list;

/// Reduces an inflected word to its root form.
pub trait Stemmer: Send + Sync {
    fn stem(&self, word: &str) -> String;
}

// ---------------------------------------------------------------------------
// Root dictionary
// ---------------------------------------------------------------------------

/// Set of known Indonesian root words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootDictionary {
    words: HashSet<String>,
}

impl Default for RootDictionary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RootDictionary {
    /// The bundled root list: common verbs plus property-listing vocabulary.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_words(BUILTIN_ROOT_WORDS.iter().copied())
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words.into_iter().map(|w| w.as_ref().to_lowercase()).collect(),
        }
    }

    /// Read a root list, one word per line (e.g. a full `kata-dasar.txt`).
    ///
    /// # Errors
    ///
    /// Returns [`propfusion_core::PropFusionError::Config`] if the file cannot
    /// be read.
    pub fn from_file(path: &Path) -> Result<Self> {
        let words = read_word_list(path, "root-word dictionary")?;
        Ok(Self { words })
    }

    #[must_use]
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Affix tables
// ---------------------------------------------------------------------------

const PARTICLES: &[&str] = &["lah", "kah", "tah", "pun"];
const POSSESSIVES: &[&str] = &["nya", "ku", "mu"];
/// Longest first, so `-kan` wins over `-an` and `-isasi` over `-i`.
const DERIVATIONAL_SUFFIXES: &[&str] = &["isasi", "isme", "kan", "an", "is", "i"];
const PLAIN_PREFIXES: &[&str] = &["di", "ke", "se"];

/// Confix patterns whose prefix is removed before the suffix.
const PREFIX_FIRST: &[(&str, &str)] = &[
    ("be", "lah"),
    ("be", "an"),
    ("me", "i"),
    ("di", "i"),
    ("pe", "i"),
    ("ter", "i"),
];

#[derive(Debug, Clone, Copy)]
enum Guard {
    Always,
    /// Reject the match when this capture group starts with `er`.
    NotEr(usize),
    /// Map this exact word to a fixed root before trying the pattern.
    Exception(&'static str, &'static str),
}

/// `(pattern, replacement, guard)`.
type RuleSpec = (&'static str, &'static str, Guard);

/// Prefix disambiguation groups. Within a group the first candidate found in
/// the dictionary wins, otherwise the last rule that matched.
const PREFIX_RULES: &[&[RuleSpec]] = &[
    // ber-V, be-rV
    &[
        (r"^ber([aiueo].*)$", "${1}", Guard::Always),
        (r"^ber([aiueo].*)$", "r${1}", Guard::Always),
    ],
    // berCAP where C != r, P != er
    &[(r"^ber([bcdfghjklmnpqstvwxyz][a-z])(.*)$", "${1}${2}", Guard::NotEr(2))],
    // berCAerV
    &[(r"^ber([bcdfghjklmnpqstvwxyz][a-z]er[aiueo].*)$", "${1}", Guard::Always)],
    &[(r"^belajar$", "ajar", Guard::Always)],
    // beC1erC2 where C1 != r
    &[(r"^be([bcdfghjklmnpqstvwxyz]er[bcdfghjklmnpqrstvwxyz].*)$", "${1}", Guard::Always)],
    // ter-V, te-rV
    &[
        (r"^ter([aiueo].*)$", "${1}", Guard::Always),
        (r"^ter([aiueo].*)$", "r${1}", Guard::Always),
    ],
    &[(r"^ter([bcdfghjklmnpqstvwxyz]er[aiueo].*)$", "${1}", Guard::Always)],
    &[(r"^ter([bcdfghjklmnpqstvwxyz])(.*)$", "${1}${2}", Guard::NotEr(2))],
    &[(r"^te([bcdfghjklmnpqstvwxyz]er[bcdfghjklmnpqrstvwxyz].*)$", "${1}", Guard::Always)],
    // me-{l,r,w,y}V
    &[(r"^me([lrwy][aiueo].*)$", "${1}", Guard::Always)],
    &[(r"^mem([bfv].*)$", "${1}", Guard::Always)],
    &[(r"^mempe(.*)$", "pe${1}", Guard::Always)],
    &[
        (r"^mem([aiueo].*)$", "m${1}", Guard::Always),
        (r"^mem([aiueo].*)$", "p${1}", Guard::Always),
    ],
    &[(r"^men([cdjstz].*)$", "${1}", Guard::Always)],
    &[
        (r"^men([aiueo].*)$", "n${1}", Guard::Always),
        (r"^men([aiueo].*)$", "t${1}", Guard::Always),
    ],
    &[(r"^meng([ghqk].*)$", "${1}", Guard::Always)],
    &[
        (r"^meng([aiueo].*)$", "${1}", Guard::Always),
        (r"^meng([aiueo].*)$", "k${1}", Guard::Always),
        (r"^menge(.*)$", "${1}", Guard::Always),
        (r"^meng([aiueo].*)$", "ng${1}", Guard::Always),
    ],
    &[
        (r"^meny([aiueo].*)$", "ny${1}", Guard::Always),
        (r"^meny([aiueo].*)$", "s${1}", Guard::Always),
    ],
    // mempV where V != e
    &[(r"^memp([abcdfghijklmopqrstuvwxyz].*)$", "p${1}", Guard::Always)],
    &[(r"^pe([wy][aiueo].*)$", "${1}", Guard::Always)],
    // per-V, pe-rV
    &[
        (r"^per([aiueo].*)$", "${1}", Guard::Always),
        (r"^per([aiueo].*)$", "r${1}", Guard::Always),
    ],
    &[(r"^per([bcdfghjklmnpqstvwxyz][a-z])(.*)$", "${1}${2}", Guard::NotEr(2))],
    &[(r"^per([bcdfghjklmnpqstvwxyz][a-z]er[aiueo].*)$", "${1}", Guard::Always)],
    &[(r"^pem([bfv].*)$", "${1}", Guard::Always)],
    &[
        (r"^pem([aiueo].*)$", "m${1}", Guard::Always),
        (r"^pem([aiueo].*)$", "p${1}", Guard::Always),
    ],
    &[(r"^pen([cdjstz].*)$", "${1}", Guard::Always)],
    &[
        (r"^pen([aiueo].*)$", "n${1}", Guard::Always),
        (r"^pen([aiueo].*)$", "t${1}", Guard::Always),
    ],
    &[(r"^peng([bcdfghjklmnpqrstvwxyz].*)$", "${1}", Guard::Always)],
    &[
        (r"^peng([aiueo].*)$", "${1}", Guard::Always),
        (r"^peng([aiueo].*)$", "k${1}", Guard::Always),
        (r"^penge(.*)$", "${1}", Guard::Always),
    ],
    &[
        (r"^peny([aiueo].*)$", "ny${1}", Guard::Always),
        (r"^peny([aiueo].*)$", "s${1}", Guard::Always),
    ],
    &[(r"^pe(l[aiueo].*)$", "${1}", Guard::Exception("pelajar", "ajar"))],
    // peCP where C not in {r, w, y, l, m, n}, P != er
    &[(r"^pe([bcdfghjkpqstvxz])(.*)$", "${1}${2}", Guard::NotEr(2))],
    &[(r"^ter([bcdfghjkpqstvxz]er[bcdfghjklmnpqrstvwxyz].*)$", "${1}", Guard::Always)],
    &[(r"^pe([bcdfghjkpqstvxz]er[bcdfghjklmnpqrstvwxyz].*)$", "${1}", Guard::Always)],
    // Infixes -er-, -el-, -em-, -in-: keep, or drop.
    &[
        (r"^([bcdfghjklmnpqrstvwxyz])(er[aiueo].*)$", "${1}${2}", Guard::Always),
        (r"^([bcdfghjklmnpqrstvwxyz])er([aiueo].*)$", "${1}${2}", Guard::Always),
    ],
    &[
        (r"^([bcdfghjklmnpqrstvwxyz])(el[aiueo].*)$", "${1}${2}", Guard::Always),
        (r"^([bcdfghjklmnpqrstvwxyz])el([aiueo].*)$", "${1}${2}", Guard::Always),
    ],
    &[
        (r"^([bcdfghjklmnpqrstvwxyz])(em[aiueo].*)$", "${1}${2}", Guard::Always),
        (r"^([bcdfghjklmnpqrstvwxyz])em([aiueo].*)$", "${1}${2}", Guard::Always),
    ],
    &[
        (r"^([bcdfghjklmnpqrstvwxyz])(in[aiueo].*)$", "${1}${2}", Guard::Always),
        (r"^([bcdfghjklmnpqrstvwxyz])in([aiueo].*)$", "${1}${2}", Guard::Always),
    ],
    &[(r"^ku(.*)$", "${1}", Guard::Always)],
    &[(r"^kau(.*)$", "${1}", Guard::Always)],
];

struct PrefixRule {
    pattern: Regex,
    replacement: &'static str,
    guard: Guard,
}

impl PrefixRule {
    fn apply(&self, word: &str) -> Option<String> {
        if let Guard::Exception(from, to) = self.guard {
            if word == from {
                return Some(to.to_string());
            }
        }
        let caps: Captures<'_> = self.pattern.captures(word)?;
        if let Guard::NotEr(group) = self.guard {
            if caps.get(group).is_some_and(|m| m.as_str().starts_with("er")) {
                return None;
            }
        }
        let mut out = String::new();
        caps.expand(self.replacement, &mut out);
        Some(out)
    }
}

static COMPILED_RULES: LazyLock<Vec<Vec<PrefixRule>>> = LazyLock::new(|| {
    PREFIX_RULES
        .iter()
        .map(|group| {
            group
                .iter()
                .map(|(pattern, replacement, guard)| PrefixRule {
                    pattern: Regex::new(pattern).expect("prefix rule regex"),
                    replacement: *replacement,
                    guard: *guard,
                })
                .collect()
        })
        .collect()
});

static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9 -]").expect("non-word regex"));

// ---------------------------------------------------------------------------
// Stemming context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Affix {
    Particle,
    Possessive,
    Suffix(&'static str),
    Prefix,
}

#[derive(Debug, Clone)]
struct Removal {
    subject: String,
    result: String,
    affix: Affix,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    SkipShortWord,
    Particle,
    Possessive,
    DerivationalSuffix,
    PlainPrefix,
    Disambiguate(usize),
}

const SUFFIX_STEPS: &[Step] = &[Step::Particle, Step::Possessive, Step::DerivationalSuffix];

struct Context<'a> {
    dictionary: &'a RootDictionary,
    original: String,
    current: String,
    removals: Vec<Removal>,
    stopped: bool,
}

impl<'a> Context<'a> {
    fn new(dictionary: &'a RootDictionary, word: &str) -> Self {
        Self {
            dictionary,
            original: word.to_string(),
            current: word.to_string(),
            removals: Vec::new(),
            stopped: false,
        }
    }

    fn found(&self) -> bool {
        self.dictionary.contains(&self.current)
    }

    fn execute(mut self) -> String {
        self.run();
        if self.found() {
            self.current
        } else {
            self.original
        }
    }

    fn run(&mut self) {
        if self.found() {
            return;
        }
        self.accept_all(&[Step::SkipShortWord]);
        if self.found() {
            return;
        }

        if prefix_first(&self.original) {
            self.remove_prefixes();
            if self.found() {
                return;
            }
            self.accept_all(SUFFIX_STEPS);
            if self.found() {
                return;
            }
            self.current = self.original.clone();
            self.removals.clear();
        }

        self.accept_all(SUFFIX_STEPS);
        if self.found() {
            return;
        }
        self.remove_prefixes();
        if self.found() {
            return;
        }
        self.restore_suffixes();
    }

    fn accept_all(&mut self, steps: &[Step]) {
        for step in steps {
            self.accept(*step);
            if self.found() || self.stopped {
                return;
            }
        }
    }

    /// One prefix round: stops at the first step that removes something.
    fn accept_prefix_round(&mut self) {
        let before = self.removals.len();
        let steps = std::iter::once(Step::PlainPrefix)
            .chain((0..COMPILED_RULES.len()).map(Step::Disambiguate));
        for step in steps {
            self.accept(step);
            if self.found() || self.stopped || self.removals.len() > before {
                return;
            }
        }
    }

    fn remove_prefixes(&mut self) {
        for _ in 0..3 {
            self.accept_prefix_round();
            if self.found() {
                return;
            }
        }
    }

    fn accept(&mut self, step: Step) {
        match step {
            Step::SkipShortWord => {
                if self.current.chars().count() <= 3 {
                    self.stopped = true;
                }
            }
            Step::Particle => {
                if let Some(rest) = strip_any_suffix(&self.current, PARTICLES) {
                    let rest = rest.0.trim_end_matches('-').to_string();
                    self.record(rest, Affix::Particle);
                }
            }
            Step::Possessive => {
                if let Some(rest) = strip_any_suffix(&self.current, POSSESSIVES) {
                    let rest = rest.0.trim_end_matches('-').to_string();
                    self.record(rest, Affix::Possessive);
                }
            }
            Step::DerivationalSuffix => {
                if let Some((rest, suffix)) = strip_any_suffix(&self.current, DERIVATIONAL_SUFFIXES) {
                    let rest = rest.to_string();
                    self.record(rest, Affix::Suffix(suffix));
                }
            }
            Step::PlainPrefix => {
                if let Some(rest) = PLAIN_PREFIXES
                    .iter()
                    .find_map(|p| self.current.strip_prefix(p))
                {
                    let rest = rest.to_string();
                    self.record(rest, Affix::Prefix);
                }
            }
            Step::Disambiguate(group) => {
                let mut result = None;
                for rule in &COMPILED_RULES[group] {
                    result = rule.apply(&self.current);
                    if result.as_deref().is_some_and(|r| self.dictionary.contains(r)) {
                        break;
                    }
                }
                if let Some(result) = result {
                    self.record(result, Affix::Prefix);
                }
            }
        }
    }

    fn record(&mut self, result: String, affix: Affix) {
        self.removals.push(Removal {
            subject: std::mem::replace(&mut self.current, result.clone()),
            result,
            affix,
        });
    }

    /// Go back to the word before any prefix was removed.
    fn restore_prefix(&mut self) {
        if let Some(first) = self.removals.iter().find(|r| r.affix == Affix::Prefix) {
            self.current = first.subject.clone();
        }
        self.removals.retain(|r| r.affix != Affix::Prefix);
    }

    /// Put suffixes back one at a time, retrying prefix removal on each form.
    fn restore_suffixes(&mut self) {
        self.restore_prefix();
        let removals = self.removals.clone();
        let current = self.current.clone();

        for removal in removals.iter().rev() {
            if removal.affix == Affix::Prefix {
                continue;
            }
            if removal.affix == Affix::Suffix("kan") {
                self.current = format!("{}k", removal.result);
                self.remove_prefixes();
                if self.found() {
                    return;
                }
                self.current = format!("{}kan", removal.result);
            } else {
                self.current = removal.subject.clone();
            }
            self.remove_prefixes();
            if self.found() {
                return;
            }
            self.removals = removals.clone();
            self.current = current.clone();
        }
    }
}

fn strip_any_suffix<'w>(
    word: &'w str,
    suffixes: &[&'static str],
) -> Option<(&'w str, &'static str)> {
    suffixes
        .iter()
        .find_map(|s| word.strip_suffix(s).map(|rest| (rest, *s)))
}

fn prefix_first(word: &str) -> bool {
    PREFIX_FIRST.iter().any(|(prefix, suffix)| {
        word.len() >= prefix.len() + suffix.len()
            && word.starts_with(prefix)
            && word.ends_with(suffix)
    })
}

// ---------------------------------------------------------------------------
// Stemmer
// ---------------------------------------------------------------------------

/// Enhanced confix stripping stemmer over a [`RootDictionary`].
///
/// ```
/// use propfusion_model::stemmer::{IndonesianStemmer, Stemmer};
///
/// let stemmer = IndonesianStemmer::default();
/// assert_eq!(stemmer.stem("perumahan"), "rumah");
/// assert_eq!(stemmer.stem("pembangunan"), "bangun");
/// ```
#[derive(Debug, Clone, Default)]
pub struct IndonesianStemmer {
    dictionary: RootDictionary,
}

impl IndonesianStemmer {
    #[must_use]
    pub fn new(dictionary: RootDictionary) -> Self {
        Self { dictionary }
    }

    fn stem_singular(&self, word: &str) -> String {
        Context::new(&self.dictionary, word).execute()
    }

    /// Reduplicated words (`rumah-rumah`) stem to a root only when both
    /// halves agree.
    fn stem_plural(&self, word: &str) -> String {
        let Some((first, second)) = word.rsplit_once('-') else {
            return word.to_string();
        };
        // `rumah-rumah-nya`: the enclitic stays with the second half.
        let (first, second) = match first.rsplit_once('-') {
            Some((head, tail)) if is_enclitic(second) => {
                (head.to_string(), format!("{tail}-{second}"))
            }
            _ => (first.to_string(), second.to_string()),
        };

        let root1 = self.stem_singular(&first);
        let mut root2 = self.stem_singular(&second);
        if !self.dictionary.contains(&second) && root2 == second {
            root2 = self.stem_singular(&format!("me{second}"));
        }
        if root1 == root2 {
            root1
        } else {
            word.to_string()
        }
    }
}

fn is_enclitic(part: &str) -> bool {
    PARTICLES.contains(&part) || POSSESSIVES.contains(&part)
}

/// Hyphenated, ignoring a single trailing `-nya`-style enclitic.
fn is_plural(word: &str) -> bool {
    match word.rsplit_once('-') {
        Some((head, tail)) if is_enclitic(tail) => head.contains('-'),
        Some(_) => true,
        None => false,
    }
}

impl Stemmer for IndonesianStemmer {
    fn stem(&self, word: &str) -> String {
        let lowered = word.to_lowercase();
        let cleaned = NON_WORD_RE.replace_all(&lowered, " ");
        cleaned
            .split_whitespace()
            .map(|w| {
                if is_plural(w) {
                    self.stem_plural(w)
                } else {
                    self.stem_singular(w)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Bundled roots. Deployments that need full coverage point
/// `text_encoder.root_words_path` at a complete root list.
const BUILTIN_ROOT_WORDS: &[&str] = &[
    // verbs
    "ajar", "ambil", "angkat", "antar", "atur", "baca", "bangun", "bantu", "bayar", "beli",
    "beri", "buat", "buka", "cari", "cat", "cicil", "cipta", "cuci", "dapat", "datang",
    "dengar", "diam", "duduk", "gambar", "ganti", "guna", "hadap", "hias", "hubung", "huni",
    "ikut", "isi", "jaga", "jamin", "jemur", "jual", "kembang", "kerja", "kirim", "kunjung",
    "lengkap", "letak", "lihat", "main", "makan", "masak", "masuk", "milik", "minat", "minum",
    "nikmat", "olah", "pakai", "pandang", "pasang", "pilih", "pindah", "pukul", "rancang", "rawat",
    "renang", "sapu", "sedia", "sewa", "simpan", "tanam", "tawar", "tempat", "tinggal", "tinjau",
    "tulis", "tumbuh", "tutup", "ubah", "unggul", "untung", "urus",
    // places and rooms
    "balkon", "bandara", "dapur", "daerah", "desa", "gang", "garasi", "gereja", "gudang", "halaman",
    "jalan", "kamar", "kampung", "kampus", "kantor", "kawasan", "klinik", "kolam", "kota", "lantai",
    "lingkung", "lokasi", "masjid", "pabrik", "pagar", "pantai", "pasar", "pintu", "ruang", "rumah",
    "sekolah", "stasiun", "sungai", "taman", "teras", "terminal", "toko", "tol", "wilayah",
    // building and furnishing
    "atap", "baja", "bata", "beton", "besi", "genteng", "granit", "jati", "jendela", "kaca",
    "kayu", "keramik", "kursi", "lemari", "marmer", "meja", "perabot", "plafon", "semen", "tangga",
    "tembok",
    // descriptors
    "aman", "asri", "bagus", "bebas", "bersih", "cantik", "cepat", "dingin", "elegan", "hijau",
    "indah", "jauh", "kering", "klasik", "kokoh", "lebar", "luas", "mandi", "megah", "mewah",
    "minimalis", "modern", "murah", "nyaman", "panjang", "rapi", "ramai", "sejuk", "sempit",
    "siap", "strategis", "tenang", "tidur", "tropis",
    // people, money, paperwork
    "anak", "bank", "biaya", "harga", "hak", "izin", "jarak", "keluarga", "kredit", "listrik",
    "nego", "pajak", "sertifikat", "surat", "tamu", "tanah", "tunai", "uang", "usaha",
    // directions
    "barat", "selatan", "timur", "utara",
];
