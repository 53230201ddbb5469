use unicode_normalization::char::canonical_combining_class;
use unicode_normalization::UnicodeNormalization;

/// Prefix of every cached file name, followed by the upper-cased term.
pub const FILE_PREFIX: &str = "MAPA MENTAL SOBRE ";

/// Strips diacritics and anything that is not an ASCII letter, digit or space.
///
/// Total and deterministic: the worst case is an empty string, which is still
/// used as a (degenerate) folder or file name.
pub fn sanitize(text: &str) -> String {
    let cleaned: String = text
        .nfkd()
        .filter(|c| canonical_combining_class(*c) == 0)
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect();

    cleaned.trim().to_string()
}

/// Folder holding every cached image for a term, e.g. `Sistema Nervoso` -> `sistema_nervoso`.
pub fn folder_name(term: &str) -> String {
    sanitize(term).to_lowercase().replace(' ', "_")
}

/// File name for the image at `index`, e.g. `MAPA MENTAL SOBRE BIOLOGIA - 3.jpg`.
pub fn file_name(term: &str, index: usize) -> String {
    format!("{}{} - {}.jpg", FILE_PREFIX, sanitize(term).to_uppercase(), index)
}

/// Deterministic on-disk identity of one search result: same term and index, same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub folder: String,
    pub file: String,
}

impl CacheKey {
    pub fn new(term: &str, index: usize) -> Self {
        Self {
            folder: folder_name(term),
            file: file_name(term, index),
        }
    }
}
