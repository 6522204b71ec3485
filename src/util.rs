use lazy_regex::regex;
use serde::Serializer;

/// Lowercases and collapses whitespace so synonyms such as "2nd  Base." and
/// "2nd base" share one lookup key.
pub fn normalize_key(text: &str) -> String {
    let trimmed = text.trim().trim_end_matches('.').to_ascii_lowercase();
    regex!(r"[ \t\r\n]+").replace_all(&trimmed, " ").into_owned()
}

/// Splits a scraped "19 Collin Shaw" style name into its jersey number and
/// the name proper.
pub fn split_jersey_number(text: &str) -> (Option<u8>, String) {
    let text = text.trim();
    regex!(r"^([0-9]{1,2})[ \t]+(.+)$").captures(text).map_or_else(
        || (None, collapse_whitespace(text)),
        |caps| {
            let number = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let name = caps.get(2).map_or("", |m| m.as_str());
            (number, collapse_whitespace(name))
        },
    )
}

pub fn collapse_whitespace(text: &str) -> String {
    regex!(r"[ \t\r\n]+")
        .replace_all(text.trim(), " ")
        .into_owned()
}

/// Case-insensitive normalized Levenshtein similarity in `[0, 1]`.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Chadwick writes boolean flags as `T`/`F`.
#[allow(clippy::trivially_copy_pass_by_ref)]
pub fn serialize_flag<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_char(if *flag { 'T' } else { 'F' })
}
