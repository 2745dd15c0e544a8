use serde::{Deserialize, Deserializer, de::Error};

/// Collapses every run of whitespace into a single space and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Largest amount accepted from a document. Position changes are signed, so
/// every amount must also fit in an `i64`.
pub const MAX_AMOUNT: u64 = i64::MAX as u64;

/// Parses a non-negative integer amount as written in 13F documents.
///
/// Filers occasionally use thousands separators or a trailing `.00`; both are
/// accepted. Anything else (negative numbers, fractions, text, amounts above
/// [`MAX_AMOUNT`]) yields `None`.
pub fn parse_amount(text: &str) -> Option<u64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    let integral = match cleaned.split_once('.') {
        Some((whole, fraction)) if fraction.chars().all(|c| c == '0') => whole,
        Some(_) => return None,
        None => cleaned.as_str(),
    };
    if integral.is_empty() {
        return None;
    }
    integral.parse::<u64>().ok().filter(|amount| *amount <= MAX_AMOUNT)
}

/// Deserializes a CIK that may be written as a JSON number or a string.
pub fn deserialize_cik_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        Text(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse::<u64>().map_err(Error::custom),
    }
}
