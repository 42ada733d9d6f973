use std::fmt;

/// A US/Canada number in `+1XXXXXXXXXX` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedNumber(String);

impl NormalizedNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validates a US phone number, ignoring any formatting.
///
/// Every non-digit is dropped first, including a leading `+`. Ten digits get a `+1` country
/// code, eleven digits are accepted when they already start with `1`. Anything else is
/// rejected with `None`.
pub fn normalize(raw: &str) -> Option<NormalizedNumber> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    match digits.len() {
        10 => Some(NormalizedNumber(format!("+1{digits}"))),
        11 if digits.starts_with('1') => Some(NormalizedNumber(format!("+{digits}"))),
        _ => None,
    }
}
