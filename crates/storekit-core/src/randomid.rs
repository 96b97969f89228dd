//! # Random Identifiers
//!
//! Short random strings for tokens, slugs and test data.

use rand::seq::SliceRandom;

/// Default alphabet: ASCII letters and digits.
pub const CHARSET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates `length` characters drawn uniformly from `charset`.
///
/// An empty charset yields an empty string.
pub fn string_n_with_charset(length: usize, charset: &str) -> String {
    let alphabet: Vec<char> = charset.chars().collect();
    let mut rng = rand::thread_rng();

    (0..length)
        .filter_map(|_| alphabet.choose(&mut rng).copied())
        .collect()
}

/// Generates `length` alphanumeric characters.
///
/// ## Example
/// ```rust
/// let id = storekit_core::randomid::string_n(12);
/// assert_eq!(id.len(), 12);
/// ```
pub fn string_n(length: usize) -> String {
    string_n_with_charset(length, CHARSET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_and_alphabet() {
        let id = string_n(64);
        assert_eq!(id.chars().count(), 64);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_custom_charset() {
        let id = string_n_with_charset(32, "xé");
        assert_eq!(id.chars().count(), 32);
        assert!(id.chars().all(|c| c == 'x' || c == 'é'));
    }

    #[test]
    fn test_empty_charset() {
        assert_eq!(string_n_with_charset(8, ""), "");
    }
}
