//! Tokenizer adapter: text to token ids and back
//!
//! The estimator only needs two things from a tokenizer: a deterministic
//! `encode` for scoring and a best-effort `decode` for diagnostics.
//! HuggingFace `tokenizers::Tokenizer` implements the adapter directly.

use tokenizers::Tokenizer;

use crate::error::TokenizationError;

/// Converts raw text into token ids from a fixed vocabulary
pub trait TokenizerAdapter {
    /// Encode text into token ids.
    ///
    /// Must accept any valid UTF-8, including the empty string (which may
    /// yield zero or one tokens depending on special tokens).
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizationError>;

    /// Display string for a single token id (diagnostics only, never fails)
    fn decode(&self, token_id: u32) -> String;
}

impl TokenizerAdapter for Tokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizationError> {
        let encoding = (**self)
            .encode(text, true)
            .map_err(|e| TokenizationError(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, token_id: u32) -> String {
        (**self)
            .decode(&[token_id], false)
            .unwrap_or_else(|_| format!("<{token_id}>"))
    }
}

impl<T: TokenizerAdapter + ?Sized> TokenizerAdapter for &T {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizationError> {
        (**self).encode(text)
    }

    fn decode(&self, token_id: u32) -> String {
        (**self).decode(token_id)
    }
}

impl<T: TokenizerAdapter + ?Sized> TokenizerAdapter for Box<T> {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizationError> {
        (**self).encode(text)
    }

    fn decode(&self, token_id: u32) -> String {
        (**self).decode(token_id)
    }
}

/// Escape control whitespace so a token prints on one line
pub fn format_token(token: &str) -> String {
    token
        .replace('\n', "\\n")
        .replace('\t', "\\t")
        .replace('\r', "\\r")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Chars;

    impl TokenizerAdapter for Chars {
        fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizationError> {
            Ok(text.chars().map(|c| c as u32).collect())
        }

        fn decode(&self, token_id: u32) -> String {
            char::from_u32(token_id).map_or_else(|| format!("<{token_id}>"), String::from)
        }
    }

    fn word_level() -> Tokenizer {
        r#"{
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": {"type": "Whitespace"},
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": {"[UNK]": 0, "the": 1, "cat": 2, "sat": 3},
                "unk_token": "[UNK]"
            }
        }"#
        .parse()
        .unwrap()
    }

    #[test]
    fn test_hf_tokenizer_encode() {
        let tokenizer = word_level();
        assert_eq!(
            TokenizerAdapter::encode(&tokenizer, "the cat sat").unwrap(),
            vec![1, 2, 3]
        );
        assert_eq!(
            TokenizerAdapter::encode(&tokenizer, "the dog").unwrap(),
            vec![1, 0]
        );
        assert!(TokenizerAdapter::encode(&tokenizer, "").unwrap().is_empty());
    }

    #[test]
    fn test_hf_tokenizer_decode() {
        let tokenizer = word_level();
        assert_eq!(TokenizerAdapter::decode(&tokenizer, 2), "cat");
        assert_eq!(TokenizerAdapter::decode(&tokenizer, 0), "[UNK]");
    }

    #[test]
    fn test_format_token() {
        assert_eq!(format_token("a\nb\tc\r"), "a\\nb\\tc\\r");
        assert_eq!(format_token(" cat"), " cat");
    }

    #[test]
    fn test_reference_and_box_forward() {
        let by_ref = &Chars;
        assert_eq!(by_ref.encode("ab").unwrap(), vec![97, 98]);

        let boxed: Box<dyn TokenizerAdapter> = Box::new(Chars);
        assert_eq!(boxed.decode(99), "c");
        assert!(boxed.encode("").unwrap().is_empty());
    }
}
