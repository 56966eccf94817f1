//! Presentation of estimation results
//!
//! One result type, several renderings: the five-line plain text report,
//! a JSON envelope, and a per-token debug trace.

use anyhow::Result;
use serde::Serialize;

use crate::estimator::{EntropyEstimate, TokenSurprisal};
use crate::heuristic::WordFrequencyAnalysis;

/// An estimate together with the text it describes
#[derive(Debug, Clone)]
pub struct Report<'a> {
    pub text: &'a str,
    pub method: &'a str,
    pub estimate: EntropyEstimate,
    /// "Total tokens" as reported; derived from the estimate unless overridden
    pub token_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EstimateJson<'a> {
    total_bits: f64,
    avg_bits: f64,
    token_count: usize,
    character_count: usize,
    method: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WordFrequencyJson<'a> {
    word_count: usize,
    sentence_count: usize,
    unique_words: usize,
    entropy_score: f64,
    text: &'a str,
}

#[derive(Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    analysis: T,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    success: bool,
    error: &'a str,
}

impl<'a> Report<'a> {
    pub fn new(text: &'a str, method: &'a str, estimate: EntropyEstimate) -> Self {
        Self {
            text,
            method,
            estimate,
            token_count: estimate.token_count(),
        }
    }

    /// Report a counted number of units instead of the derived one
    pub fn with_token_count(mut self, token_count: usize) -> Self {
        self.token_count = token_count;
        self
    }

    /// Number of Unicode scalar values in the text
    pub fn character_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Plain text report
    ///
    /// ```text
    /// <text>
    /// Character count: 12
    /// Total tokens: 4
    /// Total bits: 5.00
    /// Bits per token: 1.25
    /// ```
    pub fn render_text(&self) -> String {
        format!(
            "{}\nCharacter count: {}\nTotal tokens: {}\nTotal bits: {:.2}\nBits per token: {:.2}",
            self.text,
            self.character_count(),
            self.token_count,
            self.estimate.total_bits,
            self.estimate.avg_bits_per_token
        )
    }

    /// `{"success": true, "analysis": {...}}` with camelCase fields
    pub fn render_json(&self) -> Result<String> {
        let envelope = Envelope {
            success: true,
            analysis: EstimateJson {
                total_bits: self.estimate.total_bits,
                avg_bits: self.estimate.avg_bits_per_token,
                token_count: self.token_count,
                character_count: self.character_count(),
                method: self.method,
                text: self.text,
            },
        };
        Ok(serde_json::to_string_pretty(&envelope)?)
    }
}

/// Plain text report for the word-frequency heuristic
pub fn render_word_frequency_text(text: &str, analysis: &WordFrequencyAnalysis) -> String {
    format!(
        "Text: {}\nWord count: {}\nSentence count: {}\nUnique words: {}\nEntropy score: {:.2}",
        text,
        analysis.word_count,
        analysis.sentence_count,
        analysis.unique_words,
        analysis.entropy_score
    )
}

/// JSON report for the word-frequency heuristic
pub fn render_word_frequency_json(text: &str, analysis: &WordFrequencyAnalysis) -> Result<String> {
    let envelope = Envelope {
        success: true,
        analysis: WordFrequencyJson {
            word_count: analysis.word_count,
            sentence_count: analysis.sentence_count,
            unique_words: analysis.unique_words,
            entropy_score: analysis.entropy_score,
            text,
        },
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// `{"success": false, "error": "..."}`
pub fn render_error_json(message: &str) -> String {
    let envelope = ErrorEnvelope {
        success: false,
        error: message,
    };
    serde_json::to_string_pretty(&envelope)
        .unwrap_or_else(|_| format!("{{\"success\": false, \"error\": {message:?}}}"))
}

/// One debug line per scored position
pub fn format_trace_line(entry: &TokenSurprisal) -> String {
    format!(
        "[{:>4}] {:>16} p={:.6} bits={:.4}",
        entry.position,
        format!("\"{}\"", entry.token),
        entry.probability,
        entry.bits
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_text() {
        let estimate = EntropyEstimate::from_total(5.0, 4);
        let report = Report::new("The cat sat.", "model", estimate);
        assert_eq!(
            report.render_text(),
            "The cat sat.\nCharacter count: 12\nTotal tokens: 4\nTotal bits: 5.00\nBits per token: 1.25"
        );
    }

    #[test]
    fn test_render_text_zero_estimate() {
        let report = Report::new("a", "model", EntropyEstimate::ZERO);
        let text = report.render_text();
        assert!(text.contains("Total tokens: 0"));
        assert!(text.contains("Bits per token: 0.00"));
    }

    #[test]
    fn test_counted_tokens_override_derived() {
        let analysis = crate::heuristic::ShannonAnalysis::analyze("aaaa");
        assert_eq!(analysis.to_estimate().token_count(), 0);

        let report = Report::new("aaaa", "shannon", analysis.to_estimate())
            .with_token_count(analysis.total_words);
        assert!(report.render_text().contains("Total tokens: 1"));

        let value: serde_json::Value = serde_json::from_str(&report.render_json().unwrap()).unwrap();
        assert_eq!(value["analysis"]["tokenCount"], 1);
    }

    #[test]
    fn test_character_count_is_unicode_aware() {
        let report = Report::new("caf\u{e9}\u{2014}", "model", EntropyEstimate::ZERO);
        assert_eq!(report.character_count(), 5);
    }

    #[test]
    fn test_render_json_fields() {
        let estimate = EntropyEstimate::from_total(5.0, 4);
        let json = Report::new("The cat sat.", "model", estimate)
            .render_json()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["analysis"]["totalBits"], 5.0);
        assert_eq!(value["analysis"]["avgBits"], 1.25);
        assert_eq!(value["analysis"]["tokenCount"], 4);
        assert_eq!(value["analysis"]["characterCount"], 12);
        assert_eq!(value["analysis"]["method"], "model");
        assert_eq!(value["analysis"]["text"], "The cat sat.");
    }

    #[test]
    fn test_word_frequency_renderers() {
        let analysis = WordFrequencyAnalysis::analyze("one two two");
        let text = render_word_frequency_text("one two two", &analysis);
        assert!(text.starts_with("Text: one two two\nWord count: 3\n"));
        assert!(text.contains("Unique words: 2"));

        let json = render_word_frequency_json("one two two", &analysis).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["analysis"]["wordCount"], 3);
        assert_eq!(value["analysis"]["sentenceCount"], 1);
    }

    #[test]
    fn test_error_json() {
        let value: serde_json::Value =
            serde_json::from_str(&render_error_json("No input text provided")).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "No input text provided");
    }

    #[test]
    fn test_trace_line() {
        let line = format_trace_line(&TokenSurprisal {
            position: 3,
            token_id: 7,
            token: " sat".to_string(),
            probability: 0.25,
            bits: 2.0,
        });
        assert!(line.starts_with("[   3]"));
        assert!(line.contains("\" sat\""));
        assert!(line.ends_with("p=0.250000 bits=2.0000"));
    }
}
