//! Ingestion of the fixed question bank consumed by the quiz orchestrator.

use std::{env, fs, path::PathBuf};

use anyhow::Context;
use thiserror::Error;
use tracing::info;

use crate::dao::models::QuestionContent;

/// Default location on disk where the server looks for the question bank.
const DEFAULT_BANK_PATH: &str = "config/questions.json";
/// Environment variable that overrides [`DEFAULT_BANK_PATH`].
const BANK_PATH_ENV: &str = "ECO_QUIZ_BACK_BANK_PATH";

/// Validation errors raised while ingesting bank records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BankError {
    /// A record has no question text.
    #[error("question {index} has empty text")]
    EmptyText {
        /// Position of the offending record in the bank file.
        index: usize,
    },
    /// A record offers fewer than two options.
    #[error("question {index} must offer at least two options (got {count})")]
    TooFewOptions {
        /// Position of the offending record in the bank file.
        index: usize,
        /// Number of options the record declared.
        count: usize,
    },
    /// A record does not flag exactly one option as correct.
    #[error("question {index} must flag exactly one correct option (got {count})")]
    CorrectCount {
        /// Position of the offending record in the bank file.
        index: usize,
        /// Number of options flagged correct.
        count: usize,
    },
}

/// Ordered, validated list of questions available for session sampling.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Vec<QuestionContent>,
}

impl QuestionBank {
    /// Load and validate the question bank from disk.
    pub fn load() -> anyhow::Result<Self> {
        let path = resolve_bank_path();
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("reading question bank at {}", path.display()))?;
        let records: Vec<QuestionContent> = serde_json::from_str(&contents)
            .with_context(|| format!("parsing question bank at {}", path.display()))?;
        let bank = Self::from_records(records)
            .with_context(|| format!("validating question bank at {}", path.display()))?;

        info!(path = %path.display(), count = bank.len(), "loaded question bank");
        Ok(bank)
    }

    /// Build a bank from already-parsed records, validating each one.
    pub fn from_records(records: Vec<QuestionContent>) -> Result<Self, BankError> {
        for (index, record) in records.iter().enumerate() {
            if record.text.trim().is_empty() {
                return Err(BankError::EmptyText { index });
            }
            if record.options.len() < 2 {
                return Err(BankError::TooFewOptions {
                    index,
                    count: record.options.len(),
                });
            }
            let correct = record
                .options
                .iter()
                .filter(|option| option.is_correct)
                .count();
            if correct != 1 {
                return Err(BankError::CorrectCount {
                    index,
                    count: correct,
                });
            }
        }

        Ok(Self { questions: records })
    }

    /// Ordered list of bank questions.
    pub fn questions(&self) -> &[QuestionContent] {
        &self.questions
    }

    /// Number of questions in the bank.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the bank holds no questions.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Resolve the bank path taking the environment override into account.
fn resolve_bank_path() -> PathBuf {
    env::var_os(BANK_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BANK_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::AnswerOption;

    fn option(text: &str, correct: bool) -> AnswerOption {
        AnswerOption {
            text: text.to_string(),
            is_correct: correct,
            explanation: None,
        }
    }

    fn record(text: &str, options: Vec<AnswerOption>) -> QuestionContent {
        QuestionContent {
            text: text.to_string(),
            image_url: None,
            options,
        }
    }

    #[test]
    fn accepts_valid_records() {
        let bank = QuestionBank::from_records(vec![record(
            "Quelle est la capitale de la France ?",
            vec![option("Paris", true), option("Lyon", false)],
        )])
        .unwrap();
        assert_eq!(bank.len(), 1);
        assert_eq!(bank.questions()[0].correct_index(), Some(0));
    }

    #[test]
    fn rejects_empty_text() {
        let err = QuestionBank::from_records(vec![record(
            "  ",
            vec![option("A", true), option("B", false)],
        )])
        .unwrap_err();
        assert_eq!(err, BankError::EmptyText { index: 0 });
    }

    #[test]
    fn rejects_single_option() {
        let err =
            QuestionBank::from_records(vec![record("Question ?", vec![option("A", true)])])
                .unwrap_err();
        assert_eq!(err, BankError::TooFewOptions { index: 0, count: 1 });
    }

    #[test]
    fn rejects_zero_or_multiple_correct_options() {
        let none = QuestionBank::from_records(vec![record(
            "Question ?",
            vec![option("A", false), option("B", false)],
        )])
        .unwrap_err();
        assert_eq!(none, BankError::CorrectCount { index: 0, count: 0 });

        let two = QuestionBank::from_records(vec![record(
            "Question ?",
            vec![option("A", true), option("B", true)],
        )])
        .unwrap_err();
        assert_eq!(two, BankError::CorrectCount { index: 0, count: 2 });
    }

    #[test]
    fn parses_bank_json_shape() {
        let json = r#"[
            {
                "text": "Quelle est la durée de décomposition d'un sac plastique ?",
                "imageUrl": "https://example.org/plastique.jpg",
                "options": [
                    { "text": "Environ 5 ans" },
                    { "text": "Environ 400 ans", "isCorrect": true, "explanation": "Entre 400 et 1000 ans." }
                ]
            }
        ]"#;
        let records: Vec<QuestionContent> = serde_json::from_str(json).unwrap();
        let bank = QuestionBank::from_records(records).unwrap();
        assert_eq!(bank.len(), 1);
        let question = &bank.questions()[0];
        assert_eq!(question.correct_index(), Some(1));
        assert!(question.image_url.is_some());
        assert_eq!(
            question.correct_option().unwrap().explanation.as_deref(),
            Some("Entre 400 et 1000 ans.")
        );
    }
}
