// src/models/question.rs

use serde::{Deserialize, Serialize};

/// One multiple-choice item as served by the question bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub question_number: u32,

    /// The prompt text. Mapped from the backend field `question`.
    #[serde(rename = "question")]
    pub prompt: String,

    /// Option texts. The letter of an option is derived from its position (A, B, C, ...).
    pub options: Vec<String>,

    /// Letter of the correct option.
    pub correct_option: String,

    /// Optional illustration URL.
    #[serde(default)]
    pub img: Option<String>,
}

/// Returns the positional letter for an option index (0 => "A").
/// Only the 26 latin capitals are valid labels.
pub fn option_label(index: usize) -> Option<String> {
    if index < 26 {
        Some(char::from(b'A' + index as u8).to_string())
    } else {
        None
    }
}

impl Question {
    /// Options paired with their letters, in display order.
    pub fn labelled_options(&self) -> impl Iterator<Item = (String, &str)> {
        self.options
            .iter()
            .enumerate()
            .filter_map(|(i, text)| option_label(i).map(|label| (label, text.as_str())))
    }

    /// Whether `label` names one of this question's rendered options.
    pub fn has_option(&self, label: &str) -> bool {
        self.labelled_options().any(|(l, _)| l == label)
    }

    pub fn is_correct(&self, label: &str) -> bool {
        self.correct_option == label
    }
}

/// An option carrying an explicit identifier instead of relying on array position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelledOption {
    pub label: String,
    pub text: String,
}

/// DTO for sending a question to the client during a test (excludes the correct option).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: String,
    pub question_number: u32,
    pub prompt: String,
    pub img: Option<String>,
    pub options: Vec<LabelledOption>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            question_number: q.question_number,
            prompt: q.prompt.clone(),
            img: q.img.clone(),
            options: q
                .labelled_options()
                .map(|(label, text)| LabelledOption {
                    label,
                    text: text.to_string(),
                })
                .collect(),
        }
    }
}
