// src/session/review.rs

use std::collections::HashMap;

use serde::Serialize;

use crate::models::question::Question;

/// Question id -> selected option letter.
pub type AnswerMap = HashMap<String, String>;

/// Number of questions whose recorded answer equals the correct option.
/// Unanswered questions count as incorrect.
pub fn count_correct(questions: &[Question], answers: &AnswerMap) -> u32 {
    questions
        .iter()
        .filter(|q| answers.get(&q.id).is_some_and(|a| q.is_correct(a)))
        .count() as u32
}

/// Feedback state of a single option on the review screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionMark {
    SelectedCorrect,
    SelectedIncorrect,
    CorrectNotSelected,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionReview {
    pub label: String,
    pub text: String,
    pub mark: OptionMark,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionReview {
    pub id: String,
    /// 1-based display position.
    pub position: usize,
    pub prompt: String,
    pub img: Option<String>,
    pub selected: Option<String>,
    pub correct_option: String,
    pub is_correct: bool,
    pub options: Vec<OptionReview>,
}

pub fn build_review(questions: &[Question], answers: &AnswerMap) -> Vec<QuestionReview> {
    questions
        .iter()
        .enumerate()
        .map(|(index, q)| {
            let selected = answers.get(&q.id).cloned();
            let is_correct = selected.as_deref().is_some_and(|s| q.is_correct(s));

            let options = q
                .labelled_options()
                .map(|(label, text)| {
                    let is_selected = selected.as_deref() == Some(label.as_str());
                    let mark = match (is_selected, q.is_correct(&label)) {
                        (true, true) => OptionMark::SelectedCorrect,
                        (true, false) => OptionMark::SelectedIncorrect,
                        (false, true) => OptionMark::CorrectNotSelected,
                        (false, false) => OptionMark::Neutral,
                    };
                    OptionReview {
                        label,
                        text: text.to_string(),
                        mark,
                    }
                })
                .collect();

            QuestionReview {
                id: q.id.clone(),
                position: index + 1,
                prompt: q.prompt.clone(),
                img: q.img.clone(),
                selected,
                correct_option: q.correct_option.clone(),
                is_correct,
                options,
            }
        })
        .collect()
}
