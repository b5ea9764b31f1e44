use std::collections::BTreeSet;

use crate::models::domain::{Answer, AnswerValue, Question, QuestionType, Quiz, SubmittedAnswers};

#[derive(Clone, Debug, PartialEq)]
pub struct GradingResult {
    pub score: f64, // unrounded percent
    pub passed: bool,
    pub points_earned: i64,
    pub total_points: i64,
    pub per_question: Vec<Answer>,
}

/// Grade a submission against a quiz definition.
///
/// Every question in the quiz gets exactly one entry in `per_question`, in
/// quiz order. Answers for unknown questions are ignored; answers naming
/// unknown options, or of the wrong shape for their question, count as
/// unanswered.
pub fn grade(quiz: &Quiz, answers: &SubmittedAnswers) -> GradingResult {
    let mut points_earned: i64 = 0;
    let mut per_question = Vec::with_capacity(quiz.questions.len());

    for question in &quiz.questions {
        let value = answers
            .get(&question.id)
            .and_then(|submitted| sanitize(question, submitted));

        let is_correct = value
            .as_ref()
            .map(|v| is_correct(question, v))
            .unwrap_or(false);
        let points = if is_correct { question.points } else { 0 };
        points_earned += points as i64;

        per_question.push(Answer {
            question_id: question.id.clone(),
            value,
            is_correct,
            points_earned: points,
        });
    }

    let total_points = quiz.total_points();
    let score = score_percent(points_earned, total_points);

    GradingResult {
        score,
        passed: score >= quiz.passing_score as f64,
        points_earned,
        total_points,
        per_question,
    }
}

pub fn score_percent(points_earned: i64, total_points: i64) -> f64 {
    if total_points <= 0 {
        return 0.0;
    }
    (points_earned as f64 / total_points as f64) * 100.0
}

/// Drop answers that do not fit the question so they are graded as unanswered.
fn sanitize(question: &Question, submitted: &AnswerValue) -> Option<AnswerValue> {
    match (question.question_type, submitted) {
        (QuestionType::ShortAnswer, AnswerValue::Text(text)) if !text.trim().is_empty() => {
            Some(submitted.clone())
        }
        (QuestionType::ShortAnswer, _) => None,
        (_, AnswerValue::Text(_)) => None,
        (_, AnswerValue::Choice(id)) if question.has_option(id) => Some(submitted.clone()),
        (_, AnswerValue::Choice(_)) => None,
        (_, AnswerValue::Choices(ids)) => {
            if ids.is_empty() || !ids.iter().all(|id| question.has_option(id)) {
                None
            } else {
                Some(submitted.clone())
            }
        }
    }
}

fn selected_ids(value: &AnswerValue) -> BTreeSet<&str> {
    match value {
        AnswerValue::Choice(id) => BTreeSet::from([id.as_str()]),
        AnswerValue::Choices(ids) => ids.iter().map(String::as_str).collect(),
        AnswerValue::Text(_) => BTreeSet::new(),
    }
}

fn is_correct(question: &Question, value: &AnswerValue) -> bool {
    let correct: BTreeSet<&str> = question.correct_option_ids().collect();

    match question.question_type {
        QuestionType::SingleChoice | QuestionType::TrueFalse => {
            let selected = selected_ids(value);
            correct.len() == 1 && selected == correct
        }
        // all-or-nothing: no partial credit
        QuestionType::MultipleChoice => !correct.is_empty() && selected_ids(value) == correct,
        QuestionType::ShortAnswer => match (value, question.canonical_answer()) {
            (AnswerValue::Text(text), Some(canonical)) => {
                normalize(text) == normalize(canonical)
            }
            _ => false,
        },
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
