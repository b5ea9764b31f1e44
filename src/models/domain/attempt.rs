use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::domain::Quiz;

/// Raw submitted value for one question.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Choice(String),
    Choices(Vec<String>),
    Text(String),
}

/// Question id -> submitted value.
pub type SubmittedAnswers = HashMap<String, AnswerValue>;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Attempt {
    pub id: String,
    pub learner_id: String,
    pub quiz_id: String,
    pub course_id: String,
    // assigned when graded; the (learner, quiz, number) slot is unique
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_number: Option<i32>,
    pub answers: Vec<Answer>,
    pub score: Option<f64>,
    pub passed: Option<bool>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_spent_seconds: Option<i64>,
    #[serde(default)]
    pub exceeded_time_limit: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Answer {
    pub question_id: String,
    pub value: Option<AnswerValue>,
    pub is_correct: bool,
    pub points_earned: i32,
}

impl Attempt {
    pub fn open(learner_id: &str, quiz: &Quiz, started_at: DateTime<Utc>) -> Self {
        Attempt {
            id: Uuid::new_v4().to_string(),
            learner_id: learner_id.to_string(),
            quiz_id: quiz.id.clone(),
            course_id: quiz.course_id.clone(),
            attempt_number: None,
            answers: Vec::new(),
            score: None,
            passed: None,
            started_at,
            completed_at: None,
            time_spent_seconds: None,
            exceeded_time_limit: false,
        }
    }

    pub fn is_graded(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Score rounded to two decimals. Pass/fail is always decided on the raw score.
    pub fn display_score(&self) -> Option<f64> {
        self.score.map(round_for_display)
    }
}

pub fn round_for_display(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}
