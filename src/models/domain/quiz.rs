use async_graphql::{Enum, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

pub const MAX_QUESTION_POINTS: i32 = 1000;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, SimpleObject)]
pub struct Quiz {
    pub id: String,
    pub course_id: String,
    pub lesson_id: Option<String>, // lesson this quiz gates, if any
    pub title: String,
    pub questions: Vec<Question>,
    pub passing_score: i32, // percent, 0-100
    pub max_attempts: Option<i32>,
    pub time_limit_minutes: Option<i32>,
    pub shuffle_questions: bool,
    pub show_correct_answers: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, SimpleObject)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub question_type: QuestionType,
    pub points: i32,
    pub options: Vec<QuestionOption>,
    pub explanation: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, SimpleObject)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Enum, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    ShortAnswer, // canonical text lives in the single option
}

impl Quiz {
    pub fn new(course_id: &str, title: &str, passing_score: i32) -> Self {
        let now = Utc::now();
        Quiz {
            id: Uuid::new_v4().to_string(),
            course_id: course_id.to_string(),
            lesson_id: None,
            title: title.to_string(),
            questions: Vec::new(),
            passing_score,
            max_attempts: None,
            time_limit_minutes: None,
            shuffle_questions: false,
            show_correct_answers: false,
            created_at: Some(now),
            modified_at: Some(now),
        }
    }

    pub fn total_points(&self) -> i64 {
        self.questions.iter().map(|q| q.points as i64).sum()
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Rejects definitions that could never be answered correctly.
    ///
    /// Grading stays total over malformed quizzes; this check runs only when a
    /// definition is saved.
    pub fn validate_definition(&self) -> AppResult<()> {
        let mut problems = Vec::new();

        if !(0..=100).contains(&self.passing_score) {
            problems.push(format!(
                "passing score {} must be between 0 and 100",
                self.passing_score
            ));
        }
        if matches!(self.max_attempts, Some(n) if n < 1) {
            problems.push("max attempts must be a positive number".to_string());
        }
        if matches!(self.time_limit_minutes, Some(n) if n < 1) {
            problems.push("time limit must be a positive number of minutes".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for question in &self.questions {
            if !seen.insert(question.id.as_str()) {
                problems.push(format!("question id '{}' is used twice", question.id));
            }
            if let Err(problem) = question.check_shape() {
                problems.push(format!("question '{}': {}", question.id, problem));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationError(problems.join("; ")))
        }
    }
}

impl Question {
    pub fn correct_option_ids(&self) -> impl Iterator<Item = &str> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id.as_str())
    }

    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }

    /// Text a short-answer response is matched against.
    pub fn canonical_answer(&self) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.is_correct)
            .or_else(|| self.options.first())
            .map(|o| o.text.as_str())
    }

    fn check_shape(&self) -> Result<(), String> {
        if !(1..=MAX_QUESTION_POINTS).contains(&self.points) {
            return Err(format!(
                "points must be between 1 and {}, got {}",
                MAX_QUESTION_POINTS, self.points
            ));
        }

        let correct = self.correct_option_ids().count();
        match self.question_type {
            QuestionType::SingleChoice | QuestionType::TrueFalse if correct != 1 => Err(format!(
                "needs exactly one correct option, found {}",
                correct
            )),
            QuestionType::TrueFalse if self.options.len() != 2 => {
                Err("true/false needs exactly two options".to_string())
            }
            QuestionType::MultipleChoice if correct == 0 => {
                Err("needs at least one correct option".to_string())
            }
            QuestionType::ShortAnswer if self.options.len() != 1 => {
                Err("short answer needs exactly one canonical option".to_string())
            }
            QuestionType::ShortAnswer
                if self.options[0].text.trim().is_empty() =>
            {
                Err("short answer canonical text is empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    pub fn option(id: &str, text: &str, is_correct: bool) -> QuestionOption {
        QuestionOption {
            id: id.to_string(),
            text: text.to_string(),
            is_correct,
        }
    }

    pub fn single_choice(id: &str, points: i32) -> Question {
        Question {
            id: id.to_string(),
            text: format!("Question {}", id),
            question_type: QuestionType::SingleChoice,
            points,
            options: vec![
                option(&format!("{}-a", id), "A", true),
                option(&format!("{}-b", id), "B", false),
                option(&format!("{}-c", id), "C", false),
            ],
            explanation: None,
        }
    }

    pub fn multiple_choice(id: &str, points: i32) -> Question {
        Question {
            id: id.to_string(),
            text: format!("Question {}", id),
            question_type: QuestionType::MultipleChoice,
            points,
            options: vec![
                option(&format!("{}-a", id), "A", true),
                option(&format!("{}-b", id), "B", true),
                option(&format!("{}-c", id), "C", false),
            ],
            explanation: None,
        }
    }

    pub fn true_false(id: &str, points: i32) -> Question {
        Question {
            id: id.to_string(),
            text: format!("Question {}", id),
            question_type: QuestionType::TrueFalse,
            points,
            options: vec![
                option(&format!("{}-t", id), "True", true),
                option(&format!("{}-f", id), "False", false),
            ],
            explanation: None,
        }
    }

    pub fn short_answer(id: &str, canonical: &str, points: i32) -> Question {
        Question {
            id: id.to_string(),
            text: format!("Question {}", id),
            question_type: QuestionType::ShortAnswer,
            points,
            options: vec![option(&format!("{}-x", id), canonical, true)],
            explanation: None,
        }
    }

    pub fn quiz_with(questions: Vec<Question>, passing_score: i32) -> Quiz {
        let mut quiz = Quiz::new("course-1", "Fixture quiz", passing_score);
        quiz.id = "quiz-1".to_string();
        quiz.questions = questions;
        quiz
    }
}
