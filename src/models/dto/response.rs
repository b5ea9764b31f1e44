use async_graphql::SimpleObject;
use chrono::{DateTime, Utc};
use rand::{seq::SliceRandom, Rng};
use serde::Serialize;

use crate::models::domain::{
    progress::is_course_complete, Answer, AnswerValue, Attempt, CourseProgress, QuestionType, Quiz,
};
use crate::services::award_service::AwardResult;

#[derive(Debug, Clone, Serialize, SimpleObject)]
pub struct OptionForTaking {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
pub struct QuestionForTaking {
    pub id: String,
    pub text: String,
    pub question_type: QuestionType,
    pub points: i32,
    pub options: Vec<OptionForTaking>,
}

/// A quiz as shown to a learner: no correctness flags, and no canonical
/// text for short answers.
#[derive(Debug, Clone, Serialize, SimpleObject)]
pub struct QuizForTaking {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub passing_score: i32,
    pub max_attempts: Option<i32>,
    pub time_limit_minutes: Option<i32>,
    pub total_points: i64,
    pub questions: Vec<QuestionForTaking>,
}

impl QuizForTaking {
    pub fn from_quiz<R: Rng + ?Sized>(quiz: &Quiz, rng: &mut R) -> Self {
        let mut questions: Vec<QuestionForTaking> = quiz
            .questions
            .iter()
            .map(|q| QuestionForTaking {
                id: q.id.clone(),
                text: q.text.clone(),
                question_type: q.question_type,
                points: q.points,
                options: match q.question_type {
                    QuestionType::ShortAnswer => Vec::new(),
                    _ => q
                        .options
                        .iter()
                        .map(|o| OptionForTaking {
                            id: o.id.clone(),
                            text: o.text.clone(),
                        })
                        .collect(),
                },
            })
            .collect();

        if quiz.shuffle_questions {
            questions.shuffle(rng);
        }

        QuizForTaking {
            id: quiz.id.clone(),
            course_id: quiz.course_id.clone(),
            title: quiz.title.clone(),
            passing_score: quiz.passing_score,
            max_attempts: quiz.max_attempts,
            time_limit_minutes: quiz.time_limit_minutes,
            total_points: quiz.total_points(),
            questions,
        }
    }
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
pub struct AnswerReview {
    pub question_id: String,
    pub is_correct: bool,
    pub points_earned: i32,
    pub selected_option_ids: Vec<String>,
    pub text: Option<String>,
    /// Only present when the quiz shows correct answers.
    pub correct_option_ids: Option<Vec<String>>,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
pub struct AttemptResponse {
    pub id: String,
    pub quiz_id: String,
    pub course_id: String,
    pub attempt_number: Option<i32>,
    /// Rounded to two decimals; pass/fail was decided on the exact value.
    pub score: Option<f64>,
    pub passed: Option<bool>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_spent_seconds: Option<i64>,
    pub exceeded_time_limit: bool,
    pub answers: Vec<AnswerReview>,
}

impl AttemptResponse {
    /// `quiz` reveals correct answers and explanations when its policy allows.
    pub fn from_attempt(attempt: Attempt, quiz: Option<&Quiz>) -> Self {
        let reveal = quiz.filter(|q| q.show_correct_answers);
        let score = attempt.display_score();

        let answers = attempt
            .answers
            .into_iter()
            .map(|answer| review(answer, reveal))
            .collect();

        AttemptResponse {
            id: attempt.id,
            quiz_id: attempt.quiz_id,
            course_id: attempt.course_id,
            attempt_number: attempt.attempt_number,
            score,
            passed: attempt.passed,
            started_at: attempt.started_at,
            completed_at: attempt.completed_at,
            time_spent_seconds: attempt.time_spent_seconds,
            exceeded_time_limit: attempt.exceeded_time_limit,
            answers,
        }
    }
}

fn review(answer: Answer, reveal: Option<&Quiz>) -> AnswerReview {
    let (selected_option_ids, text) = match answer.value {
        Some(AnswerValue::Choice(id)) => (vec![id], None),
        Some(AnswerValue::Choices(ids)) => (ids, None),
        Some(AnswerValue::Text(text)) => (Vec::new(), Some(text)),
        None => (Vec::new(), None),
    };

    let question = reveal.and_then(|quiz| quiz.question(&answer.question_id));

    AnswerReview {
        correct_option_ids: question
            .map(|q| q.correct_option_ids().map(str::to_string).collect()),
        explanation: question.and_then(|q| q.explanation.clone()),
        question_id: answer.question_id,
        is_correct: answer.is_correct,
        points_earned: answer.points_earned,
        selected_option_ids,
        text,
    }
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
pub struct PaginationMetadata {
    pub offset: i64,
    pub limit: i64,
    pub total: i64,
    pub has_more: bool,
}

impl PaginationMetadata {
    pub fn new(offset: i64, limit: i64, total: i64) -> Self {
        Self {
            offset,
            limit,
            total,
            has_more: offset + limit < total,
        }
    }
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
pub struct PaginatedAttempts {
    pub items: Vec<AttemptResponse>,
    pub pagination: PaginationMetadata,
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
pub struct ProgressResponse {
    pub learner_id: String,
    pub course_id: String,
    pub progress_percent: i32,
    pub completed_lesson_ids: Vec<String>,
    pub course_complete: bool,
    pub enrolled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CourseProgress> for ProgressResponse {
    fn from(progress: CourseProgress) -> Self {
        ProgressResponse {
            course_complete: is_course_complete(&progress),
            completed_lesson_ids: progress
                .completions
                .into_iter()
                .map(|c| c.lesson_id)
                .collect(),
            learner_id: progress.learner_id,
            course_id: progress.course_id,
            progress_percent: progress.progress_percent,
            enrolled_at: progress.enrolled_at,
            updated_at: progress.updated_at,
        }
    }
}

/// Result of the two-step submission: graded attempt, progress after any
/// gated lesson was completed, and newly granted awards.
#[derive(Debug, Clone, Serialize, SimpleObject)]
pub struct SubmissionResponse {
    pub attempt: AttemptResponse,
    pub progress: Option<ProgressResponse>,
    pub awards: AwardResult,
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
pub struct LessonCompletionResponse {
    pub progress: ProgressResponse,
    pub awards: AwardResult,
}
