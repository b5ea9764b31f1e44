use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    errors::{AppError, AppResult},
    models::domain::{Attempt, Quiz, SubmittedAnswers},
    repositories::{AttemptRepository, QuizRepository},
    services::grading,
};

const SLOT_RETRIES: usize = 3;

/// A freshly graded attempt together with the quiz it was graded against.
#[derive(Clone, Debug)]
pub struct GradedAttempt {
    pub attempt: Attempt,
    pub quiz: Quiz,
}

enum Record {
    Finalize,
    Insert,
}

/// The attempt ledger: opens attempts, grades them exactly once and
/// enforces the per-quiz attempt cap.
pub struct AttemptService {
    quizzes: Arc<dyn QuizRepository>,
    attempts: Arc<dyn AttemptRepository>,
}

impl AttemptService {
    pub fn new(quizzes: Arc<dyn QuizRepository>, attempts: Arc<dyn AttemptRepository>) -> Self {
        Self { quizzes, attempts }
    }

    pub async fn get_quiz(&self, quiz_id: &str) -> AppResult<Quiz> {
        self.quizzes
            .find_by_id(quiz_id)
            .await?
            .ok_or_else(|| AppError::QuizNotFound(quiz_id.to_string()))
    }

    pub async fn find_attempt(&self, attempt_id: &str) -> AppResult<Attempt> {
        self.attempts
            .find_by_id(attempt_id)
            .await?
            .ok_or_else(|| AppError::AttemptNotFound(attempt_id.to_string()))
    }

    pub async fn start_attempt(&self, learner_id: &str, quiz_id: &str) -> AppResult<Attempt> {
        let quiz = self.get_quiz(quiz_id).await?;
        self.ensure_below_cap(learner_id, &quiz).await?;

        let attempt = self
            .attempts
            .create(Attempt::open(learner_id, &quiz, Utc::now()))
            .await?;

        log::info!(
            "Learner '{}' started attempt '{}' on quiz '{}'",
            learner_id,
            attempt.id,
            quiz.id
        );
        Ok(attempt)
    }

    /// Grade an attempt opened by `start_attempt`.
    pub async fn submit_attempt(
        &self,
        attempt_id: &str,
        answers: &SubmittedAnswers,
    ) -> AppResult<GradedAttempt> {
        let attempt = self.find_attempt(attempt_id).await?;
        if attempt.is_graded() {
            return Err(AppError::AttemptAlreadyGraded(attempt.id));
        }

        let quiz = self.get_quiz(&attempt.quiz_id).await?;
        let attempt = self
            .grade_and_record(&quiz, attempt, answers, Utc::now(), Record::Finalize)
            .await?;

        Ok(GradedAttempt { attempt, quiz })
    }

    /// Grade a submission in a single call, without a prior `start_attempt`.
    pub async fn grade_quiz(
        &self,
        learner_id: &str,
        quiz_id: &str,
        answers: &SubmittedAnswers,
    ) -> AppResult<GradedAttempt> {
        let quiz = self.get_quiz(quiz_id).await?;
        self.ensure_below_cap(learner_id, &quiz).await?;

        let now = Utc::now();
        let attempt = self
            .grade_and_record(
                &quiz,
                Attempt::open(learner_id, &quiz, now),
                answers,
                now,
                Record::Insert,
            )
            .await?;

        Ok(GradedAttempt { attempt, quiz })
    }

    /// `None` when the quiz has no attempt cap.
    pub async fn attempts_remaining(&self, learner_id: &str, quiz_id: &str) -> AppResult<Option<i32>> {
        let quiz = self.get_quiz(quiz_id).await?;
        let Some(max) = quiz.max_attempts else {
            return Ok(None);
        };

        let completed = self.attempts.count_completed(learner_id, quiz_id).await?;
        Ok(Some((max as i64 - completed).max(0) as i32))
    }

    pub async fn history(
        &self,
        learner_id: &str,
        quiz_id: Option<String>,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Attempt>, i64)> {
        self.attempts
            .list_for_learner(learner_id, quiz_id, offset, limit)
            .await
    }

    async fn ensure_below_cap(&self, learner_id: &str, quiz: &Quiz) -> AppResult<()> {
        let Some(max) = quiz.max_attempts else {
            return Ok(());
        };

        let completed = self.attempts.count_completed(learner_id, &quiz.id).await?;
        if completed >= max as i64 {
            log::warn!(
                "Learner '{}' reached the attempt cap ({}) on quiz '{}'",
                learner_id,
                max,
                quiz.id
            );
            return Err(AppError::AttemptLimitExceeded { limit: max });
        }
        Ok(())
    }

    /// Shared grading core of both submission paths.
    ///
    /// The graded attempt claims the next `attempt_number` slot. Slots are
    /// unique in storage, so a concurrent grading of another attempt by the
    /// same learner forces a recount, and a recount past the cap fails with
    /// `AttemptLimitExceeded`.
    async fn grade_and_record(
        &self,
        quiz: &Quiz,
        open: Attempt,
        answers: &SubmittedAnswers,
        completed_at: DateTime<Utc>,
        record: Record,
    ) -> AppResult<Attempt> {
        let mut graded = complete(quiz, open, answers, completed_at);

        for _ in 0..SLOT_RETRIES {
            let completed = self
                .attempts
                .count_completed(&graded.learner_id, &quiz.id)
                .await?;
            graded.attempt_number = Some(next_attempt_number(quiz, completed)?);

            let stored = match record {
                Record::Finalize => self.attempts.finalize(graded.clone()).await,
                Record::Insert => self.attempts.insert_graded(graded.clone()).await,
            };

            match stored {
                Ok(attempt) => {
                    log::info!(
                        "Graded attempt '{}' #{} on quiz '{}': score {:.2}, passed {}",
                        attempt.id,
                        attempt.attempt_number.unwrap_or_default(),
                        quiz.id,
                        attempt.score.unwrap_or_default(),
                        attempt.passed.unwrap_or_default()
                    );
                    return Ok(attempt);
                }
                Err(AppError::AlreadyExists(reason)) => {
                    log::debug!("Attempt slot taken, recounting: {}", reason);
                }
                Err(err) => return Err(err),
            }
        }

        Err(AppError::Conflict(format!(
            "could not record attempt '{}' on quiz '{}'",
            graded.id, quiz.id
        )))
    }
}

fn next_attempt_number(quiz: &Quiz, completed: i64) -> AppResult<i32> {
    let number = completed + 1;
    match quiz.max_attempts {
        Some(max) if number > max as i64 => Err(AppError::AttemptLimitExceeded { limit: max }),
        _ => Ok(number as i32),
    }
}

fn complete(
    quiz: &Quiz,
    mut attempt: Attempt,
    answers: &SubmittedAnswers,
    completed_at: DateTime<Utc>,
) -> Attempt {
    let result = grading::grade(quiz, answers);
    let time_spent = (completed_at - attempt.started_at).num_seconds().max(0);

    attempt.answers = result.per_question;
    attempt.score = Some(result.score);
    attempt.passed = Some(result.passed);
    attempt.completed_at = Some(completed_at);
    attempt.time_spent_seconds = Some(time_spent);
    attempt.exceeded_time_limit = quiz
        .time_limit_minutes
        .is_some_and(|minutes| time_spent > minutes as i64 * 60);
    attempt
}
