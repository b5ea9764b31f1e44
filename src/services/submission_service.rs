use std::sync::Arc;

use crate::{
    errors::{AppError, AppResult},
    models::domain::{CourseProgress, SubmittedAnswers},
    services::{
        attempt_service::{AttemptService, GradedAttempt},
        award_service::{AwardContext, AwardResult, AwardService},
        progress_service::ProgressService,
    },
};

#[derive(Clone, Debug)]
pub struct SubmissionOutcome {
    pub graded: GradedAttempt,
    pub progress: Option<CourseProgress>,
    pub awards: AwardResult,
}

#[derive(Clone, Debug)]
pub struct LessonOutcome {
    pub progress: CourseProgress,
    pub awards: AwardResult,
}

/// Runs a submission through the ledger, the progress tracker and the award
/// engine, in that order.
pub struct SubmissionService {
    attempts: Arc<AttemptService>,
    progress: Arc<ProgressService>,
    awards: Arc<AwardService>,
}

impl SubmissionService {
    pub fn new(
        attempts: Arc<AttemptService>,
        progress: Arc<ProgressService>,
        awards: Arc<AwardService>,
    ) -> Self {
        Self {
            attempts,
            progress,
            awards,
        }
    }

    /// Two-step path: grades an attempt opened earlier by the same learner,
    /// completes the lesson the quiz gates when it is passed, then evaluates
    /// awards.
    pub async fn submit_attempt(
        &self,
        learner_id: &str,
        attempt_id: &str,
        answers: &SubmittedAnswers,
    ) -> AppResult<SubmissionOutcome> {
        let open = self.attempts.find_attempt(attempt_id).await?;
        if open.learner_id != learner_id {
            return Err(AppError::Forbidden(format!(
                "attempt '{}' belongs to another learner",
                attempt_id
            )));
        }

        let graded = self.attempts.submit_attempt(attempt_id, answers).await?;
        let course_id = graded.quiz.course_id.clone();
        let passed = graded.attempt.passed.unwrap_or(false);

        // The attempt is already final here, so a gated lesson that has since
        // left the course must not abort the submission.
        let progress = match graded.quiz.lesson_id.as_deref() {
            Some(lesson_id) if passed => match self
                .progress
                .mark_lesson_complete(learner_id, &course_id, lesson_id)
                .await
            {
                Ok(progress) => Some(progress),
                Err(AppError::ValidationError(reason)) => {
                    log::warn!(
                        "Quiz '{}' gates a lesson that cannot be completed: {}",
                        graded.quiz.id,
                        reason
                    );
                    self.progress.get_progress(learner_id, &course_id).await?
                }
                Err(err) => return Err(err),
            },
            _ => self.progress.get_progress(learner_id, &course_id).await?,
        };

        let context = AwardContext::after_quiz(graded.attempt.score.unwrap_or_default(), passed);
        let awards = self
            .awards
            .evaluate_awards(learner_id, &course_id, context)
            .await?;

        Ok(SubmissionOutcome {
            graded,
            progress,
            awards,
        })
    }

    /// One-step path: records the graded attempt only. Progress and awards
    /// are left to an explicit `complete_lesson` or `evaluate_awards`.
    pub async fn grade_quiz(
        &self,
        learner_id: &str,
        quiz_id: &str,
        answers: &SubmittedAnswers,
    ) -> AppResult<GradedAttempt> {
        self.attempts.grade_quiz(learner_id, quiz_id, answers).await
    }

    pub async fn complete_lesson(
        &self,
        learner_id: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> AppResult<LessonOutcome> {
        let progress = self
            .progress
            .mark_lesson_complete(learner_id, course_id, lesson_id)
            .await?;
        let awards = self
            .awards
            .evaluate_awards(learner_id, course_id, AwardContext::default())
            .await?;

        Ok(LessonOutcome { progress, awards })
    }
}
