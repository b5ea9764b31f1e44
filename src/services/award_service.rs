use std::sync::Arc;

use async_graphql::SimpleObject;
use chrono::Utc;
use serde::Serialize;

use crate::{
    config::EngineSettings,
    errors::{AppError, AppResult},
    models::domain::{
        progress::is_course_complete, BadgeTrigger, Certificate, CertificateStatus,
        CertificateTemplate, Course, CourseBadge, CourseProgress, UserBadge,
    },
    repositories::{
        AttemptRepository, BadgeRepository, CertificateRepository, CourseRepository,
        ProgressRepository, QuizRepository,
    },
    services::keyed_lock::{learner_course_key, KeyedLock},
};

const NUMBER_RETRIES: usize = 3;

/// What triggered an evaluation. `quiz_score` is only set for a passed quiz.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AwardContext {
    pub quiz_score: Option<f64>,
}

impl AwardContext {
    pub fn after_quiz(score: f64, passed: bool) -> Self {
        Self {
            quiz_score: passed.then_some(score),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, SimpleObject)]
pub struct AwardResult {
    pub badges_granted: Vec<String>,
    pub certificate: Option<Certificate>,
}

impl AwardResult {
    pub fn certificate_granted(&self) -> bool {
        self.certificate.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, SimpleObject)]
pub struct CertificateVerification {
    pub status: CertificateStatus,
    pub certificate: Option<Certificate>,
}

/// Whether a badge rule fires for the learner's current state.
pub fn trigger_fires(rule: &CourseBadge, course_complete: bool, context: &AwardContext) -> bool {
    match rule.trigger {
        BadgeTrigger::CourseCompletion => course_complete,
        BadgeTrigger::QuizPass => match context.quiz_score {
            Some(score) => rule.min_score.map_or(true, |min| score >= min),
            None => false,
        },
        BadgeTrigger::PerfectQuiz => context.quiz_score == Some(100.0),
    }
}

pub struct AwardService {
    courses: Arc<dyn CourseRepository>,
    progress: Arc<dyn ProgressRepository>,
    quizzes: Arc<dyn QuizRepository>,
    attempts: Arc<dyn AttemptRepository>,
    badges: Arc<dyn BadgeRepository>,
    certificates: Arc<dyn CertificateRepository>,
    settings: EngineSettings,
    locks: Arc<KeyedLock>,
}

impl AwardService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        progress: Arc<dyn ProgressRepository>,
        quizzes: Arc<dyn QuizRepository>,
        attempts: Arc<dyn AttemptRepository>,
        badges: Arc<dyn BadgeRepository>,
        certificates: Arc<dyn CertificateRepository>,
        settings: EngineSettings,
        locks: Arc<KeyedLock>,
    ) -> Self {
        Self {
            courses,
            progress,
            quizzes,
            attempts,
            badges,
            certificates,
            settings,
            locks,
        }
    }

    /// Grant every badge and the certificate the learner currently qualifies
    /// for. Safe to re-run: awards already held are never granted twice.
    pub async fn evaluate_awards(
        &self,
        learner_id: &str,
        course_id: &str,
        context: AwardContext,
    ) -> AppResult<AwardResult> {
        let course = self
            .courses
            .find_by_id(course_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Course with id '{}' not found", course_id)))?;

        let _guard = self
            .locks
            .lock(&learner_course_key(learner_id, course_id))
            .await;

        let progress = self.progress.find(learner_id, course_id).await?;
        let course_complete = progress.as_ref().is_some_and(is_course_complete);

        let mut result = AwardResult::default();

        if self.settings.badges_enabled {
            result.badges_granted = self
                .grant_badges(learner_id, course_id, course_complete, &context)
                .await?;
        }

        if self.settings.certificates_enabled {
            if let Some(progress) = progress.as_ref().filter(|p| is_course_complete(p)) {
                result.certificate = self
                    .issue_certificate(learner_id, &course, progress, &context)
                    .await?;
            }
        }

        Ok(result)
    }

    async fn grant_badges(
        &self,
        learner_id: &str,
        course_id: &str,
        course_complete: bool,
        context: &AwardContext,
    ) -> AppResult<Vec<String>> {
        let mut granted = Vec::new();

        for rule in self.badges.rules_for_course(course_id).await? {
            if self.badges.has_badge(learner_id, &rule.badge_id).await? {
                continue;
            }
            if !trigger_fires(&rule, course_complete, context) {
                continue;
            }

            let badge = UserBadge::grant(learner_id, &rule, context.quiz_score, Utc::now());
            if self.badges.grant(badge).await? {
                log::info!(
                    "Granted badge '{}' to learner '{}' ({:?} in course '{}')",
                    rule.badge_id,
                    learner_id,
                    rule.trigger,
                    course_id
                );
                granted.push(rule.badge_id);
            } else {
                log::debug!(
                    "Badge '{}' for learner '{}' was granted concurrently",
                    rule.badge_id,
                    learner_id
                );
            }
        }

        Ok(granted)
    }

    async fn issue_certificate(
        &self,
        learner_id: &str,
        course: &Course,
        progress: &CourseProgress,
        context: &AwardContext,
    ) -> AppResult<Option<Certificate>> {
        if self
            .certificates
            .find_for_learner(learner_id, &course.id)
            .await?
            .is_some()
        {
            return Ok(None);
        }

        let Some(template) = self
            .certificates
            .template_for_course(&course.id)
            .await?
            .filter(|t| t.enabled)
        else {
            return Ok(None);
        };

        if template.require_all_lessons && !progress.has_completed_every_lesson(course) {
            log::debug!(
                "Learner '{}' has not completed every lesson of course '{}'",
                learner_id,
                course.id
            );
            return Ok(None);
        }

        let best_score = self
            .best_passing_score(learner_id, &course.id)
            .await?
            .or(context.quiz_score);

        if !meets_min_score(&template, best_score) {
            log::debug!(
                "Learner '{}' best score {:?} is below the certificate minimum {} for course '{}'",
                learner_id,
                best_score,
                template.min_score,
                course.id
            );
            return Ok(None);
        }

        for _ in 0..NUMBER_RETRIES {
            let certificate = Certificate::issue(
                learner_id,
                &template,
                best_score,
                &self.settings.certificate_verify_base_url,
                Utc::now(),
            );

            match self.certificates.issue(certificate).await {
                Ok(Some(issued)) => {
                    log::info!(
                        "Issued certificate '{}' to learner '{}' for course '{}'",
                        issued.certificate_number,
                        learner_id,
                        course.id
                    );
                    return Ok(Some(issued));
                }
                Ok(None) => {
                    log::debug!(
                        "Certificate for learner '{}' in course '{}' was issued concurrently",
                        learner_id,
                        course.id
                    );
                    return Ok(None);
                }
                Err(AppError::AlreadyExists(reason)) => {
                    log::warn!("Regenerating certificate number: {}", reason);
                }
                Err(err) => return Err(err),
            }
        }

        Err(AppError::Conflict(format!(
            "could not allocate a certificate number for course '{}'",
            course.id
        )))
    }

    /// Highest score among the learner's passed attempts on quizzes of the course.
    pub async fn best_passing_score(
        &self,
        learner_id: &str,
        course_id: &str,
    ) -> AppResult<Option<f64>> {
        let quiz_ids = self
            .quizzes
            .find_by_course(course_id)
            .await?
            .into_iter()
            .map(|quiz| quiz.id)
            .collect();

        self.attempts.best_passing_score(learner_id, quiz_ids).await
    }

    pub async fn verify_certificate(
        &self,
        certificate_number: &str,
        code: &str,
    ) -> AppResult<CertificateVerification> {
        let certificate = self
            .certificates
            .find_by_number(certificate_number)
            .await?
            .filter(|c| c.verification_code == code);

        Ok(match certificate {
            Some(certificate) => CertificateVerification {
                status: certificate.status_at(Utc::now()),
                certificate: Some(certificate),
            },
            None => CertificateVerification {
                status: CertificateStatus::Unknown,
                certificate: None,
            },
        })
    }

    pub async fn badges_for_learner(&self, learner_id: &str) -> AppResult<Vec<UserBadge>> {
        self.badges.badges_for_learner(learner_id).await
    }

    pub async fn certificates_for_learner(&self, learner_id: &str) -> AppResult<Vec<Certificate>> {
        self.certificates.certificates_for_learner(learner_id).await
    }
}

fn meets_min_score(template: &CertificateTemplate, best_score: Option<f64>) -> bool {
    if template.min_score <= 0.0 {
        return true;
    }
    best_score.is_some_and(|score| score >= template.min_score)
}
