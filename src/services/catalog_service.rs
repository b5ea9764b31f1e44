use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::{
    errors::{AppError, AppResult},
    models::{
        domain::{CertificateTemplate, Course, CourseBadge, Quiz},
        dto::{
            request::{CertificateTemplateInput, CourseBadgeInput, CourseInput, QuizInput},
            response::QuizForTaking,
        },
    },
    repositories::{BadgeRepository, CertificateRepository, CourseRepository, QuizRepository},
};

/// Authoring side: quiz, course and award-rule definitions.
pub struct CatalogService {
    quizzes: Arc<dyn QuizRepository>,
    courses: Arc<dyn CourseRepository>,
    badges: Arc<dyn BadgeRepository>,
    certificates: Arc<dyn CertificateRepository>,
}

impl CatalogService {
    pub fn new(
        quizzes: Arc<dyn QuizRepository>,
        courses: Arc<dyn CourseRepository>,
        badges: Arc<dyn BadgeRepository>,
        certificates: Arc<dyn CertificateRepository>,
    ) -> Self {
        Self {
            quizzes,
            courses,
            badges,
            certificates,
        }
    }

    pub async fn get_quiz(&self, id: &str) -> AppResult<Quiz> {
        self.quizzes
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::QuizNotFound(id.to_string()))
    }

    pub async fn get_course(&self, id: &str) -> AppResult<Course> {
        self.courses
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Course with id '{}' not found", id)))
    }

    pub async fn quiz_for_taking(&self, id: &str) -> AppResult<QuizForTaking> {
        let quiz = self.get_quiz(id).await?;
        Ok(QuizForTaking::from_quiz(&quiz, &mut rand::thread_rng()))
    }

    pub async fn save_quiz(&self, input: QuizInput) -> AppResult<Quiz> {
        input.validate()?;

        let mut quiz = Quiz::from(input);
        quiz.validate_definition()?;

        let course = self.get_course(&quiz.course_id).await?;
        if let Some(lesson_id) = quiz.lesson_id.as_deref() {
            if !course.has_lesson(lesson_id) {
                return Err(AppError::ValidationError(format!(
                    "lesson '{}' does not belong to course '{}'",
                    lesson_id, course.id
                )));
            }
        }

        let now = Utc::now();
        let existing = self.quizzes.find_by_id(&quiz.id).await?;
        quiz.created_at = existing.and_then(|q| q.created_at).or(Some(now));
        quiz.modified_at = Some(now);

        let saved = self.quizzes.upsert(quiz).await?;
        log::info!("Saved quiz '{}' for course '{}'", saved.id, saved.course_id);
        Ok(saved)
    }

    pub async fn save_course(&self, input: CourseInput) -> AppResult<Course> {
        input.validate()?;

        let duplicates = input.duplicate_lesson_ids();
        if !duplicates.is_empty() {
            return Err(AppError::ValidationError(format!(
                "lesson ids used more than once: {}",
                duplicates.join(", ")
            )));
        }

        let mut course = Course::from(input);

        let orphaned: Vec<String> = self
            .quizzes
            .find_by_course(&course.id)
            .await?
            .into_iter()
            .filter_map(|quiz| match quiz.lesson_id {
                Some(lesson_id) if !course.has_lesson(&lesson_id) => Some(format!(
                    "lesson '{}' is gated by quiz '{}'",
                    lesson_id, quiz.id
                )),
                _ => None,
            })
            .collect();
        if !orphaned.is_empty() {
            return Err(AppError::ValidationError(format!(
                "cannot remove gated lessons: {}",
                orphaned.join("; ")
            )));
        }

        let now = Utc::now();
        let existing = self.courses.find_by_id(&course.id).await?;
        course.created_at = existing.and_then(|c| c.created_at).or(Some(now));
        course.modified_at = Some(now);

        let saved = self.courses.upsert(course).await?;
        log::info!(
            "Saved course '{}' with {} lessons",
            saved.id,
            saved.total_lessons()
        );
        Ok(saved)
    }

    /// One template per course; saving again replaces it.
    pub async fn save_certificate_template(
        &self,
        input: CertificateTemplateInput,
    ) -> AppResult<CertificateTemplate> {
        input.validate()?;
        self.get_course(&input.course_id).await?;

        let existing_id = self
            .certificates
            .template_for_course(&input.course_id)
            .await?
            .map(|t| t.id);

        let saved = self
            .certificates
            .save_template(input.into_template(existing_id))
            .await?;
        log::info!("Saved certificate template for course '{}'", saved.course_id);
        Ok(saved)
    }

    pub async fn save_course_badge(&self, input: CourseBadgeInput) -> AppResult<CourseBadge> {
        input.validate()?;
        self.get_course(&input.course_id).await?;

        let saved = self.badges.save_rule(CourseBadge::from(input)).await?;
        log::info!(
            "Saved badge rule '{}' ({:?}) for course '{}'",
            saved.badge_id,
            saved.trigger,
            saved.course_id
        );
        Ok(saved)
    }
}
