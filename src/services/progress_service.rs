use std::sync::Arc;

use chrono::Utc;

use crate::{
    errors::{AppError, AppResult},
    models::domain::{Course, CourseProgress},
    repositories::{CourseRepository, ProgressRepository},
    services::keyed_lock::{learner_course_key, KeyedLock},
};

const SAVE_RETRIES: usize = 5;

pub struct ProgressService {
    courses: Arc<dyn CourseRepository>,
    progress: Arc<dyn ProgressRepository>,
    locks: Arc<KeyedLock>,
}

impl ProgressService {
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        progress: Arc<dyn ProgressRepository>,
        locks: Arc<KeyedLock>,
    ) -> Self {
        Self {
            courses,
            progress,
            locks,
        }
    }

    pub async fn get_course(&self, course_id: &str) -> AppResult<Course> {
        self.courses
            .find_by_id(course_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Course with id '{}' not found", course_id)))
    }

    pub async fn get_progress(
        &self,
        learner_id: &str,
        course_id: &str,
    ) -> AppResult<Option<CourseProgress>> {
        self.progress.find(learner_id, course_id).await
    }

    /// Idempotent: returns the existing record when the learner is already enrolled.
    pub async fn enroll(&self, learner_id: &str, course_id: &str) -> AppResult<CourseProgress> {
        self.get_course(course_id).await?;
        let progress = self.load_or_enroll(learner_id, course_id).await?;
        Ok(progress)
    }

    /// Mark a lesson complete and recompute the course percentage.
    ///
    /// Completing an already-complete lesson leaves the completion set, and
    /// therefore the percentage, unchanged.
    pub async fn mark_lesson_complete(
        &self,
        learner_id: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> AppResult<CourseProgress> {
        let course = self.get_course(course_id).await?;
        if !course.has_lesson(lesson_id) {
            return Err(AppError::ValidationError(format!(
                "lesson '{}' does not belong to course '{}'",
                lesson_id, course_id
            )));
        }

        let _guard = self
            .locks
            .lock(&learner_course_key(learner_id, course_id))
            .await;

        for _ in 0..SAVE_RETRIES {
            let mut progress = self.load_or_enroll(learner_id, course_id).await?;
            let expected_version = progress.version;
            let now = Utc::now();

            let newly_completed = progress.record_completion(lesson_id, now);
            progress.recompute(&course, now);
            progress.version += 1;

            match self.progress.save(progress, expected_version).await {
                Ok(saved) => {
                    if newly_completed {
                        log::info!(
                            "Learner '{}' completed lesson '{}' of course '{}' ({}%)",
                            learner_id,
                            lesson_id,
                            course_id,
                            saved.progress_percent
                        );
                    }
                    return Ok(saved);
                }
                Err(AppError::Conflict(reason)) => {
                    log::debug!("Retrying progress write: {}", reason);
                }
                Err(err) => return Err(err),
            }
        }

        Err(AppError::Conflict(format!(
            "progress for learner '{}' in course '{}' kept changing",
            learner_id, course_id
        )))
    }

    async fn load_or_enroll(&self, learner_id: &str, course_id: &str) -> AppResult<CourseProgress> {
        if let Some(existing) = self.progress.find(learner_id, course_id).await? {
            return Ok(existing);
        }

        match self
            .progress
            .insert(CourseProgress::enroll(learner_id, course_id, Utc::now()))
            .await
        {
            Ok(created) => {
                log::info!("Enrolled learner '{}' in course '{}'", learner_id, course_id);
                Ok(created)
            }
            Err(AppError::AlreadyExists(_)) => self
                .progress
                .find(learner_id, course_id)
                .await?
                .ok_or_else(|| {
                    AppError::InternalError(format!(
                        "enrollment of '{}' in '{}' vanished",
                        learner_id, course_id
                    ))
                }),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::course::fixtures::course_with_lessons;
    use crate::repositories::{
        course_repository::MockCourseRepository, progress_repository::MockProgressRepository,
    };

    fn courses() -> MockCourseRepository {
        let mut repo = MockCourseRepository::new();
        repo.expect_find_by_id()
            .returning(|id| Ok(Some(course_with_lessons(id, &[2, 2]))));
        repo
    }

    fn service(progress: MockProgressRepository) -> ProgressService {
        ProgressService::new(
            Arc::new(courses()),
            Arc::new(progress),
            Arc::new(KeyedLock::new()),
        )
    }

    #[tokio::test]
    async fn completing_a_lesson_recomputes_the_percentage() {
        let mut progress = MockProgressRepository::new();
        progress
            .expect_find()
            .returning(|l, c| Ok(Some(CourseProgress::enroll(l, c, Utc::now()))));
        progress
            .expect_save()
            .withf(|p, expected| *expected == 0 && p.version == 1)
            .returning(|p, _| Ok(p));

        let saved = service(progress)
            .mark_lesson_complete("learner-1", "course-1", "l1")
            .await
            .unwrap();

        assert_eq!(saved.progress_percent, 25);
        assert!(saved.is_lesson_complete("l1"));
    }

    #[tokio::test]
    async fn unknown_lesson_is_a_validation_error() {
        let mut progress = MockProgressRepository::new();
        progress.expect_save().never();

        let err = service(progress)
            .mark_lesson_complete("learner-1", "course-1", "l99")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn version_conflict_reloads_and_retries() {
        let mut seq = mockall::Sequence::new();
        let mut progress = MockProgressRepository::new();
        progress.expect_find().returning(|l, c| {
            let mut p = CourseProgress::enroll(l, c, Utc::now());
            p.version = 3;
            Ok(Some(p))
        });
        progress
            .expect_save()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(AppError::Conflict("stale".to_string())));
        progress
            .expect_save()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|p, _| Ok(p));

        let saved = service(progress)
            .mark_lesson_complete("learner-1", "course-1", "l3")
            .await
            .unwrap();
        assert_eq!(saved.version, 4);
    }

    #[tokio::test]
    async fn enroll_absorbs_a_concurrent_enrollment() {
        let mut seq = mockall::Sequence::new();
        let mut progress = MockProgressRepository::new();
        progress
            .expect_find()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(None));
        progress
            .expect_insert()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(AppError::AlreadyExists("enrolled".to_string())));
        progress
            .expect_find()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|l, c| Ok(Some(CourseProgress::enroll(l, c, Utc::now()))));

        let enrolled = service(progress)
            .enroll("learner-1", "course-1")
            .await
            .unwrap();
        assert_eq!(enrolled.progress_percent, 0);
    }

    #[tokio::test]
    async fn enroll_in_missing_course_fails() {
        let mut courses = MockCourseRepository::new();
        courses.expect_find_by_id().returning(|_| Ok(None));
        let service = ProgressService::new(
            Arc::new(courses),
            Arc::new(MockProgressRepository::new()),
            Arc::new(KeyedLock::new()),
        );

        let err = service.enroll("learner-1", "nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
