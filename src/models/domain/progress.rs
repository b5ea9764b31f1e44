use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::domain::Course;

/// Per (learner, course) completion state. `progress_percent` is derived, never set directly.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CourseProgress {
    pub id: String,
    pub learner_id: String,
    pub course_id: String,
    pub progress_percent: i32,
    pub completions: Vec<LessonCompletion>,
    pub enrolled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64, // bumped on every write, compared on update
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LessonCompletion {
    pub lesson_id: String,
    pub completed_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// round(completed / total * 100), 0 for a course without lessons.
pub fn progress_percent(completed: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    let ratio = completed.min(total) as f64 / total as f64;
    (ratio * 100.0).round() as i32
}

impl CourseProgress {
    pub fn enroll(learner_id: &str, course_id: &str, now: DateTime<Utc>) -> Self {
        CourseProgress {
            id: Uuid::new_v4().to_string(),
            learner_id: learner_id.to_string(),
            course_id: course_id.to_string(),
            progress_percent: 0,
            completions: Vec::new(),
            enrolled_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn is_lesson_complete(&self, lesson_id: &str) -> bool {
        self.completions.iter().any(|c| c.lesson_id == lesson_id)
    }

    /// Returns false when the lesson was already complete; only its
    /// `last_seen_at` is refreshed in that case.
    pub fn record_completion(&mut self, lesson_id: &str, now: DateTime<Utc>) -> bool {
        if let Some(existing) = self
            .completions
            .iter_mut()
            .find(|c| c.lesson_id == lesson_id)
        {
            existing.last_seen_at = now;
            return false;
        }

        self.completions.push(LessonCompletion {
            lesson_id: lesson_id.to_string(),
            completed_at: now,
            last_seen_at: now,
        });
        true
    }

    /// Completions that still belong to the course. Lessons removed from the
    /// course after being completed do not count.
    pub fn completed_lessons_in(&self, course: &Course) -> usize {
        self.completions
            .iter()
            .filter(|c| course.has_lesson(&c.lesson_id))
            .count()
    }

    pub fn recompute(&mut self, course: &Course, now: DateTime<Utc>) {
        self.progress_percent =
            progress_percent(self.completed_lessons_in(course), course.total_lessons());
        self.updated_at = now;
    }

    /// Raw-count check, immune to rounding in `progress_percent`.
    pub fn has_completed_every_lesson(&self, course: &Course) -> bool {
        let total = course.total_lessons();
        total > 0 && self.completed_lessons_in(course) == total
    }
}

/// Gate for course-completion awards.
pub fn is_course_complete(progress: &CourseProgress) -> bool {
    progress.progress_percent >= 100
}
