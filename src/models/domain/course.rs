use async_graphql::SimpleObject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Course structure as far as progress tracking needs it: modules holding lessons.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, SimpleObject)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub modules: Vec<CourseModule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, SimpleObject)]
pub struct CourseModule {
    pub id: String,
    pub title: String,
    pub order: i32,
    pub lessons: Vec<Lesson>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, SimpleObject)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub order: i32,
}

impl Course {
    pub fn lesson_ids(&self) -> impl Iterator<Item = &str> {
        self.modules
            .iter()
            .flat_map(|m| m.lessons.iter())
            .map(|l| l.id.as_str())
    }

    pub fn total_lessons(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }

    pub fn has_lesson(&self, lesson_id: &str) -> bool {
        self.lesson_ids().any(|id| id == lesson_id)
    }
}
