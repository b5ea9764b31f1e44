use async_trait::async_trait;
use mongodb::{bson::doc, options::IndexOptions, Collection, IndexModel};

use crate::{
    db::{self, Database},
    errors::{is_duplicate_key, AppError, AppResult},
    models::domain::CourseProgress,
};

/// Progress documents are written with optimistic concurrency: `save` only
/// lands when the stored version still equals `expected_version`, otherwise
/// it fails with `AppError::Conflict` and nothing is written.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn find(&self, learner_id: &str, course_id: &str) -> AppResult<Option<CourseProgress>>;
    /// Fails with `AlreadyExists` when the learner is already enrolled.
    async fn insert(&self, progress: CourseProgress) -> AppResult<CourseProgress>;
    async fn save(
        &self,
        progress: CourseProgress,
        expected_version: i64,
    ) -> AppResult<CourseProgress>;
}

pub struct MongoProgressRepository {
    collection: Collection<CourseProgress>,
}

impl MongoProgressRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection(db::PROGRESS);
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let model = IndexModel::builder()
            .keys(doc! { "learner_id": 1, "course_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("learner_course_unique".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(model).await?;
        log::info!("Created unique index on course_progress (learner_id, course_id)");
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for MongoProgressRepository {
    async fn find(&self, learner_id: &str, course_id: &str) -> AppResult<Option<CourseProgress>> {
        let progress = self
            .collection
            .find_one(doc! { "learner_id": learner_id, "course_id": course_id })
            .await?;
        Ok(progress)
    }

    async fn insert(&self, progress: CourseProgress) -> AppResult<CourseProgress> {
        match self.collection.insert_one(&progress).await {
            Ok(_) => Ok(progress),
            Err(err) if is_duplicate_key(&err) => Err(AppError::AlreadyExists(format!(
                "learner '{}' is already enrolled in course '{}'",
                progress.learner_id, progress.course_id
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(
        &self,
        progress: CourseProgress,
        expected_version: i64,
    ) -> AppResult<CourseProgress> {
        let result = self
            .collection
            .replace_one(
                doc! {
                    "learner_id": &progress.learner_id,
                    "course_id": &progress.course_id,
                    "version": expected_version
                },
                &progress,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::Conflict(format!(
                "progress for learner '{}' in course '{}' changed concurrently",
                progress.learner_id, progress.course_id
            )));
        }

        Ok(progress)
    }
}
