use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{bson::doc, options::IndexOptions, Collection, IndexModel};

use crate::{
    db::{self, Database},
    errors::{is_duplicate_key, AppError, AppResult},
    models::domain::Attempt,
};

/// Storage for quiz attempts.
///
/// Implementations must guarantee two things atomically: `finalize` only
/// succeeds for an attempt that is still open, and no two graded attempts of
/// the same learner and quiz share an `attempt_number`. A taken number is
/// reported as `AppError::AlreadyExists`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    async fn create(&self, attempt: Attempt) -> AppResult<Attempt>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Attempt>>;
    async fn count_completed(&self, learner_id: &str, quiz_id: &str) -> AppResult<i64>;
    /// Replace an open attempt with its graded form.
    async fn finalize(&self, graded: Attempt) -> AppResult<Attempt>;
    /// Store an attempt that was graded without ever being opened.
    async fn insert_graded(&self, graded: Attempt) -> AppResult<Attempt>;
    async fn best_passing_score(
        &self,
        learner_id: &str,
        quiz_ids: Vec<String>,
    ) -> AppResult<Option<f64>>;
    async fn list_for_learner(
        &self,
        learner_id: &str,
        quiz_id: Option<String>,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Attempt>, i64)>;
}

pub struct MongoAttemptRepository {
    collection: Collection<Attempt>,
}

impl MongoAttemptRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection(db::ATTEMPTS);
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for quiz_attempts collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        // one graded attempt per (learner, quiz, number); open attempts carry no number
        let slot_index = IndexModel::builder()
            .keys(doc! { "learner_id": 1, "quiz_id": 1, "attempt_number": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "attempt_number": { "$type": "int" } })
                    .name("learner_quiz_attempt_number_unique".to_string())
                    .build(),
            )
            .build();

        let learner_index = IndexModel::builder()
            .keys(doc! { "learner_id": 1, "started_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("learner_started_at".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(slot_index).await?;
        self.collection.create_index(learner_index).await?;

        log::info!("Successfully created indexes for quiz_attempts collection");
        Ok(())
    }
}

#[async_trait]
impl AttemptRepository for MongoAttemptRepository {
    async fn create(&self, attempt: Attempt) -> AppResult<Attempt> {
        self.collection.insert_one(&attempt).await?;
        Ok(attempt)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Attempt>> {
        let attempt = self.collection.find_one(doc! { "id": id }).await?;
        Ok(attempt)
    }

    async fn count_completed(&self, learner_id: &str, quiz_id: &str) -> AppResult<i64> {
        let count = self
            .collection
            .count_documents(doc! {
                "learner_id": learner_id,
                "quiz_id": quiz_id,
                "completed_at": { "$ne": null }
            })
            .await?;
        Ok(count as i64)
    }

    async fn finalize(&self, graded: Attempt) -> AppResult<Attempt> {
        let result = self
            .collection
            .replace_one(doc! { "id": &graded.id, "completed_at": null }, &graded)
            .await;

        let result = match result {
            Ok(result) => result,
            Err(err) if is_duplicate_key(&err) => {
                return Err(AppError::AlreadyExists(format!(
                    "attempt number {:?} for quiz '{}' is taken",
                    graded.attempt_number, graded.quiz_id
                )))
            }
            Err(err) => return Err(err.into()),
        };

        if result.matched_count == 0 {
            return match self.find_by_id(&graded.id).await? {
                Some(_) => Err(AppError::AttemptAlreadyGraded(graded.id)),
                None => Err(AppError::AttemptNotFound(graded.id)),
            };
        }

        Ok(graded)
    }

    async fn insert_graded(&self, graded: Attempt) -> AppResult<Attempt> {
        self.collection.insert_one(&graded).await?;
        Ok(graded)
    }

    async fn best_passing_score(
        &self,
        learner_id: &str,
        quiz_ids: Vec<String>,
    ) -> AppResult<Option<f64>> {
        if quiz_ids.is_empty() {
            return Ok(None);
        }

        let mut cursor = self
            .collection
            .find(doc! {
                "learner_id": learner_id,
                "quiz_id": { "$in": quiz_ids },
                "passed": true
            })
            .sort(doc! { "score": -1 })
            .limit(1)
            .await?;

        let best = cursor.try_next().await?;
        Ok(best.and_then(|attempt| attempt.score))
    }

    async fn list_for_learner(
        &self,
        learner_id: &str,
        quiz_id: Option<String>,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Attempt>, i64)> {
        let mut filter = doc! { "learner_id": learner_id };

        if let Some(qid) = quiz_id {
            filter.insert("quiz_id", qid);
        }

        let total = self.collection.count_documents(filter.clone()).await?;

        let attempts = self
            .collection
            .find(filter)
            .skip(offset.max(0) as u64)
            .limit(limit)
            .sort(doc! { "started_at": -1 })
            .await?
            .try_collect()
            .await?;

        Ok((attempts, total as i64))
    }
}
