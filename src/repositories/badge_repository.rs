use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{IndexOptions, ReplaceOptions},
    Collection, IndexModel,
};

use crate::{
    db::{self, Database},
    errors::{is_duplicate_key, AppResult},
    models::domain::{CourseBadge, UserBadge},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BadgeRepository: Send + Sync {
    async fn rules_for_course(&self, course_id: &str) -> AppResult<Vec<CourseBadge>>;
    async fn save_rule(&self, rule: CourseBadge) -> AppResult<CourseBadge>;
    async fn has_badge(&self, learner_id: &str, badge_id: &str) -> AppResult<bool>;
    /// Returns false, without writing, when the learner already holds the badge.
    async fn grant(&self, badge: UserBadge) -> AppResult<bool>;
    async fn badges_for_learner(&self, learner_id: &str) -> AppResult<Vec<UserBadge>>;
}

pub struct MongoBadgeRepository {
    rules: Collection<CourseBadge>,
    grants: Collection<UserBadge>,
}

impl MongoBadgeRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            rules: db.get_collection(db::COURSE_BADGES),
            grants: db.get_collection(db::USER_BADGES),
        }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let rule_id = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.rules.create_index(rule_id).await?;

        let rule_course = IndexModel::builder()
            .keys(doc! { "course_id": 1 })
            .build();
        self.rules.create_index(rule_course).await?;
        log::info!("Created indexes on course_badges");

        let grant_unique = IndexModel::builder()
            .keys(doc! { "learner_id": 1, "badge_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("learner_badge_unique".to_string())
                    .build(),
            )
            .build();
        self.grants.create_index(grant_unique).await?;
        log::info!("Created unique index on user_badges (learner_id, badge_id)");

        Ok(())
    }
}

#[async_trait]
impl BadgeRepository for MongoBadgeRepository {
    async fn rules_for_course(&self, course_id: &str) -> AppResult<Vec<CourseBadge>> {
        let rules = self
            .rules
            .find(doc! { "course_id": course_id })
            .await?
            .try_collect()
            .await?;
        Ok(rules)
    }

    async fn save_rule(&self, rule: CourseBadge) -> AppResult<CourseBadge> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.rules
            .replace_one(doc! { "id": &rule.id }, &rule)
            .with_options(options)
            .await?;
        Ok(rule)
    }

    async fn has_badge(&self, learner_id: &str, badge_id: &str) -> AppResult<bool> {
        let existing = self
            .grants
            .find_one(doc! { "learner_id": learner_id, "badge_id": badge_id })
            .await?;
        Ok(existing.is_some())
    }

    async fn grant(&self, badge: UserBadge) -> AppResult<bool> {
        match self.grants.insert_one(&badge).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => {
                log::debug!(
                    "Badge '{}' already held by learner '{}'",
                    badge.badge_id,
                    badge.learner_id
                );
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn badges_for_learner(&self, learner_id: &str) -> AppResult<Vec<UserBadge>> {
        let badges = self
            .grants
            .find(doc! { "learner_id": learner_id })
            .sort(doc! { "awarded_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(badges)
    }
}
