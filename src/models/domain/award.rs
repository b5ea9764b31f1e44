use async_graphql::{Enum, SimpleObject};
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Enum, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadgeTrigger {
    CourseCompletion,
    QuizPass,
    PerfectQuiz,
}

/// Award rule: grants `badge_id` to learners of `course_id` when `trigger` fires.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, SimpleObject)]
pub struct CourseBadge {
    pub id: String,
    pub course_id: String,
    pub badge_id: String,
    pub badge_name: String,
    pub trigger: BadgeTrigger,
    pub min_score: Option<f64>,
}

/// Grant record. Unique per (learner, badge) across all courses.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, SimpleObject)]
pub struct UserBadge {
    pub id: String,
    pub learner_id: String,
    pub badge_id: String,
    pub metadata: BadgeGrantMetadata,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, SimpleObject)]
pub struct BadgeGrantMetadata {
    pub course_id: String,
    pub trigger: BadgeTrigger,
    pub score: Option<f64>,
}

impl UserBadge {
    pub fn grant(
        learner_id: &str,
        rule: &CourseBadge,
        score: Option<f64>,
        now: DateTime<Utc>,
    ) -> Self {
        UserBadge {
            id: Uuid::new_v4().to_string(),
            learner_id: learner_id.to_string(),
            badge_id: rule.badge_id.clone(),
            metadata: BadgeGrantMetadata {
                course_id: rule.course_id.clone(),
                trigger: rule.trigger,
                score,
            },
            awarded_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, SimpleObject)]
pub struct CertificateTemplate {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub enabled: bool,
    pub validity_months: Option<i32>,
    pub min_score: f64, // 0 disables the score requirement
    pub require_all_lessons: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, SimpleObject)]
pub struct Certificate {
    pub id: String,
    pub learner_id: String,
    pub course_id: String,
    pub template_id: String,
    pub title: String,
    pub certificate_number: String,
    pub score: Option<f64>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    #[graphql(skip)]
    pub verification_code: String,
    pub verification_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Enum, Copy)]
pub enum CertificateStatus {
    Valid,
    Expired,
    Unknown,
}

/// Human-auditable number: course prefix, issuance second, random suffix.
/// Platform-wide uniqueness is enforced by the unique index on the number.
pub fn certificate_number(course_id: &str, issued_at: DateTime<Utc>) -> String {
    let prefix: String = course_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_ascii_uppercase();
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase();

    format!(
        "CERT-{}-{}-{}",
        if prefix.is_empty() { "COURSE".to_string() } else { prefix },
        issued_at.format("%Y%m%d%H%M%S"),
        suffix
    )
}

pub fn verification_code(certificate_number: &str, learner_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(certificate_number.as_bytes());
    hasher.update(b":");
    hasher.update(learner_id.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

impl Certificate {
    pub fn issue(
        learner_id: &str,
        template: &CertificateTemplate,
        score: Option<f64>,
        verify_base_url: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let number = certificate_number(&template.course_id, now);
        let code = verification_code(&number, learner_id);
        let expires_at = template
            .validity_months
            .filter(|months| *months > 0)
            .and_then(|months| now.checked_add_months(Months::new(months as u32)));

        Certificate {
            id: Uuid::new_v4().to_string(),
            learner_id: learner_id.to_string(),
            course_id: template.course_id.clone(),
            template_id: template.id.clone(),
            title: template.title.clone(),
            verification_url: format!(
                "{}/{}?code={}",
                verify_base_url.trim_end_matches('/'),
                number,
                code
            ),
            certificate_number: number,
            score,
            issued_at: now,
            expires_at,
            verification_code: code,
        }
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> CertificateStatus {
        match self.expires_at {
            Some(expires_at) if expires_at <= now => CertificateStatus::Expired,
            _ => CertificateStatus::Valid,
        }
    }
}
