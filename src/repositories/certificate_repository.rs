use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{IndexOptions, ReplaceOptions},
    Collection, IndexModel,
};

use crate::{
    db::{self, Database},
    errors::{is_duplicate_key, AppError, AppResult},
    models::domain::{Certificate, CertificateTemplate},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CertificateRepository: Send + Sync {
    async fn template_for_course(&self, course_id: &str) -> AppResult<Option<CertificateTemplate>>;
    async fn save_template(&self, template: CertificateTemplate) -> AppResult<CertificateTemplate>;
    async fn find_for_learner(
        &self,
        learner_id: &str,
        course_id: &str,
    ) -> AppResult<Option<Certificate>>;
    /// `Ok(None)` when the learner already holds a certificate for the course.
    /// A clashing certificate number is an `AlreadyExists` error.
    async fn issue(&self, certificate: Certificate) -> AppResult<Option<Certificate>>;
    async fn find_by_number(&self, certificate_number: &str) -> AppResult<Option<Certificate>>;
    async fn certificates_for_learner(&self, learner_id: &str) -> AppResult<Vec<Certificate>>;
}

pub struct MongoCertificateRepository {
    templates: Collection<CertificateTemplate>,
    certificates: Collection<Certificate>,
}

impl MongoCertificateRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            templates: db.get_collection(db::CERTIFICATE_TEMPLATES),
            certificates: db.get_collection(db::CERTIFICATES),
        }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let template_course = IndexModel::builder()
            .keys(doc! { "course_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("course_unique".to_string())
                    .build(),
            )
            .build();
        self.templates.create_index(template_course).await?;

        let learner_course = IndexModel::builder()
            .keys(doc! { "learner_id": 1, "course_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("learner_course_unique".to_string())
                    .build(),
            )
            .build();
        let number = IndexModel::builder()
            .keys(doc! { "certificate_number": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("certificate_number_unique".to_string())
                    .build(),
            )
            .build();
        self.certificates.create_index(learner_course).await?;
        self.certificates.create_index(number).await?;

        log::info!("Created unique indexes on certificates and certificate_templates");
        Ok(())
    }
}

#[async_trait]
impl CertificateRepository for MongoCertificateRepository {
    async fn template_for_course(&self, course_id: &str) -> AppResult<Option<CertificateTemplate>> {
        let template = self
            .templates
            .find_one(doc! { "course_id": course_id })
            .await?;
        Ok(template)
    }

    async fn save_template(&self, template: CertificateTemplate) -> AppResult<CertificateTemplate> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.templates
            .replace_one(doc! { "course_id": &template.course_id }, &template)
            .with_options(options)
            .await?;
        Ok(template)
    }

    async fn find_for_learner(
        &self,
        learner_id: &str,
        course_id: &str,
    ) -> AppResult<Option<Certificate>> {
        let certificate = self
            .certificates
            .find_one(doc! { "learner_id": learner_id, "course_id": course_id })
            .await?;
        Ok(certificate)
    }

    async fn issue(&self, certificate: Certificate) -> AppResult<Option<Certificate>> {
        match self.certificates.insert_one(&certificate).await {
            Ok(_) => Ok(Some(certificate)),
            Err(err) if is_duplicate_key(&err) => {
                let held = self
                    .find_for_learner(&certificate.learner_id, &certificate.course_id)
                    .await?;
                if held.is_some() {
                    Ok(None)
                } else {
                    Err(AppError::AlreadyExists(format!(
                        "certificate number '{}' is already in use",
                        certificate.certificate_number
                    )))
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_number(&self, certificate_number: &str) -> AppResult<Option<Certificate>> {
        let certificate = self
            .certificates
            .find_one(doc! { "certificate_number": certificate_number })
            .await?;
        Ok(certificate)
    }

    async fn certificates_for_learner(&self, learner_id: &str) -> AppResult<Vec<Certificate>> {
        let certificates = self
            .certificates
            .find(doc! { "learner_id": learner_id })
            .sort(doc! { "issued_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(certificates)
    }
}
