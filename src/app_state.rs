use std::sync::Arc;

use crate::{
    config::{Config, EngineSettings},
    db::Database,
    errors::AppResult,
    repositories::{
        AttemptRepository, BadgeRepository, CertificateRepository, CourseRepository,
        MongoAttemptRepository, MongoBadgeRepository, MongoCertificateRepository,
        MongoCourseRepository, MongoProgressRepository, MongoQuizRepository, ProgressRepository,
        QuizRepository,
    },
    services::{
        keyed_lock::KeyedLock, AttemptService, AwardService, CatalogService, ProgressService,
        SubmissionService,
    },
};

/// Storage seams the services are built from.
#[derive(Clone)]
pub struct Repositories {
    pub quizzes: Arc<dyn QuizRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub courses: Arc<dyn CourseRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub badges: Arc<dyn BadgeRepository>,
    pub certificates: Arc<dyn CertificateRepository>,
}

#[derive(Clone)]
pub struct AppState {
    pub catalog_service: Arc<CatalogService>,
    pub attempt_service: Arc<AttemptService>,
    pub progress_service: Arc<ProgressService>,
    pub award_service: Arc<AwardService>,
    pub submission_service: Arc<SubmissionService>,
    pub db: Option<Database>,
}

impl AppState {
    pub async fn new(config: &Config) -> AppResult<Self> {
        let db = Database::connect(config).await?;

        let quizzes = Arc::new(MongoQuizRepository::new(&db));
        quizzes.ensure_indexes().await?;
        let attempts = Arc::new(MongoAttemptRepository::new(&db));
        attempts.ensure_indexes().await?;
        let courses = Arc::new(MongoCourseRepository::new(&db));
        courses.ensure_indexes().await?;
        let progress = Arc::new(MongoProgressRepository::new(&db));
        progress.ensure_indexes().await?;
        let badges = Arc::new(MongoBadgeRepository::new(&db));
        badges.ensure_indexes().await?;
        let certificates = Arc::new(MongoCertificateRepository::new(&db));
        certificates.ensure_indexes().await?;

        let repositories = Repositories {
            quizzes,
            attempts,
            courses,
            progress,
            badges,
            certificates,
        };

        let mut state = Self::from_repositories(repositories, config.engine.clone());
        state.db = Some(db);
        Ok(state)
    }

    pub fn from_repositories(repos: Repositories, settings: EngineSettings) -> Self {
        let locks = Arc::new(KeyedLock::new());

        let catalog_service = Arc::new(CatalogService::new(
            repos.quizzes.clone(),
            repos.courses.clone(),
            repos.badges.clone(),
            repos.certificates.clone(),
        ));
        let attempt_service = Arc::new(AttemptService::new(
            repos.quizzes.clone(),
            repos.attempts.clone(),
        ));
        let progress_service = Arc::new(ProgressService::new(
            repos.courses.clone(),
            repos.progress.clone(),
            locks.clone(),
        ));
        let award_service = Arc::new(AwardService::new(
            repos.courses,
            repos.progress,
            repos.quizzes,
            repos.attempts,
            repos.badges,
            repos.certificates,
            settings,
            locks,
        ));
        let submission_service = Arc::new(SubmissionService::new(
            attempt_service.clone(),
            progress_service.clone(),
            award_service.clone(),
        ));

        Self {
            catalog_service,
            attempt_service,
            progress_service,
            award_service,
            submission_service,
            db: None,
        }
    }
}
