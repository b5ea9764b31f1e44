use async_graphql::{Context, Object, Result, ResultExt, ID};

use crate::{
    app_state::AppState,
    auth::{caller_from_context, require_self_or, Capability},
    errors::AppError,
    graphql::helpers::{authorize, pagination, target_learner},
    models::{
        domain::{Certificate, Course, Quiz, UserBadge},
        dto::{
            request::PaginationParams,
            response::{
                AttemptResponse, PaginatedAttempts, PaginationMetadata, ProgressResponse,
                QuizForTaking,
            },
        },
    },
    services::award_service::CertificateVerification,
};

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// A quiz as presented to learners, without answers.
    async fn quiz_for_taking(&self, ctx: &Context<'_>, id: ID) -> Result<QuizForTaking> {
        let state = ctx.data::<AppState>()?;
        authorize(ctx, &[Capability::TakeQuizzes]).extend()?;

        state.catalog_service.quiz_for_taking(&id).await.extend()
    }

    /// Full quiz definition including correct options.
    async fn quiz(&self, ctx: &Context<'_>, id: ID) -> Result<Quiz> {
        let state = ctx.data::<AppState>()?;
        authorize(ctx, &[Capability::ManageCourses]).extend()?;

        state.catalog_service.get_quiz(&id).await.extend()
    }

    async fn course(&self, ctx: &Context<'_>, id: ID) -> Result<Course> {
        let state = ctx.data::<AppState>()?;
        caller_from_context(ctx).extend()?;

        state.catalog_service.get_course(&id).await.extend()
    }

    async fn attempt(&self, ctx: &Context<'_>, id: ID) -> Result<AttemptResponse> {
        let state = ctx.data::<AppState>()?;
        let caller = caller_from_context(ctx).extend()?;

        let attempt = state.attempt_service.find_attempt(&id).await.extend()?;
        require_self_or(&caller, &attempt.learner_id, Capability::ViewLearnerRecords).extend()?;

        // answers are only revealed on graded attempts
        let quiz = if attempt.is_graded() {
            match state.attempt_service.get_quiz(&attempt.quiz_id).await {
                Ok(quiz) => Some(quiz),
                Err(AppError::QuizNotFound(_)) => None,
                Err(err) => return Err(err).extend(),
            }
        } else {
            None
        };

        Ok(AttemptResponse::from_attempt(attempt, quiz.as_ref()))
    }

    /// Attempt history, newest first.
    async fn attempts(
        &self,
        ctx: &Context<'_>,
        quiz_id: Option<ID>,
        learner_id: Option<ID>,
        pagination_params: Option<PaginationParams>,
    ) -> Result<PaginatedAttempts> {
        let state = ctx.data::<AppState>()?;
        let caller = caller_from_context(ctx).extend()?;
        let learner_id = target_learner(&caller, learner_id).extend()?;
        let (offset, limit) = pagination(pagination_params).extend()?;

        let (attempts, total) = state
            .attempt_service
            .history(&learner_id, quiz_id.map(|id| id.to_string()), offset, limit)
            .await
            .extend()?;

        Ok(PaginatedAttempts {
            items: attempts
                .into_iter()
                .map(|a| AttemptResponse::from_attempt(a, None))
                .collect(),
            pagination: PaginationMetadata::new(offset, limit, total),
        })
    }

    /// Null when the quiz allows unlimited attempts.
    async fn attempts_remaining(
        &self,
        ctx: &Context<'_>,
        quiz_id: ID,
        learner_id: Option<ID>,
    ) -> Result<Option<i32>> {
        let state = ctx.data::<AppState>()?;
        let caller = caller_from_context(ctx).extend()?;
        let learner_id = target_learner(&caller, learner_id).extend()?;

        state
            .attempt_service
            .attempts_remaining(&learner_id, &quiz_id)
            .await
            .extend()
    }

    async fn course_progress(
        &self,
        ctx: &Context<'_>,
        course_id: ID,
        learner_id: Option<ID>,
    ) -> Result<Option<ProgressResponse>> {
        let state = ctx.data::<AppState>()?;
        let caller = caller_from_context(ctx).extend()?;
        let learner_id = target_learner(&caller, learner_id).extend()?;

        let progress = state
            .progress_service
            .get_progress(&learner_id, &course_id)
            .await
            .extend()?;
        Ok(progress.map(ProgressResponse::from))
    }

    async fn my_badges(&self, ctx: &Context<'_>, learner_id: Option<ID>) -> Result<Vec<UserBadge>> {
        let state = ctx.data::<AppState>()?;
        let caller = caller_from_context(ctx).extend()?;
        let learner_id = target_learner(&caller, learner_id).extend()?;

        state.award_service.badges_for_learner(&learner_id).await.extend()
    }

    async fn my_certificates(
        &self,
        ctx: &Context<'_>,
        learner_id: Option<ID>,
    ) -> Result<Vec<Certificate>> {
        let state = ctx.data::<AppState>()?;
        let caller = caller_from_context(ctx).extend()?;
        let learner_id = target_learner(&caller, learner_id).extend()?;

        state
            .award_service
            .certificates_for_learner(&learner_id)
            .await
            .extend()
    }

    /// Public: anyone holding a certificate number and its code may verify it.
    async fn verify_certificate(
        &self,
        ctx: &Context<'_>,
        certificate_number: String,
        code: String,
    ) -> Result<CertificateVerification> {
        let state = ctx.data::<AppState>()?;

        state
            .award_service
            .verify_certificate(&certificate_number, &code)
            .await
            .extend()
    }
}
