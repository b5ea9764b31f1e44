use async_graphql::{Context, Object, Result, ResultExt, ID};

use crate::{
    app_state::AppState,
    auth::{caller_from_context, require_capabilities, require_self_or, Capability},
    graphql::helpers::authorize,
    models::{
        domain::{CertificateTemplate, Course, CourseBadge, Quiz},
        dto::{
            request::{
                submitted_answers, CertificateTemplateInput, CourseBadgeInput, CourseInput,
                GradeQuizInput, QuizInput, SubmitAttemptInput,
            },
            response::{
                AttemptResponse, LessonCompletionResponse, ProgressResponse, SubmissionResponse,
            },
        },
    },
    services::award_service::{AwardContext, AwardResult},
};
use validator::Validate;

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Enroll the caller, or with `ManageCourses` another learner. Idempotent.
    async fn enroll(
        &self,
        ctx: &Context<'_>,
        course_id: ID,
        learner_id: Option<ID>,
    ) -> Result<ProgressResponse> {
        let state = ctx.data::<AppState>()?;
        let caller = caller_from_context(ctx).extend()?;
        let learner_id = learner_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| caller.user_id.clone());
        require_self_or(&caller, &learner_id, Capability::ManageCourses).extend()?;

        let progress = state
            .progress_service
            .enroll(&learner_id, &course_id)
            .await
            .extend()?;
        Ok(progress.into())
    }

    async fn start_attempt(&self, ctx: &Context<'_>, quiz_id: ID) -> Result<AttemptResponse> {
        let state = ctx.data::<AppState>()?;
        let caller = authorize(ctx, &[Capability::TakeQuizzes]).extend()?;

        let attempt = state
            .attempt_service
            .start_attempt(&caller.user_id, &quiz_id)
            .await
            .extend()?;
        Ok(AttemptResponse::from_attempt(attempt, None))
    }

    /// Grade an attempt opened with `startAttempt`, then update progress and awards.
    async fn submit_attempt(
        &self,
        ctx: &Context<'_>,
        input: SubmitAttemptInput,
    ) -> Result<SubmissionResponse> {
        let state = ctx.data::<AppState>()?;
        let caller = authorize(ctx, &[Capability::TakeQuizzes]).extend()?;
        input.validate().map_err(crate::errors::AppError::from).extend()?;

        let answers = submitted_answers(input.answers).extend()?;
        let outcome = state
            .submission_service
            .submit_attempt(&caller.user_id, &input.attempt_id, &answers)
            .await
            .extend()?;

        Ok(SubmissionResponse {
            attempt: AttemptResponse::from_attempt(
                outcome.graded.attempt,
                Some(&outcome.graded.quiz),
            ),
            progress: outcome.progress.map(ProgressResponse::from),
            awards: outcome.awards,
        })
    }

    /// Grade and record in one call. Progress and awards are not touched.
    async fn grade_quiz(&self, ctx: &Context<'_>, input: GradeQuizInput) -> Result<AttemptResponse> {
        let state = ctx.data::<AppState>()?;
        let caller = authorize(ctx, &[Capability::TakeQuizzes]).extend()?;
        input.validate().map_err(crate::errors::AppError::from).extend()?;

        let answers = submitted_answers(input.answers).extend()?;
        let graded = state
            .submission_service
            .grade_quiz(&caller.user_id, &input.quiz_id, &answers)
            .await
            .extend()?;

        Ok(AttemptResponse::from_attempt(graded.attempt, Some(&graded.quiz)))
    }

    async fn complete_lesson(
        &self,
        ctx: &Context<'_>,
        course_id: ID,
        lesson_id: ID,
    ) -> Result<LessonCompletionResponse> {
        let state = ctx.data::<AppState>()?;
        let caller = authorize(ctx, &[Capability::TakeQuizzes]).extend()?;

        let outcome = state
            .submission_service
            .complete_lesson(&caller.user_id, &course_id, &lesson_id)
            .await
            .extend()?;

        Ok(LessonCompletionResponse {
            progress: outcome.progress.into(),
            awards: outcome.awards,
        })
    }

    /// Re-run the award rules for a learner. Never grants anything twice.
    async fn evaluate_awards(
        &self,
        ctx: &Context<'_>,
        course_id: ID,
        learner_id: Option<ID>,
    ) -> Result<AwardResult> {
        let state = ctx.data::<AppState>()?;
        let caller = caller_from_context(ctx).extend()?;
        let learner_id = learner_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| caller.user_id.clone());
        require_self_or(&caller, &learner_id, Capability::EvaluateAwards).extend()?;

        state
            .award_service
            .evaluate_awards(&learner_id, &course_id, AwardContext::default())
            .await
            .extend()
    }

    async fn save_quiz(&self, ctx: &Context<'_>, input: QuizInput) -> Result<Quiz> {
        let state = ctx.data::<AppState>()?;
        let caller = caller_from_context(ctx).extend()?;
        require_capabilities(caller.role, &[Capability::ManageCourses]).extend()?;

        state.catalog_service.save_quiz(input).await.extend()
    }

    async fn save_course(&self, ctx: &Context<'_>, input: CourseInput) -> Result<Course> {
        let state = ctx.data::<AppState>()?;
        authorize(ctx, &[Capability::ManageCourses]).extend()?;

        state.catalog_service.save_course(input).await.extend()
    }

    async fn save_certificate_template(
        &self,
        ctx: &Context<'_>,
        input: CertificateTemplateInput,
    ) -> Result<CertificateTemplate> {
        let state = ctx.data::<AppState>()?;
        authorize(ctx, &[Capability::ManageCourses]).extend()?;

        state
            .catalog_service
            .save_certificate_template(input)
            .await
            .extend()
    }

    async fn save_course_badge(
        &self,
        ctx: &Context<'_>,
        input: CourseBadgeInput,
    ) -> Result<CourseBadge> {
        let state = ctx.data::<AppState>()?;
        authorize(ctx, &[Capability::ManageCourses]).extend()?;

        state.catalog_service.save_course_badge(input).await.extend()
    }
}
