use async_graphql::{Context, ID};

use crate::{
    auth::{caller_from_context, require_capabilities, require_self_or, Caller, Capability},
    errors::AppResult,
    models::dto::request::PaginationParams,
};
use validator::Validate;

/// Resolve the calling identity and check it holds `required`.
pub fn authorize(ctx: &Context<'_>, required: &[Capability]) -> AppResult<Caller> {
    let caller = caller_from_context(ctx)?;
    require_capabilities(caller.role, required)?;
    Ok(caller)
}

/// The learner a query is about: the caller unless another id is given,
/// which needs `ViewLearnerRecords`.
pub fn target_learner(caller: &Caller, learner_id: Option<ID>) -> AppResult<String> {
    let learner_id = learner_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| caller.user_id.clone());
    require_self_or(caller, &learner_id, Capability::ViewLearnerRecords)?;
    Ok(learner_id)
}

pub fn pagination(params: Option<PaginationParams>) -> AppResult<(i64, i64)> {
    let params = params.unwrap_or_default();
    params.validate()?;
    Ok((params.offset(), params.limit()))
}
