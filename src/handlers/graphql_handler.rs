use actix_web::{get, post, web, HttpResponse};
use async_graphql::http::GraphiQLSource;
use async_graphql_actix_web::{GraphQLRequest, GraphQLResponse};

use crate::{auth::Caller, graphql::Schema};

/// Requests without gateway identity headers still reach the schema so
/// public queries such as certificate verification work.
#[post("/graphql")]
pub async fn graphql(
    schema: web::Data<Schema>,
    caller: Option<Caller>,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = request.into_inner();
    if let Some(caller) = caller {
        log::debug!("GraphQL request from {} ({:?})", caller.user_id, caller.role);
        request = request.data(caller);
    }
    schema.execute(request).await.into()
}

#[get("/graphiql")]
pub async fn graphiql() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(GraphiQLSource::build().endpoint("/graphql").finish())
}
