use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::instrument;

use crate::{
    application::{
        error::{HttpError, MARKDOWN_CONTENT_TYPE, MirrorError, Subject},
        mirror::MirrorServices,
    },
    domain::types::Taxonomy,
};

use super::middleware::{log_responses, set_request_context};

const MARKDOWN_EXTENSION: &str = ".md";

#[derive(Clone)]
pub struct HttpState {
    pub services: MirrorServices,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/llms.txt", get(index_document))
        .route("/llms-ctx.txt", get(basic_context))
        .route("/llms-ctx-full.txt", get(full_context))
        .route("/{file}", get(entity_document))
        .route("/{taxonomy}/{file}", get(taxonomy_archive))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

fn markdown_response(body: String) -> Response {
    let mut response = (StatusCode::OK, body).into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(MARKDOWN_CONTENT_TYPE));
    response
}

fn respond(source: &'static str, result: Result<String, MirrorError>) -> Response {
    match result {
        Ok(body) => markdown_response(body),
        Err(err) => HttpError::from_mirror(source, &err).into_response(),
    }
}

#[instrument(skip_all)]
async fn index_document(State(state): State<HttpState>) -> Response {
    respond(
        "infra::http::public::index_document",
        state.services.index.get_or_build().await,
    )
}

#[instrument(skip_all)]
async fn basic_context(State(state): State<HttpState>) -> Response {
    respond(
        "infra::http::public::basic_context",
        state.services.context.get_or_build_basic().await,
    )
}

#[instrument(skip_all)]
async fn full_context(State(state): State<HttpState>) -> Response {
    respond(
        "infra::http::public::full_context",
        state.services.context.get_or_build_full().await,
    )
}

#[instrument(skip_all, fields(file = %file))]
async fn entity_document(State(state): State<HttpState>, Path(file): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::entity_document";

    let Some(slug) = file.strip_suffix(MARKDOWN_EXTENSION) else {
        return not_found(SOURCE, &file);
    };
    respond(SOURCE, state.services.markdown.get_or_build_eligible(slug).await)
}

#[instrument(skip_all, fields(taxonomy = %taxonomy, file = %file))]
async fn taxonomy_archive(
    State(state): State<HttpState>,
    Path((taxonomy, file)): Path<(String, String)>,
) -> Response {
    const SOURCE: &str = "infra::http::public::taxonomy_archive";

    let Some(term) = file.strip_suffix(MARKDOWN_EXTENSION) else {
        return not_found(SOURCE, &file);
    };
    let Ok(taxonomy) = taxonomy.parse::<Taxonomy>() else {
        return not_found(SOURCE, &taxonomy);
    };
    respond(
        SOURCE,
        state.services.taxonomy.get_or_build(taxonomy, term).await,
    )
}

async fn fallback() -> Response {
    not_found("infra::http::public::fallback", "route")
}

fn not_found(source: &'static str, reference: &str) -> Response {
    let err = MirrorError::not_found(Subject::Content, reference);
    HttpError::from_mirror(source, &err).into_response()
}
