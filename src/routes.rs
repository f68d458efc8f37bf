// src/routes.rs

use std::sync::Arc;

use axum::{
    Router,
    http::Method,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use tower_governor::{
    GovernorError, GovernorLayer, governor::GovernorConfigBuilder,
    key_extractor::GlobalKeyExtractor,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    error::AppError,
    handlers::{generate, questions, sets},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (generation, sets, questions).
/// * Rate limits the generation route when configured.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let mut generate_routes =
        Router::new().route("/generate-questions", post(generate::generate_questions));

    let replenish = state.config.generate_replenish_secs;
    let burst = state.config.generate_burst;
    if replenish > 0 && burst > 0 {
        // One model call per request; a global bucket caps spend regardless of caller.
        let governor_conf = GovernorConfigBuilder::default()
            .key_extractor(GlobalKeyExtractor)
            .per_second(replenish)
            .burst_size(burst)
            .finish();

        match governor_conf {
            Some(conf) => {
                generate_routes = generate_routes
                    .layer(GovernorLayer::new(Arc::new(conf)).error_handler(governor_error));
            }
            None => tracing::warn!("Invalid rate limit settings, generation route is unlimited"),
        }
    }

    let set_routes = Router::new()
        .route("/set", post(sets::create_set))
        .route(
            "/set/{set_id}",
            get(sets::get_set)
                .patch(sets::update_set)
                .delete(sets::delete_set),
        )
        .route("/sets/user/{user_id}", get(sets::list_user_sets))
        .route("/sets/search", get(sets::search_sets));

    let question_routes = Router::new()
        .route("/questions", post(questions::create_question))
        .route("/questions/reorder", post(questions::reorder_questions))
        .route("/questions/{set_id}", get(questions::list_questions))
        .route(
            "/question/{id}",
            patch(questions::update_question).delete(questions::delete_question),
        );

    let api = Router::new()
        .merge(generate_routes)
        .merge(set_routes)
        .merge(question_routes);

    Router::new()
        .nest("/api", api)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Renders limiter rejections in the same `{ error, message }` shape as every other error.
fn governor_error(err: GovernorError) -> Response {
    match err {
        GovernorError::TooManyRequests { wait_time, headers } => {
            let mut response = AppError::RateLimited(format!(
                "Too many generation requests, retry in {}s",
                wait_time
            ))
            .into_response();
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
        other => AppError::InternalServerError(other.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{
        ai::{CompletionRequest, LanguageModel, ModelError, QuestionGenerator},
        config::Config,
        store::MemoryStore,
    };

    struct SilentModel;

    #[async_trait]
    impl LanguageModel for SilentModel {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ModelError> {
            Err(ModelError::EmptyResponse)
        }

        fn name(&self) -> &str {
            "silent"
        }
    }

    fn state(replenish: u64, burst: u32) -> AppState {
        let config = Config {
            database_url: None,
            llm_api_key: "k".to_string(),
            llm_base_url: url::Url::parse("http://127.0.0.1:9/v1").unwrap(),
            llm_model: "silent".to_string(),
            llm_temperature: 0.0,
            generation_timeout: Duration::from_secs(1),
            generate_replenish_secs: replenish,
            generate_burst: burst,
            port: 0,
            rust_log: "error".to_string(),
        };
        AppState {
            store: Arc::new(MemoryStore::new()),
            generator: Arc::new(QuestionGenerator::new(
                Arc::new(SilentModel),
                config.generation_timeout,
            )),
            config,
        }
    }

    fn generate_request() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/generate-questions")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"questionQuantity":0,"context":"x","userId":"u"}"#))
            .unwrap()
    }

    #[tokio::test]
    async fn generation_route_is_rate_limited() {
        let app = create_router(state(60, 1));

        let first = app.clone().oneshot(generate_request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::BAD_REQUEST);

        let second = app.oneshot(generate_request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key("retry-after"));

        let bytes = axum::body::to_bytes(second.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "rate_limited");
    }

    #[tokio::test]
    async fn zero_burst_disables_the_limit() {
        let app = create_router(state(60, 0));

        for _ in 0..3 {
            let resp = app.clone().oneshot(generate_request()).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let app = create_router(state(0, 0));
        let resp = app
            .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
