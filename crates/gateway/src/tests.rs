//! Router tests driven through `tower::ServiceExt::oneshot`

use super::*;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use ragwise_common::config::RateLimitConfig;
use ragwise_common::embeddings::HashingEmbedder;
use ragwise_common::llm::{CompletionService, OutputSchema, Prompt, TextStream};
use ragwise_common::{Document, Result as AppResult};
use ragwise_search::WebSearchProvider;
use serde_json::{json, Value};
use tower::ServiceExt;

const ANSWER: &str = "Task decomposition breaks a goal into smaller steps.";

const ARTICLE: &str = "Task decomposition lets an agent break a complicated goal into \
smaller and simpler steps. Chain of thought prompting asks the model to think step by step.";

/// Routes everything to the store and approves every grade
struct AgreeableCompletion;

#[async_trait]
impl CompletionService for AgreeableCompletion {
    async fn complete(&self, _prompt: &Prompt) -> AppResult<String> {
        Ok(ANSWER.to_string())
    }

    async fn complete_structured(&self, _prompt: &Prompt, schema: &OutputSchema) -> AppResult<Value> {
        Ok(match schema.name.as_str() {
            "route_query" => json!({ "datasource": "vectorstore" }),
            _ => json!({ "binary_score": true }),
        })
    }

    async fn complete_stream(&self, _prompt: &Prompt) -> AppResult<TextStream> {
        let chunks: Vec<AppResult<String>> = ANSWER
            .split_inclusive(' ')
            .map(|chunk| Ok(chunk.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    fn model_name(&self) -> &str {
        "agreeable"
    }
}

struct NoWebSearch;

#[async_trait]
impl WebSearchProvider for NoWebSearch {
    async fn search(&self, _query: &str) -> AppResult<Vec<Document>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "none"
    }
}

fn app_with(rate_limit: RateLimitConfig) -> Router {
    let config = AppConfig {
        rate_limit,
        ..AppConfig::default()
    };
    let store: Arc<dyn DocumentStore> = Arc::new(InMemoryVectorStore::new(Arc::new(HashingEmbedder::new(64))));
    let agent = Arc::new(Agent::new(
        Arc::new(AgreeableCompletion),
        store.clone(),
        Arc::new(NoWebSearch),
        config.agent.clone(),
        config.store.top_k,
    ));
    let ingestor = Arc::new(Ingestor::new(store.clone(), &config.ingestion).unwrap());

    create_router(AppState::new(config, agent, ingestor, store).unwrap())
}

fn app() -> Router {
    app_with(RateLimitConfig {
        requests_per_second: 100,
        burst: 100,
        enabled: true,
    })
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

async fn seed(app: &Router) {
    let response = app
        .clone()
        .oneshot(post(
            "/v1/documents",
            json!({ "documents": [{ "content": ARTICLE, "title": "Agents", "source": "https://blog.example/agents" }] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_health() {
    let response = app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_ready_reports_store_size() {
    let app = app();

    let before = body_json(app.clone().oneshot(get("/ready")).await.unwrap()).await;
    assert_eq!(before["checks"]["store"]["status"], "empty");
    assert_eq!(before["checks"]["store"]["documents"], 0);

    seed(&app).await;

    let after = body_json(app.oneshot(get("/ready")).await.unwrap()).await;
    assert_eq!(after["status"], "ready");
    assert_eq!(after["checks"]["store"]["status"], "up");
    assert!(after["checks"]["store"]["documents"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_ask_answers_from_the_store() {
    let app = app();
    seed(&app).await;

    let response = app
        .oneshot(post("/v1/ask", json!({ "question": "What is task decomposition?" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["answer"], ANSWER);
    assert_eq!(body["status"], "answered");
    assert_eq!(body["generate_attempts"], 1);
    assert_eq!(
        body["path"],
        json!(["ROUTE", "RETRIEVE", "GRADE_DOCUMENTS", "GENERATE", "END"])
    );
    assert_eq!(body["sources"][0]["title"], "Agents");
    assert_eq!(body["sources"][0]["origin"], "vectorstore");
}

#[tokio::test]
async fn test_blank_question_is_rejected() {
    let app = app();

    let empty = app.clone().oneshot(post("/v1/ask", json!({ "question": "" }))).await.unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(empty).await["error"]["code"], "VALIDATION_ERROR");

    let blank = app.oneshot(post("/v1/ask", json!({ "question": "   " }))).await.unwrap();
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ask_stream_emits_events_in_order() {
    let app = app();
    seed(&app).await;

    let response = app
        .oneshot(post("/v1/ask/stream", json!({ "question": "What is task decomposition?" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let body = body_text(response).await;
    let entered = body.find("event: node_entered").unwrap();
    let token = body.find("event: token").unwrap();
    let completed = body.find("event: completed").unwrap();
    assert!(entered < token && token < completed);
    assert!(!body.contains("event: error"));
}

#[tokio::test]
async fn test_ask_stream_rejects_empty_question_up_front() {
    let response = app()
        .oneshot(post("/v1/ask/stream", json!({ "question": "" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_graph_is_mermaid() {
    let response = app().oneshot(get("/v1/graph")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.starts_with("flowchart TD"));
    assert!(body.contains("WEBSEARCH"));
}

#[tokio::test]
async fn test_malformed_url_rejects_request() {
    let response = app()
        .oneshot(post("/v1/documents/urls", json!({ "urls": ["ftp://files.example/a"] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_document_batch_rejected() {
    let response = app()
        .oneshot(post("/v1/documents", json!({ "documents": [] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rate_limit_applies_to_api_routes_only() {
    let app = app_with(RateLimitConfig {
        requests_per_second: 1,
        burst: 1,
        enabled: true,
    });

    assert_eq!(app.clone().oneshot(get("/v1/graph")).await.unwrap().status(), StatusCode::OK);

    let limited = app.clone().oneshot(get("/v1/graph")).await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(limited).await["error"]["code"], "RATE_LIMITED");

    assert_eq!(app.oneshot(get("/health")).await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let response = app().oneshot(get("/health")).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
