//! Model-backed evaluation: retry behavior, fallbacks and a wire round trip.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use sqlgate_core::completion::{
    ApiKey, CompletionClient, CompletionError, CompletionRequest, CompletionResult, OpenAiClient,
};
use sqlgate_core::evaluator::{ModelEvaluator, RiskEvaluator};
use sqlgate_core::retry::RetryConfig;
use sqlgate_core::{EvaluationTier, SeverityTier, Statement, StatementKind};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Clone)]
enum Reply {
    Text(&'static str),
    Status(u16),
}

/// Client replaying a fixed script; the last reply repeats once exhausted.
struct ScriptedClient {
    script: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    fn new(script: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, _request: &CompletionRequest) -> CompletionResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            }
        };
        match reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Status(status) => Err(CompletionError::ApiResponse {
                status,
                message: "scripted failure".to_string(),
                retry_after_ms: None,
            }),
        }
    }
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 2,
        jitter_factor: 0.0,
    }
}

fn evaluator(client: Arc<ScriptedClient>) -> ModelEvaluator {
    ModelEvaluator::new(client, "test-model", 0.3, 400, fast_retry())
}

fn statement() -> Statement {
    Statement::new(
        "SELECT * FROM orders WHERE total > 100",
        StatementKind::Select,
        "reports/orders.sql",
        vec!["orders".to_string()],
    )
}

fn plan() -> Vec<String> {
    vec!["Seq Scan on orders  (cost=0.00..35.50 rows=10 width=16)".to_string()]
}

const GOOD_JSON: &str = r#"{"evaluation": "GOOD", "severity": "LOW", "execution_time": "0.4 ms", "issues": [], "recommendations": ["Keep the filter selective"]}"#;

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let client = ScriptedClient::new(vec![Reply::Status(503), Reply::Status(429), Reply::Text(GOOD_JSON)]);
    let verdict = evaluator(client.clone())
        .assess(&statement(), &plan(), &CancellationToken::new())
        .await;

    assert_eq!(client.calls(), 3);
    assert_eq!(verdict.evaluation, EvaluationTier::Good);
    assert_eq!(verdict.estimated_time, "0.4 ms");
}

#[tokio::test]
async fn exhausted_retries_fall_back_to_high_severity() {
    let client = ScriptedClient::new(vec![Reply::Status(502)]);
    let verdict = evaluator(client.clone())
        .assess(&statement(), &plan(), &CancellationToken::new())
        .await;

    assert_eq!(client.calls(), 3);
    assert_eq!(verdict.evaluation, EvaluationTier::Acceptable);
    assert_eq!(verdict.severity, SeverityTier::High);
    assert!(verdict.issues[0].starts_with("Evaluator backend unavailable"));
}

#[tokio::test]
async fn authentication_failure_is_not_retried() {
    let client = ScriptedClient::new(vec![Reply::Status(401)]);
    let verdict = evaluator(client.clone())
        .assess(&statement(), &plan(), &CancellationToken::new())
        .await;

    assert_eq!(client.calls(), 1);
    assert_eq!(verdict.severity, SeverityTier::High);
}

#[tokio::test]
async fn prose_without_json_is_a_parse_fallback() {
    let client = ScriptedClient::new(vec![Reply::Text("This query looks fine to me.")]);
    let verdict = evaluator(client.clone())
        .assess(&statement(), &plan(), &CancellationToken::new())
        .await;

    assert_eq!(client.calls(), 1);
    assert_eq!(verdict.evaluation, EvaluationTier::Acceptable);
    assert_eq!(verdict.severity, SeverityTier::Medium);
}

#[tokio::test]
async fn unknown_tier_keeps_the_statement_reviewable() {
    let client = ScriptedClient::new(vec![Reply::Text(
        r#"{"evaluation": "GOOD|CRITICAL", "severity": "SEVERE", "issues": "Missing index on total"}"#,
    )]);
    let verdict = evaluator(client)
        .assess(&statement(), &plan(), &CancellationToken::new())
        .await;

    assert_eq!(verdict.evaluation, EvaluationTier::Acceptable);
    assert_eq!(verdict.severity, SeverityTier::Medium);
    assert_eq!(verdict.issues[0], "Missing index on total");
    assert!(verdict.issues.len() >= 2);
}

#[tokio::test]
async fn cancelled_evaluation_stops_calling_the_backend() {
    let client = ScriptedClient::new(vec![Reply::Status(503)]);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let verdict = evaluator(client.clone())
        .assess(&statement(), &plan(), &cancel)
        .await;

    assert!(client.calls() <= 1);
    assert_eq!(verdict.severity, SeverityTier::High);
}

#[tokio::test]
async fn openai_compatible_backend_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "```json\n{\"evaluation\": \"CRITICAL\", \"severity\": \"CRITICAL\", \"execution_time\": \"n/a\", \"issues\": [\"Full table rewrite\"], \"recommendations\": [\"Batch the update\"]}\n```"
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(server.uri(), ApiKey::literal("sk-test"), std::time::Duration::from_secs(5)).unwrap();
    let model = ModelEvaluator::new(Arc::new(client), "test-model", 0.3, 400, fast_retry());
    let verdict = model
        .assess(&statement(), &plan(), &CancellationToken::new())
        .await;

    assert_eq!(verdict.evaluation, EvaluationTier::Critical);
    assert_eq!(verdict.issues, vec!["Full table rewrite".to_string()]);
    assert_eq!(verdict.recommendations, vec!["Batch the update".to_string()]);
}
