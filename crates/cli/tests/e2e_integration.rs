//! End-to-end tests for repolens.
//!
//! These drive whole requests through the request handler (and, for a
//! few, the HTTP gateway) against an in-memory GitHub and scripted
//! models: the worked scenarios first, then the structural guarantees
//! every request must keep.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use repolens_agent::context::token;
use repolens_agent::test_support::{FnProvider, ScriptedProvider, text, tool_call};
use repolens_agent::{BudgetManager, PromptInput, RequestHandler, ScratchpadEntry, Status};
use repolens_config::{AppConfig, GatewayConfig, GithubConfig, ToolsConfig};
use repolens_core::{
    ConversationTurn, ErrorKind, GithubError, PathArgs, ProviderRequest, RefArgs, RepoLocator,
    Role, SearchArgs, ToolCall, ToolCatalog, ToolInvocation, ToolResult,
};
use repolens_gateway::{GatewayState, build_router};
use repolens_github::test_support::{FixtureGithub, FixtureRepo};
use repolens_github::{GithubClient, HttpTransport, RawResponse};
use repolens_tools::ToolSet;
use reqwest::Url;
use reqwest::header::HeaderMap;
use serde_json::{Value, json};
use tokio::time::Instant;
use tower::ServiceExt;

// ── Fixtures ─────────────────────────────────────────────────────────────

fn calcom() -> FixtureRepo {
    FixtureRepo::new("calcom", "cal.com")
        .description("Scheduling infrastructure for absolutely everyone.")
        .stars(32_000)
        .language("TypeScript")
        .file("README.md", "# Cal.com\n")
        .file("package.json", r#"{"name":"calcom-monorepo"}"#)
        .file("apps/web/package.json", r#"{"name":"@calcom/web"}"#)
        .file("apps/web/lib/utils.ts", "export const noop = () => {};\n")
        .file(
            "apps/web/lib/auth/index.ts",
            "export async function getServerSession() {\n  return null;\n}\n",
        )
        .file("apps/web/lib/auth/providers.ts", "export const providers = [];\n")
        .file("packages/ui/index.ts", "export * from './button';\n")
}

fn handler_with(
    provider: Arc<dyn repolens_core::Provider>,
    github: Arc<FixtureGithub>,
    config: &AppConfig,
) -> RequestHandler {
    RequestHandler::new(provider, github, config)
}

// ── Scenario A: navigate to the auth logic ───────────────────────────────

#[tokio::test]
async fn scenario_a_walks_the_tree_to_the_auth_module() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_call("root-tree", json!({})),
        tool_call("subdir-tree", json!({"path": "apps/web/lib"})),
        tool_call("file-fetch", json!({"path": "apps/web/lib/auth/index.ts"})),
        text("Authentication lives in apps/web/lib/auth/index.ts (getServerSession)."),
    ]));
    let github = Arc::new(FixtureGithub::new().with_repo(calcom()));
    let handler = handler_with(provider.clone(), github.clone(), &AppConfig::default());

    let outcome = handler
        .ask_repo("calcom/cal.com", "Where is the auth logic?", &[])
        .await
        .unwrap();

    assert_eq!(outcome.status, Status::Finished);
    assert!(!outcome.incomplete);
    assert!(outcome.answer.contains("apps/web/lib/auth/index.ts"));
    assert_eq!(outcome.tools_called(), vec!["root-tree", "subdir-tree", "file-fetch"]);
    assert_eq!(outcome.iterations, 3);

    let payloads: Vec<&str> = outcome
        .scratchpad
        .iter()
        .filter_map(|entry| match entry {
            ScratchpadEntry::Tool { result, .. } => Some(result.payload.as_str()),
            ScratchpadEntry::Correction { .. } => None,
        })
        .collect();
    assert!(payloads[0].contains("apps"));
    assert!(payloads[1].contains("auth"));
    assert!(payloads[2].contains("getServerSession"));

    // each observation reached the model before its next decision
    let requests = provider.requests();
    assert_eq!(requests.len(), 4);
    let last = &requests[3].messages;
    assert!(last.iter().any(|m| m.role == Role::Tool && m.content.contains("getServerSession")));
    assert!(
        requests[0].messages[0].content.contains("calcom/cal.com"),
        "system prompt names the repository"
    );
}

// ── Scenario B: repository does not exist ────────────────────────────────

#[tokio::test]
async fn scenario_b_missing_repository_is_a_clear_answer() {
    let provider = Arc::new(ScriptedProvider::new(vec![tool_call("repo-info", json!({}))]));
    let github = Arc::new(FixtureGithub::new().with_repo(calcom()));
    let handler = handler_with(provider.clone(), github, &AppConfig::default());

    let outcome = handler
        .ask_repo("owner/does-not-exist", "What does this do?", &[])
        .await
        .unwrap();

    assert_eq!(outcome.status, Status::Failed(ErrorKind::RepoNotFound));
    assert!(outcome.answer.contains("owner/does-not-exist"));
    assert!(outcome.answer.contains("does not exist"));
    // the loop stopped without asking the model again
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn scenario_b_over_http() {
    let provider = Arc::new(ScriptedProvider::new(vec![tool_call("repo-info", json!({}))]));
    let github = Arc::new(FixtureGithub::new().with_repo(calcom()));
    let handler = handler_with(provider, github, &AppConfig::default());
    let app = build_router(Arc::new(GatewayState { handler }), &GatewayConfig::default()).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/ask_repo")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "user_prompt": "What does this do?",
                "repo_name": "owner/does-not-exist",
                "chat_history": []
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["user_prompt"], "What does this do?");
    assert!(body["agent_response"].as_str().unwrap().contains("does not exist"));
}

// ── Scenario C: unknown tool ─────────────────────────────────────────────

#[tokio::test]
async fn scenario_c_unknown_tool_is_corrected_then_fails() {
    let config = AppConfig::default();
    let max_corrections = config.agent.max_corrections;
    let provider = Arc::new(ScriptedProvider::new(
        (0..max_corrections)
            .map(|_| tool_call("delete_repo", json!({"repo": "calcom/cal.com"})))
            .collect(),
    ));
    let github = Arc::new(FixtureGithub::new().with_repo(calcom()));
    let handler = handler_with(provider.clone(), github.clone(), &config);

    let outcome = handler
        .ask_repo("calcom/cal.com", "Delete this repo", &[])
        .await
        .unwrap();

    assert_eq!(outcome.status, Status::Failed(ErrorKind::InvalidToolCall));
    assert_eq!(outcome.scratchpad.len(), max_corrections);
    assert_eq!(outcome.tool_calls_made(), 0);
    assert_eq!(github.total_calls(), 0, "no network call for an invalid tool");
    assert_eq!(provider.remaining(), 0);

    // the model was shown its mistake before trying again
    let second = &provider.requests()[1];
    assert!(
        second
            .messages
            .iter()
            .any(|m| m.role == Role::Tool && m.content.contains("invalid_tool_call"))
    );
}

#[tokio::test]
async fn scenario_c_model_recovers_after_correction() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_call("delete_repo", json!({})),
        tool_call("repo-info", json!({})),
        text("Cal.com is a scheduling platform written in TypeScript."),
    ]));
    let github = Arc::new(FixtureGithub::new().with_repo(calcom()));
    let handler = handler_with(provider, github.clone(), &AppConfig::default());

    let outcome = handler
        .ask_repo("calcom/cal.com", "What is this?", &[])
        .await
        .unwrap();

    assert_eq!(outcome.status, Status::Finished);
    assert_eq!(outcome.tools_called(), vec!["delete_repo", "repo-info"]);
    assert_eq!(outcome.tool_calls_made(), 1);
    assert_eq!(github.total_calls(), 1);
}

// ── Scenario D: rate-limited code search ─────────────────────────────────

/// Replays canned HTTP responses and notes when each request arrived.
#[derive(Clone, Default)]
struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<RawResponse>>>,
    seen: Arc<Mutex<Vec<(String, Instant)>>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<RawResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            seen: Arc::default(),
        }
    }

    fn arrivals(&self) -> Vec<Instant> {
        self.seen.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait::async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &Url, _headers: &HeaderMap) -> Result<RawResponse, GithubError> {
        self.seen
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| RawResponse::new(500, "script exhausted")))
    }
}

fn rate_limited(retry_after: &str) -> RawResponse {
    RawResponse::new(429, r#"{"message":"API rate limit exceeded"}"#)
        .with_header("retry-after", retry_after)
}

fn search_tools(transport: ScriptedTransport) -> ToolSet {
    let config = GithubConfig {
        token: Some("ghp_test".into()),
        ..GithubConfig::default()
    };
    let client = GithubClient::with_transport(transport, &config).unwrap();
    ToolSet::new(Arc::new(client), &ToolsConfig::default())
}

fn search_auth() -> ToolCall {
    ToolCall::CodeSearch(SearchArgs {
        query: "auth".into(),
    })
}

#[tokio::test(start_paused = true)]
async fn scenario_d_waits_once_then_reports_rate_limit() {
    let transport = ScriptedTransport::new(vec![rate_limited("2"), rate_limited("2")]);
    let tools = search_tools(transport.clone());
    let repo = RepoLocator::new("calcom", "cal.com");

    let started = Instant::now();
    let result = tools.execute(&repo, &search_auth()).await;

    assert!(!result.success);
    assert_eq!(result.error, Some(ErrorKind::RateLimited));

    let arrivals = transport.arrivals();
    assert_eq!(arrivals.len(), 2, "exactly one retry");
    let gap = arrivals[1] - arrivals[0];
    assert!(gap >= Duration::from_secs(2) && gap < Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn scenario_d_retry_succeeds_after_waiting() {
    let hits = json!({
        "total_count": 1,
        "incomplete_results": false,
        "items": [{
            "name": "index.ts",
            "path": "apps/web/lib/auth/index.ts",
            "html_url": "https://github.com/calcom/cal.com/blob/main/apps/web/lib/auth/index.ts"
        }]
    });
    let transport = ScriptedTransport::new(vec![
        rate_limited("2"),
        RawResponse::new(200, hits.to_string()),
    ]);
    let tools = search_tools(transport.clone());

    let result = tools
        .execute(&RepoLocator::new("calcom", "cal.com"), &search_auth())
        .await;

    assert!(result.success, "{}", result.payload);
    assert!(result.payload.contains("apps/web/lib/auth/index.ts"));
    assert_eq!(transport.arrivals().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn scenario_d_long_retry_after_is_not_waited_out() {
    let transport = ScriptedTransport::new(vec![rate_limited("3600")]);
    let tools = search_tools(transport.clone());

    let started = Instant::now();
    let result = tools
        .execute(&RepoLocator::new("calcom", "cal.com"), &search_auth())
        .await;

    assert_eq!(result.error, Some(ErrorKind::RateLimited));
    assert_eq!(transport.arrivals().len(), 1);
    assert!(started.elapsed() < Duration::from_secs(1));
}

// ── Properties ───────────────────────────────────────────────────────────

/// First asks for repo-info, then answers with whatever the tool said.
fn echo_provider() -> Arc<dyn repolens_core::Provider> {
    Arc::new(FnProvider::new(|request: &ProviderRequest| {
        let observed = request
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .map(|m| m.content.clone());
        Ok(match observed {
            Some(content) => text(&content),
            None => tool_call("repo-info", json!({})),
        })
    }))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_never_share_state() {
    let github = Arc::new(
        FixtureGithub::new()
            .with_repo(FixtureRepo::new("acme", "alpha").description("Alpha rocket engine"))
            .with_repo(FixtureRepo::new("acme", "beta").description("Beta bakery POS"))
            .with_latency(Duration::from_millis(5)),
    );
    let handler = Arc::new(handler_with(echo_provider(), github, &AppConfig::default()));

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..16 {
        let handler = handler.clone();
        let (repo, question) = if i % 2 == 0 {
            ("acme/alpha", format!("alpha question {i}"))
        } else {
            ("acme/beta", format!("beta question {i}"))
        };
        tasks.spawn(async move {
            let history = [ConversationTurn::user(format!("earlier {repo}"))];
            let outcome = handler.ask_repo(repo, &question, &history).await.unwrap();
            (repo, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (repo, outcome) = joined.unwrap();
        assert_eq!(outcome.status, Status::Finished);
        assert_eq!(outcome.scratchpad.len(), 1);
        if repo == "acme/alpha" {
            assert!(outcome.answer.contains("Alpha rocket engine"));
            assert!(!outcome.answer.contains("Beta"));
        } else {
            assert!(outcome.answer.contains("Beta bakery POS"));
            assert!(!outcome.answer.contains("Alpha"));
        }
    }
}

#[tokio::test]
async fn loop_always_terminates_within_the_cap() {
    for max_iterations in [1, 2, 5, 12] {
        let mut config = AppConfig::default();
        config.agent.max_iterations = max_iterations;

        // never answers while tools are on offer
        let provider = Arc::new(FnProvider::new(|request: &ProviderRequest| {
            Ok(if request.tools.is_empty() {
                text("Best guess from the listing.")
            } else {
                tool_call("root-tree", json!({}))
            })
        }));
        let github = Arc::new(FixtureGithub::new().with_repo(calcom()));
        let handler = handler_with(provider, github.clone(), &config);

        let outcome = handler
            .ask_repo("calcom/cal.com", "Describe the layout", &[])
            .await
            .unwrap();

        assert_eq!(outcome.status, Status::Failed(ErrorKind::LoopExhausted));
        assert!(outcome.iterations <= max_iterations);
        assert_eq!(outcome.iterations, max_iterations);
        assert!(outcome.incomplete);
        assert_eq!(outcome.answer, "Best guess from the listing.");
        assert_eq!(github.total_calls(), max_iterations);
    }
}

#[tokio::test]
async fn answer_within_the_cap_finishes() {
    let mut config = AppConfig::default();
    config.agent.max_iterations = 4;
    let decisions = Arc::new(AtomicUsize::new(0));
    let counter = decisions.clone();
    let provider = Arc::new(FnProvider::new(move |_: &ProviderRequest| {
        // three tool calls, then the answer
        Ok(if counter.fetch_add(1, Ordering::SeqCst) < 3 {
            tool_call("repo-info", json!({}))
        } else {
            text("done")
        })
    }));
    let github = Arc::new(FixtureGithub::new().with_repo(calcom()));
    let handler = handler_with(provider, github, &config);

    let outcome = handler.ask_repo("calcom/cal.com", "q", &[]).await.unwrap();

    assert_eq!(outcome.status, Status::Finished);
    assert_eq!(outcome.answer, "done");
    assert_eq!(outcome.iterations, 3);
    assert_eq!(decisions.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn subdir_tree_stays_under_its_node_threshold() {
    let mut repo = FixtureRepo::new("acme", "monorepo");
    for dir in 0..20 {
        for file in 0..30 {
            repo = repo.file(&format!("src/module{dir:02}/file{file:02}.rs"), "// generated\n");
        }
    }
    let github: Arc<FixtureGithub> = Arc::new(FixtureGithub::new().with_repo(repo));
    let locator = RepoLocator::new("acme", "monorepo");
    let call = ToolCall::SubdirTree(PathArgs {
        path: "src".into(),
        git_ref: None,
    });

    for threshold in [1, 10, 50, 200] {
        let config = ToolsConfig {
            subdir_max_nodes: threshold,
            ..ToolsConfig::default()
        };
        let tools = ToolSet::new(github.clone(), &config);
        let result = tools.execute(&locator, &call).await;

        assert!(result.success);
        assert!(result.truncated, "threshold {threshold} should truncate 620 nodes");
        let nodes = result
            .payload
            .lines()
            .filter(|line| line.contains('📁') || line.contains('📄'))
            .count();
        assert!(nodes <= threshold, "{nodes} nodes rendered for threshold {threshold}");
    }
}

#[test]
fn assembled_prompts_never_exceed_the_budget() {
    let manager = BudgetManager::new(4_000, 1_000, 4);
    let tools = ToolCatalog::standard().definitions();
    let limit = 4_000 - 1_000;

    for history_len in [0, 3, 10, 60] {
        for scratch_len in [0, 1, 8, 30] {
            let history: Vec<ConversationTurn> = (0..history_len)
                .map(|i| {
                    let content = format!("turn {i}: {}", "lorem ipsum ".repeat(80));
                    if i % 2 == 0 {
                        ConversationTurn::user(content)
                    } else {
                        ConversationTurn::assistant(content)
                    }
                })
                .collect();
            let scratchpad: Vec<ScratchpadEntry> = (0..scratch_len)
                .map(|i| ScratchpadEntry::Tool {
                    invocation: ToolInvocation {
                        id: format!("call_{i}"),
                        name: "file-fetch".into(),
                        arguments: json!({"path": format!("src/file{i}.rs")}),
                    },
                    result: ToolResult::ok("fn main() {}\n".repeat(200)),
                })
                .collect();

            let prompt = manager
                .assemble(&PromptInput {
                    system: "You explore GitHub repositories.",
                    tools: &tools,
                    history: &history,
                    question: "Where is main?",
                    scratchpad: &scratchpad,
                })
                .unwrap();

            let used = token::estimate_messages_tokens(&prompt.messages)
                + token::estimate_tools_tokens(&tools);
            assert!(
                used <= limit,
                "history {history_len}, scratchpad {scratch_len}: {used} > {limit}"
            );
            assert!(prompt.budget.fits());

            // every tool call is still on record even if its payload went
            let recorded = prompt
                .messages
                .iter()
                .filter(|m| !m.tool_calls.is_empty())
                .count();
            assert_eq!(recorded, scratch_len);
            assert_eq!(
                prompt
                    .messages
                    .iter()
                    .filter(|m| m.content == "Where is main?")
                    .count(),
                1
            );
        }
    }
}

#[tokio::test]
async fn repeated_reads_are_idempotent() {
    let github = Arc::new(FixtureGithub::new().with_repo(calcom()));
    let tools = ToolSet::new(github, &ToolsConfig::default());
    let repo = RepoLocator::new("calcom", "cal.com");

    for call in [ToolCall::RepoInfo, ToolCall::RootTree(RefArgs::default())] {
        let first = tools.execute(&repo, &call).await;
        let second = tools.execute(&repo, &call).await;
        assert!(first.success);
        assert_eq!(first.payload, second.payload);
        assert_eq!(first, second);
    }
}

#[tokio::test(start_paused = true)]
async fn dropping_a_request_stops_its_work() {
    let provider = Arc::new(
        ScriptedProvider::new(vec![tool_call("repo-info", json!({}))])
            .with_delays(vec![Duration::from_secs(20)]),
    );
    let github = Arc::new(FixtureGithub::new().with_repo(calcom()));
    let handler = handler_with(provider.clone(), github.clone(), &AppConfig::default());

    let cancelled = tokio::time::timeout(
        Duration::from_secs(1),
        handler.ask_repo("calcom/cal.com", "What is this?", &[]),
    )
    .await;
    assert!(cancelled.is_err(), "request should still be waiting on the model");

    // nothing keeps running after the caller gave up
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(provider.call_count(), 1);
    assert_eq!(github.total_calls(), 0);
}
