use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flowchat::{
    config::RuntimeConfig,
    provider::{llm::MockTransitionAdvisor, ProviderResult, TransitionAdvisor},
    storage::{FlowStore, InMemoryStore, LocalJsonStore, MockFlowStore, StorageError},
    FlowError, FlowRuntime, FlowSource, Message, Role, RuntimeError, SessionStatus, StartRequest,
    Value,
};
use pretty_assertions::assert_eq;

const CARRIER: &str = include_str!("../data/carrier.flow");
const TOPUP: &str = include_str!("../data/topup.flow");

const GREETING: &str = "您好，欢迎使用智能客服！";
const MENU: &str = "请问需要办理什么业务？（查余额 / 充值 / 人工）";
const FALLBACK: &str = "抱歉，我没有理解您的意思。";

fn runtime_with(store: Arc<InMemoryStore>) -> FlowRuntime {
    FlowRuntime::new(RuntimeConfig::default(), store)
}

fn texts(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.text.as_str()).collect()
}

#[tokio::test]
async fn test_greets_and_waits_for_input() {
    let runtime = FlowRuntime::default();
    let started = runtime.start_source(CARRIER, false).await.unwrap();

    assert_eq!(texts(&started.messages), vec![GREETING, MENU]);
    assert!(started.messages.iter().all(|m| m.role == Role::Assistant));

    let snapshot = runtime.inspect(&started.session_id).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::AwaitingInput);
    assert_eq!(snapshot.pending_ask.as_deref(), Some("query"));
    assert_eq!(snapshot.current_state, "start");
}

#[tokio::test]
async fn test_routes_balance_queries_by_rule() {
    let runtime = FlowRuntime::default();
    let started = runtime.start_source(CARRIER, false).await.unwrap();

    let response = runtime.send(&started.session_id, "查余额").await.unwrap();
    assert_eq!(
        texts(&response.messages),
        vec!["您当前的余额为 0 元。", GREETING, MENU]
    );

    let snapshot = runtime.inspect(&started.session_id).await.unwrap();
    assert_eq!(snapshot.bindings["query"], serde_json::json!("查余额"));
    // the user's own message is kept in the transcript but not echoed back
    assert_eq!(snapshot.transcript[2], Message::user("查余额"));
}

#[tokio::test]
async fn test_renders_stored_balance() {
    let store = Arc::new(InMemoryStore::new());
    store
        .save("user.json", "balance", &Value::Number(120.0))
        .await
        .unwrap();
    let runtime = runtime_with(store);
    let started = runtime.start_source(CARRIER, false).await.unwrap();

    let response = runtime.send(&started.session_id, "余额多少").await.unwrap();
    assert_eq!(response.messages[0].text, "您当前的余额为 120 元。");
}

#[tokio::test]
async fn test_tops_up_with_integer_coercion() {
    let store = Arc::new(InMemoryStore::new());
    store
        .save("user.json", "balance", &Value::from(""))
        .await
        .unwrap();
    let runtime = runtime_with(store.clone());
    let started = runtime.start_source(CARRIER, false).await.unwrap();

    let response = runtime.send(&started.session_id, "充值100").await.unwrap();
    assert_eq!(texts(&response.messages), vec!["请输入充值金额："]);

    let response = runtime.send(&started.session_id, "50").await.unwrap();
    assert_eq!(
        texts(&response.messages),
        vec!["充值成功，当前余额 50 元。", GREETING, MENU]
    );
    assert_eq!(
        store.load("user.json", "balance").await.unwrap(),
        Some(Value::Number(50.0))
    );

    // a second top-up adds to the stored value
    runtime.send(&started.session_id, "充值").await.unwrap();
    let response = runtime.send(&started.session_id, " 25 ").await.unwrap();
    assert_eq!(response.messages[0].text, "充值成功，当前余额 75 元。");
}

#[tokio::test]
async fn test_uses_fallback_state_without_delegate() {
    let runtime = FlowRuntime::default();
    let started = runtime.start_source(CARRIER, true).await.unwrap();

    let response = runtime.send(&started.session_id, "随便聊聊").await.unwrap();
    assert_eq!(texts(&response.messages), vec![FALLBACK, GREETING, MENU]);
}

#[tokio::test]
async fn test_follows_delegate_suggestion() {
    let mut advisor = MockTransitionAdvisor::new();
    advisor
        .expect_suggest_transition()
        .withf(|transcript, candidates| {
            transcript.last().map(|m| m.text.as_str()) == Some("我想看看账户")
                && candidates.to_vec()
                    == vec![
                        "agent".to_string(),
                        "balance".to_string(),
                        "end".to_string(),
                        "topup".to_string(),
                    ]
        })
        .times(1)
        .returning(|_, _| Ok(Some("balance".to_string())));
    advisor.expect_name().return_const("mock".to_string());

    let runtime = FlowRuntime::default().with_advisor(Arc::new(advisor));
    let started = runtime.start_source(CARRIER, true).await.unwrap();

    let response = runtime.send(&started.session_id, "我想看看账户").await.unwrap();
    assert_eq!(
        texts(&response.messages),
        vec!["您当前的余额为 0 元。", GREETING, MENU]
    );
}

#[tokio::test]
async fn test_ignores_unknown_suggestions() {
    let mut advisor = MockTransitionAdvisor::new();
    advisor
        .expect_suggest_transition()
        .times(1)
        .returning(|_, _| Ok(Some("nowhere".to_string())));
    advisor.expect_name().return_const("mock".to_string());

    let runtime = FlowRuntime::default().with_advisor(Arc::new(advisor));
    let started = runtime.start_source(CARRIER, true).await.unwrap();

    let response = runtime.send(&started.session_id, "hello").await.unwrap();
    assert_eq!(response.messages[0].text, FALLBACK);
}

#[tokio::test]
async fn test_does_not_consult_delegate_when_disabled() {
    let mut advisor = MockTransitionAdvisor::new();
    advisor.expect_suggest_transition().times(0);
    advisor.expect_name().return_const("mock".to_string());

    let runtime = FlowRuntime::default().with_advisor(Arc::new(advisor));
    let started = runtime.start_source(CARRIER, false).await.unwrap();

    let response = runtime.send(&started.session_id, "hello").await.unwrap();
    assert_eq!(response.messages[0].text, FALLBACK);
}

struct SlowAdvisor;

#[async_trait]
impl TransitionAdvisor for SlowAdvisor {
    async fn suggest_transition(
        &self,
        _transcript: &[Message],
        _candidates: &[String],
    ) -> ProviderResult<Option<String>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Some("balance".to_string()))
    }

    fn name(&self) -> &str {
        "slow"
    }
}

#[tokio::test]
async fn test_treats_delegate_timeout_as_no_suggestion() {
    let config = RuntimeConfig {
        llm_timeout: Duration::from_millis(50),
        ..RuntimeConfig::default()
    };
    let runtime = FlowRuntime::new(config, Arc::new(InMemoryStore::new()))
        .with_advisor(Arc::new(SlowAdvisor));
    let started = runtime.start_source(CARRIER, true).await.unwrap();

    let response = runtime.send(&started.session_id, "hello").await.unwrap();
    assert_eq!(response.messages[0].text, FALLBACK);
}

#[tokio::test]
async fn test_faults_when_stalled_without_fallback() {
    let source = "flow stuck\nstate start\n  ask q \"?\"\n  if q == \"x\" goto start\n";
    let runtime = FlowRuntime::default();
    let started = runtime.start_source(source, true).await.unwrap();

    let response = runtime.send(&started.session_id, "y").await.unwrap();
    assert_eq!(response.messages.len(), 1);
    assert!(response.messages[0].text.contains("Stalled in state `start`"));

    let snapshot = runtime.inspect(&started.session_id).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Faulted);
    assert_eq!(snapshot.pending_ask, None);
}

#[tokio::test]
async fn test_detects_goto_loops() {
    let source = r#"
flow loop
state start
  ask q "?"
  goto a
state a
  set n = int(n) + 1
  goto b
state b
  goto a
"#;
    let runtime = FlowRuntime::default();
    let started = runtime.start_source(source, false).await.unwrap();
    let response = runtime.send(&started.session_id, "go").await.unwrap();

    assert_eq!(response.messages.len(), 1);
    assert!(response.messages[0].text.contains("Goto loop detected"));

    let snapshot = runtime.inspect(&started.session_id).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Faulted);
    // 32 hops allowed: a, b, a, ... visits `a` 16 times
    assert_eq!(snapshot.bindings["n"], serde_json::json!(16));
}

#[tokio::test]
async fn test_recovers_from_statement_errors() {
    let source = r#"
flow recover
state start
  reply "{{ name | shout }}"
  set x = 1 / 0
  reply "still here {{ x | default:"none" }}"
  ask name "name?"
  reply "hi {{ name }}"
"#;
    let runtime = FlowRuntime::default();
    let started = runtime.start_source(source, false).await.unwrap();

    assert_eq!(
        texts(&started.messages),
        vec![
            "[error] Undefined filter: shout/0",
            "[error] Type error: division by zero",
            "still here none",
            "name?",
        ]
    );
    let snapshot = runtime.inspect(&started.session_id).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::AwaitingInput);
}

#[tokio::test]
async fn test_reports_storage_failures_and_continues() {
    let mut store = MockFlowStore::new();
    store
        .expect_load()
        .times(1)
        .returning(|_, _| Err(StorageError::Io("disk on fire".to_string())));
    store.expect_save().times(0);

    let runtime = FlowRuntime::new(RuntimeConfig::default(), Arc::new(store));
    let started = runtime.start_source(CARRIER, false).await.unwrap();
    let response = runtime.send(&started.session_id, "查余额").await.unwrap();

    assert_eq!(
        texts(&response.messages),
        vec![
            "[error] Persistence error: Storage error: disk on fire",
            "您当前的余额为 0 元。",
            GREETING,
            MENU,
        ]
    );
}

#[tokio::test]
async fn test_resumes_inside_conditional_blocks() {
    let source = r#"
flow nested
state start
  ask mode "mode?"
  if mode == "form"
    ask name "name?"
    reply "hi {{ name }}"
  end
  reply "bye {{ mode }}"
  goto end
state end
  reply "done"
"#;
    let runtime = FlowRuntime::default();
    let started = runtime.start_source(source, false).await.unwrap();
    assert_eq!(texts(&started.messages), vec!["mode?"]);

    let response = runtime.send(&started.session_id, "form").await.unwrap();
    assert_eq!(texts(&response.messages), vec!["name?"]);

    let response = runtime.send(&started.session_id, "wxw").await.unwrap();
    assert_eq!(texts(&response.messages), vec!["hi wxw", "bye form", "done"]);

    let snapshot = runtime.inspect(&started.session_id).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Terminated);
    assert_eq!(
        runtime.send(&started.session_id, "again").await.unwrap_err(),
        RuntimeError::UnexpectedInput {
            status: SessionStatus::Terminated
        }
    );
}

#[tokio::test]
async fn test_rejects_invalid_source_without_creating_a_session() {
    let runtime = FlowRuntime::default();
    let result = runtime
        .start_source("flow f\nstate start\n  goto nowhere\n", false)
        .await;
    assert!(matches!(result, Err(FlowError::Parse(e)) if e.line == 3));
    assert_eq!(runtime.session_count(), 0);
}

#[tokio::test]
async fn test_starts_from_a_path_and_closes() {
    let runtime = FlowRuntime::default();
    let started = runtime
        .start(StartRequest {
            flow: FlowSource::Path(concat!(env!("CARGO_MANIFEST_DIR"), "/data/carrier.flow").to_string()),
            use_llm: false,
        })
        .await
        .unwrap();
    assert_eq!(started.messages.len(), 2);
    assert_eq!(runtime.session_count(), 1);

    runtime.close(&started.session_id).unwrap();
    assert_eq!(runtime.session_count(), 0);
    assert!(matches!(
        runtime.inspect(&started.session_id).await,
        Err(RuntimeError::SessionNotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_isolates_concurrent_sessions() {
    let source = r#"
flow greet
state start
  ask name "name?"
  set count = int(count) + 1
  reply "hi {{ name }} #{{ count }}"
  goto start
"#;
    let runtime = Arc::new(FlowRuntime::default());
    let alice = runtime.start_source(source, false).await.unwrap().session_id;
    let bob = runtime.start_source(source, false).await.unwrap().session_id;

    let tasks: Vec<_> = [(alice.clone(), "alice"), (bob.clone(), "bob")]
        .into_iter()
        .map(|(id, name)| {
            let runtime = runtime.clone();
            tokio::spawn(async move {
                let mut replies = Vec::new();
                for _ in 0..5 {
                    let response = runtime.send(&id, name).await.unwrap();
                    replies.push(response.messages[0].text.clone());
                }
                replies
            })
        })
        .collect();
    let results = futures::future::join_all(tasks).await;

    let alice_replies = results[0].as_ref().unwrap();
    let bob_replies = results[1].as_ref().unwrap();
    assert_eq!(alice_replies.last().unwrap(), "hi alice #5");
    assert_eq!(bob_replies.last().unwrap(), "hi bob #5");
    assert!(alice_replies.iter().all(|r| r.starts_with("hi alice")));

    let snapshot = runtime.inspect(&alice).await.unwrap();
    assert_eq!(snapshot.bindings["name"], serde_json::json!("alice"));
    assert_eq!(snapshot.bindings["count"], serde_json::json!(5));
}

#[tokio::test]
async fn test_persists_topups_to_json_files() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("user.json"),
        r#"{"name": "wxw", "balance": 100}"#,
    )
    .unwrap();
    let runtime = FlowRuntime::new(
        RuntimeConfig::default(),
        Arc::new(LocalJsonStore::new(dir.path())),
    );

    let started = runtime.start_source(TOPUP, false).await.unwrap();
    assert_eq!(started.messages[0].text, "wxw，欢迎回来。");

    runtime.send(&started.session_id, "充值").await.unwrap();
    let response = runtime.send(&started.session_id, "50").await.unwrap();
    assert_eq!(response.messages[0].text, "充值 50 元成功，当前余额 150 元。");

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("user.json")).unwrap())
            .unwrap();
    assert_eq!(saved["balance"], serde_json::json!(150));
    assert_eq!(saved["name"], serde_json::json!("wxw"));

    let response = runtime.send(&started.session_id, "退出").await.unwrap();
    assert_eq!(texts(&response.messages), vec!["再见！"]);
    let snapshot = runtime.inspect(&started.session_id).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Terminated);
}

#[tokio::test]
async fn test_failing_condition_skips_the_conditional() {
    let source = r#"
flow guard
state start
  if 1 / 0 > 1 goto end
  reply "after"
  ask x "x?"
state end
  reply "bye"
"#;
    let runtime = FlowRuntime::default();
    let started = runtime.start_source(source, false).await.unwrap();

    assert_eq!(
        texts(&started.messages),
        vec!["[error] Type error: division by zero", "after", "x?"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_to_one_session_are_serialized() {
    let source = r#"
flow once
state start
  ask name "name?"
  reply "hi {{ name }}"
  goto end
state end
  reply "bye"
"#;
    let runtime = Arc::new(FlowRuntime::default());
    let session_id = runtime.start_source(source, false).await.unwrap().session_id;

    let tasks: Vec<_> = ["alice", "bob"]
        .into_iter()
        .map(|name| {
            let runtime = runtime.clone();
            let session_id = session_id.clone();
            tokio::spawn(async move { (name, runtime.send(&session_id, name).await) })
        })
        .collect();
    let results: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners: Vec<_> = results.iter().filter(|(_, result)| result.is_ok()).collect();
    assert_eq!(winners.len(), 1);
    let (winner, response) = winners[0];
    assert_eq!(
        texts(&response.as_ref().unwrap().messages),
        vec![format!("hi {}", winner).as_str(), "bye"]
    );

    let loser = results.iter().find(|(_, result)| result.is_err()).unwrap();
    assert_eq!(
        loser.1.as_ref().unwrap_err(),
        &RuntimeError::UnexpectedInput {
            status: SessionStatus::Terminated
        }
    );

    let snapshot = runtime.inspect(&session_id).await.unwrap();
    assert_eq!(snapshot.bindings["name"], serde_json::json!(*winner));
    let users: Vec<_> = snapshot
        .transcript
        .iter()
        .filter(|m| m.role == Role::User)
        .collect();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].text, *winner);
}
