//! Tests for instructa-agent: instruction store, context assembly, and the
//! validated generation loop driven against MockProvider

use instructa_agent::*;
use instructa_core::{ChatConfig, InstructionDraft, InstructionSource, Role};
use instructa_llm::{LlmRequest, MockBehavior, MockProvider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const GEN: &str = "gen-model";
const AUX: &str = "aux-model";
const JUDGE: &str = "judge-model";

fn test_config(validate: bool, max_retries: u32) -> ChatConfig {
    let mut config = ChatConfig::default();
    config.model.name = GEN.into();
    config.instruction_model.name = AUX.into();
    config.instruction_model.system_prompt = "EXTRACT".into();
    config.conflict_check.system_prompt = "CONFLICT\n{existing_instructions}".into();
    config.validation.enable = validate;
    config.validation.max_retries = max_retries;
    config.validation.model = JUDGE.into();
    config.validation.system_prompt = "VALIDATE {active_instructions} RESPONSE {response}".into();
    config
}

fn is_extraction(req: &LlmRequest) -> bool {
    req.system_prompt() == Some("EXTRACT")
}

fn is_conflict_check(req: &LlmRequest) -> bool {
    req.system_prompt().is_some_and(|p| p.starts_with("CONFLICT"))
}

fn no_instructions() -> MockBehavior {
    MockBehavior::text(r#"{"instructions": []}"#)
}

fn no_conflicts() -> MockBehavior {
    MockBehavior::text(r#"{"conflicts": []}"#)
}

fn rejected() -> MockBehavior {
    MockBehavior::text(
        r#"{"valid": false, "violations": [{"description": "Not in French", "suggestion": "Translate it"}]}"#,
    )
}

/// Generation answers "candidate-N" for the N-th call.
fn numbered_candidates() -> impl Fn() -> MockBehavior + Send + Sync {
    let n = AtomicUsize::new(0);
    move || MockBehavior::Text(format!("candidate-{}", n.fetch_add(1, Ordering::SeqCst) + 1))
}

fn session_with(mock: &Arc<MockProvider>, config: &ChatConfig) -> ChatSession {
    ChatSession::new(mock.clone(), config)
}

fn count(mock: &MockProvider, pred: impl Fn(&LlmRequest) -> bool) -> usize {
    mock.requests().iter().filter(|r| pred(r)).count()
}

// ===========================================================================
// InstructionStore properties
// ===========================================================================

#[test]
fn store_names_stay_unique_under_mixed_operations() {
    let names = ["a", "b", "c", "d"];
    let mut store = InstructionStore::new();
    for i in 0..64usize {
        let name = names[i % names.len()];
        let other = names[(i * 7 + 3) % names.len()];
        match i % 3 {
            0 => {
                store.upsert(InstructionDraft::new(name, format!("v{i}")));
            }
            1 => {
                store.replace_by_name(other, InstructionDraft::new(name, format!("r{i}")));
            }
            _ => {
                store.replace_by_name("missing", InstructionDraft::new(other, format!("m{i}")));
            }
        }
        let mut seen: Vec<&str> = store.iter().map(|inst| inst.name.as_str()).collect();
        let before = seen.len();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), before, "duplicate name after step {i}");
    }
}

#[test]
fn replace_missing_equals_upsert() {
    let mut via_replace = InstructionStore::new();
    let mut via_upsert = InstructionStore::new();
    for store in [&mut via_replace, &mut via_upsert] {
        store.upsert(InstructionDraft::new("tone", "Be formal"));
    }
    via_replace.replace_by_name("ghost", InstructionDraft::new("length", "Short"));
    via_upsert.upsert(InstructionDraft::new("length", "Short"));

    let a: Vec<_> = via_replace.iter().map(|i| (i.name.clone(), i.description.clone())).collect();
    let b: Vec<_> = via_upsert.iter().map(|i| (i.name.clone(), i.description.clone())).collect();
    assert_eq!(a, b);
}

#[test]
fn snapshot_is_a_copy() {
    let mut store = InstructionStore::new();
    store.upsert(InstructionDraft::new("a", "x"));
    let snap = store.snapshot();
    store.clear();
    assert_eq!(snap.len(), 1);
    assert!(store.is_empty());
}

// ===========================================================================
// ContextBuilder
// ===========================================================================

#[test]
fn context_unchanged_when_no_instructions() {
    let mut log = MessageLog::new();
    log.push_user("hello");
    log.push_assistant("hi");
    log.push_user("again");
    let turns = ContextBuilder::new().build(&log, &InstructionStore::new());
    assert_eq!(turns, log.turns().to_vec());
}

// ===========================================================================
// Schema parsing
// ===========================================================================

#[test]
fn verdict_defaults_to_invalid_when_valid_missing() {
    let v: VerdictResponse = parse_structured(r#"{"violations": []}"#).unwrap();
    assert!(!v.valid);
}

#[test]
fn extraction_keeps_extra_fields_as_parameters() {
    let r: ExtractionResponse = parse_structured(
        r#"{"instructions": [{"name": "language_constraint", "description": "French", "parameters": {"lang": "fr"}}]}"#,
    )
    .unwrap();
    assert_eq!(r.instructions[0].parameters["parameters"]["lang"], "fr");
}

// ===========================================================================
// Generation loop
// ===========================================================================

#[tokio::test]
async fn validation_disabled_makes_one_generation_call() {
    let next = numbered_candidates();
    let mock = Arc::new(MockProvider::from_fn(move |req| {
        if req.model == GEN {
            next()
        } else {
            no_instructions()
        }
    }));
    let mut session = session_with(&mock, &test_config(false, 5));

    let outcome = session.respond("hello").await;
    assert_eq!(outcome.status, TurnStatus::Accepted);
    assert_eq!(outcome.reply, "candidate-1");
    assert_eq!(outcome.attempts, 1);
    assert_eq!(mock.calls_for_model(GEN), 1);
    assert_eq!(mock.calls_for_model(JUDGE), 0);

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "candidate-1");
}

#[tokio::test]
async fn always_invalid_exhausts_after_max_retries_plus_one() {
    let next = numbered_candidates();
    let mock = Arc::new(MockProvider::from_fn(move |req| match req.model.as_str() {
        GEN => next(),
        JUDGE => rejected(),
        _ => no_instructions(),
    }));
    let mut session = session_with(&mock, &test_config(true, 2));

    let outcome = session.respond("Tell me a joke").await;
    assert_eq!(outcome.status, TurnStatus::Exhausted);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(mock.calls_for_model(GEN), 3);
    assert_eq!(mock.calls_for_model(JUDGE), 3);
    assert_eq!(outcome.reply, format!("candidate-3{EXHAUSTED_SUFFIX}"));

    // user turn + one feedback turn per rejection, no assistant turn
    let history = session.history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].role, Role::User);
    assert!(history[1..].iter().all(|t| t.role == Role::System));
    assert!(history[1].content.starts_with(FEEDBACK_HEADER));
    assert!(history[1].content.contains("- Not in French (suggestion: Translate it)"));
}

#[tokio::test]
async fn zero_retries_returns_single_candidate_with_suffix() {
    let mock = Arc::new(MockProvider::from_fn(|req| match req.model.as_str() {
        GEN => MockBehavior::text("Bonjour?"),
        JUDGE => rejected(),
        _ => no_instructions(),
    }));
    let mut session = session_with(&mock, &test_config(true, 0));

    let outcome = session.respond("hi").await;
    assert_eq!(outcome.reply, "Bonjour?\n(maximum correction attempts reached)");
    assert_eq!(outcome.attempts, 1);
    assert_eq!(mock.calls_for_model(GEN), 1);
}

#[tokio::test]
async fn failing_validator_accepts_current_candidate() {
    let mock = Arc::new(MockProvider::from_fn(|req| match req.model.as_str() {
        GEN => MockBehavior::text("reply"),
        JUDGE => MockBehavior::error("judge offline"),
        _ => no_instructions(),
    }));
    let mut session = session_with(&mock, &test_config(true, 3));

    let outcome = session.respond("hi").await;
    assert!(outcome.is_accepted());
    assert_eq!(outcome.reply, "reply");
    assert_eq!(mock.calls_for_model(GEN), 1);
    assert_eq!(session.history().last().unwrap().role, Role::Assistant);
}

#[tokio::test]
async fn unreadable_verdict_accepts_current_candidate() {
    let mock = Arc::new(MockProvider::from_fn(|req| match req.model.as_str() {
        GEN => MockBehavior::text("reply"),
        JUDGE => MockBehavior::text("I think it is fine."),
        _ => no_instructions(),
    }));
    let mut session = session_with(&mock, &test_config(true, 3));

    let outcome = session.respond("hi").await;
    assert_eq!(outcome.status, TurnStatus::Accepted);
    assert_eq!(outcome.attempts, 1);
}

#[tokio::test]
async fn generation_failure_short_circuits() {
    let mock = Arc::new(MockProvider::from_fn(|req| match req.model.as_str() {
        GEN => MockBehavior::error("upstream 500"),
        JUDGE => rejected(),
        _ => no_instructions(),
    }));
    let mut session = session_with(&mock, &test_config(true, 4));

    let outcome = session.respond("hi").await;
    assert_eq!(outcome.status, TurnStatus::GenerationFailed);
    assert!(outcome.reply.starts_with(GENERATION_FAILED_PREFIX));
    assert!(outcome.reply.contains("upstream 500"));
    assert_eq!(outcome.attempts, 1);
    assert_eq!(mock.calls_for_model(GEN), 1);
    assert_eq!(mock.calls_for_model(JUDGE), 0);
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn correction_succeeds_and_feedback_persists() {
    let next = numbered_candidates();
    let mock = Arc::new(MockProvider::from_fn(move |req| match req.model.as_str() {
        GEN => next(),
        JUDGE => {
            let prompt = req.system_prompt().unwrap_or_default();
            if prompt.ends_with("candidate-2") {
                MockBehavior::text(r#"{"valid": true, "violations": []}"#)
            } else {
                rejected()
            }
        }
        _ => no_instructions(),
    }));
    let mut session = session_with(&mock, &test_config(true, 2));

    let outcome = session.respond("first").await;
    assert!(outcome.is_accepted());
    assert_eq!(outcome.reply, "candidate-2");
    assert_eq!(outcome.attempts, 2);

    // The second attempt saw the feedback turn.
    let gen_requests: Vec<_> = mock.requests().into_iter().filter(|r| r.model == GEN).collect();
    assert!(gen_requests[1]
        .messages
        .iter()
        .any(|t| t.role == Role::System && t.content.starts_with(FEEDBACK_HEADER)));

    let roles: Vec<Role> = session.history().iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::User, Role::System, Role::Assistant]);

    // Still there on the next turn.
    session.respond("second").await;
    assert!(session.history().iter().any(|t| t.content.starts_with(FEEDBACK_HEADER)));
}

#[tokio::test]
async fn extraction_failure_does_not_abort_turn() {
    let mock = Arc::new(MockProvider::from_fn(|req| match req.model.as_str() {
        GEN => MockBehavior::text("ok"),
        _ => MockBehavior::text("not json at all"),
    }));
    let mut session = session_with(&mock, &test_config(false, 0));

    let outcome = session.respond("Always be brief").await;
    assert!(outcome.is_accepted());
    assert!(session.active_instructions().is_empty());
}

#[tokio::test]
async fn conflict_check_skipped_while_store_empty() {
    let mock = Arc::new(MockProvider::from_fn(|req| match req.model.as_str() {
        GEN => MockBehavior::text("ok"),
        _ if is_conflict_check(req) => no_conflicts(),
        _ => no_instructions(),
    }));
    let mut session = session_with(&mock, &test_config(false, 0));

    session.respond("hi").await;
    session.respond("hi again").await;
    assert_eq!(count(&mock, is_conflict_check), 0);
    assert_eq!(count(&mock, is_extraction), 2);
}

/// Fill the store with one instruction, then send a second turn whose
/// conflict check answers with `conflict`. The active set must not change.
async fn assert_conflict_reply_leaves_store_untouched(conflict: MockBehavior) {
    let mock = Arc::new(MockProvider::from_fn(move |req| {
        let user = req.last_content().unwrap_or_default();
        match req.model.as_str() {
            GEN => MockBehavior::text("ok"),
            _ if is_conflict_check(req) => conflict.clone(),
            _ if user.contains("formal") => MockBehavior::text(
                r#"{"instructions": [{"name": "tone", "description": "Be formal"}]}"#,
            ),
            _ => no_instructions(),
        }
    }));
    let mut session = session_with(&mock, &test_config(false, 0));

    session.respond("Be formal").await;
    let before = session.active_instructions();
    assert_eq!(before.len(), 1);

    let outcome = session.respond("Actually, be casual").await;
    assert!(outcome.is_accepted());
    assert_eq!(outcome.reply, "ok");
    assert_eq!(count(&mock, is_conflict_check), 1);
    assert_eq!(session.active_instructions(), before);
}

#[tokio::test]
async fn unreadable_conflict_check_changes_nothing() {
    assert_conflict_reply_leaves_store_untouched(MockBehavior::text("tone is superseded, I think"))
        .await;
}

#[tokio::test]
async fn failed_conflict_check_changes_nothing() {
    assert_conflict_reply_leaves_store_untouched(MockBehavior::error("aux model offline")).await;
}

#[tokio::test]
async fn conflict_with_unnamed_replacement_is_ignored() {
    assert_conflict_reply_leaves_store_untouched(MockBehavior::text(
        r#"{"conflicts": [{"old_name": "tone", "new_instruction": {"name": "  ", "description": "Be casual"}}]}"#,
    ))
    .await;
}

#[tokio::test]
async fn instructions_are_injected_before_newest_user_turn() {
    let mock = Arc::new(MockProvider::from_fn(|req| match req.model.as_str() {
        GEN => MockBehavior::text("Oui."),
        _ if is_extraction(req) => MockBehavior::text(
            r#"{"instructions": [{"name": "language_constraint", "description": "Answer in French"}]}"#,
        ),
        _ => no_conflicts(),
    }));
    let mut session = session_with(&mock, &test_config(false, 0));

    session.respond("Always answer in French").await;

    let gen = mock.requests().into_iter().find(|r| r.model == GEN).unwrap();
    assert_eq!(gen.messages.len(), 2);
    assert_eq!(gen.messages[0].role, Role::System);
    assert_eq!(gen.messages[0].content, "Instructions you must follow:\n- Answer in French");
    assert_eq!(gen.messages[1].content, "Always answer in French");

    // The synthetic turn is never logged.
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn language_constraint_is_replaced_on_conflict() {
    let mock = Arc::new(MockProvider::from_fn(|req| {
        let user = req.last_content().unwrap_or_default();
        match req.model.as_str() {
            GEN => MockBehavior::text("ok"),
            _ if is_conflict_check(req) => {
                if user.contains("English") {
                    MockBehavior::text(
                        r#"```json
{"conflicts": [{"old_name": "language_constraint",
  "new_instruction": {"name": "language_constraint", "description": "Answer in English"}}]}
```"#,
                    )
                } else {
                    no_conflicts()
                }
            }
            _ if user.contains("French") => MockBehavior::text(
                r#"{"instructions": [{"name": "language_constraint", "description": "Answer in French"}]}"#,
            ),
            _ => no_instructions(),
        }
    }));
    let mut session = session_with(&mock, &test_config(false, 0));

    session.respond("Always answer in French").await;
    assert_eq!(session.active_instructions().len(), 1);

    session.respond("Always answer in English").await;
    let active = session.active_instructions();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "language_constraint");
    assert!(active[0].description.contains("English"));
    assert_eq!(active[0].source, InstructionSource::Replacement);

    // The conflict prompt listed the French rule.
    let check = mock.requests().into_iter().find(|r| is_conflict_check(r)).unwrap();
    assert!(check
        .system_prompt()
        .unwrap()
        .contains("1. language_constraint (Answer in French)"));
}

#[tokio::test]
async fn validator_sees_instructions_and_candidate() {
    let mock = Arc::new(MockProvider::from_fn(|req| match req.model.as_str() {
        GEN => MockBehavior::text("Bonjour"),
        JUDGE => MockBehavior::text(r#"{"valid": true}"#),
        _ if is_extraction(req) => MockBehavior::text(
            r#"{"instructions": [{"name": "language_constraint", "description": "Réponds en français"}]}"#,
        ),
        _ => no_conflicts(),
    }));
    let mut session = session_with(&mock, &test_config(true, 1));

    session.respond("Réponds toujours en français").await;

    let judge = mock.requests().into_iter().find(|r| r.model == JUDGE).unwrap();
    let prompt = judge.system_prompt().unwrap();
    assert!(prompt.contains("\"name\":\"language_constraint\""));
    assert!(prompt.contains("Réponds en français"));
    assert!(prompt.ends_with("RESPONSE Bonjour"));
}

// ===========================================================================
// Session lifecycle
// ===========================================================================

#[tokio::test]
async fn reset_and_clear_are_independent() {
    let mock = Arc::new(MockProvider::from_fn(|req| match req.model.as_str() {
        GEN => MockBehavior::text("ok"),
        _ if is_extraction(req) => MockBehavior::text(
            r#"{"instructions": [{"name": "tone", "description": "Be formal"}]}"#,
        ),
        _ => no_conflicts(),
    }));
    let mut session = session_with(&mock, &test_config(false, 0));
    assert!(session.key().as_str().starts_with("chat-"));

    session.respond("Be formal").await;
    session.reset_history();
    assert!(session.history().is_empty());
    assert_eq!(session.active_instructions().len(), 1);

    session.respond("again").await;
    session.clear_instructions();
    assert!(session.active_instructions().is_empty());
    assert_eq!(session.history().len(), 2);

    session.reset();
    assert!(session.history().is_empty());
}
