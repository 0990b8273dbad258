use std::env;
use std::sync::Arc;
use std::time::Duration;

use snafu::{OptionExt, Snafu};

use scribe_api::{
    ChatMessage, ChatSession, GenerateContentResponse, ServiceError, StatusCode, StreamEvent,
};
use scribe_chat::{
    ChatController, DEFAULT_SESSION_TITLE, GenerationScript, MemorySessions, NoticeSeverity,
    ScriptedGeneration, derive_session_title,
};

#[derive(Debug, Clone)]
struct RunnerArgs {
    scenario: Scenario,
}

#[derive(Debug, Clone, Copy)]
enum Scenario {
    SendRoundtrip,
    SessionFirstWins,
    TitleAuthority,
    FailureRollback,
    InterruptPartial,
    DeleteTwoPhase,
    LegacyFallback,
    All,
}

impl Scenario {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "send_roundtrip" => Some(Self::SendRoundtrip),
            "session_first_wins" => Some(Self::SessionFirstWins),
            "title_authority" => Some(Self::TitleAuthority),
            "failure_rollback" => Some(Self::FailureRollback),
            "interrupt_partial" => Some(Self::InterruptPartial),
            "delete_two_phase" => Some(Self::DeleteTwoPhase),
            "legacy_fallback" => Some(Self::LegacyFallback),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::SendRoundtrip => "send_roundtrip",
            Self::SessionFirstWins => "session_first_wins",
            Self::TitleAuthority => "title_authority",
            Self::FailureRollback => "failure_rollback",
            Self::InterruptPartial => "interrupt_partial",
            Self::DeleteTwoPhase => "delete_two_phase",
            Self::LegacyFallback => "legacy_fallback",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Snafu)]
enum RunnerError {
    #[snafu(display("missing required --scenario argument"))]
    MissingScenario { stage: &'static str },
    #[snafu(display("missing value for argument '{arg}'"))]
    MissingArgumentValue {
        stage: &'static str,
        arg: &'static str,
    },
    #[snafu(display("unknown scenario '{raw}'"))]
    UnknownScenario { stage: &'static str, raw: String },
    #[snafu(display("unknown argument '{raw}'"))]
    UnknownArgument { stage: &'static str, raw: String },
    #[snafu(display("scenario '{scenario}' failed: {reason}"))]
    ScenarioFailed {
        stage: &'static str,
        scenario: &'static str,
        reason: String,
    },
    #[snafu(display("stream frame decode failed: {source}"))]
    FrameDecode {
        stage: &'static str,
        source: serde_json::Error,
    },
}

type RunnerResult<T> = Result<T, RunnerError>;

fn check(condition: bool, scenario: &'static str, reason: &str) -> RunnerResult<()> {
    if condition {
        Ok(())
    } else {
        ScenarioFailedSnafu {
            stage: "scenario-check",
            scenario,
            reason: reason.to_string(),
        }
        .fail()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(error) = run().await {
        println!("runner_ok=false");
        eprintln!("runner_error={error}");
        std::process::exit(1);
    }
}

async fn run() -> RunnerResult<()> {
    let args = parse_args(env::args().skip(1))?;
    println!("scenario={}", args.scenario.name());

    match args.scenario {
        Scenario::SendRoundtrip => run_send_roundtrip().await,
        Scenario::SessionFirstWins => run_session_first_wins().await,
        Scenario::TitleAuthority => run_title_authority().await,
        Scenario::FailureRollback => run_failure_rollback().await,
        Scenario::InterruptPartial => run_interrupt_partial().await,
        Scenario::DeleteTwoPhase => run_delete_two_phase().await,
        Scenario::LegacyFallback => run_legacy_fallback().await,
        Scenario::All => run_all().await,
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> RunnerResult<RunnerArgs> {
    let mut scenario = None;
    let mut pending = args.into_iter();

    while let Some(argument) = pending.next() {
        match argument.as_str() {
            "--scenario" => {
                let value = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-scenario-value",
                    arg: "--scenario",
                })?;

                let parsed = Scenario::parse(&value).context(UnknownScenarioSnafu {
                    stage: "parse-args-scenario",
                    raw: value,
                })?;
                scenario = Some(parsed);
            }
            other => {
                return UnknownArgumentSnafu {
                    stage: "parse-args",
                    raw: other.to_string(),
                }
                .fail();
            }
        }
    }

    let scenario = scenario.context(MissingScenarioSnafu { stage: "parse-args" })?;
    Ok(RunnerArgs { scenario })
}

fn fixture() -> (Arc<MemorySessions>, Arc<ScriptedGeneration>, ChatController) {
    let sessions = Arc::new(MemorySessions::new());
    let generation = Arc::new(ScriptedGeneration::new());
    let controller = ChatController::new(sessions.clone(), generation.clone());
    (sessions, generation, controller)
}

async fn run_send_roundtrip() -> RunnerResult<()> {
    let scenario = "send_roundtrip";
    let (sessions, generation, mut controller) = fixture();

    let uid = MemorySessions::mint_uid();
    let prompt = "What did I write about compilers last week?";
    let mut created = ChatSession::new(uid.clone(), derive_session_title(prompt));
    created.messages = vec![
        ChatMessage::user(prompt),
        ChatMessage::assistant("You wrote two notes."),
    ];
    sessions.seed(created.clone()).await;

    generation
        .enqueue(GenerationScript::Events(vec![
            Ok(StreamEvent::ModelReady(Some(ChatSession::new(
                uid.clone(),
                DEFAULT_SESSION_TITLE,
            )))),
            Ok(StreamEvent::Content("You wrote ".to_string())),
            Ok(StreamEvent::Content("two notes.".to_string())),
            Ok(StreamEvent::TitleGenerated(ChatSession::new(
                uid.clone(),
                derive_session_title(prompt),
            ))),
            Ok(StreamEvent::OutputComplete),
            Ok(StreamEvent::OutputEnd),
        ]))
        .await;

    controller.send_message(prompt).await;

    let state = controller.state();
    check(state.messages.len() == 2, scenario, "expected two messages")?;
    check(
        state.messages[1].content == "You wrote two notes.",
        scenario,
        "assistant content mismatch",
    )?;
    check(
        state.active_session_uid() == Some(uid.as_str()),
        scenario,
        "session not bound",
    )?;
    check(
        controller.session_list().len() == 1,
        scenario,
        "session list not refreshed",
    )?;
    check(
        sessions.list_call_count() == 1,
        scenario,
        "expected exactly one list refresh",
    )?;
    check(!state.is_streaming, scenario, "streaming flag not reset")?;

    println!("messages={}", state.messages.len());
    println!("session_title={}", controller.session_list()[0].title);
    println!("runner_ok=true");
    Ok(())
}

async fn run_session_first_wins() -> RunnerResult<()> {
    let scenario = "session_first_wins";
    let (_, generation, mut controller) = fixture();

    generation
        .enqueue(GenerationScript::Events(vec![
            Ok(StreamEvent::ModelReady(Some(ChatSession::new("a", "A")))),
            Ok(StreamEvent::SessionUpdated(ChatSession::new("a", "A"))),
            Ok(StreamEvent::SessionUpdated(ChatSession::new("b", "B"))),
            Ok(StreamEvent::Content("ok".to_string())),
            Ok(StreamEvent::OutputComplete),
        ]))
        .await;

    controller.send_message("hello").await;

    check(
        controller.state().active_session_uid() == Some("a"),
        scenario,
        "first session assignment must win",
    )?;

    println!("bound_session=a");
    println!("runner_ok=true");
    Ok(())
}

async fn run_title_authority() -> RunnerResult<()> {
    let scenario = "title_authority";
    let (_, generation, mut controller) = fixture();

    generation
        .enqueue(GenerationScript::Events(vec![
            Ok(StreamEvent::ModelReady(Some(ChatSession::new("a", "")))),
            Ok(StreamEvent::Content("ok".to_string())),
            Ok(StreamEvent::TitleGenerated(ChatSession::new(
                "b",
                "Final title",
            ))),
            Ok(StreamEvent::OutputEnd),
        ]))
        .await;

    controller.send_message("hello").await;

    check(
        controller.state().active_session_uid() == Some("b"),
        scenario,
        "title event must override the pinned session",
    )?;

    println!("bound_session=b");
    println!("runner_ok=true");
    Ok(())
}

async fn run_failure_rollback() -> RunnerResult<()> {
    let scenario = "failure_rollback";
    let (_, generation, mut controller) = fixture();

    generation
        .enqueue(GenerationScript::Refuse(ServiceError::status(
            "generate",
            StatusCode::Unauthenticated,
            "Please sign in to use AI features",
        )))
        .await;

    controller.send_message("hello").await;

    check(
        controller.state().messages.is_empty(),
        scenario,
        "optimistic message must roll back",
    )?;
    check(
        !controller.state().is_streaming,
        scenario,
        "streaming flag must reset",
    )?;

    let notices = controller.take_notices();
    check(notices.len() == 1, scenario, "expected one notice")?;
    check(
        notices[0].severity == NoticeSeverity::Error,
        scenario,
        "notice must be an error",
    )?;

    println!("notice={}", notices[0].message);
    println!("runner_ok=true");
    Ok(())
}

async fn run_interrupt_partial() -> RunnerResult<()> {
    let scenario = "interrupt_partial";
    let (_, generation, mut controller) = fixture();

    generation
        .enqueue(GenerationScript::EventsThenStall(vec![Ok(
            StreamEvent::Content("partial answer".to_string()),
        )]))
        .await;

    let handle = controller.interrupt_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.interrupt();
    });

    controller.send_message("hello").await;

    let state = controller.state();
    check(state.messages.len() == 2, scenario, "expected two messages")?;
    check(
        state.messages[1].content == "partial answer",
        scenario,
        "partial content must be kept on interrupt",
    )?;
    check(!state.is_streaming, scenario, "streaming flag must reset")?;

    println!("partial_kept=true");
    println!("runner_ok=true");
    Ok(())
}

async fn run_delete_two_phase() -> RunnerResult<()> {
    let scenario = "delete_two_phase";
    let (sessions, _, mut controller) = fixture();

    sessions.seed(ChatSession::new("s-1", "Doomed")).await;
    controller.select_session("s-1").await;

    controller.request_delete("s-1");
    check(
        sessions.get("s-1").await.is_some(),
        scenario,
        "request alone must not delete",
    )?;

    controller.cancel_delete();
    controller.confirm_delete().await;
    check(
        sessions.get("s-1").await.is_some(),
        scenario,
        "confirm after cancel must be a no-op",
    )?;

    controller.request_delete("s-1");
    controller.confirm_delete().await;
    check(
        sessions.get("s-1").await.is_none(),
        scenario,
        "confirmed delete must remove the session",
    )?;
    check(
        controller.state().current_session.is_none(),
        scenario,
        "active conversation must clear",
    )?;

    println!("deleted=s-1");
    println!("runner_ok=true");
    Ok(())
}

async fn run_legacy_fallback() -> RunnerResult<()> {
    let scenario = "legacy_fallback";
    let (_, generation, mut controller) = fixture();

    // Frames as an untyped server emits them, decoded through the wire layer.
    let frames = [
        r#"{"content":"Hel"}"#,
        r#"{"content":"lo"}"#,
        r#"{"session":{"uid":"legacy-1","title":"Old server"}}"#,
    ];
    let mut steps = Vec::new();
    for frame in frames {
        let decoded: GenerateContentResponse =
            serde_json::from_str(frame).map_err(|source| RunnerError::FrameDecode {
                stage: "decode-legacy-frame",
                source,
            })?;
        steps.push(Ok(decoded.into_event()));
    }
    generation.enqueue(GenerationScript::Events(steps)).await;

    controller.send_message("hello").await;

    let state = controller.state();
    check(
        state.messages.last().map(|m| m.content.as_str()) == Some("Hello"),
        scenario,
        "legacy content frames must accumulate",
    )?;
    check(
        state.active_session_uid() == Some("legacy-1"),
        scenario,
        "legacy session frame must bind",
    )?;

    println!("bound_session=legacy-1");
    println!("runner_ok=true");
    Ok(())
}

async fn run_all() -> RunnerResult<()> {
    run_send_roundtrip().await?;
    run_session_first_wins().await?;
    run_title_authority().await?;
    run_failure_rollback().await?;
    run_interrupt_partial().await?;
    run_delete_two_phase().await?;
    run_legacy_fallback().await?;
    println!("all_passed=true");
    Ok(())
}
