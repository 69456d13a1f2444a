//! The turn-taking state machine.

use std::sync::Arc;
use std::time::Instant;

use tiller_core::error::ProviderError;
use tiller_core::event::DisplayEvent;
use tiller_core::message::{ContentBlock, Conversation, Turn};
use tiller_core::provider::{ModelInfo, Provider, ProviderResolver};
use tiller_core::tool::ToolRegistry;
use tiller_index::Indexer;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

/// Default cap on consecutive tool rounds per human turn.
const DEFAULT_MAX_TOOL_ROUNDS: usize = 25;

/// Where the engine is in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Waiting for the next line from the human.
    AwaitingUserInput,
    /// A model call (or the tool round that follows it) is in progress.
    AwaitingModel,
    /// The session is over.
    Exited,
}

/// Owns the transcript and the active provider, and is the only writer of
/// either.
pub struct Engine {
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) resolver: Arc<dyn ProviderResolver>,
    tools: Arc<ToolRegistry>,
    pub(crate) conversation: Conversation,
    output: mpsc::UnboundedSender<DisplayEvent>,
    pub(crate) cancel: CancellationToken,
    state: EngineState,
    pub(crate) indexer: Option<Arc<Indexer>>,
    pub(crate) clipboard_command: Option<String>,
    max_tool_rounds: usize,
}

impl Engine {
    pub fn new(
        provider: Arc<dyn Provider>,
        resolver: Arc<dyn ProviderResolver>,
        tools: Arc<ToolRegistry>,
        output: mpsc::UnboundedSender<DisplayEvent>,
    ) -> Self {
        Self {
            provider,
            resolver,
            tools,
            conversation: Conversation::new(),
            output,
            cancel: CancellationToken::new(),
            state: EngineState::AwaitingUserInput,
            indexer: None,
            clipboard_command: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Use `cancel` to end the session (and abort in-flight model calls).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Enable `/index` and `/reindex`.
    pub fn with_indexer(mut self, indexer: Arc<Indexer>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    /// Shell command `/copy` pipes the last answer into.
    pub fn with_clipboard_command(mut self, command: Option<String>) -> Self {
        self.clipboard_command = command.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The provider/model the next call will go to.
    pub fn model_info(&self) -> ModelInfo {
        self.provider.model_info()
    }

    /// Read lines until `/quit`, end of input, or cancellation.
    ///
    /// Returns the final transcript.
    pub async fn run(mut self, mut input: mpsc::Receiver<String>) -> Conversation {
        info!(
            conversation_id = %self.conversation.id,
            model = %self.model_info(),
            tools = self.tools.len(),
            "Session started"
        );
        let cancel = self.cancel.clone();

        while self.state != EngineState::Exited {
            if cancel.is_cancelled() {
                self.exit();
                break;
            }

            self.emit(DisplayEvent::Prompt);
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                line = input.recv() => line,
            };

            match line {
                Some(line) => self.submit(&line).await,
                None => self.exit(),
            }
        }

        info!(
            conversation_id = %self.conversation.id,
            turns = self.conversation.len(),
            "Session ended"
        );
        self.conversation
    }

    /// Handle one line of human input.
    ///
    /// Blank lines are ignored; slash commands never reach the transcript.
    pub async fn submit(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        if self.handle_command(line).await {
            return;
        }
        if self.cancel.is_cancelled() {
            debug!("Cancelled before the user turn was committed");
            self.emit(DisplayEvent::error(ProviderError::Cancelled.to_string()));
            return;
        }

        if let Err(e) = self.conversation.push(Turn::user_text(line)) {
            warn!(error = %e, "Rejected user turn");
            self.emit(DisplayEvent::error(e.to_string()));
            return;
        }
        self.drive_model().await;
    }

    /// Call the model until it answers without tool uses, it fails, or the
    /// round cap is hit.
    async fn drive_model(&mut self) {
        let mut rounds = 0;

        loop {
            if self.cancel.is_cancelled() {
                debug!("Cancelled before model call");
                self.emit(DisplayEvent::error(ProviderError::Cancelled.to_string()));
                break;
            }
            self.state = EngineState::AwaitingModel;

            let provider = Arc::clone(&self.provider);
            let info = provider.model_info();
            let definitions = self.tools.definitions();
            let span = info_span!(
                "inference",
                conversation_id = %self.conversation.id,
                model = %info,
                round = rounds,
            );

            let started = Instant::now();
            let result = provider
                .run_inference(&self.cancel, &definitions, self.conversation.turns())
                .instrument(span)
                .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let turn = match result {
                Ok(turn) => turn,
                Err(e) => {
                    warn!(model = %info, elapsed_ms, error = %e, "Model call failed");
                    self.emit(DisplayEvent::error(e.to_string()));
                    break;
                }
            };
            debug!(model = %info, elapsed_ms, blocks = turn.blocks.len(), "Model answered");

            let blocks = turn.blocks.clone();
            if let Err(e) = self.conversation.push(turn) {
                warn!(error = %e, "Model returned an invalid turn");
                self.emit(DisplayEvent::error(format!("invalid model response: {e}")));
                break;
            }

            let mut results = Vec::new();
            for block in blocks {
                match block {
                    ContentBlock::Text { text } => {
                        if !text.is_empty() {
                            self.emit(DisplayEvent::Assistant(text));
                        }
                    }
                    ContentBlock::ToolUse { id, name, input } => {
                        self.emit(DisplayEvent::Tool(format!("{name}({input})")));
                        let started = Instant::now();
                        let result = self.tools.dispatch(&id, &name, input).await;
                        debug!(
                            tool = %name,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Tool dispatched"
                        );
                        results.push(result);
                    }
                    ContentBlock::ToolResult { .. } => {}
                }
            }

            if results.is_empty() {
                break;
            }

            if let Err(e) = self.conversation.push(Turn::tool_results(results)) {
                warn!(error = %e, "Could not commit tool results");
                self.emit(DisplayEvent::error(e.to_string()));
                break;
            }

            rounds += 1;
            if rounds >= self.max_tool_rounds {
                warn!(rounds, "Tool round limit reached");
                self.emit(DisplayEvent::error(format!(
                    "stopped after {rounds} tool round(s) without a final answer"
                )));
                break;
            }
        }

        self.state = EngineState::AwaitingUserInput;
    }

    pub(crate) fn emit(&self, event: DisplayEvent) {
        if self.output.send(event).is_err() {
            debug!("Display channel closed");
        }
    }

    pub(crate) fn output(&self) -> mpsc::UnboundedSender<DisplayEvent> {
        self.output.clone()
    }

    pub(crate) fn exit(&mut self) {
        if self.state != EngineState::Exited {
            self.state = EngineState::Exited;
            self.emit(DisplayEvent::Exit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{StaticResolver, SequentialMockProvider, drain, tool_use_turn};
    use serde_json::json;
    use tiller_core::error::ProviderError;
    use tiller_core::message::Role;

    fn engine_with(
        provider: Arc<SequentialMockProvider>,
        tools: ToolRegistry,
    ) -> (Engine, mpsc::UnboundedReceiver<DisplayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let resolver = Arc::new(StaticResolver::new(vec![provider.clone()]));
        (Engine::new(provider, resolver, Arc::new(tools), tx), rx)
    }

    #[tokio::test]
    async fn text_answer_returns_control() {
        let provider = Arc::new(SequentialMockProvider::texts(&["Hello! How can I help?"]));
        let (mut engine, mut rx) = engine_with(provider.clone(), ToolRegistry::new());

        engine.submit("Hello!").await;

        assert_eq!(provider.call_count(), 1);
        assert_eq!(engine.conversation().len(), 2);
        assert_eq!(engine.state(), EngineState::AwaitingUserInput);
        assert_eq!(
            drain(&mut rx),
            vec![DisplayEvent::Assistant("Hello! How can I help?".into())]
        );
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let (mut engine, mut rx) = engine_with(provider.clone(), ToolRegistry::new());

        engine.submit("   ").await;

        assert_eq!(provider.call_count(), 0);
        assert!(engine.conversation().is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_is_answered_and_committed() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            Ok(tool_use_turn(&[("call_1", "launch_rockets", json!({}))])),
            Ok(Turn::assistant(vec![ContentBlock::text("Sorry.")])),
        ]));
        let (mut engine, mut rx) = engine_with(provider.clone(), ToolRegistry::new());

        engine.submit("go").await;

        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.transcripts()[1].len(), 3);
        let turns = engine.conversation().turns();
        assert_eq!(turns.len(), 4);
        assert_eq!(
            turns[2].blocks,
            vec![ContentBlock::tool_result("call_1", "tool not found", true)]
        );
        assert_eq!(
            drain(&mut rx),
            vec![
                DisplayEvent::Tool("launch_rockets({})".into()),
                DisplayEvent::Assistant("Sorry.".into()),
            ]
        );
    }

    #[tokio::test]
    async fn provider_error_commits_nothing() {
        let provider = Arc::new(SequentialMockProvider::new(vec![Err(
            ProviderError::Network("connection reset".into()),
        )]));
        let (mut engine, mut rx) = engine_with(provider, ToolRegistry::new());

        engine.submit("hi").await;

        let turns = engine.conversation().turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], DisplayEvent::Error(msg) if msg.contains("connection reset")));
        assert_eq!(engine.state(), EngineState::AwaitingUserInput);
    }

    #[tokio::test]
    async fn invalid_model_turn_is_rejected() {
        let provider = Arc::new(SequentialMockProvider::new(vec![Ok(tool_use_turn(&[
            ("dup", "a", json!({})),
            ("dup", "b", json!({})),
        ]))]));
        let (mut engine, mut rx) = engine_with(provider, ToolRegistry::new());

        engine.submit("hi").await;

        assert_eq!(engine.conversation().len(), 1);
        assert!(matches!(&drain(&mut rx)[..], [DisplayEvent::Error(_)]));
    }

    #[tokio::test]
    async fn round_cap_stops_auto_continue() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            Ok(tool_use_turn(&[("c1", "missing", json!({}))])),
            Ok(tool_use_turn(&[("c2", "missing", json!({}))])),
            Ok(tool_use_turn(&[("c3", "missing", json!({}))])),
        ]));
        let (engine, mut rx) = engine_with(provider.clone(), ToolRegistry::new());
        let mut engine = engine.with_max_tool_rounds(2);

        engine.submit("loop forever").await;

        assert_eq!(provider.call_count(), 2);
        assert_eq!(engine.conversation().len(), 5);
        assert!(!engine.conversation().has_unresolved_tool_use());
        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(DisplayEvent::Error(msg)) if msg.contains("2 tool round")));
    }

    #[tokio::test]
    async fn cancelled_session_makes_no_call() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let (engine, mut rx) = engine_with(provider.clone(), ToolRegistry::new());
        let cancel = CancellationToken::new();
        let mut engine = engine.with_cancellation(cancel.clone());

        cancel.cancel();
        engine.submit("hello?").await;

        assert_eq!(provider.call_count(), 0);
        assert!(engine.conversation().is_empty());
        assert_eq!(drain(&mut rx), vec![DisplayEvent::error("Request cancelled")]);
    }

    #[tokio::test]
    async fn run_until_quit() {
        let provider = Arc::new(SequentialMockProvider::texts(&["Hi there."]));
        let (engine, mut rx) = engine_with(provider.clone(), ToolRegistry::new());
        let (input, lines) = mpsc::channel(4);

        input.send("hello".to_string()).await.unwrap();
        input.send("/quit".to_string()).await.unwrap();
        let transcript = engine.run(lines).await;

        assert_eq!(transcript.len(), 2);
        assert_eq!(
            drain(&mut rx),
            vec![
                DisplayEvent::Prompt,
                DisplayEvent::Assistant("Hi there.".into()),
                DisplayEvent::Prompt,
                DisplayEvent::Exit,
            ]
        );
    }

    #[tokio::test]
    async fn run_ends_when_input_closes() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let (engine, mut rx) = engine_with(provider, ToolRegistry::new());
        let (input, lines) = mpsc::channel::<String>(1);
        drop(input);

        engine.run(lines).await;
        assert_eq!(drain(&mut rx), vec![DisplayEvent::Prompt, DisplayEvent::Exit]);
    }

    #[tokio::test]
    async fn run_ends_on_cancellation() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let (engine, mut rx) = engine_with(provider, ToolRegistry::new());
        let cancel = CancellationToken::new();
        let engine = engine.with_cancellation(cancel.clone());
        let (_input, lines) = mpsc::channel::<String>(1);

        let session = tokio::spawn(engine.run(lines));
        cancel.cancel();
        session.await.unwrap();

        assert_eq!(drain(&mut rx).last(), Some(&DisplayEvent::Exit));
    }
}
