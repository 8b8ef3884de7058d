//! The chat completion engine.
//!
//! `ChatEngine::create_chat_completion` is the single entry point: it
//! assembles the message window, calls the provider (batched or
//! streamed), resolves tool rounds until the model produces a final
//! answer, recovers from window-too-long rejections, and persists the
//! finished turn to the session store.

use crate::assembler::{AssembleRequest, AssembledWindow, MessageAssembler};
use crate::options::{ChatCompletion, CompletionChunk, CompletionContent, CompletionOptions};
use crate::retry::RetryController;
use crate::rounds::ToolCallResolver;
use crate::stream::StreamAggregator;
use std::sync::Arc;
use tabletalk_core::database::Database;
use tabletalk_core::error::{EngineError, Error};
use tabletalk_core::message::Message;
use tabletalk_core::provider::{CompletionRequest, Provider, ToolDefinition, Usage};
use tabletalk_core::session::{SessionId, SessionStore};
use tabletalk_core::tool::{Tool, ToolRegistry};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Buffered caller-facing chunks before backpressure applies.
const STREAM_CHANNEL_CAPACITY: usize = 32;

/// The tool-augmented completion engine.
///
/// Cheap to clone; all collaborators are shared behind `Arc`.
#[derive(Clone)]
pub struct ChatEngine {
    provider: Arc<dyn Provider>,
    store: Option<Arc<dyn SessionStore>>,
    database: Option<Arc<dyn Database>>,
    tools: ToolRegistry,
    config: tabletalk_config::EngineConfig,
}

/// Everything one turn needs, resolved from options + config defaults.
/// Owned so the streaming path can move it into its task.
struct TurnPlan {
    model: String,
    temperature: f32,
    definitions: Vec<ToolDefinition>,
    resolver: Arc<ToolCallResolver>,
    options: CompletionOptions,
    session: Option<SessionId>,
    window: AssembledWindow,
}

impl ChatEngine {
    pub fn new(provider: Arc<dyn Provider>, config: tabletalk_config::EngineConfig) -> Self {
        Self {
            provider,
            store: None,
            database: None,
            tools: ToolRegistry::new(),
            config,
        }
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_database(mut self, database: Arc<dyn Database>) -> Self {
        self.database = Some(database);
        self
    }

    /// Register an engine-level tool, available to every call.
    pub fn register_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn config(&self) -> &tabletalk_config::EngineConfig {
        &self.config
    }

    /// Run one completion turn.
    ///
    /// Returns exactly one response object or one chunk stream,
    /// depending on `options.stream`.
    pub async fn create_chat_completion(
        &self,
        session: Option<&SessionId>,
        options: CompletionOptions,
    ) -> Result<ChatCompletion, Error> {
        let plan = self.plan_turn(session, options).await?;
        debug!(
            model = %plan.model,
            window = plan.window.messages.len(),
            tools = plan.definitions.len(),
            stream = plan.options.stream,
            "Starting completion turn"
        );

        if plan.options.stream {
            Ok(ChatCompletion::Stream(self.spawn_stream(plan)))
        } else {
            let content = self.complete_with_retry(&plan).await?;
            Ok(ChatCompletion::Content(content))
        }
    }

    /// Resolve defaults and assemble the window for one turn.
    async fn plan_turn(
        &self,
        session: Option<&SessionId>,
        options: CompletionOptions,
    ) -> Result<TurnPlan, Error> {
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());
        let temperature = options
            .temperature
            .unwrap_or(self.config.default_temperature);
        let max_length = options
            .max_messages_length
            .unwrap_or(self.config.default_max_messages);
        let system_role = options.system_role.clone().or_else(|| {
            let default = self.config.default_system_role.clone();
            (!default.is_empty()).then_some(default)
        });

        // Per-call tools layer over the engine registry, last wins.
        let mut overlay = ToolRegistry::new();
        overlay.register_all(options.tools.iter().cloned());
        let registry = self.tools.merged_with(&overlay);
        let definitions = registry.definitions();
        let resolver = Arc::new(ToolCallResolver::new(registry));

        let assembler = MessageAssembler::new(self.store.clone(), self.database.clone());
        let window = assembler
            .assemble(AssembleRequest {
                session,
                system_role,
                prompt: options.prompt.clone(),
                messages: &options.messages,
                load_history: options.load_history,
                load_database_schema: options.load_database_schema,
                max_length,
                on_slice: options.on_messages_length_slice.as_ref(),
            })
            .await?;

        Ok(TurnPlan {
            model,
            temperature,
            definitions,
            resolver,
            options,
            session: session.cloned(),
            window,
        })
    }

    // ── Non-streaming path ────────────────────────────────────────────

    /// Run the tool-round loop, retrying with a smaller window when the
    /// provider rejects the payload as too long.
    async fn complete_with_retry(&self, plan: &TurnPlan) -> Result<CompletionContent, Error> {
        let mut retry = RetryController::new(self.config.max_length_retries);
        let mut window = plan.window.messages.clone();

        loop {
            match self.run_rounds(window.clone(), plan).await {
                Ok((content, usage)) => {
                    self.persist_turn(plan, &content).await?;
                    return Ok(CompletionContent { content, usage });
                }
                Err(Error::Provider(provider_error)) => {
                    let cap = retry.decide(
                        provider_error,
                        window.len(),
                        plan.options.on_message_length_exceeded.as_ref(),
                        plan.options.on_messages_length_exceeded.as_ref(),
                    )?;
                    window = truncate_front(&plan.window.messages, cap);
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Batched request/tool loop: one provider call per round until the
    /// model answers without requesting tools.
    async fn run_rounds(
        &self,
        mut messages: Vec<Message>,
        plan: &TurnPlan,
    ) -> Result<(String, Option<Usage>), Error> {
        for round in 0..=self.config.max_tool_rounds {
            let response = self
                .provider
                .complete(CompletionRequest {
                    model: plan.model.clone(),
                    messages: messages.clone(),
                    temperature: plan.temperature,
                    tools: plan.definitions.clone(),
                    stream: false,
                })
                .await?;

            let assistant = response.message;
            if assistant.tool_calls.is_empty() {
                info!(round, "Turn complete");
                return Ok((assistant.content, response.usage));
            }
            if round == self.config.max_tool_rounds {
                break;
            }

            debug!(round, calls = assistant.tool_calls.len(), "Model requested tools");
            let tool_messages = plan
                .resolver
                .resolve(
                    &assistant.tool_calls,
                    plan.options.on_tool_call.as_ref(),
                    plan.options.on_tool_call_result.as_ref(),
                )
                .await?;
            messages.push(assistant);
            messages.extend(tool_messages);
        }

        Err(EngineError::ToolRoundsExceeded {
            rounds: self.config.max_tool_rounds,
        }
        .into())
    }

    // ── Streaming path ────────────────────────────────────────────────

    /// Spawn the streaming turn and hand the receiver to the caller.
    fn spawn_stream(&self, plan: TurnPlan) -> mpsc::Receiver<Result<CompletionChunk, Error>> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(error) = engine.run_stream(&tx, &plan).await {
                let _ = tx.send(Err(error)).await;
            }
        });
        rx
    }

    /// Streaming equivalent of [`Self::complete_with_retry`].
    ///
    /// Window retries are only possible while nothing has been
    /// forwarded yet; a chunk the caller has seen is never retracted.
    async fn run_stream(
        &self,
        tx: &mpsc::Sender<Result<CompletionChunk, Error>>,
        plan: &TurnPlan,
    ) -> Result<(), Error> {
        let mut retry = RetryController::new(self.config.max_length_retries);
        let mut window = plan.window.messages.clone();
        let mut forwarded = false;

        loop {
            match self.stream_rounds(tx, window.clone(), plan, &mut forwarded).await {
                Ok(StreamOutcome::Finished(content)) => {
                    self.persist_turn(plan, &content).await?;
                    return Ok(());
                }
                Ok(StreamOutcome::Cancelled) => {
                    debug!("Stream consumer gone, turn abandoned");
                    return Ok(());
                }
                Err(Error::Provider(provider_error)) if !forwarded => {
                    let cap = retry.decide(
                        provider_error,
                        window.len(),
                        plan.options.on_message_length_exceeded.as_ref(),
                        plan.options.on_messages_length_exceeded.as_ref(),
                    )?;
                    window = truncate_front(&plan.window.messages, cap);
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Streamed request/tool loop over a single caller-facing channel.
    /// Continuation rounds append their chunks after the previous
    /// round's, never interleaved.
    async fn stream_rounds(
        &self,
        tx: &mpsc::Sender<Result<CompletionChunk, Error>>,
        mut messages: Vec<Message>,
        plan: &TurnPlan,
        forwarded: &mut bool,
    ) -> Result<StreamOutcome, Error> {
        let mut transcript = String::new();

        for round in 0..=self.config.max_tool_rounds {
            let mut deltas = self
                .provider
                .stream(CompletionRequest {
                    model: plan.model.clone(),
                    messages: messages.clone(),
                    temperature: plan.temperature,
                    tools: plan.definitions.clone(),
                    stream: true,
                })
                .await?;

            let mut aggregator = StreamAggregator::new();
            while let Some(item) = deltas.recv().await {
                let chunk = item?;
                let done = chunk.done;
                if let Some(fragment) = aggregator.apply(chunk) {
                    *forwarded = true;
                    transcript.push_str(&fragment);
                    if tx.send(Ok(CompletionChunk { content: fragment })).await.is_err() {
                        return Ok(StreamOutcome::Cancelled);
                    }
                }
                if done {
                    break;
                }
            }

            let response = aggregator.finish().map_err(Error::from)?;
            if response.tool_calls.is_empty() {
                info!(round, "Streamed turn complete");
                return Ok(StreamOutcome::Finished(transcript));
            }
            if round == self.config.max_tool_rounds {
                break;
            }

            debug!(round, calls = response.tool_calls.len(), "Model requested tools mid-stream");
            let tool_messages = plan
                .resolver
                .resolve(
                    &response.tool_calls,
                    plan.options.on_tool_call.as_ref(),
                    plan.options.on_tool_call_result.as_ref(),
                )
                .await?;
            messages.push(Message::assistant_tool_calls(
                response.content,
                response.tool_calls,
            ));
            messages.extend(tool_messages);
        }

        Err(EngineError::ToolRoundsExceeded {
            rounds: self.config.max_tool_rounds,
        }
        .into())
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Persist the finished turn: the prompt actually used (when not
    /// deduplicated away) and the final assistant content. Tool
    /// traffic never reaches the store.
    async fn persist_turn(&self, plan: &TurnPlan, content: &str) -> Result<(), Error> {
        let (Some(store), Some(session)) = (&self.store, &plan.session) else {
            return Ok(());
        };
        if let Some(prompt) = &plan.window.prompt {
            store.append(session, Message::user(prompt.clone())).await?;
        }
        store.append(session, Message::assistant(content)).await?;
        debug!(session = %session, "Turn persisted");
        Ok(())
    }
}

/// How one streamed attempt ended.
enum StreamOutcome {
    /// Terminal answer, full transcript attached
    Finished(String),
    /// The caller dropped the receiver; nothing more to do
    Cancelled,
}

/// The retry window: the originally assembled messages, re-truncated
/// verbatim from the front to the new cap. Never reloaded or
/// reassembled.
fn truncate_front(messages: &[Message], cap: usize) -> Vec<Message> {
    if messages.len() > cap {
        warn!(
            dropped = messages.len() - cap,
            cap, "Shrinking window for retry"
        );
        messages[messages.len() - cap..].to_vec()
    } else {
        messages.to_vec()
    }
}
