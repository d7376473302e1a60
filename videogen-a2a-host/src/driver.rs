//! Task-completion driver.
//!
//! One call to [`TaskDriver::complete_task`] performs a logical exchange with
//! the agent: send a prompt, classify every returned event, hand finished
//! videos to the uploader and resolve the final message or task. When the
//! task asks for more input the driver reads another prompt and sends it on
//! the same task, up to a fixed number of rounds.

use std::io::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::artifact::{ResultUri, classify, first_video_uri};
use crate::client::AgentTransport;
use crate::handoff::{Handoff, UploadHandle, UploadRequest};
use crate::protocol::{
    Artifact, ContextId, Event, Message, MessageSendConfiguration, MessageSendParams,
    PushNotificationConfig, SendMessageResult, Task, TaskId, TaskQueryParams,
};

/// Replies that end an interactive exchange.
pub const QUIT_SENTINELS: [&str; 2] = [":q", "quit"];

/// Default bound on consecutive input-required rounds.
pub const DEFAULT_MAX_INPUT_ROUNDS: u32 = 8;

/// Question shown when the agent needs more input.
pub const INPUT_QUESTION: &str = "What do you want to send to the agent? (:q or quit to exit)";

/// Source of follow-up prompts.
#[async_trait]
pub trait PromptReader: Send + Sync {
    /// Ask `question`; `None` means no more input.
    async fn read_prompt(&self, question: &str) -> std::io::Result<Option<String>>;
}

/// Reads follow-up prompts from standard input.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

#[async_trait]
impl PromptReader for StdinPrompt {
    async fn read_prompt(&self, question: &str) -> std::io::Result<Option<String>> {
        print!("\n{}: ", question);
        std::io::stdout().flush()?;

        let (read, line) = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            let read = std::io::stdin().read_line(&mut line)?;
            Ok::<_, std::io::Error>((read, line))
        })
        .await
        .map_err(std::io::Error::other)??;

        if read == 0 {
            Ok(None)
        } else {
            Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
        }
    }
}

/// How the driver talks to the agent.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Use `message/stream` instead of `message/send`.
    pub streaming: bool,
    /// Attached to every send when set.
    pub push_notification: Option<PushNotificationConfig>,
    pub max_input_rounds: u32,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            streaming: true,
            push_notification: None,
            max_input_rounds: DEFAULT_MAX_INPUT_ROUNDS,
        }
    }
}

/// How an exchange ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The agent replied with a direct message.
    Message(Message),
    /// The task reached a state other than input-required.
    Task(Task),
    /// The user entered a quit sentinel or input ended.
    Quit,
    /// The task still wanted input after the maximum number of rounds.
    InputRoundsExhausted(Task),
    /// The call failed. `fatal` marks a stream that could not be opened or
    /// was abandoned midway; either way only this exchange ends.
    TransportFailed { fatal: bool, error: String },
    /// Neither a message nor a task was obtained.
    NoResult,
}

/// Result of [`TaskDriver::complete_task`].
#[derive(Debug)]
pub struct Exchange {
    pub outcome: Outcome,
    pub context_id: ContextId,
    pub task_id: Option<TaskId>,
    /// Hand-offs started during the exchange, still running or finished.
    pub uploads: Vec<UploadHandle>,
}

impl Exchange {
    /// Whether the caller should go on with the next exchange. Only an
    /// explicit quit ends the run.
    pub fn should_continue(&self) -> bool {
        !matches!(self.outcome, Outcome::Quit)
    }

    /// Whether the exchange ended without a usable result.
    pub fn failed(&self) -> bool {
        matches!(self.outcome, Outcome::TransportFailed { .. } | Outcome::NoResult)
    }
}

/// Holds the task id of one logical task. The first id wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSlot(Option<TaskId>);

impl TaskSlot {
    pub fn new(initial: Option<TaskId>) -> Self {
        Self(initial)
    }

    /// Record `id` if the slot is empty. Returns whether it was stored.
    pub fn capture(&mut self, id: &TaskId) -> bool {
        match &self.0 {
            None => {
                debug!(task_id = %id, "Task id captured");
                self.0 = Some(id.clone());
                true
            }
            Some(current) if current == id => false,
            Some(current) => {
                warn!(current = %current, ignored = %id, "Ignoring conflicting task id");
                false
            }
        }
    }

    pub fn get(&self) -> Option<&TaskId> {
        self.0.as_ref()
    }

    pub fn into_inner(self) -> Option<TaskId> {
        self.0
    }
}

/// What one send produced.
enum Round {
    Message(Message),
    Task(Task),
    Empty,
    Failed { fatal: bool, error: String },
}

/// Drives exchanges with one agent.
pub struct TaskDriver {
    transport: Arc<dyn AgentTransport>,
    handoff: Arc<dyn Handoff>,
    prompts: Arc<dyn PromptReader>,
    options: DriverOptions,
}

impl TaskDriver {
    pub fn new(
        transport: Arc<dyn AgentTransport>,
        handoff: Arc<dyn Handoff>,
        prompts: Arc<dyn PromptReader>,
        options: DriverOptions,
    ) -> Self {
        Self {
            transport,
            handoff,
            prompts,
            options,
        }
    }

    /// Run one logical exchange.
    ///
    /// With `prompt == None` the first prompt is read from the prompt reader.
    /// The context id is never changed; the returned task id is the first one
    /// the agent assigned (or `task` if it was already set).
    #[instrument(level = "info", skip(self, prompt), fields(context_id = %context))]
    pub async fn complete_task(&self, prompt: Option<String>, context: &ContextId, task: Option<TaskId>) -> Exchange {
        let mut slot = TaskSlot::new(task);
        let mut uploads = Vec::new();
        let mut next_prompt = prompt;
        let mut input_rounds = 0u32;

        let outcome = loop {
            let text = match next_prompt.take() {
                Some(text) => text,
                None => match self.read_follow_up().await {
                    Some(text) => text,
                    None => break Outcome::Quit,
                },
            };

            match self.send(&text, context, &mut slot, &mut uploads).await {
                Round::Failed { fatal, error } => break Outcome::TransportFailed { fatal, error },
                Round::Message(message) => {
                    println!("\n{}", to_json(&message));
                    break Outcome::Message(message);
                }
                Round::Task(task) => {
                    println!("\n{}", redacted_task_json(&task));
                    if !task.status.state.needs_input() {
                        break Outcome::Task(task);
                    }
                    input_rounds += 1;
                    if input_rounds > self.options.max_input_rounds {
                        warn!(rounds = input_rounds, "Task still requires input, giving up");
                        break Outcome::InputRoundsExhausted(task);
                    }
                    info!(task_id = %task.id, round = input_rounds, "Task requires more input");
                }
                Round::Empty => {
                    warn!("Exchange produced neither a message nor a task");
                    break Outcome::NoResult;
                }
            }
        };

        Exchange {
            outcome,
            context_id: context.clone(),
            task_id: slot.into_inner(),
            uploads,
        }
    }

    async fn read_follow_up(&self) -> Option<String> {
        match self.prompts.read_prompt(INPUT_QUESTION).await {
            Ok(Some(text)) if QUIT_SENTINELS.contains(&text.trim()) => None,
            Ok(Some(text)) => Some(text),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read prompt");
                None
            }
        }
    }

    fn params(&self, text: &str, context: &ContextId, slot: &TaskSlot) -> MessageSendParams {
        MessageSendParams {
            message: Message::user_text(text, context, slot.get()),
            configuration: Some(MessageSendConfiguration {
                accepted_output_modes: vec!["text".to_string()],
                push_notification_config: self.options.push_notification.clone(),
                history_length: None,
                blocking: None,
            }),
            metadata: None,
        }
    }

    async fn send(
        &self,
        text: &str,
        context: &ContextId,
        slot: &mut TaskSlot,
        uploads: &mut Vec<UploadHandle>,
    ) -> Round {
        let params = self.params(text, context, slot);
        if self.options.streaming {
            self.send_streaming(params, text, context, slot, uploads).await
        } else {
            self.send_unary(params, slot).await
        }
    }

    async fn send_unary(&self, params: MessageSendParams, slot: &mut TaskSlot) -> Round {
        match self.transport.send_message(params).await {
            Ok(SendMessageResult::Message(message)) => Round::Message(message),
            Ok(SendMessageResult::Task(task)) => {
                slot.capture(&task.id);
                Round::Task(task)
            }
            Err(e) => {
                println!("Failed to complete the call: {}", e);
                Round::Failed {
                    fatal: false,
                    error: e.to_string(),
                }
            }
        }
    }

    async fn send_streaming(
        &self,
        params: MessageSendParams,
        prompt: &str,
        context: &ContextId,
        slot: &mut TaskSlot,
        uploads: &mut Vec<UploadHandle>,
    ) -> Round {
        let mut stream = match self.transport.send_message_streaming(params).await {
            Ok(stream) => stream,
            Err(e) => {
                println!("Error: {}", e);
                return Round::Failed {
                    fatal: true,
                    error: e.to_string(),
                };
            }
        };

        let mut message = None;
        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    println!("Error: {}", e);
                    return Round::Failed {
                        fatal: true,
                        error: e.to_string(),
                    };
                }
            };

            if let Some(id) = event.context_id().filter(|id| *id != context) {
                warn!(expected = %context, received = %id, "Event carries an unexpected context id");
            }
            println!("stream event => {}", to_json(&event));

            match event {
                Event::Task(task) => {
                    slot.capture(&task.id);
                }
                Event::StatusUpdate(update) => {
                    slot.capture(&update.task_id);
                }
                Event::ArtifactUpdate(update) => {
                    slot.capture(&update.task_id);
                    if let Some(handle) = self.hand_off(&update.artifact, prompt) {
                        uploads.push(handle);
                    }
                }
                Event::Message(m) => message = Some(m),
            }
        }

        let task = match slot.get() {
            Some(id) => match self.transport.get_task(TaskQueryParams::new(id.clone())).await {
                Ok(task) => Some(task),
                Err(e) => {
                    println!("Failed to fetch task {}: {}", id, e);
                    None
                }
            },
            None => None,
        };

        match (message, task) {
            (Some(message), _) => Round::Message(message),
            (None, Some(task)) => Round::Task(task),
            (None, None) => Round::Empty,
        }
    }

    /// Start an upload for the first video part of `artifact`, if it is stored in GCS.
    fn hand_off(&self, artifact: &Artifact, prompt: &str) -> Option<UploadHandle> {
        let Some(uri) = first_video_uri(&artifact.parts) else {
            debug!(
                artifact_id = %artifact.artifact_id,
                parts = artifact.parts.len(),
                "Artifact has no video file part"
            );
            return None;
        };
        println!("Video available at: {}", uri);

        match classify(uri) {
            ResultUri::Storage(gcs) => {
                println!("[VIDEO GENERATED] GCS URI: {}", gcs);
                Some(self.handoff.dispatch(UploadRequest::from_prompt(gcs, prompt)))
            }
            ResultUri::Other(other) => {
                println!("[VIDEO GENERATED] Non-GCS URI: {}", other);
                None
            }
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Task JSON with the file payloads of history messages removed.
pub fn redacted_task_json(task: &Task) -> String {
    let mut value = match serde_json::to_value(task) {
        Ok(value) => value,
        Err(_) => return String::new(),
    };
    if let Some(history) = value.get_mut("history").and_then(Value::as_array_mut) {
        for message in history {
            if let Some(parts) = message.get_mut("parts").and_then(Value::as_array_mut) {
                for part in parts {
                    if let Some(part) = part.as_object_mut() {
                        part.remove("file");
                    }
                }
            }
        }
    }
    value.to_string()
}
