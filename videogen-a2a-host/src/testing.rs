//! Scripted collaborators for driver and batch tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;

use crate::client::{AgentTransport, ClientError, EventStream};
use crate::driver::PromptReader;
use crate::handoff::{Handoff, UploadHandle, UploadReport, UploadRequest, UploadStatus};
use crate::protocol::{
    Artifact, ContextId, Event, FileContent, FileWithUri, JsonRpcError, Message, MessageSendParams, Part, Role,
    SendMessageResult, Task, TaskArtifactUpdateEvent, TaskId, TaskQueryParams, TaskState, TaskStatus,
    TaskStatusUpdateEvent,
};

pub const CONTEXT: &str = "ctx-test";

pub fn context() -> ContextId {
    ContextId::new(CONTEXT)
}

pub fn task(id: &str, state: TaskState) -> Task {
    Task {
        id: TaskId::new(id),
        context_id: context(),
        status: TaskStatus {
            state,
            message: None,
            timestamp: None,
        },
        artifacts: Vec::new(),
        history: Vec::new(),
        metadata: None,
    }
}

pub fn agent_message(text: &str) -> Message {
    Message {
        role: Role::Agent,
        parts: vec![Part::text(text)],
        message_id: "m-1".to_string(),
        task_id: None,
        context_id: Some(context()),
        metadata: None,
    }
}

pub fn file_part(uri: &str, mime: &str) -> Part {
    Part::File {
        file: FileContent::Uri(FileWithUri {
            uri: uri.to_string(),
            mime_type: Some(mime.to_string()),
            name: None,
        }),
        metadata: None,
    }
}

pub fn artifact_event(task_id: &str, parts: Vec<Part>) -> Event {
    Event::ArtifactUpdate(TaskArtifactUpdateEvent {
        task_id: TaskId::new(task_id),
        context_id: context(),
        artifact: Artifact {
            artifact_id: "a-1".to_string(),
            name: Some("video".to_string()),
            description: None,
            parts,
            metadata: None,
        },
        append: None,
        last_chunk: Some(true),
        metadata: None,
    })
}

pub fn status_event(task_id: &str, state: TaskState) -> Event {
    Event::StatusUpdate(TaskStatusUpdateEvent {
        task_id: TaskId::new(task_id),
        context_id: context(),
        status: TaskStatus {
            state,
            message: None,
            timestamp: None,
        },
        is_final: true,
        metadata: None,
    })
}

pub fn rpc_error(message: &str) -> ClientError {
    ClientError::Rpc(JsonRpcError {
        code: -32603,
        message: message.to_string(),
        data: None,
    })
}

type StreamScript = Result<Vec<Result<Event, ClientError>>, ClientError>;

/// Replays queued responses and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    streams: Mutex<VecDeque<StreamScript>>,
    unary: Mutex<VecDeque<Result<SendMessageResult, ClientError>>>,
    tasks: Mutex<VecDeque<Result<Task, ClientError>>>,
    sent: Mutex<Vec<MessageSendParams>>,
    queries: Mutex<Vec<TaskQueryParams>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_stream(&self, events: Vec<Event>) {
        self.streams
            .lock()
            .unwrap()
            .push_back(Ok(events.into_iter().map(Ok).collect()));
    }

    pub fn push_stream_items(&self, items: Vec<Result<Event, ClientError>>) {
        self.streams.lock().unwrap().push_back(Ok(items));
    }

    pub fn push_stream_failure(&self, error: ClientError) {
        self.streams.lock().unwrap().push_back(Err(error));
    }

    pub fn push_unary(&self, result: Result<SendMessageResult, ClientError>) {
        self.unary.lock().unwrap().push_back(result);
    }

    pub fn push_task(&self, task: Task) {
        self.tasks.lock().unwrap().push_back(Ok(task));
    }

    pub fn sent(&self) -> Vec<MessageSendParams> {
        self.sent.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<TaskQueryParams> {
        self.queries.lock().unwrap().clone()
    }
}

fn exhausted(what: &'static str) -> ClientError {
    ClientError::Decode {
        what,
        message: "script exhausted".to_string(),
    }
}

#[async_trait]
impl AgentTransport for ScriptedTransport {
    async fn send_message(&self, params: MessageSendParams) -> Result<SendMessageResult, ClientError> {
        self.sent.lock().unwrap().push(params);
        self.unary
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("message/send")))
    }

    async fn send_message_streaming(&self, params: MessageSendParams) -> Result<EventStream, ClientError> {
        self.sent.lock().unwrap().push(params);
        let script = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("message/stream")))?;
        Ok(futures::stream::iter(script).boxed())
    }

    async fn get_task(&self, params: TaskQueryParams) -> Result<Task, ClientError> {
        self.queries.lock().unwrap().push(params);
        self.tasks
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("tasks/get")))
    }
}

/// Records hand-offs and reports them as successful.
#[derive(Default)]
pub struct RecordingHandoff {
    requests: Mutex<Vec<UploadRequest>>,
}

impl RecordingHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<UploadRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Handoff for RecordingHandoff {
    fn dispatch(&self, request: UploadRequest) -> UploadHandle {
        let storage_ref = request.storage_ref.clone();
        self.requests.lock().unwrap().push(request);
        let report = UploadReport::new(storage_ref.clone(), UploadStatus::Succeeded);
        UploadHandle::spawn(storage_ref, async move { report })
    }
}

/// Answers follow-up questions from a fixed list, then reports end of input.
#[derive(Default)]
pub struct ScriptedPrompts {
    replies: Mutex<VecDeque<String>>,
    asked: Mutex<u32>,
}

impl ScriptedPrompts {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            asked: Mutex::new(0),
        }
    }

    pub fn asked(&self) -> u32 {
        *self.asked.lock().unwrap()
    }
}

#[async_trait]
impl PromptReader for ScriptedPrompts {
    async fn read_prompt(&self, _question: &str) -> std::io::Result<Option<String>> {
        *self.asked.lock().unwrap() += 1;
        Ok(self.replies.lock().unwrap().pop_front())
    }
}
