//! In-memory fakes for unit tests.

use crate::conversation::ConversationTurn;
use crate::error::{CompletionError, CompletionErrorKind, RepoError, Result};
use crate::llm::{CompletionResponse, CompletionTransport};
use crate::messaging::ChatPlatform;
use crate::repo::{PullResult, RepoStatus, RepoSync, UpdateInfo};
use crate::{BotIdentity, DeliveredMessage, Error, RawMessage, ThreadHandle};

use chrono::{DateTime, TimeZone as _, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn bot_identity() -> BotIdentity {
    BotIdentity {
        user_id: "42".into(),
        username: "RelayBot".into(),
        alias: Some("Relay".into()),
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
        .single()
        .expect("valid fixed timestamp")
}

/// A channel message `secs` seconds after a fixed base time.
pub fn raw_message(id: &str, author_id: &str, is_bot: bool, content: &str, secs: i64) -> RawMessage {
    RawMessage {
        id: id.into(),
        author_id: author_id.into(),
        author_is_bot: is_bot,
        content: content.into(),
        created_at: base_time() + chrono::Duration::seconds(secs),
        channel_id: "channel-1".into(),
        is_thread: false,
        mentions: Vec::new(),
    }
}

/// A thread the fake platform was asked to create.
#[derive(Debug, Clone)]
pub struct CreatedThread {
    pub id: String,
    pub name: String,
    pub anchor_id: String,
    pub auto_archive_minutes: u16,
}

/// Records every platform call; failures are opt-in.
#[derive(Debug, Default)]
pub struct FakePlatform {
    history: Vec<RawMessage>,
    fail_create: bool,
    fail_fetch: bool,
    fail_typing: bool,
    fail_send_after: Option<usize>,
    created: Mutex<Vec<CreatedThread>>,
    sent: Mutex<Vec<(String, String)>>,
    typing: AtomicUsize,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(mut self, history: Vec<RawMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn failing_typing(mut self) -> Self {
        self.fail_typing = true;
        self
    }

    /// Accept `count` sends, then fail every later one.
    pub fn failing_send_after(mut self, count: usize) -> Self {
        self.fail_send_after = Some(count);
        self
    }

    pub fn created_threads(&self) -> Vec<CreatedThread> {
        self.created.lock().expect("lock").clone()
    }

    pub fn all_sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("lock").clone()
    }

    pub fn sent_contents(&self, thread_id: &str) -> Vec<String> {
        self.all_sent()
            .into_iter()
            .filter(|(id, _)| id == thread_id)
            .map(|(_, content)| content)
            .collect()
    }

    pub fn typing_count(&self) -> usize {
        self.typing.load(Ordering::SeqCst)
    }
}

impl ChatPlatform for FakePlatform {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_thread(
        &self,
        message: &RawMessage,
        name: &str,
        auto_archive_minutes: u16,
    ) -> Result<ThreadHandle> {
        if self.fail_create {
            return Err(Error::Platform("missing permissions".into()));
        }
        let mut created = self.created.lock().expect("lock");
        let id = format!("thread-new-{}", created.len() + 1);
        created.push(CreatedThread {
            id: id.clone(),
            name: name.to_string(),
            anchor_id: message.id.clone(),
            auto_archive_minutes,
        });
        Ok(ThreadHandle {
            id,
            name: name.to_string(),
        })
    }

    async fn fetch_messages(&self, _thread: &ThreadHandle, limit: u8) -> Result<Vec<RawMessage>> {
        if self.fail_fetch {
            return Err(Error::Platform("history unavailable".into()));
        }
        Ok(self.history.iter().take(usize::from(limit)).cloned().collect())
    }

    async fn send_message(&self, thread: &ThreadHandle, content: &str) -> Result<DeliveredMessage> {
        let mut sent = self.sent.lock().expect("lock");
        if self.fail_send_after.is_some_and(|limit| sent.len() >= limit) {
            return Err(Error::Platform("send rejected".into()));
        }
        sent.push((thread.id.clone(), content.to_string()));
        Ok(DeliveredMessage {
            id: format!("sent-{}", sent.len()),
            thread_id: thread.id.clone(),
        })
    }

    async fn send_typing(&self, _thread: &ThreadHandle) -> Result<()> {
        self.typing.fetch_add(1, Ordering::SeqCst);
        if self.fail_typing {
            return Err(Error::Platform("typing rejected".into()));
        }
        Ok(())
    }
}

type ScriptedResult = std::result::Result<CompletionResponse, CompletionError>;

/// Replays queued results; the last one repeats once the queue drains.
#[derive(Debug)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<ScriptedResult>>,
    is_process: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<(tokio::time::Instant, Vec<ConversationTurn>)>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<ScriptedResult>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            is_process: false,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing(error: CompletionError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn as_process(mut self) -> Self {
        self.is_process = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_times(&self) -> Vec<tokio::time::Instant> {
        self.calls.lock().expect("lock").iter().map(|(at, _)| *at).collect()
    }

    pub fn received_turns(&self) -> Vec<Vec<ConversationTurn>> {
        self.calls
            .lock()
            .expect("lock")
            .iter()
            .map(|(_, turns)| turns.clone())
            .collect()
    }

    fn next_result(&self) -> ScriptedResult {
        let mut responses = self.responses.lock().expect("lock");
        if responses.len() > 1 {
            if let Some(result) = responses.pop_front() {
                return result;
            }
        }
        responses.front().cloned().unwrap_or_else(|| {
            Err(CompletionError::new(CompletionErrorKind::Unknown, "no scripted response"))
        })
    }
}

#[async_trait::async_trait]
impl CompletionTransport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_process(&self) -> bool {
        self.is_process
    }

    async fn complete(&self, turns: &[ConversationTurn]) -> ScriptedResult {
        self.calls
            .lock()
            .expect("lock")
            .push((tokio::time::Instant::now(), turns.to_vec()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_result()
    }
}

/// Repository double with a clean `main` checkout by default.
#[derive(Debug)]
pub struct FakeRepo {
    status: std::result::Result<RepoStatus, RepoError>,
    status_delay: Option<Duration>,
    updates: UpdateInfo,
    pull: std::result::Result<PullResult, RepoError>,
    update_checks: AtomicUsize,
}

impl FakeRepo {
    pub fn new() -> Self {
        Self {
            status: Ok(RepoStatus {
                branch: "main".into(),
                clean: true,
                modified: Vec::new(),
                tracking: Some("origin/main".into()),
            }),
            status_delay: None,
            updates: UpdateInfo::default(),
            pull: Ok(PullResult {
                updated: false,
                summary: "Already up to date".into(),
                files: Vec::new(),
            }),
            update_checks: AtomicUsize::new(0),
        }
    }

    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = Some(delay);
        self
    }

    pub fn with_updates(mut self, updates: UpdateInfo) -> Self {
        self.updates = updates;
        self
    }

    pub fn with_pull(mut self, pull: std::result::Result<PullResult, RepoError>) -> Self {
        self.pull = pull;
        self
    }

    pub fn update_checks(&self) -> usize {
        self.update_checks.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RepoSync for FakeRepo {
    async fn initialize(&self) -> std::result::Result<(), RepoError> {
        Ok(())
    }

    async fn status(&self) -> std::result::Result<RepoStatus, RepoError> {
        if let Some(delay) = self.status_delay {
            tokio::time::sleep(delay).await;
        }
        self.status.clone()
    }

    async fn check_for_updates(&self) -> std::result::Result<UpdateInfo, RepoError> {
        self.update_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.updates)
    }

    async fn pull_changes(&self) -> std::result::Result<PullResult, RepoError> {
        self.pull.clone()
    }
}
