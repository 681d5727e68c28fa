//! Chat runtime: drives a [`Session`] from a single event loop.
//!
//! Adapter intents, reply arrivals and playback completions are queued as events and
//! handled one at a time, each to completion. The runtime executes the effects the
//! session returns: it spawns reply requests and presentations, cancels presentations,
//! and forwards notices. Reactive state goes out on a `watch` channel after every event.

use crate::chat::{
    Effect, Generation, Message, MessageId, Notice, ReplyError, SendOutcome, Session, Utterance,
};
use crate::config::Config;
use crate::llm::{self, ReplySource};
use crate::playback::{self, Presenter};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

const INTENT_CHANNEL_SIZE: usize = 64;
const NOTICE_CHANNEL_SIZE: usize = 64;

/// Reactive view of the session for the presentation adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub chat_history: Vec<Message>,
    pub loading: bool,
    /// Gate occupant: the assistant message being presented right now.
    pub message: Option<Message>,
    pub camera_zoomed: bool,
    pub last_error: Option<String>,
    pub generation: Generation,
}

impl Snapshot {
    fn of(session: &Session) -> Self {
        Self {
            chat_history: session.history().to_vec(),
            loading: session.loading(),
            message: session.current_playback().cloned(),
            camera_zoomed: session.camera_zoomed(),
            last_error: session.last_error().map(str::to_string),
            generation: session.generation(),
        }
    }

    /// Send affordance state; false whenever `loading || message`.
    pub fn can_send(&self) -> bool {
        !self.loading && self.message.is_none()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("chat runtime has stopped")]
    Closed,
}

/// Actions the presentation adapter can take.
#[derive(Debug)]
enum Intent {
    Chat {
        text: String,
        accepted: oneshot::Sender<bool>,
    },
    ClearChatHistory,
    StartNewChat,
    SetCameraZoomed(bool),
    ToggleZoom,
    Shutdown,
}

/// How a presentation ended.
#[derive(Debug)]
enum PlaybackOutcome {
    Completed,
    Failed(String),
    TimedOut,
}

/// Results posted back by spawned tasks.
#[derive(Debug)]
enum TaskEvent {
    Reply {
        generation: Generation,
        result: Result<Vec<Utterance>, ReplyError>,
    },
    PlaybackFinished {
        generation: Generation,
        id: MessageId,
        outcome: PlaybackOutcome,
    },
}

/// Clonable handle bound to a running [`ChatRuntime`].
#[derive(Clone)]
pub struct ChatHandle {
    intents: mpsc::Sender<Intent>,
    snapshot: watch::Receiver<Snapshot>,
    notices: broadcast::Sender<Notice>,
}

impl ChatHandle {
    /// Send `text` to the tutor. Returns false when the send was rejected (busy or blank).
    pub async fn chat(&self, text: impl Into<String>) -> Result<bool, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.intent(Intent::Chat {
            text: text.into(),
            accepted: tx,
        })
        .await?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    pub async fn clear_chat_history(&self) -> Result<(), RuntimeError> {
        self.intent(Intent::ClearChatHistory).await
    }

    pub async fn start_new_chat(&self) -> Result<(), RuntimeError> {
        self.intent(Intent::StartNewChat).await
    }

    pub async fn set_camera_zoomed(&self, zoomed: bool) -> Result<(), RuntimeError> {
        self.intent(Intent::SetCameraZoomed(zoomed)).await
    }

    pub async fn toggle_zoom(&self) -> Result<(), RuntimeError> {
        self.intent(Intent::ToggleZoom).await
    }

    /// Stop the runtime; in-flight requests and presentations are abandoned.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.intent(Intent::Shutdown).await
    }

    /// Current reactive state.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Wait until the current cycle is over (not loading, nothing presenting).
    pub async fn wait_until_idle(&self) -> Result<Snapshot, RuntimeError> {
        let mut rx = self.snapshot.clone();
        let snap = rx
            .wait_for(Snapshot::can_send)
            .await
            .map_err(|_| RuntimeError::Closed)?;
        Ok(snap.clone())
    }

    async fn intent(&self, intent: Intent) -> Result<(), RuntimeError> {
        self.intents
            .send(intent)
            .await
            .map_err(|_| RuntimeError::Closed)
    }
}

/// Owns the session and its collaborators. Build one, then [`ChatRuntime::spawn`] it.
pub struct ChatRuntime {
    session: Session,
    replies: Arc<dyn ReplySource>,
    presenter: Arc<dyn Presenter>,
    playback_timeout: Option<Duration>,
}

impl ChatRuntime {
    pub fn new(replies: Arc<dyn ReplySource>, presenter: Arc<dyn Presenter>) -> Self {
        Self {
            session: Session::default(),
            replies,
            presenter,
            playback_timeout: None,
        }
    }

    /// Runtime with the configured backend, presenter, zoom and playback timeout.
    pub fn from_config(config: &Config, persona: Option<String>) -> Self {
        Self::new(
            llm::reply_source(&config.backend, persona),
            playback::presenter(&config.playback),
        )
        .with_camera_zoomed(config.ui.camera_zoomed)
        .with_playback_timeout(config.playback.timeout())
    }

    pub fn with_camera_zoomed(mut self, zoomed: bool) -> Self {
        self.session = Session::new(zoomed);
        self
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = presenter;
        self
    }

    /// Treat a presentation as finished after `timeout`. None waits forever.
    pub fn with_playback_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.playback_timeout = timeout;
        self
    }

    /// Start the event loop on the current tokio runtime.
    pub fn spawn(self) -> (ChatHandle, JoinHandle<()>) {
        let (intent_tx, intent_rx) = mpsc::channel(INTENT_CHANNEL_SIZE);
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::of(&self.session));
        let (notice_tx, _) = broadcast::channel(NOTICE_CHANNEL_SIZE);
        let (task_tx, task_rx) = mpsc::unbounded_channel();

        let handle = ChatHandle {
            intents: intent_tx,
            snapshot: snapshot_rx,
            notices: notice_tx.clone(),
        };
        let event_loop = EventLoop {
            session: self.session,
            replies: self.replies,
            presenter: self.presenter,
            playback_timeout: self.playback_timeout,
            snapshot_tx,
            notice_tx,
            task_tx,
            reply_tasks: Vec::new(),
            playback_task: None,
        };
        let join = tokio::spawn(event_loop.run(intent_rx, task_rx));
        (handle, join)
    }
}

struct EventLoop {
    session: Session,
    replies: Arc<dyn ReplySource>,
    presenter: Arc<dyn Presenter>,
    playback_timeout: Option<Duration>,
    snapshot_tx: watch::Sender<Snapshot>,
    notice_tx: broadcast::Sender<Notice>,
    task_tx: mpsc::UnboundedSender<TaskEvent>,
    reply_tasks: Vec<JoinHandle<()>>,
    playback_task: Option<JoinHandle<()>>,
}

impl EventLoop {
    async fn run(
        mut self,
        mut intents: mpsc::Receiver<Intent>,
        mut tasks: mpsc::UnboundedReceiver<TaskEvent>,
    ) {
        log::debug!("chat runtime started");
        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(Intent::Shutdown) | None => break,
                    Some(intent) => self.handle_intent(intent),
                },
                Some(event) = tasks.recv() => self.handle_task_event(event),
            }
        }
        for task in self.reply_tasks.drain(..) {
            task.abort();
        }
        if let Some(task) = self.playback_task.take() {
            task.abort();
            self.presenter.cancel();
        }
        log::debug!("chat runtime stopped");
    }

    fn handle_intent(&mut self, intent: Intent) {
        let effects = match intent {
            Intent::Chat { text, accepted } => match self.session.send(&text) {
                SendOutcome::Accepted(effects) => {
                    self.publish();
                    let _ = accepted.send(true);
                    self.execute(effects);
                    return;
                }
                SendOutcome::Rejected(reason) => {
                    log::debug!("chat intent rejected: {:?}", reason);
                    let _ = accepted.send(false);
                    return;
                }
            },
            Intent::ClearChatHistory => self.session.clear_chat_history(),
            Intent::StartNewChat => self.session.start_new_chat(),
            Intent::SetCameraZoomed(zoomed) => self.session.set_camera_zoomed(zoomed),
            Intent::ToggleZoom => self.session.toggle_zoom(),
            Intent::Shutdown => return,
        };
        self.publish();
        self.execute(effects);
    }

    fn handle_task_event(&mut self, event: TaskEvent) {
        let effects = match event {
            TaskEvent::Reply { generation, result } => self.session.on_reply(generation, result),
            TaskEvent::PlaybackFinished {
                generation,
                id,
                outcome,
            } => {
                if generation == self.session.generation() {
                    self.playback_task = None;
                }
                match outcome {
                    PlaybackOutcome::Completed => {}
                    PlaybackOutcome::Failed(e) => {
                        log::warn!("presentation of {} failed: {}", id, e)
                    }
                    PlaybackOutcome::TimedOut => {
                        log::warn!(
                            "presentation of {} did not finish within {:?}; releasing the gate",
                            id,
                            self.playback_timeout.unwrap_or_default()
                        );
                        self.presenter.cancel();
                    }
                }
                self.session.on_playback_finished(generation, id)
            }
        };
        self.publish();
        self.execute(effects);
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(Snapshot::of(&self.session));
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::RequestReply {
                    generation,
                    text,
                    context,
                } => self.spawn_reply(generation, text, context),
                Effect::Present {
                    generation,
                    message,
                } => self.spawn_presentation(generation, message),
                Effect::CancelPlayback => {
                    if let Some(task) = self.playback_task.take() {
                        task.abort();
                    }
                    self.presenter.cancel();
                }
                Effect::Notify(notice) => {
                    // No subscribers is fine.
                    let _ = self.notice_tx.send(notice);
                }
            }
        }
    }

    fn spawn_reply(&mut self, generation: Generation, text: String, context: Vec<Message>) {
        self.reply_tasks.retain(|t| !t.is_finished());
        let replies = Arc::clone(&self.replies);
        let tx = self.task_tx.clone();
        self.reply_tasks.push(tokio::spawn(async move {
            let result = replies.request_reply(&text, &context).await;
            let _ = tx.send(TaskEvent::Reply { generation, result });
        }));
    }

    fn spawn_presentation(&mut self, generation: Generation, message: Message) {
        if let Some(previous) = self.playback_task.take() {
            previous.abort();
        }
        let presenter = Arc::clone(&self.presenter);
        let timeout = self.playback_timeout;
        let tx = self.task_tx.clone();
        self.playback_task = Some(tokio::spawn(async move {
            let id = message.id();
            let run = presenter.present(message.text());
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, run).await {
                    Ok(Ok(())) => PlaybackOutcome::Completed,
                    Ok(Err(e)) => PlaybackOutcome::Failed(e.to_string()),
                    Err(_) => PlaybackOutcome::TimedOut,
                },
                None => match run.await {
                    Ok(()) => PlaybackOutcome::Completed,
                    Err(e) => PlaybackOutcome::Failed(e.to_string()),
                },
            };
            let _ = tx.send(TaskEvent::PlaybackFinished {
                generation,
                id,
                outcome,
            });
        }));
    }
}
