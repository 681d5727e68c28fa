//! Integration tests: drive a running chat runtime with collaborators the test controls.
//! Replies and presentations only resolve when the test says so.

use async_trait::async_trait;
use lib::chat::{Generation, Message, Notice, Utterance};
use lib::llm::{ReplyError, ReplySource};
use lib::playback::{PlaybackError, Presenter};
use lib::{ChatHandle, ChatRuntime, RuntimeError, Snapshot};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

struct Request {
    text: String,
    context: Vec<Message>,
    respond: oneshot::Sender<Result<Vec<Utterance>, ReplyError>>,
}

impl Request {
    fn reply(self, texts: &[&str]) {
        let _ = self
            .respond
            .send(Ok(texts.iter().map(|t| Utterance::new(*t)).collect()));
    }

    fn fail(self, error: ReplyError) {
        let _ = self.respond.send(Err(error));
    }
}

struct ControlledReplies(mpsc::UnboundedSender<Request>);

#[async_trait]
impl ReplySource for ControlledReplies {
    async fn request_reply(
        &self,
        text: &str,
        context: &[Message],
    ) -> Result<Vec<Utterance>, ReplyError> {
        let (tx, rx) = oneshot::channel();
        self.0
            .send(Request {
                text: text.to_string(),
                context: context.to_vec(),
                respond: tx,
            })
            .map_err(|_| ReplyError::Network("harness gone".into()))?;
        rx.await
            .unwrap_or_else(|_| Err(ReplyError::Network("reply dropped".into())))
    }
}

struct Presentation {
    text: String,
    done: oneshot::Sender<Result<(), PlaybackError>>,
}

impl Presentation {
    fn finish(self) {
        let _ = self.done.send(Ok(()));
    }
}

struct ControlledPresenter {
    started: mpsc::UnboundedSender<Presentation>,
    cancels: Arc<AtomicUsize>,
}

#[async_trait]
impl Presenter for ControlledPresenter {
    async fn present(&self, text: &str) -> Result<(), PlaybackError> {
        let (tx, rx) = oneshot::channel();
        let _ = self.started.send(Presentation {
            text: text.to_string(),
            done: tx,
        });
        rx.await.unwrap_or(Ok(()))
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    handle: ChatHandle,
    join: JoinHandle<()>,
    requests: mpsc::UnboundedReceiver<Request>,
    presentations: mpsc::UnboundedReceiver<Presentation>,
    cancels: Arc<AtomicUsize>,
}

async fn within<F: Future>(f: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("timed out waiting")
}

fn start(playback_timeout: Option<Duration>) -> Harness {
    let (req_tx, requests) = mpsc::unbounded_channel();
    let (pres_tx, presentations) = mpsc::unbounded_channel();
    let cancels = Arc::new(AtomicUsize::new(0));
    let presenter = ControlledPresenter {
        started: pres_tx,
        cancels: Arc::clone(&cancels),
    };
    let (handle, join) = ChatRuntime::new(Arc::new(ControlledReplies(req_tx)), Arc::new(presenter))
        .with_playback_timeout(playback_timeout)
        .spawn();
    Harness {
        handle,
        join,
        requests,
        presentations,
        cancels,
    }
}

impl Harness {
    async fn next_request(&mut self) -> Request {
        within(self.requests.recv()).await.expect("reply requested")
    }

    async fn next_presentation(&mut self) -> Presentation {
        within(self.presentations.recv())
            .await
            .expect("presentation started")
    }

    async fn wait_for(&self, pred: impl FnMut(&Snapshot) -> bool) -> Snapshot {
        let mut rx = self.handle.subscribe();
        let snap = within(rx.wait_for(pred)).await.expect("runtime running");
        snap.clone()
    }

    async fn idle(&self) -> Snapshot {
        within(self.handle.wait_until_idle()).await.expect("runtime running")
    }
}

fn texts(history: &[Message]) -> Vec<&str> {
    history.iter().map(Message::text).collect()
}

#[tokio::test]
async fn full_cycle_presents_utterances_in_order_then_reenables_send() {
    let mut h = start(None);
    let mut notices = h.handle.notices();

    assert!(h.handle.snapshot().can_send());
    assert!(h.handle.chat("Explain recursion").await.unwrap());

    let snap = h.handle.snapshot();
    assert!(snap.loading);
    assert!(!snap.can_send());
    assert_eq!(texts(&snap.chat_history), vec!["Explain recursion"]);

    let req = h.next_request().await;
    assert_eq!(req.text, "Explain recursion");
    assert!(req.context.is_empty());
    req.reply(&["u1", "u2"]);

    let first = h.next_presentation().await;
    assert_eq!(first.text, "u1");
    let snap = h.handle.snapshot();
    assert!(!snap.loading);
    assert_eq!(snap.message.as_ref().map(Message::text), Some("u1"));
    assert!(!snap.can_send());
    assert_eq!(texts(&snap.chat_history), vec!["Explain recursion", "u1"]);

    // Presenting blocks sending.
    assert!(!h.handle.chat("Another question").await.unwrap());

    first.finish();
    let second = h.next_presentation().await;
    assert_eq!(second.text, "u2");
    second.finish();

    let snap = h.idle().await;
    assert_eq!(snap.message, None);
    assert_eq!(texts(&snap.chat_history), vec!["Explain recursion", "u1", "u2"]);
    assert!(snap.chat_history.iter().all(Message::played));
    assert_eq!(snap.last_error, None);

    let mut kinds = Vec::new();
    while let Ok(n) = notices.try_recv() {
        kinds.push(match n {
            Notice::MessageAppended { message } => format!("append {}", message.text()),
            Notice::LoadingChanged { loading } => format!("loading {}", loading),
            Notice::PlaybackFinished { .. } => "finished".to_string(),
            other => format!("{:?}", other),
        });
    }
    assert_eq!(
        kinds,
        vec![
            "append Explain recursion",
            "loading true",
            "loading false",
            "append u1",
            "finished",
            "append u2",
            "finished",
        ]
    );
}

#[tokio::test]
async fn send_while_loading_is_rejected_without_a_second_request() {
    let mut h = start(None);
    assert!(h.handle.chat("first").await.unwrap());
    assert!(!h.handle.chat("second").await.unwrap());

    let req = h.next_request().await;
    assert_eq!(req.text, "first");
    assert!(h.requests.try_recv().is_err());
    assert_eq!(texts(&h.handle.snapshot().chat_history), vec!["first"]);
    req.reply(&[]);
    h.idle().await;
}

#[tokio::test]
async fn blank_text_is_rejected() {
    let h = start(None);
    assert!(!h.handle.chat("   ").await.unwrap());
    assert!(h.handle.snapshot().chat_history.is_empty());
}

#[tokio::test]
async fn failed_request_keeps_question_and_allows_resend() {
    let mut h = start(None);
    let mut notices = h.handle.notices();
    assert!(h.handle.chat("What is a node?").await.unwrap());
    h.next_request()
        .await
        .fail(ReplyError::Network("connection refused".into()));

    let snap = h.idle().await;
    assert_eq!(texts(&snap.chat_history), vec!["What is a node?"]);
    assert!(snap.last_error.as_deref().unwrap().contains("connection refused"));

    let mut failed = false;
    while let Ok(n) = notices.try_recv() {
        failed |= matches!(n, Notice::RequestFailed { .. });
    }
    assert!(failed);

    assert!(h.handle.chat("What is a node?").await.unwrap());
    let req = h.next_request().await;
    assert_eq!(texts(&req.context), vec!["What is a node?"]);
    assert_eq!(h.handle.snapshot().last_error, None);
}

#[tokio::test]
async fn new_chat_discards_late_reply() {
    let mut h = start(None);
    assert!(h.handle.chat("old question").await.unwrap());
    let late = h.next_request().await;

    h.handle.start_new_chat().await.unwrap();
    let snap = h.wait_for(|s| s.generation == Generation(1)).await;
    assert!(snap.chat_history.is_empty());
    assert!(!snap.loading);
    assert!(snap.can_send());

    late.reply(&["stale answer"]);

    assert!(h.handle.chat("new question").await.unwrap());
    let req = h.next_request().await;
    assert_eq!(req.text, "new question");
    assert!(req.context.is_empty());
    req.reply(&["fresh answer"]);

    let p = h.next_presentation().await;
    assert_eq!(p.text, "fresh answer");
    p.finish();
    let snap = h.idle().await;
    assert_eq!(texts(&snap.chat_history), vec!["new question", "fresh answer"]);
}

#[tokio::test]
async fn new_chat_cancels_running_presentation() {
    let mut h = start(None);
    assert!(h.handle.chat("q").await.unwrap());
    h.next_request().await.reply(&["a", "b"]);
    let a = h.next_presentation().await;
    assert_eq!(a.text, "a");

    h.handle.start_new_chat().await.unwrap();
    let snap = h.wait_for(|s| s.generation == Generation(1)).await;
    assert_eq!(snap.message, None);
    assert!(snap.chat_history.is_empty());
    assert!(h.cancels.load(Ordering::SeqCst) >= 1);
    drop(a);

    assert!(h.handle.chat("next").await.unwrap());
    h.next_request().await.reply(&["c"]);
    let c = h.next_presentation().await;
    assert_eq!(c.text, "c");
    c.finish();
    let snap = h.idle().await;
    assert_eq!(texts(&snap.chat_history), vec!["next", "c"]);
}

#[tokio::test]
async fn clear_history_leaves_current_cycle_running() {
    let mut h = start(None);
    assert!(h.handle.chat("q").await.unwrap());
    h.next_request().await.reply(&["a", "b"]);
    let a = h.next_presentation().await;

    h.handle.clear_chat_history().await.unwrap();
    let snap = h.wait_for(|s| s.chat_history.is_empty()).await;
    assert_eq!(snap.message.as_ref().map(Message::text), Some("a"));
    assert!(!snap.can_send());

    a.finish();
    let b = h.next_presentation().await;
    assert_eq!(b.text, "b");
    b.finish();
    let snap = h.idle().await;
    assert_eq!(texts(&snap.chat_history), vec!["b"]);
    assert_eq!(h.cancels.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn presenter_error_still_releases_gate() {
    let mut h = start(None);
    assert!(h.handle.chat("q").await.unwrap());
    h.next_request().await.reply(&["a", "b"]);
    let a = h.next_presentation().await;
    let _ = a.done.send(Err(PlaybackError::Spawn("no speaker".into())));

    let b = h.next_presentation().await;
    assert_eq!(b.text, "b");
    b.finish();
    h.idle().await;
}

#[tokio::test]
async fn stuck_presentation_is_released_after_timeout() {
    let mut h = start(Some(Duration::from_millis(50)));
    assert!(h.handle.chat("q").await.unwrap());
    h.next_request().await.reply(&["slow", "next"]);

    let slow = h.next_presentation().await;
    assert_eq!(slow.text, "slow");
    // Never finished; the timeout moves on.
    let next = h.next_presentation().await;
    assert_eq!(next.text, "next");
    assert!(h.cancels.load(Ordering::SeqCst) >= 1);
    next.finish();
    h.idle().await;
    drop(slow);
}

#[tokio::test]
async fn zoom_is_independent_of_the_cycle() {
    let mut h = start(None);
    assert!(h.handle.snapshot().camera_zoomed);
    assert!(h.handle.chat("q").await.unwrap());

    h.handle.toggle_zoom().await.unwrap();
    let snap = h.wait_for(|s| !s.camera_zoomed).await;
    assert!(snap.loading);

    h.handle.set_camera_zoomed(true).await.unwrap();
    h.wait_for(|s| s.camera_zoomed).await;

    h.next_request().await.reply(&[]);
    let snap = h.idle().await;
    assert!(snap.camera_zoomed);
}

#[tokio::test]
async fn shutdown_stops_the_runtime() {
    let h = start(None);
    h.handle.shutdown().await.unwrap();
    within(h.join).await.unwrap();
    assert_eq!(h.handle.chat("hello").await, Err(RuntimeError::Closed));
}
