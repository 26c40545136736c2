//! One running conversation.
//!
//! Everything a conversation owns lives on a single task: inbound messages,
//! caption timers and video lookups are all handled from one `select!` loop,
//! so the session state is never shared. Hosts talk to the task through a
//! [`SessionHandle`] and receive [`Command`]s on the returned channel, which
//! closes when the conversation ends.

use crate::Command;
use crate::config::SessionConfig;
use crate::dispatcher::{Action, ToolDispatcher};
use crate::forwarder::OutboundForwarder;
use crate::normalize::normalize;
use crate::resolver::{ResolveError, ResolvedVideo, VideoResolver};
use crate::session_state::{PlaybackMode, SessionState};
use anyhow::{Result, anyhow};
use experience_types::{NormalizedEvent, RawMessage, Role, StatusEvent, ToolCall};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const INBOX_CAPACITY: usize = 256;
const COMMAND_CAPACITY: usize = 64;

#[derive(Debug)]
enum Inbound {
    Message(RawMessage),
    ClearSubtitles,
    CtaClicked,
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Leave,
}

/// A point-in-time view of the session, for hosts and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub playback: PlaybackMode,
    pub current_video_id: Option<String>,
    pub cta_visible: bool,
    pub cta_clicked: bool,
    pub caption: Option<String>,
    pub transcript_len: usize,
    pub resolving: bool,
}

/// Sends events into a running session. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Inbound>,
}

impl SessionHandle {
    async fn send(&self, inbound: Inbound) -> Result<()> {
        self.tx
            .send(inbound)
            .await
            .map_err(|_| anyhow!("Session has ended"))
    }

    /// Hands one raw transport message to the session.
    pub async fn ingest(&self, raw: RawMessage) -> Result<()> {
        self.send(Inbound::Message(raw)).await
    }

    pub async fn clear_subtitles(&self) -> Result<()> {
        self.send(Inbound::ClearSubtitles).await
    }

    pub async fn cta_clicked(&self) -> Result<()> {
        self.send(Inbound::CtaClicked).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Inbound::Snapshot(reply)).await?;
        rx.await.map_err(|_| anyhow!("Session has ended"))
    }

    /// Ends the conversation. Pending caption timers are cancelled and any
    /// video lookup still in flight is discarded.
    pub async fn leave(&self) -> Result<()> {
        self.send(Inbound::Leave).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

struct Resolution {
    generation: u64,
    call: ToolCall,
    event: RawMessage,
    result: Result<ResolvedVideo, ResolveError>,
}

struct Session {
    config: SessionConfig,
    state: SessionState,
    dispatcher: ToolDispatcher,
    resolver: Arc<VideoResolver>,
    forwarder: OutboundForwarder,
    commands: mpsc::Sender<Command>,
    /// Bumped for every lookup so a superseded one is recognised.
    generation: u64,
    resolving: Option<JoinHandle<()>>,
    results_tx: mpsc::UnboundedSender<Resolution>,
    results_rx: mpsc::UnboundedReceiver<Resolution>,
}

/// Starts a conversation on its own task.
pub fn spawn(
    config: SessionConfig,
    resolver: Arc<VideoResolver>,
    forwarder: OutboundForwarder,
) -> (SessionHandle, mpsc::Receiver<Command>) {
    let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);
    let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (results_tx, results_rx) = mpsc::unbounded_channel();

    let session = Session {
        state: SessionState::new(&config),
        dispatcher: ToolDispatcher::new(config.conversation_id()),
        config,
        resolver,
        forwarder,
        commands,
        generation: 0,
        resolving: None,
        results_tx,
        results_rx,
    };
    tokio::spawn(session.run(inbox));

    (SessionHandle { tx }, command_rx)
}

impl Session {
    async fn run(mut self, mut inbox: mpsc::Receiver<Inbound>) {
        tracing::info!(
            conversation_id = self.config.conversation_id(),
            demo_id = self.config.demo_id(),
            "Session started"
        );

        loop {
            let caption_task = self.state.subtitles.pending();
            let caption_timer = async move {
                match caption_task {
                    Some(task) => {
                        tokio::time::sleep_until(task.deadline()).await;
                        task
                    }
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                inbound = inbox.recv() => {
                    let keep_going = match inbound {
                        Some(Inbound::Message(raw)) => self.on_message(&raw).await,
                        Some(Inbound::ClearSubtitles) => {
                            self.clear_captions().await;
                            true
                        }
                        Some(Inbound::CtaClicked) => {
                            let actions =
                                self.dispatcher.cta_clicked(&mut self.state, Instant::now());
                            self.run_actions(actions).await;
                            true
                        }
                        Some(Inbound::Snapshot(reply)) => {
                            let _ = reply.send(self.snapshot());
                            true
                        }
                        Some(Inbound::Leave) | None => false,
                    };
                    if !keep_going {
                        break;
                    }
                }
                Some(resolution) = self.results_rx.recv() => {
                    self.on_resolved(resolution).await;
                }
                task = caption_timer => {
                    if let Some(frame) = self.state.subtitles.on_timer(task, Instant::now()) {
                        self.emit(Command::Subtitle(frame)).await;
                    }
                }
            }
        }

        self.end();
    }

    /// Returns false when the message ends the conversation.
    async fn on_message(&mut self, raw: &RawMessage) -> bool {
        let now = Instant::now();
        let event = normalize(raw);
        tracing::trace!(kind = event.kind(), "inbound message");

        match event {
            NormalizedEvent::ToolCall(call) => {
                if self.state.dedup.should_forward(&call, now) {
                    let actions = self.dispatcher.dispatch(&mut self.state, &call, raw);
                    self.run_actions(actions).await;
                }
            }
            NormalizedEvent::TranscriptBatch(entries) => {
                let before = self.state.transcript.len();
                let added = self.state.transcript.record_batch(&entries, now);
                tracing::trace!(added, total = self.state.transcript.len(), "transcript batch");

                let latest = self.state.transcript.messages()[before..]
                    .iter()
                    .rev()
                    .find(|message| message.role() == Role::Assistant)
                    .map(|message| message.content().to_string());
                if let Some(text) = latest {
                    self.caption(&text, now).await;
                }
            }
            NormalizedEvent::Utterance(utterance) => {
                let recorded = self.state.transcript.record_utterance(&utterance, now);
                if utterance.role() == Role::Assistant && (recorded || utterance.is_partial()) {
                    self.caption(utterance.text(), now).await;
                }
            }
            NormalizedEvent::Status(status) => match status {
                StatusEvent::ReplicaStoppedSpeaking => self.clear_captions().await,
                StatusEvent::ObjectiveCompleted {
                    objective,
                    properties,
                } => {
                    let action = self
                        .dispatcher
                        .objective_completed(objective.as_deref(), &properties);
                    self.run_actions(vec![action]).await;
                }
                StatusEvent::Shutdown => {
                    tracing::info!("Transport shut the conversation down");
                    return false;
                }
                other => tracing::trace!(event_type = other.event_type(), "status"),
            },
            NormalizedEvent::Unrecognized => {}
        }
        true
    }

    async fn on_resolved(&mut self, resolution: Resolution) {
        if resolution.generation != self.generation {
            tracing::debug!(
                generation = resolution.generation,
                current = self.generation,
                "discarding superseded video lookup"
            );
            return;
        }
        self.resolving = None;

        let actions =
            self.dispatcher
                .apply_resolution(
                    &mut self.state,
                    &resolution.call,
                    &resolution.event,
                    resolution.result,
                );
        self.run_actions(actions).await;
    }

    async fn run_actions(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Emit(command) => self.emit(command).await,
                Action::Resolve { title, call, event } => {
                    self.start_resolution(title, call, event)
                }
                Action::CancelResolve => self.cancel_resolution(),
                Action::Forward(event) => {
                    self.forwarder.forward(event);
                }
            }
        }
    }

    /// A newer fetch_video supersedes any lookup still running.
    fn start_resolution(&mut self, title: String, call: ToolCall, event: RawMessage) {
        self.cancel_resolution();

        let generation = self.generation;
        let resolver = self.resolver.clone();
        let demo_id = self.config.demo_id().to_string();
        let results = self.results_tx.clone();

        self.resolving = Some(tokio::spawn(async move {
            let result = resolver.resolve(&title, &demo_id).await;
            let _ = results.send(Resolution {
                generation,
                call,
                event,
                result,
            });
        }));
    }

    fn cancel_resolution(&mut self) {
        self.generation += 1;
        if let Some(task) = self.resolving.take() {
            tracing::debug!("aborting in-flight video lookup");
            task.abort();
        }
    }

    async fn caption(&mut self, text: &str, now: Instant) {
        if let Some(frame) = self.state.subtitles.on_text(text, now) {
            self.emit(Command::Subtitle(frame)).await;
        }
    }

    async fn clear_captions(&mut self) {
        if let Some(frame) = self.state.subtitles.clear(Instant::now()) {
            self.emit(Command::Subtitle(frame)).await;
        }
    }

    async fn emit(&self, command: Command) {
        tracing::debug!(?command, "emitting command");
        if self.commands.send(command).await.is_err() {
            tracing::debug!("host stopped listening for commands");
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            playback: self.state.playback,
            current_video_id: self
                .state
                .current_video
                .as_ref()
                .map(|video| video.asset().id().to_string()),
            cta_visible: self.state.cta.is_visible(),
            cta_clicked: self.state.cta.is_clicked(),
            caption: self.state.subtitles.displayed_text().map(str::to_string),
            transcript_len: self.state.transcript.len(),
            resolving: self.resolving.is_some(),
        }
    }

    fn end(&mut self) {
        self.state.subtitles.cancel();
        self.cancel_resolution();
        tracing::info!(
            conversation_id = self.config.conversation_id(),
            messages = self.state.transcript.len(),
            "Session ended"
        );
    }
}
