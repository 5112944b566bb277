use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender, unbounded};
use smol::Timer;
use tracing::{debug, info, warn};

use crate::message::{ChatMessage, ChatStatus, Role};

/// Options forwarded with a submit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitRequest {
    pub input: String,
}

impl SubmitRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// The streaming chat client the tree is reconciled against.
/// It owns the authoritative linear message array for the current turn.
pub trait ChatTransport {
    fn status(&self) -> ChatStatus;

    fn messages(&self) -> &[ChatMessage];

    /// Cancel the in-flight reply, keeping whatever streamed so far
    fn stop(&mut self);

    /// Regenerate the last assistant reply
    fn reload(&mut self);

    /// Append the user's input and request a reply
    fn handle_submit(&mut self, request: SubmitRequest);

    /// Replace the array wholesale, e.g. with a historical path before resubmitting
    fn set_messages(&mut self, messages: Vec<ChatMessage>);

    /// Apply progress that arrived since the last call. Returns whether anything changed.
    fn pump(&mut self) -> bool;
}

#[derive(Debug)]
enum StreamEvent {
    Chunk { turn: u64, text: String },
    Failed { turn: u64, reason: String },
    Done { turn: u64 },
}

/// In-process assistant that streams a canned reply word by word.
///
/// A generator thread drives a `smol` timer and pushes chunks over a channel;
/// the owner drains them from its event loop with [`ChatTransport::pump`].
/// Inputs starting with `/fail` make the reply break off with an error.
pub struct ScriptedTransport {
    messages: Vec<ChatMessage>,
    status: ChatStatus,
    next_id: u64,
    /// Bumped for every reply, so chunks of a stopped reply are dropped
    turn: u64,
    delay: Duration,
    sender: Sender<StreamEvent>,
    receiver: Receiver<StreamEvent>,
    cancel: Option<Arc<AtomicBool>>,
    streaming_id: Option<String>,
}

impl ScriptedTransport {
    pub fn new(delay: Duration) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            messages: Vec::new(),
            status: ChatStatus::Ready,
            next_id: 0,
            turn: 0,
            delay,
            sender,
            receiver,
            cancel: None,
            streaming_id: None,
        }
    }

    /// Start from an existing conversation, e.g. a system prompt
    pub fn with_messages(delay: Duration, messages: Vec<ChatMessage>) -> Self {
        let mut transport = Self::new(delay);
        transport.next_id = messages.len() as u64;
        transport.messages = messages;
        transport
    }

    fn fresh_id(&mut self) -> String {
        self.next_id += 1;
        format!("msg-{}", self.next_id)
    }

    fn cancel_reply(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.store(true, Ordering::Relaxed);
        }
        // anything still queued for the old turn is now stale
        self.turn += 1;
        self.streaming_id = None;
    }

    fn start_reply(&mut self) {
        let Some(prompt) = self
            .messages
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.clone())
        else {
            return;
        };

        self.cancel_reply();
        self.status = ChatStatus::Submitted;
        let turn = self.turn;
        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel = Some(cancel.clone());

        let fail = prompt.trim_start().starts_with("/fail");
        let words = compose_reply(&prompt, turn);
        let sender = self.sender.clone();
        let delay = self.delay;
        info!("transport: streaming reply turn={} words={}", turn, words.len());

        thread::spawn(move || {
            smol::block_on(async move {
                for (i, word) in words.into_iter().enumerate() {
                    if !delay.is_zero() {
                        Timer::after(delay).await;
                    }
                    if cancel.load(Ordering::Relaxed) {
                        return;
                    }
                    if fail && i == 3 {
                        let _ = sender.send(StreamEvent::Failed {
                            turn,
                            reason: "scripted failure".to_string(),
                        });
                        return;
                    }
                    let text = if i == 0 { word } else { format!(" {word}") };
                    if sender.send(StreamEvent::Chunk { turn, text }).is_err() {
                        return;
                    }
                }
                let _ = sender.send(StreamEvent::Done { turn });
            })
        });
    }

    fn apply(&mut self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Chunk { turn, text } if turn == self.turn => {
                match self.streaming_id.clone() {
                    Some(id) => {
                        if let Some(message) = self.messages.iter_mut().rev().find(|m| m.id == id) {
                            message.content.push_str(&text);
                        }
                    }
                    None => {
                        let id = self.fresh_id();
                        self.messages.push(ChatMessage::assistant(id.clone(), text));
                        self.streaming_id = Some(id);
                        self.status = ChatStatus::Streaming;
                    }
                }
                true
            }
            StreamEvent::Failed { turn, reason } if turn == self.turn => {
                warn!("transport: reply failed: {}", reason);
                self.cancel = None;
                self.streaming_id = None;
                self.status = ChatStatus::Error;
                true
            }
            StreamEvent::Done { turn } if turn == self.turn => {
                debug!("transport: reply done turn={}", turn);
                self.cancel = None;
                self.streaming_id = None;
                self.status = ChatStatus::Ready;
                true
            }
            _ => false,
        }
    }
}

/// Words of the reply to `prompt`, varied by `turn` so regenerations differ
fn compose_reply(prompt: &str, turn: u64) -> Vec<String> {
    let openers = ["Sure.", "Good question.", "Let me think.", "Here goes."];
    let opener = openers[(turn as usize) % openers.len()];
    let prompt = prompt.trim();
    format!("{opener} You asked: \"{prompt}\". This is reply number {turn}, one of possibly many branches.")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

impl ChatTransport for ScriptedTransport {
    fn status(&self) -> ChatStatus {
        self.status
    }

    fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    fn stop(&mut self) {
        if !self.status.is_busy() {
            return;
        }
        info!("transport: stop");
        self.cancel_reply();
        self.status = ChatStatus::Ready;
    }

    fn reload(&mut self) {
        self.stop();
        while self
            .messages
            .last()
            .is_some_and(|message| message.role == Role::Assistant)
        {
            self.messages.pop();
        }
        if self.messages.last().is_some_and(|message| message.role == Role::User) {
            self.start_reply();
        }
    }

    fn handle_submit(&mut self, request: SubmitRequest) {
        if self.status.is_busy() {
            warn!("transport: submit ignored while a reply is in flight");
            return;
        }
        let input = request.input.trim();
        if input.is_empty() {
            return;
        }
        let id = self.fresh_id();
        self.messages.push(ChatMessage::user(id, input));
        self.start_reply();
    }

    fn set_messages(&mut self, messages: Vec<ChatMessage>) {
        self.stop();
        debug!("transport: set_messages len={}", messages.len());
        self.messages = messages;
    }

    fn pump(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.receiver.try_recv() {
            changed |= self.apply(event);
        }
        changed
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.store(true, Ordering::Relaxed);
        }
    }
}
