use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::gateway::Gateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry. Transcripts live for the panel, not across reloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// What `send` did with the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The assistant's reply was appended.
    Replied,
    /// The request failed; the error was appended as an inline assistant turn.
    Failed,
    /// Empty or whitespace-only input; transcript unchanged.
    IgnoredEmpty,
    /// A send is already in flight; transcript unchanged. Not queued, since
    /// a queued turn could land out of order with its reply.
    IgnoredPending,
}

/// Stateless-per-turn relay between the transcript and the backend assistant.
///
/// A chat failure becomes a message bubble, never an error the caller has to
/// handle: one bad turn should not disrupt the rest of the conversation.
pub struct ChatBridge {
    gateway: Arc<dyn Gateway>,
    transcript: Mutex<Vec<ChatTurn>>,
    in_flight: AtomicBool,
}

impl ChatBridge {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            transcript: Mutex::new(Vec::new()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn transcript(&self) -> Vec<ChatTurn> {
        self.transcript.lock().unwrap().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Send one user message. The user turn is appended before the request
    /// goes out; the reply (or an inline error) follows when it resolves.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::IgnoredEmpty;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return SendOutcome::IgnoredPending;
        }

        self.push(Role::User, text.to_string());
        let outcome = match self.gateway.send_chat(text).await {
            Ok(reply) => {
                self.push(Role::Assistant, reply.reply);
                SendOutcome::Replied
            }
            Err(err) => {
                warn!(error = %err, "chat send failed");
                self.push(Role::Assistant, format!("Error: {err}"));
                SendOutcome::Failed
            }
        };
        self.in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    fn push(&self, role: Role, content: String) {
        self.transcript.lock().unwrap().push(ChatTurn { role, content });
    }
}
