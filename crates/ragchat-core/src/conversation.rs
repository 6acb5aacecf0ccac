//! The conversation log and the rules for mutating it.
//!
//! A send is split in two halves so the caller controls where the network
//! call runs: [`ConversationStore::begin_send`] appends the user message and
//! hands back the request, [`ConversationStore::complete_send`] appends the
//! reply. Only one send may be outstanding at a time.

use crate::directory::{DocumentDescriptor, DocumentDirectory};
use crate::error::{TransportError, ValidationError};
use crate::state::ChatMessage;
use crate::transport::{AskRequest, AskResponse, Backend};

pub const DEFAULT_GREETING: &str = "Hello! I'm your domain-specific assistant. Ask me anything about the uploaded documents, or upload a new PDF to get started.";

pub const FALLBACK_REPLY: &str =
    "Sorry, I encountered an error processing your request. Please try again later.";

pub const CANCELLED_REPLY: &str = "Request cancelled before an answer arrived.";

/// Initial state and behaviour switches for a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationOptions {
    pub greeting: String,
    /// Append a system message whenever the active document changes.
    pub announce_selection: bool,
}

impl Default for ConversationOptions {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            announce_selection: true,
        }
    }
}

/// Identity of the selected document. Not owned: it is dropped when the
/// directory stops listing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug)]
pub struct ConversationStore {
    options: ConversationOptions,
    messages: Vec<ChatMessage>,
    active_document: Option<DocumentRef>,
    in_flight: bool,
    clear_requested: bool,
}

impl ConversationStore {
    pub fn new(options: ConversationOptions) -> Self {
        let messages = vec![ChatMessage::assistant(options.greeting.clone(), Vec::new())];
        Self {
            options,
            messages,
            active_document: None,
            in_flight: false,
            clear_requested: false,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn active_document(&self) -> Option<&DocumentRef> {
        self.active_document.as_ref()
    }

    pub fn is_waiting(&self) -> bool {
        self.in_flight
    }

    pub fn clear_requested(&self) -> bool {
        self.clear_requested
    }

    /// Validate `text`, append it as a user message and mark a send as in
    /// flight. Rejected input leaves the store untouched.
    pub fn begin_send(&mut self, text: &str) -> Result<AskRequest, ValidationError> {
        let question = text.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        if self.in_flight {
            return Err(ValidationError::RequestInFlight);
        }

        self.messages.push(ChatMessage::user(question));
        self.in_flight = true;

        Ok(AskRequest {
            question: question.to_string(),
            document_id: self.active_document.as_ref().map(|doc| doc.id.clone()),
        })
    }

    /// Append the reply for the outstanding send. Returns `None` when no send
    /// is outstanding, e.g. a late answer after a cancel or clear.
    pub fn complete_send(&mut self, outcome: Result<AskResponse, TransportError>) -> Option<&ChatMessage> {
        if !self.in_flight {
            tracing::debug!("dropping answer for a send that is no longer outstanding");
            return None;
        }
        Some(self.finish_send(outcome))
    }

    /// Run a full send against `backend`.
    pub async fn send_message(&mut self, backend: &dyn Backend, text: &str) -> Result<&ChatMessage, ValidationError> {
        let request = self.begin_send(text)?;
        let outcome = backend.ask(&request).await;
        Ok(self.finish_send(outcome))
    }

    /// Give up on the outstanding send. The user message still gets exactly
    /// one assistant reply, flagged as an error.
    pub fn cancel_send(&mut self) -> bool {
        if !self.in_flight {
            return false;
        }
        tracing::info!("ask cancelled");
        self.in_flight = false;
        self.messages.push(ChatMessage::failure(CANCELLED_REPLY));
        true
    }

    pub fn request_clear(&mut self) {
        self.clear_requested = true;
    }

    pub fn cancel_clear(&mut self) {
        self.clear_requested = false;
    }

    /// Reset the log to the greeting. Only acts after [`Self::request_clear`].
    /// Any outstanding send is abandoned.
    pub fn confirm_clear(&mut self) -> bool {
        if !self.clear_requested {
            return false;
        }
        self.clear_requested = false;
        self.in_flight = false;
        self.messages = vec![ChatMessage::assistant(self.options.greeting.clone(), Vec::new())];
        tracing::info!("conversation cleared");
        true
    }

    /// Change the active document. Returns true when the selection changed.
    pub fn select_document(&mut self, doc: Option<&DocumentDescriptor>) -> bool {
        let next = doc.map(|d| DocumentRef {
            id: d.id.clone(),
            name: d.name.clone(),
        });
        if next == self.active_document {
            return false;
        }

        if self.options.announce_selection {
            let note = match &next {
                Some(doc) => format!("Now answering questions about \"{}\".", doc.name),
                None => "Document filter cleared. Answering from all documents.".to_string(),
            };
            self.messages.push(ChatMessage::system(note));
        }
        self.active_document = next;
        true
    }

    /// Drop the selection if the directory no longer lists it.
    pub fn retain_selection(&mut self, directory: &DocumentDirectory) -> bool {
        match &self.active_document {
            Some(doc) if !directory.contains(&doc.id) => {
                tracing::debug!(document = %doc.id, "active document no longer listed");
                self.active_document = None;
                true
            }
            _ => false,
        }
    }

    /// Append an informational system message.
    pub fn note(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::system(text));
    }

    fn finish_send(&mut self, outcome: Result<AskResponse, TransportError>) -> &ChatMessage {
        self.in_flight = false;
        let reply = match outcome {
            Ok(answer) => ChatMessage::assistant(answer.response, answer.sources),
            Err(err) => {
                tracing::warn!(error = %err, "ask failed");
                ChatMessage::failure(FALLBACK_REPLY)
            }
        };
        self.messages.push(reply);
        &self.messages[self.messages.len() - 1]
    }
}
