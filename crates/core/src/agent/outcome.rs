use std::error::Error as StdError;
use std::fmt::{self, Display};

use turnloop_model::ErrorKind as ProviderErrorKind;

use crate::conversation::Conversation;

/// The result of a successful run.
#[derive(Clone, Debug)]
pub struct RunOutput {
    pub(crate) answer: String,
    pub(crate) conversation: Conversation,
}

impl RunOutput {
    /// Returns the final answer of the model.
    #[inline]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Returns the full conversation of the run.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Consumes the output and returns the answer.
    #[inline]
    pub fn into_answer(self) -> String {
        self.answer
    }
}

/// The reason a run failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunErrorKind {
    /// The model provider failed, and retrying didn't help.
    Provider(ProviderErrorKind),
    /// The run didn't finish before its deadline.
    Timeout,
    /// The model kept requesting tools beyond the allowed number of calls.
    TurnLimitExceeded,
    /// The model answered with neither text nor tool calls.
    EmptyResponse,
}

impl Display for RunErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunErrorKind::Provider(kind) => {
                write!(f, "Provider error ({kind})")
            }
            RunErrorKind::Timeout => write!(f, "Timeout"),
            RunErrorKind::TurnLimitExceeded => write!(f, "Turn limit exceeded"),
            RunErrorKind::EmptyResponse => write!(f, "Empty response"),
        }
    }
}

/// Describes a failed run.
///
/// The conversation as it was when the run stopped is kept for diagnostics.
#[derive(Clone, Debug)]
pub struct RunError {
    kind: RunErrorKind,
    message: String,
    conversation: Conversation,
}

impl RunError {
    pub(crate) fn new(
        kind: RunErrorKind,
        message: String,
        conversation: Conversation,
    ) -> Self {
        Self {
            kind,
            message,
            conversation,
        }
    }

    /// Returns the kind of the failure.
    #[inline]
    pub fn kind(&self) -> RunErrorKind {
        self.kind
    }

    /// Returns a human readable description of the failure.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the conversation up to the failure.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Consumes the error and returns the conversation.
    #[inline]
    pub fn into_conversation(self) -> Conversation {
        self.conversation
    }
}

impl Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for RunError {}
