use rst_common::with_errors::thiserror::{self, Error};

use crate::coprotocol::{CancelToken, CoProtocol, TransportError};
use crate::messaging::types::MessageError;
use crate::messaging::ProblemReport;
use crate::wallet::WalletError;

use super::conversation::Conversation;

/// `StateMachineError` provides all error types a protocol role may return
///
/// Protocol level failures are not errors, they are reported through
/// [`Outcome::Failure`]
#[derive(Debug, PartialEq, Error, Clone)]
pub enum StateMachineError {
    #[error("aborted by user")]
    Aborted,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<TransportError> for StateMachineError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Aborted => StateMachineError::Aborted,
            other => StateMachineError::Transport(other.to_string()),
        }
    }
}

impl From<WalletError> for StateMachineError {
    fn from(err: WalletError) -> Self {
        StateMachineError::Wallet(err.to_string())
    }
}

impl From<MessageError> for StateMachineError {
    fn from(err: MessageError) -> Self {
        StateMachineError::InvalidInput(err.to_string())
    }
}

/// `Role` marks which side initiated the protocol
///
/// It only selects the problem code attributed to a failure and whether the problem
/// report is sent to the counterpart, it never changes the control flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Failure(ProblemReport),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    pub fn problem_report(&self) -> Option<&ProblemReport> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(report) => Some(report),
        }
    }
}

/// `Classified` is how a role sorts a decoded reply
#[derive(Debug, Clone, PartialEq)]
pub enum Classified<M> {
    Expected(M),
    Problem(ProblemReport),
    Unexpected,
}

/// `Step` is the result of one conversation turn
#[derive(Debug, Clone, PartialEq)]
pub enum Step<M> {
    Reply(M),
    Failed(ProblemReport),
}

/// `StateMachine` is the surface shared by every protocol role
pub trait StateMachine {
    type Transport: CoProtocol;

    fn conversation(&self) -> &Conversation<Self::Transport>;

    fn role(&self) -> Role {
        self.conversation().role()
    }

    fn is_leader(&self) -> bool {
        self.role() == Role::Leader
    }

    /// The problem report of the last failed run
    fn problem_report(&self) -> Option<&ProblemReport> {
        self.conversation().problem_report()
    }

    fn abort(&self) {
        self.conversation().abort()
    }

    /// A handle able to abort the run from another task
    fn abort_handle(&self) -> CancelToken {
        self.conversation().abort_handle()
    }
}
