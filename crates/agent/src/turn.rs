//! Turn-level result and policy types.

use fleetpilot_core::error::ProviderError;
use fleetpilot_core::message::MessageId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Appended as an assistant message when a turn fails.
pub const APOLOGY_MESSAGE: &str =
    "Sorry, something went wrong while processing your request. Please try again.";

/// Appended when the loop ceiling is hit under [`CeilingPolicy::Announce`].
pub const CEILING_MESSAGE: &str = "I couldn't complete this after several attempts.";

/// Errors that stop a turn.
///
/// Only [`TurnError::Busy`] ever reaches a session caller; provider failures
/// are folded into the transcript as the apology message.
#[derive(Debug, Clone, Error)]
pub enum TurnError {
    #[error("A turn is already in progress for this conversation")]
    Busy,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// What to do when a turn runs out of tool iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeilingPolicy {
    /// Stop with whatever the last reply holds
    #[default]
    Silent,
    /// Also append [`CEILING_MESSAGE`]
    Announce,
}

impl CeilingPolicy {
    pub fn from_flag(announce: bool) -> Self {
        if announce { Self::Announce } else { Self::Silent }
    }
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The model gave a final answer
    Answered,
    /// The tool-iteration ceiling was reached first
    CeilingReached,
    /// The provider failed; the apology message was appended
    Failed,
    /// Empty input, nothing happened
    Ignored,
}

impl TurnOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Answered => "answered",
            Self::CeilingReached => "ceiling_reached",
            Self::Failed => "failed",
            Self::Ignored => "ignored",
        }
    }
}

/// Summary of one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub outcome: TurnOutcome,

    /// Tool executions performed during the turn
    pub iterations: usize,

    /// The assistant message holding the last streamed reply
    pub reply_id: Option<MessageId>,

    /// Failure description for [`TurnOutcome::Failed`]
    pub error: Option<String>,
}

impl TurnReport {
    pub(crate) fn ignored() -> Self {
        Self {
            outcome: TurnOutcome::Ignored,
            iterations: 0,
            reply_id: None,
            error: None,
        }
    }
}
