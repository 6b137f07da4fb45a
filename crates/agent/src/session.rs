//! Console chat session — one transcript plus the agent that drives it.
//!
//! The transcript sits behind an async mutex and `ask` only ever uses
//! `try_lock`, so a second turn started while one is in flight gets
//! [`TurnError::Busy`] instead of interleaving with it.

use fleetpilot_core::agent::AgentStatus;
use fleetpilot_core::event::DomainEvent;
use fleetpilot_core::message::{DEFAULT_GREETING, Message, Transcript};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, watch};

use crate::assistant::Assistant;
use crate::loop_runner::AgentLoop;
use crate::turn::{TurnError, TurnReport};

/// Which turn strategy the session uses.
pub enum TurnDriver {
    Iterative(AgentLoop),
    Recursive(Assistant),
}

impl TurnDriver {
    fn agent(&self) -> &AgentLoop {
        match self {
            Self::Iterative(agent) => agent,
            Self::Recursive(assistant) => assistant.agent(),
        }
    }
}

pub struct ConsoleSession {
    driver: TurnDriver,
    transcript: Mutex<Transcript>,
}

impl ConsoleSession {
    pub fn new(driver: TurnDriver, greeting: impl Into<String>) -> Self {
        Self {
            driver,
            transcript: Mutex::new(Transcript::new(greeting)),
        }
    }

    pub fn iterative(agent: AgentLoop) -> Self {
        Self::new(TurnDriver::Iterative(agent), DEFAULT_GREETING)
    }

    pub fn recursive(assistant: Assistant) -> Self {
        Self::new(TurnDriver::Recursive(assistant), DEFAULT_GREETING)
    }

    /// Run one turn. Returns [`TurnError::Busy`] if a turn is already running.
    pub async fn ask(&self, input: &str) -> Result<TurnReport, TurnError> {
        let mut transcript = self.transcript.try_lock().map_err(|_| TurnError::Busy)?;
        match &self.driver {
            TurnDriver::Iterative(agent) => Ok(agent.run_turn(&mut transcript, input).await),
            TurnDriver::Recursive(assistant) => assistant.ask(&mut transcript, input).await,
        }
    }

    /// Reset the conversation to the greeting. Refused while a turn is running.
    pub fn clear(&self) -> Result<(), TurnError> {
        let mut transcript = self.transcript.try_lock().map_err(|_| TurnError::Busy)?;
        transcript.clear();
        Ok(())
    }

    /// Copy of the transcript, waiting for any running turn to finish.
    pub async fn messages(&self) -> Vec<Message> {
        self.transcript.lock().await.messages().to_vec()
    }

    pub fn is_busy(&self) -> bool {
        self.transcript.try_lock().is_err()
    }

    pub fn status(&self) -> watch::Receiver<AgentStatus> {
        self.driver.agent().status()
    }

    pub fn events(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.driver.agent().event_bus().subscribe()
    }

    pub fn agent(&self) -> &AgentLoop {
        self.driver.agent()
    }
}
