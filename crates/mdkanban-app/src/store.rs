//! Owner of the current board state with change notification.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use crate::board::{Action, BoardError, BoardState, TaskWrite, Transition, reduce};
use crate::settings::BoardSettings;

/// Holds the board and publishes every new state to subscribers.
///
/// Dispatch takes `&mut self`, so one writer at a time is enforced by the
/// borrow checker; readers keep [`watch::Receiver`]s.
#[derive(Debug)]
pub struct BoardStore {
    state: Arc<BoardState>,
    sender: watch::Sender<Arc<BoardState>>,
}

impl BoardStore {
    /// Store with an empty board.
    #[must_use]
    pub fn new(settings: BoardSettings) -> Self {
        let state = Arc::new(BoardState::new(settings));
        let (sender, _) = watch::channel(Arc::clone(&state));
        Self { state, sender }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &BoardState {
        &self.state
    }

    /// Receiver that sees every state published from now on.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<BoardState>> {
        self.sender.subscribe()
    }

    /// Apply `action` and publish the result.
    ///
    /// # Errors
    /// The action's [`BoardError`]; the state is not changed and nothing is published.
    pub fn dispatch(&mut self, action: Action) -> Result<Vec<TaskWrite>, BoardError> {
        let Transition { state, writes } = reduce(&self.state, action).inspect_err(|err| {
            warn!(%err, "board action rejected");
        })?;
        self.state = Arc::new(state);
        self.sender.send_replace(Arc::clone(&self.state));
        Ok(writes)
    }
}
