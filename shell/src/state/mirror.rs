use std::rc::Rc;

use tokio::sync::watch;

use super::app_state::AppState;

/// Single-writer holder of [`AppState`].
///
/// Clones share the same state. Every [`update`](Self::update) publishes one
/// complete snapshot, so observers never see a half-applied handler.
#[derive(Clone)]
pub struct StateMirror {
    tx: Rc<watch::Sender<AppState>>,
}

impl StateMirror {
    pub fn new() -> Self {
        Self::with_state(AppState::default())
    }

    pub fn with_state(state: AppState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx: Rc::new(tx) }
    }

    /// Applies `f` to a copy of the state and publishes the result.
    pub fn update<R>(&self, f: impl FnOnce(&mut AppState) -> R) -> R {
        let mut next = self.tx.borrow().clone();
        let result = f(&mut next);
        debug_assert!(
            next.per_key_state_consistent(),
            "per-key state must belong to the selected key"
        );
        self.tx.send_replace(next);
        result
    }

    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&self.tx.borrow())
    }

    pub fn snapshot(&self) -> AppState {
        self.tx.borrow().clone()
    }

    /// Receiver for presentation logic; sees each published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.tx.subscribe()
    }
}

impl Default for StateMirror {
    fn default() -> Self {
        Self::new()
    }
}
