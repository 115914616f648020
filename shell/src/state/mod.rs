//! Surface-side application state.

mod app_state;
mod mirror;
mod overlay;
mod search;

pub use app_state::{
    ActivePane, AppState, Banner, ConflictBatch, ConflictItem, Dialog, PendingAction, PendingKind,
    Presentation, Resolution, SettingsDraft,
};
pub use mirror::StateMirror;
pub use overlay::{Overlay, OverlayStack};
pub use search::{KeyStatus, SearchState};
