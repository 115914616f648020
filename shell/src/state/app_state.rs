use std::collections::VecDeque;
use std::mem;

use crate::bridge::messages::{AttachmentInfo, CopyAction};
use crate::config::{AppConfig, Theme};

use super::overlay::{Overlay, OverlayStack};
use super::search::SearchState;

/// Which pane owns keyboard focus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActivePane {
    #[default]
    Search,
    KeyList,
    Editor,
    Attachments,
}

/// An action requested before its prerequisite (loaded content) was available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub key: String,
    pub kind: PendingKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingKind {
    Copy(CopyAction),
    Focus(ActivePane),
}

impl PendingKind {
    fn same_kind(&self, other: &PendingKind) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }
}

/// Persistent inline banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub message: String,
    /// Set when the banner offers a retry of the failed save.
    pub retry: bool,
}

/// Blocking dialog. Its only action is the acknowledged quit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    CoreInitFailed { message: String, data_dir: String },
}

/// Where user-visible failures and notices are shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presentation {
    pub banner: Option<Banner>,
    pub toast: Option<String>,
    pub dialog: Option<Dialog>,
}

/// Per-item answer in the attachment conflict dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Overwrite,
    /// Keep both; the new file gets a free numbered name.
    KeepBoth,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictItem {
    pub source: String,
    pub filename: String,
    /// `None` for items without a conflict.
    pub resolution: Option<Resolution>,
    pub conflicting: bool,
}

/// Files waiting for the user to resolve name conflicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictBatch {
    pub key: String,
    pub items: Vec<ConflictItem>,
}

impl ConflictBatch {
    pub fn unresolved(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.conflicting && item.resolution.is_none())
            .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDraft {
    pub config: AppConfig,
    pub launch_at_login: bool,
}

/// The one writable copy of UI state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub core_ready: bool,
    pub theme: Theme,
    pub search: SearchState,
    pub selected_key: Option<String>,
    pub active_pane: ActivePane,

    /// Key the per-key fields below belong to; `None` until its value arrives.
    pub loaded_key: Option<String>,
    pub attachments: Vec<AttachmentInfo>,
    pub preview_cache: Option<String>,
    pub key_hash: Option<String>,
    pub read_only: bool,

    pub is_dirty: bool,
    pub copy_in_flight: bool,
    /// Key whose attachment add was sent and not yet confirmed by a fresh `value`.
    pub attachment_add_in_flight: Option<String>,
    pub is_shutting_down: bool,
    pub pending_actions: VecDeque<PendingAction>,

    pub presentation: Presentation,
    pub overlays: OverlayStack,
    pub conflicts: Option<ConflictBatch>,
    pub settings: Option<SettingsDraft>,
    pub welcome_visible: bool,
}

impl AppState {
    /// True while a clipboard copy or an attachment add is in flight.
    pub fn is_copying(&self) -> bool {
        self.copy_in_flight || self.attachment_add_in_flight.is_some()
    }

    /// Changes the selection and clears every piece of per-key state with it.
    pub fn select(&mut self, key: Option<String>) {
        self.selected_key = key;
        self.loaded_key = None;
        self.attachments.clear();
        self.preview_cache = None;
        self.key_hash = None;
        self.read_only = false;
        self.is_dirty = false;
        let selected = self.selected_key.as_deref();
        self.pending_actions
            .retain(|action| Some(action.key.as_str()) == selected);
        if self
            .conflicts
            .as_ref()
            .is_some_and(|batch| Some(batch.key.as_str()) != selected)
        {
            self.conflicts = None;
            self.overlays.release(Overlay::ConflictDialog);
        }
    }

    /// Whether per-key state belongs to the selected key (or is empty).
    pub fn per_key_state_consistent(&self) -> bool {
        match &self.loaded_key {
            Some(loaded) => self.selected_key.as_ref() == Some(loaded),
            None => self.attachments.is_empty() && self.preview_cache.is_none() && self.key_hash.is_none(),
        }
    }

    /// Queues an action, replacing any earlier request of the same kind.
    pub fn enqueue(&mut self, action: PendingAction) {
        self.pending_actions
            .retain(|queued| !queued.kind.same_kind(&action.kind));
        self.pending_actions.push_back(action);
    }

    /// Removes and returns the actions whose prerequisite is now met for `key`.
    pub fn take_ready(&mut self, key: &str) -> Vec<PendingAction> {
        let (ready, waiting): (Vec<_>, Vec<_>) = mem::take(&mut self.pending_actions)
            .into_iter()
            .partition(|action| action.key == key);
        self.pending_actions = waiting.into();
        ready
    }

    pub fn show_toast(&mut self, message: impl Into<String>) {
        self.presentation.toast = Some(message.into());
    }

    pub fn show_banner(&mut self, message: impl Into<String>, retry: bool) {
        self.presentation.banner = Some(Banner {
            message: message.into(),
            retry,
        });
    }
}
