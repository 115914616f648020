//! WebView message types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, Theme};
use crate::geometry::Rect;

/// Common behaviour of both message directions.
pub trait Message: Serialize + DeserializeOwned {
    /// True for the catch-all variant produced by an unrecognized `type`.
    fn is_unknown(&self) -> bool;
}

/// Messages from the rendering surface to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum IncomingMessage {
    Ready,
    Search {
        query: String,
    },
    Select {
        key: String,
    },
    Create {
        key: String,
    },
    /// Plain content write for surfaces without a content handle.
    Save {
        key: String,
        content: String,
    },
    Rename {
        old_key: String,
        new_key: String,
        force: bool,
    },
    Trash {
        key: String,
    },
    Restore {
        key: String,
    },
    /// Update timestamp after a content write through the content handle.
    Touch {
        key: String,
    },
    /// Raw paths (drop, paste) for the host to resolve before conflict checking.
    AddFiles {
        key: String,
        files: Vec<String>,
    },
    /// Add attachments with target filenames.
    AddAttachments {
        key: String,
        /// Each file: [source_path, target_filename]
        files: Vec<(String, String)>,
    },
    RemoveAttachment {
        key: String,
        filename: String,
    },
    /// Copy attachments to the clipboard as files.
    CopyFiles {
        key: String,
        filenames: Vec<String>,
    },
    OpenFilePicker {
        key: String,
    },
    Hide,
    ShutdownAck,
    ShutdownBlocked,
    SaveSettings {
        config: AppConfig,
        launch_at_login: bool,
    },
    SuspendGlobalHotkey,
    ResumeGlobalHotkey,
    WelcomeResult {
        launch_at_login: bool,
    },
    StartWindowDrag,
    /// Drag regions in surface coordinates (CSS pixels).
    DragRegions {
        regions: Vec<Rect>,
    },
    #[serde(other)]
    Unknown,
}

impl Message for IncomingMessage {
    fn is_unknown(&self) -> bool {
        matches!(self, IncomingMessage::Unknown)
    }
}

/// Messages from the host to the rendering surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum OutgoingMessage {
    CoreReady,
    Theme {
        theme: Theme,
    },
    SearchResults {
        active_keys: Vec<String>,
        trashed_keys: Vec<String>,
        exact_match: ExactMatch,
    },
    /// Sent together with a [`ContentHandle`](super::ContentHandle) for the key's content.
    Value {
        key: String,
        attachments: Vec<AttachmentInfo>,
        key_hash: String,
        read_only: bool,
    },
    KeyCreated {
        success: bool,
        key: String,
    },
    RenameResult {
        old_key: String,
        new_key: String,
        result: RenameResultType,
    },
    Shutdown,
    Focus,
    FocusSearch,
    FilesSelected {
        key: String,
        files: Vec<String>,
    },
    FilesPasted {
        files: Vec<String>,
    },
    DoCopy {
        action: CopyAction,
    },
    CopyResult {
        success: bool,
    },
    OpenSettings {
        config: AppConfig,
        launch_at_login: bool,
    },
    Toast {
        message: String,
    },
    SaveFailed {
        message: String,
    },
    CoreInitFailed {
        message: String,
        data_dir: String,
    },
    ShowWelcome,
    #[serde(other)]
    Unknown,
}

impl Message for OutgoingMessage {
    fn is_unknown(&self) -> bool {
        matches!(self, OutgoingMessage::Unknown)
    }
}

/// Whether the current query names an existing key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExactMatch {
    #[default]
    None,
    Active,
    Trashed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenameResultType {
    Success,
    DestinationExists,
    InvalidKey,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CopyAction {
    Markdown,
    Files,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInfo {
    pub filename: String,
    pub size: u64,
    pub thumbnail_url: Option<String>,
}
