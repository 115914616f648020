//! Host side of the bridge: routing surface messages, the storage worker and
//! persisted settings.

mod settings;
pub mod store;
pub mod worker;

pub use settings::{load_config, mark_welcome_shown, save_settings};
pub use store::{FsStore, Key, Store};
pub use worker::{Outbound, Request, WorkerEvent, WorkerHandle};

use std::path::PathBuf;

use crate::bridge::IncomingMessage;
use crate::config::AppConfig;
use crate::geometry::Rect;

/// What the host does with one surface message.
#[derive(Debug, Clone, PartialEq)]
pub enum HostAction {
    /// Post the theme from the UI thread, then let the worker answer.
    Ready,
    Worker(Request),
    Window(WindowCommand),
}

/// Work that must happen on the UI thread.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowCommand {
    Hide,
    /// The surface refused to close; show the window again.
    ShutdownBlocked,
    OpenFilePicker { key: String },
    SaveSettings { config: AppConfig, launch_at_login: bool },
    SuspendHotkey,
    ResumeHotkey,
    WelcomeResult { launch_at_login: bool },
    StartDrag,
    DragRegions(Vec<Rect>),
}

/// The host-side dispatch table. Returns `None` for unknown messages.
pub fn route(message: IncomingMessage) -> Option<HostAction> {
    use HostAction::{Window, Worker};

    let action = match message {
        IncomingMessage::Ready => HostAction::Ready,
        IncomingMessage::Search { query } => Worker(Request::Search { query }),
        IncomingMessage::Select { key } => Worker(Request::GetValue { key }),
        IncomingMessage::Create { key } => Worker(Request::Create { key }),
        IncomingMessage::Save { key, content } => Worker(Request::Save { key, content }),
        IncomingMessage::Rename {
            old_key,
            new_key,
            force,
        } => Worker(Request::Rename {
            old_key,
            new_key,
            force,
        }),
        IncomingMessage::Trash { key } => Worker(Request::Trash { key }),
        IncomingMessage::Restore { key } => Worker(Request::Restore { key }),
        IncomingMessage::Touch { key } => Worker(Request::Touch { key }),
        IncomingMessage::AddFiles { key, files } => Worker(Request::FilesSelected {
            key,
            files: files.into_iter().map(PathBuf::from).collect(),
        }),
        IncomingMessage::AddAttachments { key, files } => Worker(Request::AddAttachments { key, files }),
        IncomingMessage::RemoveAttachment { key, filename } => {
            Worker(Request::RemoveAttachment { key, filename })
        }
        IncomingMessage::CopyFiles { key, filenames } => Worker(Request::CopyFiles { key, filenames }),
        IncomingMessage::OpenFilePicker { key } => Window(WindowCommand::OpenFilePicker { key }),
        IncomingMessage::Hide => Window(WindowCommand::Hide),
        IncomingMessage::ShutdownAck => Worker(Request::Shutdown),
        IncomingMessage::ShutdownBlocked => Window(WindowCommand::ShutdownBlocked),
        IncomingMessage::SaveSettings {
            config,
            launch_at_login,
        } => Window(WindowCommand::SaveSettings {
            config,
            launch_at_login,
        }),
        IncomingMessage::SuspendGlobalHotkey => Window(WindowCommand::SuspendHotkey),
        IncomingMessage::ResumeGlobalHotkey => Window(WindowCommand::ResumeHotkey),
        IncomingMessage::WelcomeResult { launch_at_login } => {
            Window(WindowCommand::WelcomeResult { launch_at_login })
        }
        IncomingMessage::StartWindowDrag => Window(WindowCommand::StartDrag),
        IncomingMessage::DragRegions { regions } => Window(WindowCommand::DragRegions(regions)),
        IncomingMessage::Unknown => return None,
    };
    Some(action)
}
