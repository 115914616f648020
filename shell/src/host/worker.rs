//! Background worker thread that owns the store.
//!
//! Requests arrive over a std channel; results leave as [`WorkerEvent`]s. After
//! each event the worker calls `wake` so the UI thread (which owns the WebView)
//! knows to drain the event channel.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use super::store::{Key, Store};
use crate::bridge::ContentHandle;
use crate::bridge::messages::{AttachmentInfo, OutgoingMessage, RenameResultType};
use crate::error::StoreError;

/// Maximum number of keys per result list.
pub const SEARCH_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// WebView is ready: answer with `coreReady` or `coreInitFailed`.
    WebviewReady,
    GetValue {
        key: String,
    },
    Save {
        key: String,
        content: String,
    },
    Create {
        key: String,
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
    Search {
        query: String,
    },
    /// Update timestamp after content save via the content handle.
    Touch {
        key: String,
    },
    /// Files dropped, pasted or picked: validate and hand back for conflict checks.
    FilesSelected {
        key: String,
        files: Vec<PathBuf>,
    },
    AddAttachments {
        key: String,
        /// (source_path, target_filename)
        files: Vec<(String, String)>,
    },
    RemoveAttachment {
        key: String,
        filename: String,
    },
    CopyFiles {
        key: String,
        filenames: Vec<String>,
    },
    Shutdown,
}

/// A message for the surface plus its out-of-band content handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub message: OutgoingMessage,
    pub handle: Option<ContentHandle>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Post(Outbound),
    /// Put these files on the clipboard and answer with `copyResult`.
    CopyToClipboard { paths: Vec<PathBuf> },
    ShutdownComplete,
}

pub type Wake = Arc<dyn Fn() + Send + Sync>;

pub struct WorkerHandle {
    requests: Sender<Request>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Queues a request. Returns false if the worker has exited.
    pub fn send(&self, request: Request) -> bool {
        self.requests.send(request).is_ok()
    }

    /// Waits for the worker thread to exit.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("worker thread panicked");
        }
    }
}

/// Starts the worker thread.
///
/// `open` runs on the worker thread; if it fails, every `WebviewReady` is
/// answered with `coreInitFailed` and store requests are dropped.
pub fn start<S, F>(open: F, data_dir: PathBuf, events: Sender<WorkerEvent>, wake: Wake) -> WorkerHandle
where
    S: Store + 'static,
    F: FnOnce() -> Result<S, StoreError> + Send + 'static,
{
    let (requests, request_rx) = mpsc::channel::<Request>();

    let thread = thread::Builder::new()
        .name("keva-worker".to_string())
        .spawn(move || {
            let store = match open() {
                Ok(store) => Ok(store),
                Err(e) => {
                    warn!(error = %e, dir = %data_dir.display(), "failed to open store");
                    Err(e.to_string())
                }
            };
            let mut worker = Worker {
                store,
                data_dir,
                query: String::new(),
                events,
                wake,
            };
            worker.run(request_rx);
        });

    let thread = match thread {
        Ok(thread) => Some(thread),
        Err(e) => {
            warn!(error = %e, "failed to spawn worker thread");
            None
        }
    };

    WorkerHandle { requests, thread }
}

struct Worker<S> {
    /// Open error message if the store could not be opened.
    store: Result<S, String>,
    data_dir: PathBuf,
    query: String,
    events: Sender<WorkerEvent>,
    wake: Wake,
}

impl<S: Store> Worker<S> {
    fn run(&mut self, requests: Receiver<Request>) {
        for request in requests {
            if matches!(request, Request::Shutdown) {
                info!("worker shutting down");
                self.emit(WorkerEvent::ShutdownComplete);
                break;
            }
            if matches!(request, Request::WebviewReady) {
                self.ready();
                continue;
            }
            if self.store.is_ok() {
                self.handle(request);
            } else {
                debug!(?request, "store unavailable, dropping request");
            }
        }
    }

    fn ready(&mut self) {
        let message = match &self.store {
            Ok(_) => OutgoingMessage::CoreReady,
            Err(e) => OutgoingMessage::CoreInitFailed {
                message: e.clone(),
                data_dir: self.data_dir.display().to_string(),
            },
        };
        self.post(message);
    }

    fn handle(&mut self, request: Request) {
        let now = SystemTime::now();
        match request {
            Request::GetValue { key } => self.send_value(&key, now),
            Request::Save { key, content } => self.save(&key, &content, now),
            Request::Create { key } => {
                let success = self.with_store(|store| {
                    let key = Key::parse(&key)?;
                    store.create(&key, now)
                });
                self.post(OutgoingMessage::KeyCreated { success, key });
                if success {
                    self.send_search_results();
                }
            }
            Request::Rename {
                old_key,
                new_key,
                force,
            } => {
                let result = self.rename(&old_key, &new_key, force, now);
                self.post(OutgoingMessage::RenameResult {
                    old_key,
                    new_key,
                    result,
                });
                if result == RenameResultType::Success {
                    self.send_search_results();
                }
            }
            Request::Trash { key } => {
                if self.with_store(|store| store.trash(&Key::parse(&key)?, now)) {
                    self.send_search_results();
                }
            }
            Request::Restore { key } => {
                if self.with_store(|store| store.restore(&Key::parse(&key)?, now)) {
                    self.send_search_results();
                }
            }
            Request::Search { query } => {
                self.query = query;
                self.send_search_results();
            }
            Request::Touch { key } => {
                self.with_store(|store| store.touch(&Key::parse(&key)?, now));
            }
            Request::FilesSelected { key, files } => self.files_selected(key, files),
            Request::AddAttachments { key, files } => {
                let files = files
                    .into_iter()
                    .map(|(path, name)| (PathBuf::from(path), name))
                    .collect();
                if !self.with_store(|store| store.add_attachments(&Key::parse(&key)?, files, now)) {
                    self.post(OutgoingMessage::Toast {
                        message: "Couldn't add attachments".to_string(),
                    });
                }
                // Always answer so the surface stops waiting on the add.
                self.send_value(&key, now);
            }
            Request::RemoveAttachment { key, filename } => {
                if self.with_store(|store| store.remove_attachment(&Key::parse(&key)?, &filename, now)) {
                    self.send_value(&key, now);
                }
            }
            Request::CopyFiles { key, filenames } => self.copy_files(&key, &filenames),
            Request::WebviewReady | Request::Shutdown => {}
        }
    }

    /// Runs a store operation, logging failures. Returns whether it succeeded.
    fn with_store(&mut self, op: impl FnOnce(&mut S) -> Result<(), StoreError>) -> bool {
        let Ok(store) = &mut self.store else {
            return false;
        };
        match op(store) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "store operation failed");
                false
            }
        }
    }

    fn send_value(&mut self, key_str: &str, now: SystemTime) {
        let Ok(store) = &mut self.store else {
            return;
        };
        let entry = Key::parse(key_str).ok().and_then(|key| store.get(&key));
        let Some(entry) = entry else {
            self.post(OutgoingMessage::Toast {
                message: format!("\"{key_str}\" no longer exists"),
            });
            return;
        };

        let read_only = entry.trashed;
        if !read_only && let Err(e) = store.touch(&entry.key, now) {
            debug!(key = key_str, error = %e, "touch failed");
        }

        let attachments = entry
            .attachments
            .iter()
            .map(|att| AttachmentInfo {
                filename: att.filename.clone(),
                size: att.size,
                thumbnail_url: store.thumbnail_url(&entry.key, &att.filename),
            })
            .collect();
        let handle = ContentHandle {
            path: store.content_path(&entry.key),
            read_only,
        };
        let message = OutgoingMessage::Value {
            key: key_str.to_string(),
            attachments,
            key_hash: entry.key.hash(),
            read_only,
        };
        self.emit(WorkerEvent::Post(Outbound {
            message,
            handle: Some(handle),
        }));
    }

    fn save(&mut self, key_str: &str, content: &str, now: SystemTime) {
        let saved = self.with_store(|store| {
            let key = Key::parse(key_str)?;
            if store.get(&key).is_none_or(|entry| entry.trashed) {
                return Err(StoreError::KeyNotFound(key_str.to_string()));
            }
            std::fs::write(store.content_path(&key), content)?;
            store.touch(&key, now)
        });
        if !saved {
            self.post(OutgoingMessage::SaveFailed {
                message: format!("Couldn't save \"{key_str}\""),
            });
        }
    }

    fn rename(&mut self, old_key: &str, new_key: &str, force: bool, now: SystemTime) -> RenameResultType {
        let Ok(store) = &mut self.store else {
            return RenameResultType::NotFound;
        };
        let Ok(old) = Key::parse(old_key) else {
            return RenameResultType::NotFound;
        };
        let Ok(new) = Key::parse(new_key) else {
            return RenameResultType::InvalidKey;
        };
        if store.get(&old).is_none() {
            return RenameResultType::NotFound;
        }

        if store.get(&new).is_some() {
            if !force {
                return RenameResultType::DestinationExists;
            }
            if let Err(e) = store.purge(&new) {
                warn!(key = new_key, error = %e, "failed to purge rename destination");
                return RenameResultType::DestinationExists;
            }
        }

        match store.rename(&old, &new, now) {
            Ok(()) => RenameResultType::Success,
            Err(e) => {
                warn!(old_key, new_key, error = %e, "rename failed");
                RenameResultType::NotFound
            }
        }
    }

    fn files_selected(&mut self, key: String, files: Vec<PathBuf>) {
        let total = files.len();
        let files: Vec<String> = files
            .into_iter()
            .filter(|path| path.is_file())
            .map(|path| path.to_string_lossy().into_owned())
            .collect();

        let skipped = total - files.len();
        if skipped > 0 {
            self.post(OutgoingMessage::Toast {
                message: format!("Skipped {skipped} item(s) that are not files"),
            });
        }
        if !files.is_empty() {
            self.post(OutgoingMessage::FilesSelected { key, files });
        }
    }

    fn copy_files(&mut self, key_str: &str, filenames: &[String]) {
        let paths: Vec<PathBuf> = match (&self.store, Key::parse(key_str)) {
            (Ok(store), Ok(key)) => filenames
                .iter()
                .filter_map(|name| match store.attachment_path(&key, name) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!(error = %e, "refusing to copy attachment");
                        None
                    }
                })
                .filter(|path| path.exists())
                .collect(),
            _ => Vec::new(),
        };

        if paths.is_empty() {
            self.post(OutgoingMessage::CopyResult { success: false });
        } else {
            self.emit(WorkerEvent::CopyToClipboard { paths });
        }
    }

    fn send_search_results(&mut self) {
        let Ok(store) = &self.store else {
            return;
        };
        let outcome = store.search(&self.query, SEARCH_LIMIT);
        self.post(OutgoingMessage::SearchResults {
            active_keys: outcome.active,
            trashed_keys: outcome.trashed,
            exact_match: outcome.exact_match,
        });
    }

    fn post(&self, message: OutgoingMessage) {
        self.emit(WorkerEvent::Post(Outbound {
            message,
            handle: None,
        }));
    }

    fn emit(&self, event: WorkerEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver gone");
            return;
        }
        (self.wake)();
    }
}
