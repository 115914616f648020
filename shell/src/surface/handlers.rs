//! Handlers for host-to-surface messages.

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use tracing::{debug, info, warn};

use super::Surface;
use super::attachments::{finalize, plan_batch};
use crate::bridge::messages::{AttachmentInfo, CopyAction, ExactMatch, RenameResultType};
use crate::bridge::{ContentHandle, Handler, IncomingMessage, OutgoingMessage};
use crate::config::AppConfig;
use crate::error::Result;
use crate::shutdown::ShutdownVerdict;
use crate::state::{ActivePane, Dialog, Overlay, PendingAction, PendingKind, SettingsDraft};

impl Handler<OutgoingMessage> for Surface {
    fn begin(&self, seq: u64) {
        self.dispatching.set(Some(seq));
    }

    fn handle(
        &self,
        message: OutgoingMessage,
        handle: Option<ContentHandle>,
    ) -> LocalBoxFuture<'_, Result<()>> {
        async move {
            match message {
                OutgoingMessage::CoreReady => self.on_core_ready(),
                OutgoingMessage::Theme { theme } => {
                    self.mirror.update(|state| state.theme = theme);
                    Ok(())
                }
                OutgoingMessage::SearchResults {
                    active_keys,
                    trashed_keys,
                    exact_match,
                } => {
                    self.on_search_results(active_keys, trashed_keys, exact_match);
                    Ok(())
                }
                OutgoingMessage::Value {
                    key,
                    attachments,
                    key_hash,
                    read_only,
                } => {
                    self.on_value(key, attachments, key_hash, read_only, handle)
                        .await
                }
                OutgoingMessage::KeyCreated { success, key } => self.on_key_created(success, key),
                OutgoingMessage::RenameResult {
                    old_key,
                    new_key,
                    result,
                } => self.on_rename_result(old_key, new_key, result),
                OutgoingMessage::Shutdown => {
                    let seq = self.dispatching.take();
                    self.on_shutdown(seq).await
                }
                OutgoingMessage::Focus => {
                    self.on_focus();
                    Ok(())
                }
                OutgoingMessage::FocusSearch => {
                    self.mirror.update(|state| state.active_pane = ActivePane::Search);
                    Ok(())
                }
                OutgoingMessage::FilesSelected { key, files } => self.on_files(key, files),
                OutgoingMessage::FilesPasted { files } => {
                    match self.mirror.read(|state| state.selected_key.clone()) {
                        Some(key) => self.on_files(key, files),
                        None => {
                            self.mirror
                                .update(|state| state.show_toast("Select a key before pasting files"));
                            Ok(())
                        }
                    }
                }
                OutgoingMessage::DoCopy { action } => self.copy(action).await,
                OutgoingMessage::CopyResult { success } => self.on_copy_result(success),
                OutgoingMessage::OpenSettings {
                    config,
                    launch_at_login,
                } => self.on_open_settings(config, launch_at_login),
                OutgoingMessage::Toast { message } => {
                    self.mirror.update(|state| state.show_toast(message));
                    Ok(())
                }
                OutgoingMessage::SaveFailed { message } => {
                    self.mirror.update(|state| state.show_banner(message, true));
                    Ok(())
                }
                OutgoingMessage::CoreInitFailed { message, data_dir } => {
                    warn!(%message, %data_dir, "host could not open storage");
                    self.mirror.update(|state| {
                        state.presentation.dialog = Some(Dialog::CoreInitFailed { message, data_dir });
                        state.overlays.claim(Overlay::QuitDialog);
                    });
                    Ok(())
                }
                OutgoingMessage::ShowWelcome => {
                    self.mirror.update(|state| state.welcome_visible = true);
                    Ok(())
                }
                // Filtered out by the dispatch loop.
                OutgoingMessage::Unknown => Ok(()),
            }
        }
        .boxed_local()
    }
}

impl Surface {
    fn on_core_ready(&self) -> Result<()> {
        let query = self.mirror.update(|state| {
            state.core_ready = true;
            state.search.query.clone()
        });
        info!("core ready");
        self.send(IncomingMessage::Search { query })
    }

    fn on_search_results(&self, active_keys: Vec<String>, trashed_keys: Vec<String>, exact_match: ExactMatch) {
        self.mirror.update(|state| {
            let search = &mut state.search;
            search.results_query = search.query.clone();
            search.active_keys = active_keys;
            search.trashed_keys = trashed_keys;
            search.exact_match = exact_match;
        });
    }

    async fn on_value(
        &self,
        key: String,
        attachments: Vec<AttachmentInfo>,
        key_hash: String,
        read_only: bool,
        handle: Option<ContentHandle>,
    ) -> Result<()> {
        // Any value for the key answers its attachment add, selected or not.
        self.mirror.update(|state| {
            if state.attachment_add_in_flight.as_ref() == Some(&key) {
                state.attachment_add_in_flight = None;
            }
        });
        if !self.is_selected(&key) {
            debug!(%key, "ignoring value for a key that is no longer selected");
            return Ok(());
        }

        let reload = self.mirror.read(|state| !(state.loaded_key.as_ref() == Some(&key) && state.is_dirty));
        let content = match (&handle, reload) {
            (Some(handle), true) => match self.content.read(handle).await {
                Ok(content) => Some(content),
                Err(e) => {
                    warn!(%key, error = %e, "content read failed");
                    self.mirror
                        .update(|state| state.show_banner(format!("Couldn't open \"{key}\": {e}"), false));
                    None
                }
            },
            _ => None,
        };

        // The selection may have moved while the content was read.
        if !self.is_selected(&key) {
            debug!(%key, "selection changed during content read");
            return Ok(());
        }

        let read_only = read_only || handle.as_ref().is_none_or(|h| h.read_only);
        if handle.is_none() {
            warn!(%key, "value arrived without a content handle, opening read-only");
        }
        *self.handle.borrow_mut() = handle;

        let ready = self.mirror.update(|state| {
            state.loaded_key = Some(key.clone());
            state.attachments = attachments;
            state.key_hash = Some(key_hash);
            state.read_only = read_only;
            if let Some(content) = content {
                state.preview_cache = Some(content);
            }
            state.take_ready(&key)
        });

        for action in ready {
            self.run_pending(action).await?;
        }
        Ok(())
    }

    async fn run_pending(&self, action: PendingAction) -> Result<()> {
        debug!(key = %action.key, kind = ?action.kind, "running pending action");
        match action.kind {
            PendingKind::Copy(copy) => self.copy(copy).await,
            PendingKind::Focus(pane) => {
                self.mirror.update(|state| state.active_pane = pane);
                Ok(())
            }
        }
    }

    fn on_key_created(&self, success: bool, key: String) -> Result<()> {
        if !success {
            self.mirror
                .update(|state| state.show_toast(format!("Couldn't create \"{key}\"")));
            return Ok(());
        }
        self.mirror.update(|state| {
            state.select(Some(key.clone()));
            state.active_pane = ActivePane::Editor;
        });
        *self.handle.borrow_mut() = None;
        self.send(IncomingMessage::Select { key })
    }

    fn on_rename_result(&self, old_key: String, new_key: String, result: RenameResultType) -> Result<()> {
        match result {
            RenameResultType::Success => {
                if !self.is_selected(&old_key) {
                    return Ok(());
                }
                self.mirror.update(|state| state.select(Some(new_key.clone())));
                *self.handle.borrow_mut() = None;
                self.send(IncomingMessage::Select { key: new_key })
            }
            RenameResultType::DestinationExists => {
                self.mirror
                    .update(|state| state.show_toast(format!("\"{new_key}\" already exists")));
                Ok(())
            }
            RenameResultType::InvalidKey => {
                self.mirror
                    .update(|state| state.show_toast(format!("\"{new_key}\" is not a valid key")));
                Ok(())
            }
            RenameResultType::NotFound => {
                self.mirror
                    .update(|state| state.show_toast(format!("\"{old_key}\" no longer exists")));
                Ok(())
            }
        }
    }

    async fn on_shutdown(&self, seq: Option<u64>) -> Result<()> {
        let verdict = match seq {
            Some(seq) => self.shutdown.request_at(seq).await,
            None => self.shutdown.request().await,
        };
        self.send(match verdict {
            ShutdownVerdict::Ack => IncomingMessage::ShutdownAck,
            ShutdownVerdict::Blocked => IncomingMessage::ShutdownBlocked,
        })
    }

    fn on_focus(&self) {
        self.mirror.update(|state| {
            let Some(key) = state.selected_key.clone() else {
                state.active_pane = ActivePane::Search;
                return;
            };
            if state.active_pane == ActivePane::Editor && state.loaded_key.as_ref() != Some(&key) {
                state.enqueue(PendingAction {
                    key,
                    kind: PendingKind::Focus(ActivePane::Editor),
                });
            }
        });
    }

    fn on_files(&self, key: String, files: Vec<String>) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        let batch = self.mirror.read(|state| {
            let loaded = state.loaded_key.as_ref() == Some(&key) && state.selected_key.as_ref() == Some(&key);
            (loaded && !state.read_only).then(|| plan_batch(&key, &files, &state.attachments))
        });
        let Some(batch) = batch else {
            self.mirror
                .update(|state| state.show_toast("Files can only be added to the open, editable key"));
            return Ok(());
        };

        if batch.unresolved() > 0 {
            debug!(%key, conflicts = batch.unresolved(), "attachment names conflict");
            self.mirror.update(|state| {
                state.conflicts = Some(batch);
                state.overlays.claim(Overlay::ConflictDialog);
            });
            return Ok(());
        }

        let existing = self.mirror.read(|state| state.attachments.clone());
        match finalize(&batch, &existing) {
            Some(files) => self.send_attachments(key, files),
            None => Ok(()),
        }
    }

    pub(super) fn send_attachments(&self, key: String, files: Vec<(String, String)>) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        self.mirror
            .update(|state| state.attachment_add_in_flight = Some(key.clone()));
        self.send(IncomingMessage::AddAttachments { key, files })
    }

    fn on_copy_result(&self, success: bool) -> Result<()> {
        self.mirror.update(|state| {
            state.copy_in_flight = false;
            state.show_toast(if success { "Copied files" } else { "Copy failed" });
        });
        Ok(())
    }

    fn on_open_settings(&self, config: AppConfig, launch_at_login: bool) -> Result<()> {
        self.mirror.update(|state| {
            state.settings = Some(SettingsDraft {
                config,
                launch_at_login,
            });
            state.overlays.claim(Overlay::SettingsPanel);
        });
        self.send(IncomingMessage::SuspendGlobalHotkey)
    }

    /// Copies the selected key, or queues the copy until its content loads.
    pub async fn copy(&self, action: CopyAction) -> Result<()> {
        enum Plan {
            Nothing,
            Queue(String),
            Markdown(String),
            Files(String, Vec<String>),
        }

        let plan = self.mirror.read(|state| {
            let Some(key) = state.selected_key.clone() else {
                return Plan::Nothing;
            };
            if state.loaded_key.as_ref() != Some(&key) {
                return Plan::Queue(key);
            }
            match action {
                CopyAction::Markdown => Plan::Markdown(state.preview_cache.clone().unwrap_or_default()),
                CopyAction::Files => Plan::Files(
                    key,
                    state.attachments.iter().map(|a| a.filename.clone()).collect(),
                ),
            }
        });

        match plan {
            Plan::Nothing => {
                self.mirror.update(|state| state.show_toast("Nothing selected to copy"));
                Ok(())
            }
            Plan::Queue(key) => {
                debug!(%key, ?action, "content not loaded, queueing copy");
                self.mirror.update(|state| {
                    state.enqueue(PendingAction {
                        key,
                        kind: PendingKind::Copy(action),
                    })
                });
                Ok(())
            }
            Plan::Markdown(text) => {
                self.mirror.update(|state| state.copy_in_flight = true);
                let copied = self.clipboard.write_text(&text).await;
                self.mirror.update(|state| {
                    state.copy_in_flight = false;
                    match &copied {
                        Ok(()) => state.show_toast("Copied"),
                        Err(e) => state.show_toast(format!("Copy failed: {e}")),
                    }
                });
                copied
            }
            Plan::Files(_, filenames) if filenames.is_empty() => {
                self.mirror.update(|state| state.show_toast("No attachments to copy"));
                Ok(())
            }
            Plan::Files(key, filenames) => {
                self.mirror.update(|state| state.copy_in_flight = true);
                self.send(IncomingMessage::CopyFiles { key, filenames })
            }
        }
    }
}
