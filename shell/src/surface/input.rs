//! Operations driven by user input.

use tracing::{debug, info, warn};

use super::Surface;
use super::attachments::finalize;
use crate::bridge::IncomingMessage;
use crate::config::AppConfig;
use crate::error::Result;
use crate::geometry::Rect;
use crate::state::{ActivePane, Dialog, KeyStatus, Overlay, Resolution};

/// Keys the surface routes itself; everything else goes to the focused pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Tab,
    Char(char),
}

/// Who received a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRoute {
    Overlay(Overlay),
    Pane(ActivePane),
}

impl Surface {
    /// Announces the surface to the host.
    pub fn ready(&self) -> Result<()> {
        self.send(IncomingMessage::Ready)
    }

    pub fn search(&self, query: &str) -> Result<()> {
        self.mirror.update(|state| state.search.query = query.to_string());
        self.send(IncomingMessage::Search {
            query: query.to_string(),
        })
    }

    /// Selects `key` after persisting edits of the current one.
    ///
    /// If the flush fails the current selection stays and the banner offers a
    /// retry, so unsaved content is never dropped.
    pub async fn select(&self, key: &str) -> Result<()> {
        if !self.flush_or_keep("select").await {
            return Ok(());
        }
        self.mirror.update(|state| state.select(Some(key.to_string())));
        *self.handle.borrow_mut() = None;
        self.send(IncomingMessage::Select {
            key: key.to_string(),
        })
    }

    /// Records an edit of the loaded key and schedules its save.
    pub fn edit(&self, content: &str) {
        let Some(target) = self.save_target() else {
            debug!("ignoring edit of a read-only or unloaded key");
            return;
        };
        self.mirror
            .update(|state| state.preview_cache = Some(content.to_string()));
        self.save.mutate(target, content.to_string());
    }

    /// Opens `key` if it exists in any state, otherwise asks the host to create it.
    pub async fn create(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(());
        }
        let status = self.mirror.read(|state| state.search.classify(key));
        match status {
            KeyStatus::Active | KeyStatus::Trashed => {
                debug!(key, ?status, "key exists, selecting");
                self.select(key).await
            }
            KeyStatus::Absent => {
                if !self.flush_or_keep("create").await {
                    return Ok(());
                }
                self.send(IncomingMessage::Create {
                    key: key.to_string(),
                })
            }
        }
    }

    pub async fn rename(&self, old_key: &str, new_key: &str, force: bool) -> Result<()> {
        if self.is_selected(old_key) && !self.flush_or_keep("rename").await {
            return Ok(());
        }
        self.send(IncomingMessage::Rename {
            old_key: old_key.to_string(),
            new_key: new_key.to_string(),
            force,
        })
    }

    /// Moves `key` to the trash and reloads it read-only if it is open.
    pub async fn trash(&self, key: &str) -> Result<()> {
        let selected = self.is_selected(key);
        if selected && !self.flush_or_keep("trash").await {
            return Ok(());
        }
        self.send(IncomingMessage::Trash {
            key: key.to_string(),
        })?;
        if selected {
            self.reload(key)?;
        }
        Ok(())
    }

    pub fn restore(&self, key: &str) -> Result<()> {
        self.send(IncomingMessage::Restore {
            key: key.to_string(),
        })?;
        if self.is_selected(key) {
            self.reload(key)?;
        }
        Ok(())
    }

    fn reload(&self, key: &str) -> Result<()> {
        self.mirror.update(|state| state.select(Some(key.to_string())));
        *self.handle.borrow_mut() = None;
        self.send(IncomingMessage::Select {
            key: key.to_string(),
        })
    }

    /// Hands dropped or pasted paths to the host for validation.
    pub fn add_files(&self, paths: Vec<String>) -> Result<()> {
        let Some(key) = self.mirror.read(|state| state.selected_key.clone()) else {
            return Ok(());
        };
        self.send(IncomingMessage::AddFiles { key, files: paths })
    }

    pub fn remove_attachment(&self, filename: &str) -> Result<()> {
        let Some(key) = self.mirror.read(|state| state.loaded_key.clone()) else {
            return Ok(());
        };
        self.send(IncomingMessage::RemoveAttachment {
            key,
            filename: filename.to_string(),
        })
    }

    pub fn open_file_picker(&self) -> Result<()> {
        let Some(key) = self.mirror.read(|state| state.selected_key.clone()) else {
            return Ok(());
        };
        self.send(IncomingMessage::OpenFilePicker { key })
    }

    /// Records the answer for one conflicting item; sends the batch once every
    /// conflict is answered.
    pub fn resolve_conflict(&self, index: usize, resolution: Resolution) -> Result<()> {
        let finished = self.mirror.update(|state| {
            let existing = state.attachments.clone();
            let batch = state.conflicts.as_mut()?;
            match batch.items.get_mut(index) {
                Some(item) if item.conflicting => item.resolution = Some(resolution),
                _ => {
                    warn!(index, "no conflicting attachment at this index");
                    return None;
                }
            }
            let files = finalize(batch, &existing)?;
            let key = batch.key.clone();
            state.conflicts = None;
            state.overlays.release(Overlay::ConflictDialog);
            Some((key, files))
        });

        match finished {
            Some((key, files)) => self.send_attachments(key, files),
            None => Ok(()),
        }
    }

    /// Drops the whole batch.
    pub fn cancel_conflicts(&self) {
        self.mirror.update(|state| {
            state.conflicts = None;
            state.overlays.release(Overlay::ConflictDialog);
        });
    }

    pub fn save_settings(&self, config: AppConfig, launch_at_login: bool) -> Result<()> {
        self.send(IncomingMessage::SaveSettings {
            config,
            launch_at_login,
        })?;
        self.close_settings()
    }

    pub fn close_settings(&self) -> Result<()> {
        let was_open = self.mirror.update(|state| {
            state.settings = None;
            state.overlays.release(Overlay::SettingsPanel)
        });
        if was_open {
            self.send(IncomingMessage::ResumeGlobalHotkey)?;
        }
        Ok(())
    }

    pub fn finish_welcome(&self, launch_at_login: bool) -> Result<()> {
        self.mirror.update(|state| state.welcome_visible = false);
        self.send(IncomingMessage::WelcomeResult { launch_at_login })
    }

    /// Quits after the fatal storage dialog was acknowledged.
    pub fn acknowledge_fatal(&self) -> Result<()> {
        let fatal = self.mirror.read(|state| {
            matches!(state.presentation.dialog, Some(Dialog::CoreInitFailed { .. }))
        });
        if !fatal {
            return Ok(());
        }
        info!("fatal error acknowledged, quitting");
        self.send(IncomingMessage::ShutdownAck)
    }

    /// Retries the failed save with whatever content is current now.
    pub async fn retry_save(&self) -> Result<()> {
        if let Err(e) = self.save.retry().await {
            debug!(error = %e, "retry failed");
        }
        Ok(())
    }

    pub async fn hide(&self) -> Result<()> {
        // Hiding never waits on a failed save; the banner stays for next time.
        self.flush_or_keep("hide").await;
        self.send(IncomingMessage::Hide)
    }

    pub fn start_window_drag(&self) -> Result<()> {
        self.send(IncomingMessage::StartWindowDrag)
    }

    /// Reports draggable areas in surface coordinates.
    pub fn report_drag_regions(&self, regions: Vec<Rect>) -> Result<()> {
        self.send(IncomingMessage::DragRegions { regions })
    }

    pub fn focus_pane(&self, pane: ActivePane) {
        self.mirror.update(|state| state.active_pane = pane);
    }

    /// Routes a key event to the overlay holding the top claim, or to the
    /// focused pane when no overlay claims input.
    pub async fn key_event(&self, key: Key) -> Result<KeyRoute> {
        let (owner, pane) = self.mirror.read(|state| (state.overlays.owner(), state.active_pane));

        let Some(overlay) = owner else {
            match (key, pane) {
                (Key::Escape, _) => self.hide().await?,
                (Key::Enter, ActivePane::Search) => {
                    let query = self.mirror.read(|state| state.search.query.clone());
                    self.create(&query).await?;
                }
                _ => {}
            }
            return Ok(KeyRoute::Pane(pane));
        };

        match (overlay, key) {
            (Overlay::ConflictDialog, Key::Escape) => self.cancel_conflicts(),
            (Overlay::SettingsPanel, Key::Escape) => self.close_settings()?,
            (Overlay::QuitDialog, Key::Escape | Key::Enter) => self.acknowledge_fatal()?,
            _ => {}
        }
        Ok(KeyRoute::Overlay(overlay))
    }
}
