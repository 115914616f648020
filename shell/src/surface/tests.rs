use super::*;
use crate::bridge::messages::{AttachmentInfo, CopyAction, ExactMatch};
use crate::bridge::{Decoded, Handler, channel};
use crate::error::Error;
use crate::geometry::Rect;
use crate::shutdown::ShutdownPhase;
use crate::state::{ActivePane, Dialog, KeyStatus, Overlay, Resolution};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use tokio::task::LocalSet;
use tokio::time::sleep;

mod common {
    use super::*;

    #[derive(Default)]
    pub(super) struct MemoryContent {
        pub(super) files: RefCell<HashMap<PathBuf, String>>,
        pub(super) latency: Cell<Duration>,
    }

    impl ContentSource for MemoryContent {
        fn read<'a>(&'a self, handle: &'a ContentHandle) -> LocalBoxFuture<'a, Result<String>> {
            async move {
                let latency = self.latency.get();
                if !latency.is_zero() {
                    sleep(latency).await;
                }
                Ok(self.files.borrow().get(&handle.path).cloned().unwrap_or_default())
            }
            .boxed_local()
        }
    }

    #[derive(Default)]
    pub(super) struct MemorySink {
        pub(super) writes: RefCell<Vec<(String, String)>>,
        pub(super) fail: Cell<bool>,
    }

    impl ContentSink for MemorySink {
        fn write<'a>(&'a self, target: &'a SaveTarget, content: &'a str) -> LocalBoxFuture<'a, Result<()>> {
            async move {
                if self.fail.get() {
                    return Err(Error::ContentWrite {
                        key: target.key.clone(),
                        reason: "access denied".to_string(),
                    });
                }
                self.writes
                    .borrow_mut()
                    .push((target.key.clone(), content.to_string()));
                Ok(())
            }
            .boxed_local()
        }
    }

    #[derive(Default)]
    pub(super) struct MemoryClipboard {
        pub(super) text: RefCell<Option<String>>,
    }

    impl Clipboard for MemoryClipboard {
        fn write_text<'a>(&'a self, text: &'a str) -> LocalBoxFuture<'a, Result<()>> {
            async move {
                *self.text.borrow_mut() = Some(text.to_string());
                Ok(())
            }
            .boxed_local()
        }
    }

    pub(super) struct Harness {
        pub(super) surface: Surface,
        pub(super) host_rx: BridgeReceiver<IncomingMessage>,
        pub(super) content: Rc<MemoryContent>,
        pub(super) sink: Rc<MemorySink>,
        pub(super) clipboard: Rc<MemoryClipboard>,
    }

    impl Harness {
        pub(super) fn new() -> Self {
            let (outbound, host_rx) = channel::<IncomingMessage>("surface->host");
            let content = Rc::new(MemoryContent::default());
            let sink = Rc::new(MemorySink::default());
            let clipboard = Rc::new(MemoryClipboard::default());
            let io = SurfaceIo {
                content: content.clone(),
                sink: sink.clone(),
                clipboard: clipboard.clone(),
            };
            Self {
                surface: Surface::new(outbound, io, Duration::from_millis(500)),
                host_rx,
                content,
                sink,
                clipboard,
            }
        }

        /// Messages the surface sent since the last call.
        pub(super) fn sent(&mut self) -> Vec<IncomingMessage> {
            let mut messages = Vec::new();
            while let Some(inbound) = self.host_rx.try_recv() {
                if let Decoded::Known { message, .. } = inbound.decoded {
                    messages.push(message);
                }
            }
            messages
        }

        pub(super) async fn deliver(&self, message: OutgoingMessage) {
            self.deliver_with(message, None).await;
        }

        pub(super) async fn deliver_with(&self, message: OutgoingMessage, handle: Option<ContentHandle>) {
            if let Err(e) = self.surface.handle(message, handle).await {
                panic!("handler failed: {e}");
            }
        }

        pub(super) async fn deliver_value(&self, key: &str, attachments: &[&str]) {
            self.deliver_with(value(key, attachments, false), Some(handle(key))).await;
        }

        /// Selects `key` and delivers its value.
        pub(super) async fn open(&mut self, key: &str, content: &str, attachments: &[&str]) {
            self.content
                .files
                .borrow_mut()
                .insert(handle(key).path, content.to_string());
            self.surface.select(key).await.unwrap();
            self.deliver_value(key, attachments).await;
            self.sent();
        }

        pub(super) fn state(&self) -> crate::state::AppState {
            self.surface.mirror().snapshot()
        }

        pub(super) fn written(&self) -> Vec<String> {
            self.sink.writes.borrow().iter().map(|(_, c)| c.clone()).collect()
        }
    }

    pub(super) fn handle(key: &str) -> ContentHandle {
        ContentHandle {
            path: PathBuf::from(format!("{key}.md")),
            read_only: false,
        }
    }

    pub(super) fn value(key: &str, attachments: &[&str], read_only: bool) -> OutgoingMessage {
        OutgoingMessage::Value {
            key: key.to_string(),
            attachments: attachments
                .iter()
                .map(|name| AttachmentInfo {
                    filename: name.to_string(),
                    size: 3,
                    thumbnail_url: None,
                })
                .collect(),
            key_hash: format!("hash-{key}"),
            read_only,
        }
    }

    pub(super) async fn local<F: Future>(f: F) -> F::Output {
        LocalSet::new().run_until(f).await
    }

    pub(super) fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    pub(super) fn select_msg(key: &str) -> IncomingMessage {
        IncomingMessage::Select {
            key: key.to_string(),
        }
    }
}

use common::{Harness, handle, local, ms, select_msg, value};

mod values {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_value_loads_selected_key() {
        local(async {
            let mut h = Harness::new();
            h.open("a", "alpha", &["a.txt"]).await;

            let state = h.state();
            assert_eq!(state.loaded_key.as_deref(), Some("a"));
            assert_eq!(state.preview_cache.as_deref(), Some("alpha"));
            assert_eq!(state.attachments.len(), 1);
            assert_eq!(state.key_hash.as_deref(), Some("hash-a"));
            assert!(!state.read_only);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_value_is_ignored() {
        local(async {
            let mut h = Harness::new();
            h.surface.select("a").await.unwrap();
            h.surface.select("b").await.unwrap();
            assert_eq!(h.sent(), vec![select_msg("a"), select_msg("b")]);

            h.deliver_value("a", &["old.txt"]).await;

            let state = h.state();
            assert_eq!(state.selected_key.as_deref(), Some("b"));
            assert!(state.loaded_key.is_none());
            assert!(state.attachments.is_empty());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_selection_change_during_content_read() {
        local(async {
            let h = Harness::new();
            h.content.latency.set(ms(50));
            h.surface.select("a").await.unwrap();

            let (_, selected) = tokio::join!(h.deliver_value("a", &["a.txt"]), h.surface.select("b"));
            selected.unwrap();

            let state = h.state();
            assert_eq!(state.selected_key.as_deref(), Some("b"));
            assert!(state.loaded_key.is_none());
            assert!(state.attachments.is_empty());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_observers_never_see_previous_key_attachments() {
        local(async {
            let mut h = Harness::new();
            let mut frames = h.surface.mirror().subscribe();
            h.open("a", "alpha", &["a.txt"]).await;

            h.surface.select("b").await.unwrap();
            let frame = frames.borrow_and_update().clone();
            assert_eq!(frame.selected_key.as_deref(), Some("b"));
            assert!(frame.attachments.is_empty());

            h.deliver_value("a", &["a.txt"]).await;
            assert!(frames.borrow_and_update().attachments.is_empty());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_trashed_value_is_read_only() {
        local(async {
            let h = Harness::new();
            h.surface.select("t").await.unwrap();
            h.deliver_with(value("t", &[], true), Some(handle("t"))).await;

            assert!(h.state().read_only);
            h.surface.edit("changed");
            assert!(!h.state().is_dirty);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_without_handle_opens_read_only() {
        local(async {
            let h = Harness::new();
            h.surface.select("a").await.unwrap();
            h.deliver(value("a", &[], false)).await;

            let state = h.state();
            assert_eq!(state.loaded_key.as_deref(), Some("a"));
            assert!(state.read_only);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_focus_runs_when_content_arrives() {
        local(async {
            let h = Harness::new();
            h.surface.select("a").await.unwrap();
            h.surface.focus_pane(ActivePane::Editor);
            h.deliver(OutgoingMessage::Focus).await;
            assert_eq!(h.state().pending_actions.len(), 1);

            h.deliver_value("a", &[]).await;

            let state = h.state();
            assert!(state.pending_actions.is_empty());
            assert_eq!(state.active_pane, ActivePane::Editor);
        })
        .await;
    }
}

mod editing {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_edit_saves_after_delay() {
        local(async {
            let mut h = Harness::new();
            h.open("a", "alpha", &[]).await;

            h.surface.edit("alpha!");
            assert!(h.state().is_dirty);
            assert_eq!(h.state().preview_cache.as_deref(), Some("alpha!"));

            sleep(ms(499)).await;
            assert!(h.written().is_empty());
            sleep(ms(2)).await;
            assert_eq!(h.written(), vec!["alpha!"]);
            assert!(!h.state().is_dirty);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_flushes_before_switching() {
        local(async {
            let mut h = Harness::new();
            h.open("a", "alpha", &[]).await;
            h.surface.edit("draft");

            h.surface.select("b").await.unwrap();

            assert_eq!(h.written(), vec!["draft"]);
            assert_eq!(h.sent(), vec![select_msg("b")]);
            assert!(!h.surface.save().has_pending_timer());
            let state = h.state();
            assert_eq!(state.selected_key.as_deref(), Some("b"));
            assert!(!state.is_dirty);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_flush_keeps_selection() {
        local(async {
            let mut h = Harness::new();
            h.open("a", "alpha", &[]).await;
            h.sink.fail.set(true);
            h.surface.edit("draft");

            h.surface.select("b").await.unwrap();

            let state = h.state();
            assert_eq!(state.selected_key.as_deref(), Some("a"));
            assert!(state.is_dirty);
            assert!(state.presentation.banner.as_ref().is_some_and(|b| b.retry));
            assert!(h.sent().is_empty());

            h.sink.fail.set(false);
            h.surface.retry_save().await.unwrap();
            assert_eq!(h.written(), vec!["draft"]);
            assert!(h.state().presentation.banner.is_none());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dirty_value_keeps_draft() {
        local(async {
            let mut h = Harness::new();
            h.open("a", "alpha", &["a.txt"]).await;
            h.surface.edit("draft");

            h.deliver_value("a", &["a.txt", "b.txt"]).await;

            let state = h.state();
            assert_eq!(state.preview_cache.as_deref(), Some("draft"));
            assert_eq!(state.attachments.len(), 2);
        })
        .await;
    }
}

mod keys {
    use super::*;

    fn results(active: &[&str], trashed: &[&str], exact_match: ExactMatch) -> OutgoingMessage {
        OutgoingMessage::SearchResults {
            active_keys: active.iter().map(|k| k.to_string()).collect(),
            trashed_keys: trashed.iter().map(|k| k.to_string()).collect(),
            exact_match,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_core_ready_requests_results() {
        local(async {
            let mut h = Harness::new();
            h.surface.ready().unwrap();
            h.deliver(OutgoingMessage::CoreReady).await;

            assert!(h.state().core_ready);
            assert_eq!(
                h.sent(),
                vec![
                    IncomingMessage::Ready,
                    IncomingMessage::Search {
                        query: String::new()
                    }
                ]
            );
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_selects_existing_key() {
        local(async {
            let mut h = Harness::new();
            h.surface.search("notes").unwrap();
            h.deliver(results(&["notes", "notes/old"], &[], ExactMatch::Active))
                .await;
            h.sent();

            h.surface.create("notes").await.unwrap();

            assert_eq!(h.sent(), vec![select_msg("notes")]);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_uses_lists_when_query_moved_on() {
        local(async {
            let mut h = Harness::new();
            h.surface.search("no").unwrap();
            h.deliver(results(&["notes"], &["nope"], ExactMatch::None)).await;
            h.sent();

            assert_eq!(h.state().search.classify("nope"), KeyStatus::Trashed);
            h.surface.create("nope").await.unwrap();
            assert_eq!(h.sent(), vec![select_msg("nope")]);

            h.surface.create("new").await.unwrap();
            assert_eq!(
                h.sent(),
                vec![IncomingMessage::Create {
                    key: "new".to_string()
                }]
            );
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_created_selects_it() {
        local(async {
            let mut h = Harness::new();
            h.deliver(OutgoingMessage::KeyCreated {
                success: true,
                key: "fresh".to_string(),
            })
            .await;

            let state = h.state();
            assert_eq!(state.selected_key.as_deref(), Some("fresh"));
            assert_eq!(state.active_pane, ActivePane::Editor);
            assert_eq!(h.sent(), vec![select_msg("fresh")]);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_create_shows_toast() {
        local(async {
            let h = Harness::new();
            h.deliver(OutgoingMessage::KeyCreated {
                success: false,
                key: "bad".to_string(),
            })
            .await;

            assert!(h.state().selected_key.is_none());
            assert!(h.state().presentation.toast.is_some());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rename_moves_selection() {
        local(async {
            let mut h = Harness::new();
            h.open("old", "x", &[]).await;
            h.surface.rename("old", "new", false).await.unwrap();
            h.deliver(OutgoingMessage::RenameResult {
                old_key: "old".to_string(),
                new_key: "new".to_string(),
                result: crate::bridge::messages::RenameResultType::Success,
            })
            .await;

            assert_eq!(h.state().selected_key.as_deref(), Some("new"));
            let sent = h.sent();
            assert_eq!(sent.last(), Some(&select_msg("new")));
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_trash_reloads_open_key() {
        local(async {
            let mut h = Harness::new();
            h.open("a", "alpha", &[]).await;

            h.surface.trash("a").await.unwrap();

            assert_eq!(
                h.sent(),
                vec![
                    IncomingMessage::Trash {
                        key: "a".to_string()
                    },
                    select_msg("a")
                ]
            );
            assert!(h.state().loaded_key.is_none());
        })
        .await;
    }
}

mod copying {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_markdown_copy_waits_for_content() {
        local(async {
            let h = Harness::new();
            h.content
                .files
                .borrow_mut()
                .insert(handle("a").path, "# alpha".to_string());
            h.surface.select("a").await.unwrap();

            h.deliver(OutgoingMessage::DoCopy {
                action: CopyAction::Markdown,
            })
            .await;
            assert!(h.clipboard.text.borrow().is_none());

            h.deliver_value("a", &[]).await;
            assert_eq!(h.clipboard.text.borrow().as_deref(), Some("# alpha"));
            assert!(!h.state().copy_in_flight);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_copy_request_supersedes_queued_one() {
        local(async {
            let mut h = Harness::new();
            h.surface.select("a").await.unwrap();
            h.surface.copy(CopyAction::Markdown).await.unwrap();
            h.surface.copy(CopyAction::Files).await.unwrap();
            h.sent();

            h.deliver_value("a", &["a.txt"]).await;

            assert!(h.clipboard.text.borrow().is_none());
            assert_eq!(
                h.sent(),
                vec![IncomingMessage::CopyFiles {
                    key: "a".to_string(),
                    filenames: vec!["a.txt".to_string()]
                }]
            );
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_files_copy_in_flight_until_result() {
        local(async {
            let mut h = Harness::new();
            h.open("a", "alpha", &["a.txt", "b.png"]).await;

            h.surface.copy(CopyAction::Files).await.unwrap();
            assert!(h.state().copy_in_flight);
            assert_eq!(h.sent().len(), 1);

            h.deliver(OutgoingMessage::CopyResult { success: true }).await;
            assert!(!h.state().copy_in_flight);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_blocked_by_copy_then_acked() {
        local(async {
            let mut h = Harness::new();
            h.open("a", "alpha", &["a.txt"]).await;
            h.surface.copy(CopyAction::Files).await.unwrap();
            h.sent();

            h.deliver(OutgoingMessage::Shutdown).await;
            assert_eq!(h.sent(), vec![IncomingMessage::ShutdownBlocked]);
            assert_eq!(h.surface.shutdown().phase(), ShutdownPhase::Blocked);

            // Finishing the copy does not quit on its own.
            h.deliver(OutgoingMessage::CopyResult { success: true }).await;
            assert!(h.sent().is_empty());
            assert_eq!(h.surface.shutdown().phase(), ShutdownPhase::Blocked);

            h.deliver(OutgoingMessage::Shutdown).await;
            assert_eq!(h.sent(), vec![IncomingMessage::ShutdownAck]);
            assert_eq!(h.surface.shutdown().phase(), ShutdownPhase::AckSent);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_shutdowns_share_one_blocked_run() {
        local(async {
            let mut h = Harness::new();
            h.open("a", "alpha", &["a.txt"]).await;
            h.surface.copy(CopyAction::Files).await.unwrap();
            h.sent();

            let (host_tx, surface_rx) = channel::<OutgoingMessage>("host->surface");
            let host = async move {
                host_tx.send(&OutgoingMessage::Shutdown).unwrap();
                host_tx.send(&OutgoingMessage::Shutdown).unwrap();
                sleep(ms(10)).await;

                // Sent after the user asks again, once the copy is done.
                host_tx
                    .send(&OutgoingMessage::CopyResult { success: true })
                    .unwrap();
                host_tx.send(&OutgoingMessage::Shutdown).unwrap();
                sleep(ms(10)).await;
            };
            let (stats, ()) = tokio::join!(h.surface.run(surface_rx), host);

            assert_eq!(stats.handled, 4);
            assert_eq!(
                h.sent(),
                vec![
                    IncomingMessage::ShutdownBlocked,
                    IncomingMessage::ShutdownBlocked,
                    IncomingMessage::ShutdownAck,
                ]
            );
            assert_eq!(h.surface.shutdown().runs(), 2);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending_edit() {
        local(async {
            let mut h = Harness::new();
            h.open("a", "alpha", &[]).await;
            h.surface.edit("last words");

            h.deliver(OutgoingMessage::Shutdown).await;
            h.deliver(OutgoingMessage::Shutdown).await;

            assert_eq!(h.written(), vec!["last words"]);
            assert_eq!(
                h.sent(),
                vec![IncomingMessage::ShutdownAck, IncomingMessage::ShutdownAck]
            );
            assert_eq!(h.surface.shutdown().runs(), 1);
        })
        .await;
    }
}

mod conflicts {
    use super::*;

    fn files(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_unique_name_counts_up() {
        let taken: HashSet<String> = ["a.txt", "a (1).txt"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unique_name("a.txt", &taken), "a (2).txt");
        assert_eq!(unique_name("README", &taken), "README (1)");
    }

    #[test]
    fn test_plan_renames_duplicates_within_batch() {
        let batch = plan_batch("k", &files(&[r"C:\x\a.txt", "/y/a.txt"]), &[]);

        assert_eq!(batch.unresolved(), 0);
        let names: Vec<_> = batch.items.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "a (1).txt"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_conflict_sends_immediately() {
        local(async {
            let mut h = Harness::new();
            h.open("k", "", &["a.txt"]).await;

            h.deliver(OutgoingMessage::FilesSelected {
                key: "k".to_string(),
                files: files(&["/tmp/b.txt"]),
            })
            .await;

            assert_eq!(
                h.sent(),
                vec![IncomingMessage::AddAttachments {
                    key: "k".to_string(),
                    files: vec![("/tmp/b.txt".to_string(), "b.txt".to_string())]
                }]
            );
            assert_eq!(h.state().attachment_add_in_flight.as_deref(), Some("k"));

            h.deliver_value("k", &["a.txt", "b.txt"]).await;
            assert!(h.state().attachment_add_in_flight.is_none());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_answered_after_switching_keys_unblocks_shutdown() {
        local(async {
            let mut h = Harness::new();
            h.open("a", "", &[]).await;
            h.deliver(OutgoingMessage::FilesSelected {
                key: "a".to_string(),
                files: files(&["/tmp/x.txt"]),
            })
            .await;
            h.open("b", "", &[]).await;

            h.deliver_value("a", &["x.txt"]).await;

            let state = h.state();
            assert!(state.attachment_add_in_flight.is_none());
            assert_eq!(state.loaded_key.as_deref(), Some("b"));
            assert!(state.attachments.is_empty());

            h.deliver(OutgoingMessage::Shutdown).await;
            assert_eq!(h.sent(), vec![IncomingMessage::ShutdownAck]);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_selecting_another_key_drops_conflict_batch() {
        local(async {
            let mut h = Harness::new();
            h.open("a", "", &["a.txt"]).await;
            h.deliver(OutgoingMessage::FilesPasted {
                files: files(&["/in/a.txt"]),
            })
            .await;
            assert_eq!(h.state().overlays.owner(), Some(Overlay::ConflictDialog));

            h.open("b", "", &["a.txt"]).await;

            let state = h.state();
            assert!(state.conflicts.is_none());
            assert!(!state.overlays.is_claimed(Overlay::ConflictDialog));

            h.surface.resolve_conflict(0, Resolution::Overwrite).unwrap();
            assert!(h.sent().is_empty());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflict_waits_for_every_resolution() {
        local(async {
            let mut h = Harness::new();
            h.open("k", "", &["a.txt", "b.txt"]).await;

            h.deliver(OutgoingMessage::FilesPasted {
                files: files(&["/in/a.txt", "/in/b.txt", "/in/c.txt"]),
            })
            .await;

            let state = h.state();
            assert_eq!(state.overlays.owner(), Some(Overlay::ConflictDialog));
            assert_eq!(state.conflicts.as_ref().map(|b| b.unresolved()), Some(2));
            assert!(h.sent().is_empty());

            let route = h.surface.key_event(Key::Char('x')).await.unwrap();
            assert_eq!(route, KeyRoute::Overlay(Overlay::ConflictDialog));

            h.surface.resolve_conflict(0, Resolution::KeepBoth).unwrap();
            assert!(h.sent().is_empty());
            h.surface.resolve_conflict(1, Resolution::Skip).unwrap();

            assert_eq!(
                h.sent(),
                vec![IncomingMessage::AddAttachments {
                    key: "k".to_string(),
                    files: vec![
                        ("/in/a.txt".to_string(), "a (1).txt".to_string()),
                        ("/in/c.txt".to_string(), "c.txt".to_string()),
                    ]
                }]
            );
            let state = h.state();
            assert!(state.conflicts.is_none());
            assert!(state.overlays.is_empty());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_keeps_name() {
        local(async {
            let mut h = Harness::new();
            h.open("k", "", &["a.txt"]).await;
            h.deliver(OutgoingMessage::FilesPasted {
                files: files(&["/in/a.txt"]),
            })
            .await;

            h.surface.resolve_conflict(0, Resolution::Overwrite).unwrap();

            assert_eq!(
                h.sent(),
                vec![IncomingMessage::AddAttachments {
                    key: "k".to_string(),
                    files: vec![("/in/a.txt".to_string(), "a.txt".to_string())]
                }]
            );
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_escape_cancels_batch() {
        local(async {
            let mut h = Harness::new();
            h.open("k", "", &["a.txt"]).await;
            h.deliver(OutgoingMessage::FilesPasted {
                files: files(&["/in/a.txt"]),
            })
            .await;

            h.surface.key_event(Key::Escape).await.unwrap();

            assert!(h.state().conflicts.is_none());
            assert!(h.state().overlays.is_empty());
            assert!(h.sent().is_empty());
        })
        .await;
    }
}

mod overlays {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test(start_paused = true)]
    async fn test_settings_suspend_hotkey_while_open() {
        local(async {
            let mut h = Harness::new();
            h.deliver(OutgoingMessage::OpenSettings {
                config: AppConfig::default(),
                launch_at_login: true,
            })
            .await;
            assert_eq!(h.sent(), vec![IncomingMessage::SuspendGlobalHotkey]);
            assert!(h.state().settings.is_some());

            let route = h.surface.key_event(Key::Escape).await.unwrap();

            assert_eq!(route, KeyRoute::Overlay(Overlay::SettingsPanel));
            assert_eq!(h.sent(), vec![IncomingMessage::ResumeGlobalHotkey]);
            assert!(h.state().settings.is_none());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_settings_sends_config_then_resumes() {
        local(async {
            let mut h = Harness::new();
            let config = AppConfig::default();
            h.deliver(OutgoingMessage::OpenSettings {
                config: config.clone(),
                launch_at_login: false,
            })
            .await;
            h.sent();

            h.surface.save_settings(config.clone(), true).unwrap();

            assert_eq!(
                h.sent(),
                vec![
                    IncomingMessage::SaveSettings {
                        config,
                        launch_at_login: true
                    },
                    IncomingMessage::ResumeGlobalHotkey
                ]
            );
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_claim_owns_keys() {
        local(async {
            let mut h = Harness::new();
            h.deliver(OutgoingMessage::OpenSettings {
                config: crate::config::AppConfig::default(),
                launch_at_login: false,
            })
            .await;
            h.deliver(OutgoingMessage::CoreInitFailed {
                message: "database locked".to_string(),
                data_dir: "/data".to_string(),
            })
            .await;
            h.sent();

            let route = h.surface.key_event(Key::Enter).await.unwrap();

            assert_eq!(route, KeyRoute::Overlay(Overlay::QuitDialog));
            assert_eq!(h.sent(), vec![IncomingMessage::ShutdownAck]);
            assert!(matches!(
                h.state().presentation.dialog,
                Some(Dialog::CoreInitFailed { .. })
            ));
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_drag_regions_reported_to_host() {
        local(async {
            let mut h = Harness::new();
            let regions = vec![Rect::new(0, 0, 800, 32), Rect::new(760, 40, 800, 72)];

            h.surface.report_drag_regions(regions.clone()).unwrap();

            assert_eq!(h.sent(), vec![IncomingMessage::DragRegions { regions }]);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_reach_pane_without_overlay() {
        local(async {
            let mut h = Harness::new();
            h.surface.focus_pane(ActivePane::KeyList);

            let route = h.surface.key_event(Key::Tab).await.unwrap();

            assert_eq!(route, KeyRoute::Pane(ActivePane::KeyList));
            assert!(h.sent().is_empty());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_welcome_result() {
        local(async {
            let mut h = Harness::new();
            h.deliver(OutgoingMessage::ShowWelcome).await;
            assert!(h.state().welcome_visible);

            h.surface.finish_welcome(true).unwrap();

            assert!(!h.state().welcome_visible);
            assert_eq!(
                h.sent(),
                vec![IncomingMessage::WelcomeResult {
                    launch_at_login: true
                }]
            );
        })
        .await;
    }
}

mod files {
    use super::*;

    #[tokio::test]
    async fn test_file_content_reads_missing_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let handle = ContentHandle {
            path: dir.path().join("missing.md"),
            read_only: false,
        };
        assert_eq!(FileContent.read(&handle).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_touching_sink_writes_then_touches() {
        let dir = tempfile::tempdir().unwrap();
        let (outbound, mut host_rx) = channel::<IncomingMessage>("surface->host");
        let sink = TouchingSink::new(FileContent, outbound);
        let target = SaveTarget {
            key: "k".to_string(),
            handle: ContentHandle {
                path: dir.path().join("content.md"),
                read_only: false,
            },
        };

        sink.write(&target, "hello").await.unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("content.md")).unwrap(), "hello");
        let inbound = host_rx.try_recv().unwrap();
        assert!(matches!(
            inbound.decoded,
            Decoded::Known { message: IncomingMessage::Touch { ref key }, .. } if key == "k"
        ));
    }

    #[tokio::test]
    async fn test_read_only_handle_rejects_write() {
        let dir = tempfile::tempdir().unwrap();
        let target = SaveTarget {
            key: "k".to_string(),
            handle: ContentHandle {
                path: dir.path().join("content.md"),
                read_only: true,
            },
        };

        let result = FileContent.write(&target, "nope").await;

        assert!(matches!(result, Err(Error::ContentWrite { .. })));
        assert!(!dir.path().join("content.md").exists());
    }
}
