use super::messages::{AttachmentInfo, ExactMatch};
use super::*;
use crate::error::{Error, Result};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde_json::json;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use tokio::sync::Notify;
use tokio::task::LocalSet;

mod common {
    use super::*;

    /// Records every message; fails on `search`, suspends on `select{key:"slow"}`.
    #[derive(Default)]
    pub(super) struct Recorder {
        pub(super) seen: RefCell<Vec<IncomingMessage>>,
        pub(super) handles: RefCell<Vec<Option<ContentHandle>>>,
        pub(super) gate: Notify,
    }

    impl Handler<IncomingMessage> for Recorder {
        fn handle(
            &self,
            message: IncomingMessage,
            handle: Option<ContentHandle>,
        ) -> LocalBoxFuture<'_, Result<()>> {
            async move {
                if matches!(&message, IncomingMessage::Select { key } if key == "slow") {
                    self.gate.notified().await;
                }
                let fail = matches!(message, IncomingMessage::Search { .. });
                self.seen.borrow_mut().push(message);
                self.handles.borrow_mut().push(handle);
                if fail {
                    return Err(Error::BridgeClosed("search handler"));
                }
                Ok(())
            }
            .boxed_local()
        }
    }

    pub(super) fn select(key: &str) -> IncomingMessage {
        IncomingMessage::Select {
            key: key.to_string(),
        }
    }
}

use common::{Recorder, select};

mod decode {
    use super::*;

    #[test]
    fn test_known_message() {
        let decoded = decode::<IncomingMessage>(r#"{"type":"select","key":"a"}"#);
        assert!(matches!(
            decoded,
            Decoded::Known { kind, message } if kind == "select" && message == select("a")
        ));
    }

    #[test]
    fn test_unknown_type_is_not_malformed() {
        let decoded = decode::<IncomingMessage>(r#"{"type":"fromTheFuture","x":1}"#);
        assert!(matches!(decoded, Decoded::Unknown { kind } if kind == "fromTheFuture"));

        let decoded = decode::<OutgoingMessage>(r#"{"type":"somethingNew"}"#);
        assert!(matches!(decoded, Decoded::Unknown { .. }));
    }

    #[test]
    fn test_malformed_inputs() {
        for json in ["not json", r#"{"key":"a"}"#, r#"{"type":7}"#, r#"{"type":"select"}"#] {
            assert!(
                matches!(decode::<IncomingMessage>(json), Decoded::Malformed(_)),
                "{json}"
            );
        }
    }
}

mod wire_format {
    use super::*;

    #[test]
    fn test_incoming_fields_are_camel_case() {
        let message = IncomingMessage::AddAttachments {
            key: "k".to_string(),
            files: vec![("C:\\a.txt".to_string(), "a.txt".to_string())],
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"type": "addAttachments", "key": "k", "files": [["C:\\a.txt", "a.txt"]]})
        );

        let message = IncomingMessage::WelcomeResult {
            launch_at_login: true,
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"type": "welcomeResult", "launchAtLogin": true})
        );
    }

    #[test]
    fn test_outgoing_fields_are_camel_case() {
        let message = OutgoingMessage::Value {
            key: "k".to_string(),
            attachments: vec![AttachmentInfo {
                filename: "a.png".to_string(),
                size: 3,
                thumbnail_url: None,
            }],
            key_hash: "abc".to_string(),
            read_only: false,
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "type": "value",
                "key": "k",
                "attachments": [{"filename": "a.png", "size": 3, "thumbnailUrl": null}],
                "keyHash": "abc",
                "readOnly": false,
            })
        );

        let message = OutgoingMessage::SearchResults {
            active_keys: vec![],
            trashed_keys: vec!["t".to_string()],
            exact_match: ExactMatch::Trashed,
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"type": "searchResults", "activeKeys": [], "trashedKeys": ["t"], "exactMatch": "trashed"})
        );
    }

    #[test]
    fn test_unit_variants() {
        assert_eq!(
            serde_json::to_string(&OutgoingMessage::FocusSearch).unwrap(),
            r#"{"type":"focusSearch"}"#
        );
        assert_eq!(
            serde_json::to_string(&IncomingMessage::ShutdownBlocked).unwrap(),
            r#"{"type":"shutdownBlocked"}"#
        );
    }
}

mod channel {
    use super::*;

    #[tokio::test]
    async fn test_order_and_sequence_across_clones() {
        let (tx, mut rx) = channel::<IncomingMessage>("test");
        let tx2 = tx.clone();
        tx.send(&select("a")).unwrap();
        tx2.send(&select("b")).unwrap();
        tx.send(&select("c")).unwrap();

        for (expected_seq, expected_key) in [(0, "a"), (1, "b"), (2, "c")] {
            let inbound = rx.recv().await.unwrap();
            assert_eq!(inbound.seq, expected_seq);
            assert!(matches!(inbound.decoded, Decoded::Known { message, .. } if message == select(expected_key)));
        }
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_handle_travels_with_message() {
        let (tx, mut rx) = channel::<IncomingMessage>("test");
        let handle = ContentHandle {
            path: PathBuf::from("content.md"),
            read_only: true,
        };
        tx.send_with(&select("a"), Some(handle.clone())).unwrap();

        assert_eq!(rx.recv().await.unwrap().handle, Some(handle));
    }

    #[test]
    fn test_send_after_receiver_dropped_fails() {
        let (tx, rx) = channel::<IncomingMessage>("test");
        drop(rx);
        assert!(tx.is_closed());
        assert!(matches!(tx.send(&IncomingMessage::Hide), Err(Error::BridgeClosed("test"))));
    }
}

mod dispatch_loop {
    use super::*;

    #[tokio::test]
    async fn test_failed_and_unknown_messages_do_not_stop_loop() {
        let (tx, rx) = channel::<IncomingMessage>("test");
        let recorder = Recorder::default();

        tx.send(&IncomingMessage::Search {
            query: "q".to_string(),
        })
        .unwrap();
        tx.send_json(r#"{"type":"fromTheFuture"}"#.to_string(), None)
            .unwrap();
        tx.send_json("{oops".to_string(), None).unwrap();
        tx.send(&IncomingMessage::Hide).unwrap();
        drop(tx);

        let stats = dispatch::run(rx, &recorder).await;

        assert_eq!(
            stats,
            DispatchStats {
                handled: 1,
                failed: 1,
                ignored: 2
            }
        );
        assert_eq!(recorder.seen.borrow().last(), Some(&IncomingMessage::Hide));
    }

    #[tokio::test]
    async fn test_suspended_handler_keeps_accepting_in_order() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let (tx, rx) = channel::<IncomingMessage>("test");
                let recorder = Rc::new(Recorder::default());
                let loop_recorder = recorder.clone();
                let task =
                    tokio::task::spawn_local(async move { dispatch::run(rx, &*loop_recorder).await });

                tx.send(&select("slow")).unwrap();
                tokio::task::yield_now().await;
                tx.send(&select("after")).unwrap();
                tx.send(&IncomingMessage::Hide).unwrap();
                tokio::task::yield_now().await;
                assert!(recorder.seen.borrow().is_empty());

                recorder.gate.notify_one();
                drop(tx);
                let stats = task.await.unwrap();

                assert_eq!(stats.handled, 3);
                assert_eq!(
                    *recorder.seen.borrow(),
                    vec![select("slow"), select("after"), IncomingMessage::Hide]
                );
            })
            .await;
    }
}
