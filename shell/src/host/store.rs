//! Key and attachment storage owned by the worker thread.
//!
//! Layout under the data directory:
//!
//! ```text
//! index.json               key -> timestamps, lifecycle, attachment list
//! content/<key_hash>.md    markdown content, written through the content handle
//! blobs/<key_hash>/<file>  attachments
//! ```
//!
//! `key_hash` is the hex blake3 hash of the key, so renames move files but
//! never need to escape key text for the file system.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use nutype::nutype;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bridge::messages::ExactMatch;
use crate::error::StoreError;

pub const MAX_KEY_LENGTH: usize = 256;

/// Virtual host the WebView maps onto the data directory.
pub const DATA_HOST: &str = "keva-data.local";

const INDEX_FILE: &str = "index.json";
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = MAX_KEY_LENGTH),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        AsRef,
        Deref,
        TryFrom,
        Hash,
        Display,
    )
)]
pub struct Key(String);

impl Key {
    pub fn parse(key: &str) -> Result<Self, StoreError> {
        Key::try_from(key).map_err(|_| StoreError::InvalidKey(key.to_string()))
    }

    /// Hex blake3 hash naming this key's files.
    pub fn hash(&self) -> String {
        blake3::hash(self.as_bytes()).to_hex().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub trashed: bool,
    pub attachments: Vec<Attachment>,
}

/// Result lists for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    pub active: Vec<String>,
    pub trashed: Vec<String>,
    pub exact_match: ExactMatch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceOutcome {
    pub trashed: usize,
    pub purged: usize,
}

/// Storage engine used by the worker.
pub trait Store {
    fn search(&self, query: &str, limit: usize) -> SearchOutcome;
    fn get(&self, key: &Key) -> Option<Entry>;
    fn create(&mut self, key: &Key, now: SystemTime) -> Result<(), StoreError>;
    fn content_path(&self, key: &Key) -> PathBuf;
    fn touch(&mut self, key: &Key, now: SystemTime) -> Result<(), StoreError>;
    fn rename(&mut self, old: &Key, new: &Key, now: SystemTime) -> Result<(), StoreError>;
    fn trash(&mut self, key: &Key, now: SystemTime) -> Result<(), StoreError>;
    fn restore(&mut self, key: &Key, now: SystemTime) -> Result<(), StoreError>;
    fn purge(&mut self, key: &Key) -> Result<(), StoreError>;
    fn add_attachments(
        &mut self,
        key: &Key,
        files: Vec<(PathBuf, String)>,
        now: SystemTime,
    ) -> Result<(), StoreError>;
    fn remove_attachment(&mut self, key: &Key, filename: &str, now: SystemTime) -> Result<(), StoreError>;
    /// Location of an attachment. Fails for names that are not a single path component.
    fn attachment_path(&self, key: &Key, filename: &str) -> Result<PathBuf, StoreError>;

    /// URL the surface can load as a preview of the attachment, if any.
    fn thumbnail_url(&self, _key: &Key, _filename: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    created_at: SystemTime,
    updated_at: SystemTime,
    trashed_at: Option<SystemTime>,
    attachments: Vec<Attachment>,
}

/// File-system store: one JSON index plus content and blob directories.
pub struct FsStore {
    base: PathBuf,
    index: BTreeMap<String, Record>,
}

impl FsStore {
    pub fn open(base: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(base.join("content"))?;
        std::fs::create_dir_all(base.join("blobs"))?;

        let index_path = base.join(INDEX_FILE);
        let index = if index_path.exists() {
            serde_json::from_slice(&std::fs::read(&index_path)?)?
        } else {
            BTreeMap::new()
        };
        info!(path = %base.display(), keys = index.len(), "store opened");

        Ok(Self {
            base: base.to_path_buf(),
            index,
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Trashes keys idle for `trash_ttl` and purges keys trashed for `purge_ttl`.
    pub fn maintenance(
        &mut self,
        now: SystemTime,
        trash_ttl: Duration,
        purge_ttl: Duration,
    ) -> Result<MaintenanceOutcome, StoreError> {
        let expired = |since: SystemTime, ttl: Duration| {
            now.duration_since(since).is_ok_and(|age| age >= ttl)
        };

        let mut to_trash = Vec::new();
        let mut to_purge = Vec::new();
        for (key, record) in &self.index {
            match record.trashed_at {
                Some(at) if expired(at, purge_ttl) => to_purge.push(key.clone()),
                None if expired(record.updated_at, trash_ttl) => to_trash.push(key.clone()),
                _ => {}
            }
        }

        for key in &to_trash {
            if let Some(record) = self.index.get_mut(key) {
                record.trashed_at = Some(now);
            }
        }
        for key in &to_purge {
            self.remove_files(&Key::parse(key)?)?;
            self.index.remove(key);
        }

        let outcome = MaintenanceOutcome {
            trashed: to_trash.len(),
            purged: to_purge.len(),
        };
        if outcome != MaintenanceOutcome::default() {
            self.persist()?;
            info!(?outcome, "maintenance finished");
        }
        Ok(outcome)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let tmp = self.base.join(format!("{INDEX_FILE}.tmp"));
        std::fs::write(&tmp, serde_json::to_vec_pretty(&self.index)?)?;
        std::fs::rename(&tmp, self.base.join(INDEX_FILE))?;
        Ok(())
    }

    fn record_mut(&mut self, key: &Key) -> Result<&mut Record, StoreError> {
        self.index
            .get_mut(key.as_str())
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    fn blob_dir(&self, key: &Key) -> PathBuf {
        self.base.join("blobs").join(key.hash())
    }

    fn remove_files(&self, key: &Key) -> Result<(), StoreError> {
        let content = self.content_path(key);
        if content.exists() {
            std::fs::remove_file(content)?;
        }
        let blobs = self.blob_dir(key);
        if blobs.exists() {
            std::fs::remove_dir_all(blobs)?;
        }
        Ok(())
    }
}

impl Store for FsStore {
    fn search(&self, query: &str, limit: usize) -> SearchOutcome {
        let needle = query.trim().to_lowercase();
        let mut active: Vec<(&String, &Record)> = Vec::new();
        let mut trashed: Vec<(&String, &Record)> = Vec::new();

        for (key, record) in &self.index {
            if !key.to_lowercase().contains(&needle) {
                continue;
            }
            if record.trashed_at.is_some() {
                trashed.push((key, record));
            } else {
                active.push((key, record));
            }
        }
        // Most recently used first.
        active.sort_by(|a, b| b.1.updated_at.cmp(&a.1.updated_at));
        trashed.sort_by(|a, b| b.1.trashed_at.cmp(&a.1.trashed_at));

        let exact_match = match self.index.get(query.trim()) {
            Some(record) if record.trashed_at.is_some() => ExactMatch::Trashed,
            Some(_) => ExactMatch::Active,
            None => ExactMatch::None,
        };

        let names = |hits: Vec<(&String, &Record)>| -> Vec<String> {
            hits.into_iter().take(limit).map(|(k, _)| k.clone()).collect()
        };
        SearchOutcome {
            active: names(active),
            trashed: names(trashed),
            exact_match,
        }
    }

    fn get(&self, key: &Key) -> Option<Entry> {
        self.index.get(key.as_str()).map(|record| Entry {
            key: key.clone(),
            trashed: record.trashed_at.is_some(),
            attachments: record.attachments.clone(),
        })
    }

    fn create(&mut self, key: &Key, now: SystemTime) -> Result<(), StoreError> {
        if self.index.contains_key(key.as_str()) {
            return Err(StoreError::KeyAlreadyExists(key.to_string()));
        }
        std::fs::File::create(self.content_path(key))?;
        self.index.insert(
            key.to_string(),
            Record {
                created_at: now,
                updated_at: now,
                trashed_at: None,
                attachments: Vec::new(),
            },
        );
        self.persist()?;
        debug!(%key, "key created");
        Ok(())
    }

    fn content_path(&self, key: &Key) -> PathBuf {
        self.base.join("content").join(key.hash()).with_extension("md")
    }

    fn touch(&mut self, key: &Key, now: SystemTime) -> Result<(), StoreError> {
        self.record_mut(key)?.updated_at = now;
        self.persist()
    }

    fn rename(&mut self, old: &Key, new: &Key, now: SystemTime) -> Result<(), StoreError> {
        if self.index.contains_key(new.as_str()) {
            return Err(StoreError::KeyAlreadyExists(new.to_string()));
        }
        let mut record = self
            .index
            .remove(old.as_str())
            .ok_or_else(|| StoreError::KeyNotFound(old.to_string()))?;

        let old_content = self.content_path(old);
        if old_content.exists() {
            std::fs::rename(old_content, self.content_path(new))?;
        }
        let old_blobs = self.blob_dir(old);
        if old_blobs.exists() {
            std::fs::rename(old_blobs, self.blob_dir(new))?;
        }

        record.updated_at = now;
        self.index.insert(new.to_string(), record);
        self.persist()
    }

    fn trash(&mut self, key: &Key, now: SystemTime) -> Result<(), StoreError> {
        self.record_mut(key)?.trashed_at = Some(now);
        self.persist()
    }

    fn restore(&mut self, key: &Key, now: SystemTime) -> Result<(), StoreError> {
        let record = self.record_mut(key)?;
        record.trashed_at = None;
        record.updated_at = now;
        self.persist()
    }

    fn purge(&mut self, key: &Key) -> Result<(), StoreError> {
        if self.index.remove(key.as_str()).is_none() {
            return Err(StoreError::KeyNotFound(key.to_string()));
        }
        self.remove_files(key)?;
        self.persist()
    }

    fn add_attachments(
        &mut self,
        key: &Key,
        files: Vec<(PathBuf, String)>,
        now: SystemTime,
    ) -> Result<(), StoreError> {
        if !self.index.contains_key(key.as_str()) {
            return Err(StoreError::KeyNotFound(key.to_string()));
        }
        // The whole batch is checked before anything is copied.
        let mut planned = Vec::with_capacity(files.len());
        for (source, filename) in files {
            let target = self.attachment_path(key, &filename)?;
            let metadata = std::fs::metadata(&source)
                .map_err(|_| StoreError::AttachmentNotFound(source.clone()))?;
            if !metadata.is_file() {
                return Err(StoreError::NotAFile(source));
            }
            planned.push((source, target, filename));
        }
        std::fs::create_dir_all(self.blob_dir(key))?;

        let mut added = Vec::with_capacity(planned.len());
        let mut failed = None;
        for (source, target, filename) in planned {
            match std::fs::copy(&source, &target) {
                Ok(size) => added.push(Attachment { filename, size }),
                Err(e) => {
                    failed = Some(e);
                    break;
                }
            }
        }

        // Files copied before a failure stay indexed.
        let record = self.record_mut(key)?;
        if !added.is_empty() {
            record.updated_at = now;
        }
        for attachment in added {
            // Overwrite replaces the entry in place.
            record
                .attachments
                .retain(|existing| existing.filename != attachment.filename);
            record.attachments.push(attachment);
        }
        self.persist()?;
        match failed {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn remove_attachment(&mut self, key: &Key, filename: &str, now: SystemTime) -> Result<(), StoreError> {
        let path = self.attachment_path(key, filename)?;
        let record = self.record_mut(key)?;
        let before = record.attachments.len();
        record.attachments.retain(|a| a.filename != filename);
        if record.attachments.len() == before {
            return Err(StoreError::AttachmentNotFound(path));
        }
        record.updated_at = now;
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        self.persist()
    }

    fn attachment_path(&self, key: &Key, filename: &str) -> Result<PathBuf, StoreError> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == filename => Ok(self.blob_dir(key).join(name)),
            _ => Err(StoreError::InvalidFilename(filename.to_string())),
        }
    }

    fn thumbnail_url(&self, key: &Key, filename: &str) -> Option<String> {
        let extension = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
        if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return None;
        }
        Some(format!(
            "https://{DATA_HOST}/blobs/{}/{}",
            key.hash(),
            utf8_percent_encode(filename, NON_ALPHANUMERIC)
        ))
    }
}
