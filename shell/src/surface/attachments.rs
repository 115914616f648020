//! Attachment batches and filename conflicts.

use std::collections::HashSet;
use std::path::Path;

use tracing::warn;

use crate::bridge::messages::AttachmentInfo;
use crate::state::{ConflictBatch, ConflictItem, Resolution};

/// Builds the batch for `sources` against the key's current attachments.
///
/// Names that collide with an existing attachment are marked conflicting and
/// wait for a resolution. Names repeated only inside the batch are renamed
/// right away.
pub fn plan_batch(key: &str, sources: &[String], existing: &[AttachmentInfo]) -> ConflictBatch {
    let existing: HashSet<&str> = existing.iter().map(|a| a.filename.as_str()).collect();
    let mut taken: HashSet<String> = existing.iter().map(|name| name.to_string()).collect();
    let mut items = Vec::with_capacity(sources.len());

    for source in sources {
        let Some(name) = file_name(source) else {
            warn!(source = %source, "skipping path without a file name");
            continue;
        };
        let conflicting = existing.contains(name.as_str());
        let filename = if conflicting {
            name
        } else if taken.contains(&name) {
            unique_name(&name, &taken)
        } else {
            name
        };
        taken.insert(filename.clone());
        items.push(ConflictItem {
            source: source.clone(),
            filename,
            resolution: None,
            conflicting,
        });
    }

    ConflictBatch {
        key: key.to_string(),
        items,
    }
}

/// Turns a fully resolved batch into `(source, target filename)` pairs.
///
/// Returns `None` while any conflicting item lacks a resolution.
pub fn finalize(batch: &ConflictBatch, existing: &[AttachmentInfo]) -> Option<Vec<(String, String)>> {
    if batch.unresolved() > 0 {
        return None;
    }

    let mut taken: HashSet<String> = existing.iter().map(|a| a.filename.clone()).collect();
    // Names already claimed by non-conflicting items of this batch.
    taken.extend(
        batch
            .items
            .iter()
            .filter(|item| !item.conflicting)
            .map(|item| item.filename.clone()),
    );
    let mut overwritten = HashSet::new();

    let mut files = Vec::with_capacity(batch.items.len());
    for item in &batch.items {
        let target = match (item.conflicting, &item.resolution) {
            (false, _) => item.filename.clone(),
            (true, Some(Resolution::Skip)) => continue,
            (true, Some(Resolution::Overwrite)) if overwritten.insert(item.filename.clone()) => {
                item.filename.clone()
            }
            (true, _) => {
                let name = unique_name(&item.filename, &taken);
                taken.insert(name.clone());
                name
            }
        };
        files.push((item.source.clone(), target));
    }
    Some(files)
}

/// First `stem (n).ext` not in `taken`, counting from 1.
pub fn unique_name(name: &str, taken: &HashSet<String>) -> String {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

    (1u32..)
        .map(|n| match &extension {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        })
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

fn file_name(source: &str) -> Option<String> {
    // Paths come from Windows even when tests run elsewhere.
    let name = source.rsplit(['/', '\\']).next()?;
    (!name.is_empty()).then(|| name.to_string())
}
