use serde::Serialize;

use crate::models::File;
use crate::pyq::StaticFileRecord;

/// A file served to the client: either a live catalog document or a static
/// record from the pre-generated PYQ index. Serialized untagged so both
/// origins look the same to the grouping consumer.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CatalogEntry {
    Live(File),
    Static(StaticFileRecord),
}

impl CatalogEntry {
    pub fn relative_path(&self) -> &str {
        match self {
            CatalogEntry::Live(f) => &f.relative_path,
            CatalogEntry::Static(f) => &f.relative_path,
        }
    }
}

/// One display bucket: the sub-folder label and its files, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct FileGroup<T> {
    pub name: String,
    pub files: Vec<T>,
}

/// Concatenates live files with a subject's static PYQ records, statics
/// last, ready for grouping. Both origins flow through the same pass.
pub fn merge_with_static(files: Vec<File>, statics: Option<&[StaticFileRecord]>) -> Vec<CatalogEntry> {
    let mut entries: Vec<CatalogEntry> = files.into_iter().map(CatalogEntry::Live).collect();
    if let Some(records) = statics {
        entries.extend(records.iter().cloned().map(CatalogEntry::Static));
    }
    entries
}

/// Derives the display group for a file's `relativePath`: drop the first
/// segment (the subject folder) and the last (the file name itself), join
/// the rest. An empty remainder is the literal group `"Root"`, which also
/// covers bare one-segment paths.
pub fn subfolder_label(relative_path: &str) -> String {
    let parts: Vec<&str> = relative_path.split('/').collect();
    let label = if parts.len() > 2 {
        parts[1..parts.len() - 1].join("/")
    } else {
        String::new()
    };

    if label.is_empty() {
        "Root".to_string()
    } else {
        label
    }
}

/// Buckets files by sub-folder in a single pass. Groups appear in
/// first-seen order and members keep their input order, so the caller's
/// `relativePath`-sorted input yields a deterministic layout.
pub fn group_by_subfolder<T, F>(items: Vec<T>, relative_path: F) -> Vec<FileGroup<T>>
where
    F: Fn(&T) -> &str,
{
    let mut groups: Vec<FileGroup<T>> = Vec::new();

    for item in items {
        let label = subfolder_label(relative_path(&item));
        match groups.iter_mut().find(|g| g.name == label) {
            Some(group) => group.files.push(item),
            None => groups.push(FileGroup {
                name: label,
                files: vec![item],
            }),
        }
    }

    groups
}
