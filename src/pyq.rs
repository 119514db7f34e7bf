use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::slug;

/// A previous-year-question record emitted by the offline index generator.
/// Field names mirror live file query results so the grouping step never has
/// to care where a file came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticFileRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    pub file_size: String,
    pub likes: u64,
    pub is_static: bool,
    pub subject_name: String,
    pub year: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub relative_path: String,
}

/// The generated artifact: subject slug to its static records. BTreeMap so
/// the emitted JSON is stable across runs.
pub type PyqIndex = BTreeMap<String, Vec<StaticFileRecord>>;

/// Derives the subject slug for a top-level folder named
/// `"<Subject Name> (<Code>)"`, key-aligned with live Subject slugs. A folder
/// that does not match the convention is slugified whole.
pub fn subject_folder_slug(folder: &str) -> String {
    if let Some(stripped) = folder.strip_suffix(')') {
        if let Some(split) = stripped.rfind(" (") {
            let name = &stripped[..split];
            let code = &stripped[split + 2..];
            return slug::subject_slug(name, code);
        }
    }
    slug::slugify(folder)
}

/// Extracts `(year, exam kind)` from the `<year>_<Mid|End>_Sem_<rest>.pdf`
/// naming convention. Anything else yields empty strings.
pub fn parse_exam_file_name(file_name: &str) -> (String, String) {
    let stem = file_name.strip_suffix(".pdf").unwrap_or(file_name);
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 3 {
        return (String::new(), String::new());
    }

    let kind = match (parts[1], parts[2]) {
        ("Mid", "Sem") => "Mid Sem",
        ("End", "Sem") => "End Sem",
        _ => "",
    };
    (parts[0].to_string(), kind.to_string())
}

pub fn format_file_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Builds the record for one scanned file. The relative path nests statics
/// under `"Question Papers/<kind>"` so grouping buckets them by exam kind.
pub fn build_record(folder: &str, file_name: &str, size_bytes: u64) -> StaticFileRecord {
    let subject_slug = subject_folder_slug(folder);
    let (year, kind) = parse_exam_file_name(file_name);
    let bucket = if kind.is_empty() { "General" } else { &kind };

    StaticFileRecord {
        id: format!("static-{}-{}", subject_slug, file_name),
        file_name: file_name.to_string(),
        file_url: format!("/question-papers/{}/{}", folder, file_name),
        file_type: "PDF".to_string(),
        file_size: format_file_size(size_bytes),
        likes: 0,
        is_static: true,
        subject_name: folder.to_string(),
        year,
        relative_path: format!("/Question Papers/{}/{}", bucket, file_name),
        kind,
    }
}

/// Loads a generated index from disk. A missing file means no static
/// records, not an error.
pub fn load_index(path: &Path) -> Result<PyqIndex> {
    if !path.exists() {
        return Ok(PyqIndex::new());
    }
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read PYQ index {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse PYQ index {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_slug_aligns_with_subject_slug() {
        assert_eq!(
            subject_folder_slug("Engineering Chemistry (CH 1101 N)"),
            "engineering-chemistry-ch-1101-n"
        );
    }

    #[test]
    fn folder_without_code_falls_back_to_plain_slug() {
        assert_eq!(subject_folder_slug("Question Papers"), "question-papers");
    }

    #[test]
    fn mid_sem_file_name_parses() {
        let (year, kind) = parse_exam_file_name("2021_Mid_Sem_Chemistry.pdf");
        assert_eq!(year, "2021");
        assert_eq!(kind, "Mid Sem");
    }

    #[test]
    fn end_sem_file_name_parses() {
        let (year, kind) = parse_exam_file_name("2023_End_Sem_Basic_Electrical_Engineering.pdf");
        assert_eq!(year, "2023");
        assert_eq!(kind, "End Sem");
    }

    #[test]
    fn unconventional_file_name_yields_empty_metadata() {
        assert_eq!(parse_exam_file_name("notes.pdf"), (String::new(), String::new()));
        let (year, kind) = parse_exam_file_name("2020_Tutorial_Sheet.pdf");
        assert_eq!(year, "2020");
        assert_eq!(kind, "");
    }

    #[test]
    fn record_mirrors_live_file_shape() {
        let record = build_record("Engineering Chemistry (CH 1101 N)", "2021_Mid_Sem_Chemistry.pdf", 2_621_440);
        assert_eq!(
            record.id,
            "static-engineering-chemistry-ch-1101-n-2021_Mid_Sem_Chemistry.pdf"
        );
        assert_eq!(record.year, "2021");
        assert_eq!(record.kind, "Mid Sem");
        assert_eq!(record.file_size, "2.50 MB");
        assert!(record.is_static);
        assert_eq!(
            record.relative_path,
            "/Question Papers/Mid Sem/2021_Mid_Sem_Chemistry.pdf"
        );
        assert_eq!(
            record.file_url,
            "/question-papers/Engineering Chemistry (CH 1101 N)/2021_Mid_Sem_Chemistry.pdf"
        );
    }

    #[test]
    fn record_without_kind_lands_in_general() {
        let record = build_record("Engineering Chemistry (CH 1101 N)", "syllabus.pdf", 1024);
        assert_eq!(record.relative_path, "/Question Papers/General/syllabus.pdf");
        assert_eq!(record.kind, "");
    }
}
