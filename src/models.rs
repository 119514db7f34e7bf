use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PortalError, Result};
use crate::slug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub slug: String,
}

impl Branch {
    pub fn new(name: String, short_name: String) -> Self {
        let slug = slug::branch_slug(&name);
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            short_name,
            slug,
        }
    }

    /// Applies an update, regenerating the slug only when the name actually
    /// changed. Renames therefore change the branch's public URL.
    pub fn apply(&mut self, update: UpdateBranchRequest) {
        if let Some(name) = update.name {
            if name != self.name {
                self.slug = slug::branch_slug(&name);
                self.name = name;
            }
        }
        if let Some(short_name) = update.short_name {
            self.short_name = short_name;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub course_code: String,
    pub branches: Vec<String>,
    pub is_global: bool,
    pub slug: String,
}

impl Subject {
    pub fn new(name: String, course_code: String, branches: Vec<String>, is_global: bool) -> Self {
        let slug = slug::subject_slug(&name, &course_code);
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            course_code,
            branches,
            is_global,
            slug,
        }
    }

    /// Slug is derived from name and course code together, so a change to
    /// either regenerates it; nothing else does.
    pub fn apply(&mut self, update: UpdateSubjectRequest) {
        let mut renamed = false;
        if let Some(name) = update.name {
            renamed |= name != self.name;
            self.name = name;
        }
        if let Some(course_code) = update.course_code {
            renamed |= course_code != self.course_code;
            self.course_code = course_code;
        }
        if renamed {
            self.slug = slug::subject_slug(&self.name, &self.course_code);
        }
        if let Some(branches) = update.branches {
            self.branches = branches;
        }
        if let Some(is_global) = update.is_global {
            self.is_global = is_global;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: String,
    pub file_name: String,
    pub drive_file_id: String,
    pub file_url: String,
    pub relative_path: String,
    pub file_type: String,
    pub file_size: String,
    pub upload_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub subject: String,
    pub likes: u64,
    pub slug: String,
}

impl File {
    pub fn new(req: CreateFileRequest) -> Self {
        let now = Utc::now();
        let slug = slug::file_slug(&req.file_name, now.timestamp_millis());
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: req.file_name,
            drive_file_id: req.drive_file_id,
            file_url: req.file_url,
            relative_path: req.relative_path,
            file_type: req.file_type,
            file_size: req.file_size,
            upload_date: now,
            description: req.description,
            subject: req.subject,
            likes: 0,
            slug,
        }
    }

    pub fn apply(&mut self, update: UpdateFileRequest) {
        if let Some(file_name) = update.file_name {
            if file_name != self.file_name {
                self.slug = slug::file_slug(&file_name, Utc::now().timestamp_millis());
                self.file_name = file_name;
            }
        }
        if let Some(drive_file_id) = update.drive_file_id {
            self.drive_file_id = drive_file_id;
        }
        if let Some(file_url) = update.file_url {
            self.file_url = file_url;
        }
        if let Some(relative_path) = update.relative_path {
            self.relative_path = relative_path;
        }
        if let Some(file_type) = update.file_type {
            self.file_type = file_type;
        }
        if let Some(file_size) = update.file_size {
            self.file_size = file_size;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(subject) = update.subject {
            self.subject = subject;
        }
    }
}

/// Reference to a catalog entity by id or by slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Id(String),
    Slug(String),
}

/// Which subjects a caller wants. Exactly one selector; validated once here
/// instead of being re-inspected in every handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectSelector {
    ByBranchId(String),
    ByBranchSlug(String),
    Global,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectQuery {
    pub branch_id: Option<String>,
    pub branch_slug: Option<String>,
    pub global: Option<String>,
}

impl SubjectQuery {
    pub fn selector(self) -> Result<SubjectSelector> {
        let global = self.global.as_deref() == Some("true");
        let supplied = usize::from(self.branch_id.is_some())
            + usize::from(self.branch_slug.is_some())
            + usize::from(global);
        if supplied > 1 {
            return Err(PortalError::Validation(
                "Supply exactly one of branchId, branchSlug or global=true".to_string(),
            ));
        }

        if let Some(id) = self.branch_id {
            Ok(SubjectSelector::ByBranchId(id))
        } else if let Some(slug) = self.branch_slug {
            Ok(SubjectSelector::ByBranchSlug(slug))
        } else if global {
            Ok(SubjectSelector::Global)
        } else {
            Err(PortalError::Validation(
                "A branchId, branchSlug or global=true query parameter is required".to_string(),
            ))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesQuery {
    pub subject_id: Option<String>,
    pub subject_slug: Option<String>,
}

impl FilesQuery {
    pub fn subject_ref(self) -> Result<EntityRef> {
        if let Some(id) = self.subject_id {
            Ok(EntityRef::Id(id))
        } else if let Some(slug) = self.subject_slug {
            Ok(EntityRef::Slug(slug))
        } else {
            Err(PortalError::Validation("Subject ID or Slug is required".to_string()))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DetailsQuery {
    pub slug: Option<String>,
    pub id: Option<String>,
}

impl DetailsQuery {
    pub fn entity_ref(self) -> Option<EntityRef> {
        if let Some(slug) = self.slug {
            Some(EntityRef::Slug(slug))
        } else {
            self.id.map(EntityRef::Id)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBranchRequest {
    pub name: String,
    pub short_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBranchRequest {
    pub name: Option<String>,
    pub short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubjectRequest {
    pub name: String,
    pub course_code: String,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub is_global: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubjectRequest {
    pub name: Option<String>,
    pub course_code: Option<String>,
    pub branches: Option<Vec<String>>,
    pub is_global: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileRequest {
    pub file_name: String,
    pub drive_file_id: String,
    pub file_url: String,
    pub relative_path: String,
    pub file_type: String,
    pub file_size: String,
    pub description: Option<String>,
    pub subject: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    pub file_name: Option<String>,
    pub drive_file_id: Option<String>,
    pub file_url: Option<String>,
    pub relative_path: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LikesResponse {
    pub likes: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub branch: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSummary {
    pub id: String,
    pub name: String,
    pub slug: String,
}

/// A search result: the matching file joined with its subject and the names
/// of the branches that subject belongs to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(flatten)]
    pub file: File,
    pub subject_details: SubjectSummary,
    pub branch_details: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_rename_regenerates_slug() {
        let mut branch = Branch::new("Computer Science and Technology".into(), "CST".into());
        assert_eq!(branch.slug, "computer-science-and-technology");

        branch.apply(UpdateBranchRequest {
            name: Some("Information Technology".into()),
            short_name: None,
        });
        assert_eq!(branch.slug, "information-technology");
    }

    #[test]
    fn branch_update_without_rename_keeps_slug() {
        let mut branch = Branch::new("Computer Science and Technology".into(), "CST".into());
        let original_slug = branch.slug.clone();

        branch.apply(UpdateBranchRequest {
            name: None,
            short_name: Some("CSE".into()),
        });
        assert_eq!(branch.slug, original_slug);
        assert_eq!(branch.short_name, "CSE");

        // Re-submitting the identical name must not touch the slug either.
        branch.apply(UpdateBranchRequest {
            name: Some("Computer Science and Technology".into()),
            short_name: None,
        });
        assert_eq!(branch.slug, original_slug);
    }

    #[test]
    fn subject_slug_tracks_name_and_course_code() {
        let mut subject =
            Subject::new("Engineering Chemistry".into(), "CH 1101 N".into(), vec![], false);
        assert_eq!(subject.slug, "engineering-chemistry-ch-1101-n");

        subject.apply(UpdateSubjectRequest {
            course_code: Some("CH 1102".into()),
            ..Default::default()
        });
        assert_eq!(subject.slug, "engineering-chemistry-ch-1102");

        let slug_before = subject.slug.clone();
        subject.apply(UpdateSubjectRequest {
            is_global: Some(true),
            ..Default::default()
        });
        assert_eq!(subject.slug, slug_before);
    }

    #[test]
    fn subject_selector_requires_exactly_one() {
        assert!(SubjectQuery::default().selector().is_err());

        let both = SubjectQuery {
            branch_id: Some("abc".into()),
            global: Some("true".into()),
            ..Default::default()
        };
        assert!(both.selector().is_err());

        let by_slug = SubjectQuery {
            branch_slug: Some("cst".into()),
            ..Default::default()
        };
        assert_eq!(
            by_slug.selector().unwrap(),
            SubjectSelector::ByBranchSlug("cst".into())
        );

        // global must be the literal string "true", matching the query
        // parameter the client has always sent.
        let global_false = SubjectQuery {
            global: Some("false".into()),
            ..Default::default()
        };
        assert!(global_false.selector().is_err());
    }

    #[test]
    fn file_rename_regenerates_slug_with_fresh_timestamp() {
        let mut file = File::new(CreateFileRequest {
            file_name: "Unit 1 Notes.pdf".into(),
            drive_file_id: "drive-1".into(),
            file_url: "https://example.com/f".into(),
            relative_path: "Chem/Unit 1/Unit 1 Notes.pdf".into(),
            file_type: "PDF".into(),
            file_size: "1.00 MB".into(),
            description: None,
            subject: "subj-1".into(),
        });
        assert!(file.slug.starts_with("unit-1-notes-pdf-"));

        let old_slug = file.slug.clone();
        file.apply(UpdateFileRequest {
            description: Some("Handwritten".into()),
            ..Default::default()
        });
        assert_eq!(file.slug, old_slug);

        file.apply(UpdateFileRequest {
            file_name: Some("Unit 1 Notes v2.pdf".into()),
            ..Default::default()
        });
        assert!(file.slug.starts_with("unit-1-notes-v2-pdf-"));
    }
}
