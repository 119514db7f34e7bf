use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{PortalError, Result};
use crate::models::{
    Branch, CreateBranchRequest, CreateFileRequest, CreateSubjectRequest, EntityRef, File,
    SearchHit, Subject, SubjectSelector, SubjectSummary, UpdateBranchRequest, UpdateFileRequest,
    UpdateSubjectRequest,
};

const BRANCHES_FILE: &str = "branches.json";
const SUBJECTS_FILE: &str = "subjects.json";
const FILES_FILE: &str = "files.json";

pub(crate) fn load_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if path.exists() {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    } else {
        Ok(Vec::new())
    }
}

pub(crate) fn save_collection<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let json = serde_json::to_string_pretty(items)?;
    fs::write(path, json)?;
    Ok(())
}

/// The shared catalog: branches, subjects and files, each persisted as a
/// JSON document collection under the data directory.
///
/// Lock order is branches, then subjects, then files; every method that
/// touches more than one collection acquires in that order.
pub struct CatalogStorage {
    branches_path: PathBuf,
    subjects_path: PathBuf,
    files_path: PathBuf,
    branches: RwLock<Vec<Branch>>,
    subjects: RwLock<Vec<Subject>>,
    files: RwLock<Vec<File>>,
}

impl CatalogStorage {
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let branches_path = data_dir.join(BRANCHES_FILE);
        let subjects_path = data_dir.join(SUBJECTS_FILE);
        let files_path = data_dir.join(FILES_FILE);

        Ok(Self {
            branches: RwLock::new(load_collection(&branches_path)?),
            subjects: RwLock::new(load_collection(&subjects_path)?),
            files: RwLock::new(load_collection(&files_path)?),
            branches_path,
            subjects_path,
            files_path,
        })
    }

    pub async fn list_branches(&self) -> Result<Vec<Branch>> {
        let branches = self.branches.read().await;
        Ok(branches.clone())
    }

    pub async fn find_branch(&self, entity: &EntityRef) -> Result<Option<Branch>> {
        let branches = self.branches.read().await;
        Ok(branches.iter().find(|b| entity_matches(entity, &b.id, &b.slug)).cloned())
    }

    pub async fn create_branch(&self, req: CreateBranchRequest) -> Result<Branch> {
        let name = req.name.trim().to_string();
        let short_name = req.short_name.trim().to_string();
        if name.is_empty() || short_name.is_empty() {
            return Err(PortalError::Validation(
                "Branch name and shortName are required".to_string(),
            ));
        }

        let branch = Branch::new(name, short_name);
        let mut branches = self.branches.write().await;
        ensure_branch_unique(&branches, &branch, None)?;
        branches.push(branch.clone());
        save_collection(&self.branches_path, &branches)?;
        Ok(branch)
    }

    pub async fn update_branch(&self, id: &str, update: UpdateBranchRequest) -> Result<Branch> {
        let mut branches = self.branches.write().await;
        let index = branches
            .iter()
            .position(|b| b.id == id)
            .ok_or(PortalError::NotFound("Branch"))?;

        let mut updated = branches[index].clone();
        updated.apply(update);
        ensure_branch_unique(&branches, &updated, Some(id))?;

        branches[index] = updated.clone();
        save_collection(&self.branches_path, &branches)?;
        Ok(updated)
    }

    /// Deleting a branch that subjects still reference is rejected rather
    /// than leaving dangling ids behind.
    pub async fn delete_branch(&self, id: &str) -> Result<()> {
        let mut branches = self.branches.write().await;
        let index = branches
            .iter()
            .position(|b| b.id == id)
            .ok_or(PortalError::NotFound("Branch"))?;

        let subjects = self.subjects.read().await;
        if subjects.iter().any(|s| s.branches.iter().any(|b| b == id)) {
            return Err(PortalError::Validation(
                "Branch is still referenced by one or more subjects".to_string(),
            ));
        }
        drop(subjects);

        branches.remove(index);
        save_collection(&self.branches_path, &branches)?;
        Ok(())
    }

    pub async fn list_subjects(&self, selector: &SubjectSelector) -> Result<Vec<Subject>> {
        let branch_id = match selector {
            SubjectSelector::ByBranchId(id) => Some(id.clone()),
            SubjectSelector::ByBranchSlug(slug) => {
                let branch = self
                    .find_branch(&EntityRef::Slug(slug.clone()))
                    .await?
                    .ok_or(PortalError::NotFound("Branch"))?;
                Some(branch.id)
            }
            SubjectSelector::Global => None,
        };

        let subjects = self.subjects.read().await;
        let selected = subjects
            .iter()
            .filter(|s| match &branch_id {
                Some(id) => s.branches.iter().any(|b| b == id),
                None => s.is_global,
            })
            .cloned()
            .collect();
        Ok(selected)
    }

    pub async fn find_subject(&self, entity: &EntityRef) -> Result<Option<Subject>> {
        let subjects = self.subjects.read().await;
        Ok(subjects.iter().find(|s| entity_matches(entity, &s.id, &s.slug)).cloned())
    }

    pub async fn create_subject(&self, req: CreateSubjectRequest) -> Result<Subject> {
        let name = req.name.trim().to_string();
        let course_code = req.course_code.trim().to_string();
        if name.is_empty() || course_code.is_empty() {
            return Err(PortalError::Validation(
                "Subject name and courseCode are required".to_string(),
            ));
        }

        let branches = self.branches.read().await;
        ensure_branches_exist(&branches, &req.branches)?;
        drop(branches);

        let subject = Subject::new(name, course_code, req.branches, req.is_global);
        let mut subjects = self.subjects.write().await;
        ensure_subject_unique(&subjects, &subject, None)?;
        subjects.push(subject.clone());
        save_collection(&self.subjects_path, &subjects)?;
        Ok(subject)
    }

    pub async fn update_subject(&self, id: &str, update: UpdateSubjectRequest) -> Result<Subject> {
        if let Some(branch_ids) = &update.branches {
            let branches = self.branches.read().await;
            ensure_branches_exist(&branches, branch_ids)?;
        }

        let mut subjects = self.subjects.write().await;
        let index = subjects
            .iter()
            .position(|s| s.id == id)
            .ok_or(PortalError::NotFound("Subject"))?;

        let mut updated = subjects[index].clone();
        updated.apply(update);
        ensure_subject_unique(&subjects, &updated, Some(id))?;

        subjects[index] = updated.clone();
        save_collection(&self.subjects_path, &subjects)?;
        Ok(updated)
    }

    pub async fn delete_subject(&self, id: &str) -> Result<()> {
        let mut subjects = self.subjects.write().await;
        let index = subjects
            .iter()
            .position(|s| s.id == id)
            .ok_or(PortalError::NotFound("Subject"))?;

        let files = self.files.read().await;
        if files.iter().any(|f| f.subject == id) {
            return Err(PortalError::Validation(
                "Subject still has files attached".to_string(),
            ));
        }
        drop(files);

        subjects.remove(index);
        save_collection(&self.subjects_path, &subjects)?;
        Ok(())
    }

    /// Files of one subject, sorted lexicographically by `relativePath`.
    /// The ordering is load-bearing: it keeps files of the same sub-folder
    /// contiguous for the grouping step.
    pub async fn list_files(&self, subject: &EntityRef) -> Result<Vec<File>> {
        let subject_id = match subject {
            EntityRef::Id(id) => id.clone(),
            EntityRef::Slug(slug) => {
                self.find_subject(&EntityRef::Slug(slug.clone()))
                    .await?
                    .ok_or(PortalError::NotFound("Subject"))?
                    .id
            }
        };

        let files = self.files.read().await;
        let mut selected: Vec<File> = files.iter().filter(|f| f.subject == subject_id).cloned().collect();
        selected.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(selected)
    }

    pub async fn get_file(&self, id: &str) -> Result<Option<File>> {
        let files = self.files.read().await;
        Ok(files.iter().find(|f| f.id == id).cloned())
    }

    /// Resolves ids to documents, keeping input order and skipping ids that
    /// no longer exist.
    pub async fn files_by_ids(&self, ids: &[String]) -> Result<Vec<File>> {
        let files = self.files.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| files.iter().find(|f| &f.id == id).cloned())
            .collect())
    }

    pub async fn create_file(&self, req: CreateFileRequest) -> Result<File> {
        if req.file_name.trim().is_empty() || req.relative_path.trim().is_empty() {
            return Err(PortalError::Validation(
                "File fileName and relativePath are required".to_string(),
            ));
        }

        let subjects = self.subjects.read().await;
        if !subjects.iter().any(|s| s.id == req.subject) {
            return Err(PortalError::Validation(format!(
                "Unknown subject id: {}",
                req.subject
            )));
        }
        drop(subjects);

        let file = File::new(req);
        let mut files = self.files.write().await;
        files.push(file.clone());
        save_collection(&self.files_path, &files)?;
        Ok(file)
    }

    pub async fn update_file(&self, id: &str, update: UpdateFileRequest) -> Result<File> {
        if let Some(subject_id) = &update.subject {
            let subjects = self.subjects.read().await;
            if !subjects.iter().any(|s| &s.id == subject_id) {
                return Err(PortalError::Validation(format!(
                    "Unknown subject id: {}",
                    subject_id
                )));
            }
        }

        let mut files = self.files.write().await;
        let file = files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or(PortalError::NotFound("File"))?;
        file.apply(update);
        let updated = file.clone();
        save_collection(&self.files_path, &files)?;
        Ok(updated)
    }

    pub async fn delete_file(&self, id: &str) -> Result<()> {
        let mut files = self.files.write().await;
        let index = files
            .iter()
            .position(|f| f.id == id)
            .ok_or(PortalError::NotFound("File"))?;
        files.remove(index);
        save_collection(&self.files_path, &files)?;
        Ok(())
    }

    /// Atomic increment: the write lock makes concurrent likes serialize,
    /// so none are lost.
    pub async fn like_file(&self, id: &str) -> Result<u64> {
        let mut files = self.files.write().await;
        let file = files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or(PortalError::NotFound("File"))?;
        file.likes += 1;
        let likes = file.likes;
        save_collection(&self.files_path, &files)?;
        Ok(likes)
    }

    /// Atomic decrement, clamped so the counter never goes below zero.
    pub async fn unlike_file(&self, id: &str) -> Result<u64> {
        let mut files = self.files.write().await;
        let file = files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or(PortalError::NotFound("File"))?;
        file.likes = file.likes.saturating_sub(1);
        let likes = file.likes;
        save_collection(&self.files_path, &files)?;
        Ok(likes)
    }

    /// Case-insensitive substring search on file names, each hit joined
    /// with its subject and that subject's branch names. Optional id
    /// filters narrow by subject or by branch membership.
    pub async fn search(
        &self,
        query: &str,
        branch_filter: Option<&str>,
        subject_filter: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let needle = query.to_lowercase();
        let branches = self.branches.read().await;
        let subjects = self.subjects.read().await;
        let files = self.files.read().await;

        let mut hits = Vec::new();
        for file in files.iter() {
            if !file.file_name.to_lowercase().contains(&needle) {
                continue;
            }
            // Files whose subject no longer resolves drop out of results,
            // like documents lost in an inner join.
            let Some(subject) = subjects.iter().find(|s| s.id == file.subject) else {
                continue;
            };
            if let Some(wanted) = subject_filter {
                if subject.id != wanted {
                    continue;
                }
            }
            if let Some(wanted) = branch_filter {
                if !subject.branches.iter().any(|b| b == wanted) {
                    continue;
                }
            }

            let branch_names = subject
                .branches
                .iter()
                .filter_map(|id| branches.iter().find(|b| &b.id == id).map(|b| b.name.clone()))
                .collect();

            hits.push(SearchHit {
                file: file.clone(),
                subject_details: SubjectSummary {
                    id: subject.id.clone(),
                    name: subject.name.clone(),
                    slug: subject.slug.clone(),
                },
                branch_details: branch_names,
            });
        }
        Ok(hits)
    }
}

fn entity_matches(entity: &EntityRef, id: &str, slug: &str) -> bool {
    match entity {
        EntityRef::Id(wanted) => wanted == id,
        EntityRef::Slug(wanted) => wanted == slug,
    }
}

fn ensure_branch_unique(branches: &[Branch], candidate: &Branch, skip_id: Option<&str>) -> Result<()> {
    for other in branches.iter().filter(|b| Some(b.id.as_str()) != skip_id) {
        if other.short_name == candidate.short_name {
            return Err(PortalError::Validation(
                "A branch with that shortName already exists".to_string(),
            ));
        }
        if other.slug == candidate.slug {
            return Err(PortalError::Validation(
                "A branch with that name already exists".to_string(),
            ));
        }
    }
    Ok(())
}

fn ensure_subject_unique(subjects: &[Subject], candidate: &Subject, skip_id: Option<&str>) -> Result<()> {
    for other in subjects.iter().filter(|s| Some(s.id.as_str()) != skip_id) {
        if other.course_code == candidate.course_code {
            return Err(PortalError::Validation(
                "A subject with that courseCode already exists".to_string(),
            ));
        }
        if other.slug == candidate.slug {
            return Err(PortalError::Validation(
                "A subject with that name and courseCode already exists".to_string(),
            ));
        }
    }
    Ok(())
}

fn ensure_branches_exist(branches: &[Branch], ids: &[String]) -> Result<()> {
    for id in ids {
        if !branches.iter().any(|b| &b.id == id) {
            return Err(PortalError::Validation(format!("Unknown branch id: {}", id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn branch_req(name: &str, short_name: &str) -> CreateBranchRequest {
        CreateBranchRequest {
            name: name.into(),
            short_name: short_name.into(),
        }
    }

    fn subject_req(name: &str, code: &str, branches: Vec<String>) -> CreateSubjectRequest {
        CreateSubjectRequest {
            name: name.into(),
            course_code: code.into(),
            branches,
            is_global: false,
        }
    }

    fn file_req(name: &str, path: &str, subject: &str) -> CreateFileRequest {
        CreateFileRequest {
            file_name: name.into(),
            drive_file_id: "drive".into(),
            file_url: "https://example.com".into(),
            relative_path: path.into(),
            file_type: "PDF".into(),
            file_size: "1.00 MB".into(),
            description: None,
            subject: subject.into(),
        }
    }

    #[tokio::test]
    async fn duplicate_short_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CatalogStorage::new(dir.path()).unwrap();

        storage.create_branch(branch_req("Computer Science", "CS")).await.unwrap();
        let err = storage.create_branch(branch_req("Control Systems", "CS")).await;
        assert!(matches!(err, Err(PortalError::Validation(_))));
    }

    #[tokio::test]
    async fn files_come_back_sorted_by_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CatalogStorage::new(dir.path()).unwrap();
        let subject = storage.create_subject(subject_req("Chemistry", "CH 1101", vec![])).await.unwrap();

        for path in ["Chem/Unit 2/b.pdf", "Chem/Unit 1/a.pdf", "Chem/intro.pdf"] {
            storage.create_file(file_req("f.pdf", path, &subject.id)).await.unwrap();
        }

        let files = storage.list_files(&EntityRef::Slug(subject.slug.clone())).await.unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["Chem/Unit 1/a.pdf", "Chem/Unit 2/b.pdf", "Chem/intro.pdf"]
        );
    }

    #[tokio::test]
    async fn unknown_subject_slug_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CatalogStorage::new(dir.path()).unwrap();

        let err = storage.list_files(&EntityRef::Slug("missing".into())).await;
        assert!(matches!(err, Err(PortalError::NotFound("Subject"))));
    }

    #[tokio::test]
    async fn unlike_never_goes_below_zero() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CatalogStorage::new(dir.path()).unwrap();
        let subject = storage.create_subject(subject_req("Chemistry", "CH 1101", vec![])).await.unwrap();
        let file = storage.create_file(file_req("notes.pdf", "Chem/notes.pdf", &subject.id)).await.unwrap();

        assert_eq!(storage.like_file(&file.id).await.unwrap(), 1);
        assert_eq!(storage.unlike_file(&file.id).await.unwrap(), 0);
        assert_eq!(storage.unlike_file(&file.id).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_likes_are_all_counted() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(CatalogStorage::new(dir.path()).unwrap());
        let subject = storage.create_subject(subject_req("Chemistry", "CH 1101", vec![])).await.unwrap();
        let file = storage.create_file(file_req("notes.pdf", "Chem/notes.pdf", &subject.id)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let storage = storage.clone();
            let id = file.id.clone();
            handles.push(tokio::spawn(async move { storage.like_file(&id).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(storage.get_file(&file.id).await.unwrap().unwrap().likes, 16);
    }

    #[tokio::test]
    async fn referenced_branch_cannot_be_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CatalogStorage::new(dir.path()).unwrap();

        let branch = storage.create_branch(branch_req("Computer Science", "CS")).await.unwrap();
        storage
            .create_subject(subject_req("Algorithms", "CS 2201", vec![branch.id.clone()]))
            .await
            .unwrap();

        let err = storage.delete_branch(&branch.id).await;
        assert!(matches!(err, Err(PortalError::Validation(_))));
    }

    #[tokio::test]
    async fn subject_selectors_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CatalogStorage::new(dir.path()).unwrap();

        let branch = storage.create_branch(branch_req("Computer Science", "CS")).await.unwrap();
        storage
            .create_subject(subject_req("Algorithms", "CS 2201", vec![branch.id.clone()]))
            .await
            .unwrap();
        let mut global = subject_req("Syllabus", "GEN 0001", vec![]);
        global.is_global = true;
        storage.create_subject(global).await.unwrap();

        let by_id = storage
            .list_subjects(&SubjectSelector::ByBranchId(branch.id.clone()))
            .await
            .unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].name, "Algorithms");

        let by_slug = storage
            .list_subjects(&SubjectSelector::ByBranchSlug(branch.slug.clone()))
            .await
            .unwrap();
        assert_eq!(by_slug.len(), 1);

        let global = storage.list_subjects(&SubjectSelector::Global).await.unwrap();
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].name, "Syllabus");

        let missing = storage
            .list_subjects(&SubjectSelector::ByBranchSlug("nope".into()))
            .await;
        assert!(matches!(missing, Err(PortalError::NotFound("Branch"))));
    }

    #[tokio::test]
    async fn search_joins_subject_and_branches() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CatalogStorage::new(dir.path()).unwrap();

        let branch = storage.create_branch(branch_req("Computer Science", "CS")).await.unwrap();
        let other = storage.create_branch(branch_req("Mechanical", "ME")).await.unwrap();
        let subject = storage
            .create_subject(subject_req("Algorithms", "CS 2201", vec![branch.id.clone()]))
            .await
            .unwrap();
        storage
            .create_file(file_req("Sorting Notes.pdf", "Algo/Sorting Notes.pdf", &subject.id))
            .await
            .unwrap();

        let hits = storage.search("sorting", None, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].subject_details.slug, subject.slug);
        assert_eq!(hits[0].branch_details, vec!["Computer Science".to_string()]);

        assert!(storage.search("sorting", Some(other.id.as_str()), None).await.unwrap().is_empty());
        assert_eq!(storage.search("SORT", Some(branch.id.as_str()), None).await.unwrap().len(), 1);
        assert!(storage.search("calculus", None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn catalog_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = CatalogStorage::new(dir.path()).unwrap();
            storage.create_branch(branch_req("Computer Science", "CS")).await.unwrap();
        }

        let reopened = CatalogStorage::new(dir.path()).unwrap();
        let branches = reopened.list_branches().await.unwrap();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].slug, "computer-science");
    }
}
