use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{PortalError, Result};
use crate::storage::{load_collection, save_collection};
use crate::user_models::{Collection, Session, User};

const USERS_FILE: &str = "users.json";
const COLLECTIONS_FILE: &str = "collections.json";
const SESSIONS_FILE: &str = "sessions.json";

const NOT_AUTHORIZED: &str = "User not authorized";

/// Accounts, sessions, bookmarks and collections. Same persistence idiom as
/// the catalog; lock order is users, then collections, then sessions.
pub struct UserStorage {
    users_path: PathBuf,
    collections_path: PathBuf,
    sessions_path: PathBuf,
    users: RwLock<Vec<User>>,
    collections: RwLock<Vec<Collection>>,
    sessions: RwLock<Vec<Session>>,
}

impl UserStorage {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let users_path = data_dir.join(USERS_FILE);
        let collections_path = data_dir.join(COLLECTIONS_FILE);
        let sessions_path = data_dir.join(SESSIONS_FILE);

        Ok(Self {
            users: RwLock::new(load_collection(&users_path)?),
            collections: RwLock::new(load_collection(&collections_path)?),
            sessions: RwLock::new(load_collection(&sessions_path)?),
            users_path,
            collections_path,
            sessions_path,
        })
    }

    pub async fn create_user(&self, user: User) -> Result<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(PortalError::Validation(
                "An account with that email already exists".to_string(),
            ));
        }
        users.push(user.clone());
        save_collection(&self.users_path, &users)?;
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    pub async fn create_session(&self, user_id: String) -> Result<Session> {
        let session = Session::new(user_id);
        let mut sessions = self.sessions.write().await;
        sessions.push(session.clone());
        save_collection(&self.sessions_path, &sessions)?;
        Ok(session)
    }

    /// Logout is idempotent; deleting an unknown token is a no-op.
    pub async fn delete_session(&self, token: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|s| s.token != token);
        if sessions.len() != before {
            save_collection(&self.sessions_path, &sessions)?;
        }
        Ok(())
    }

    pub async fn resolve_session(&self, token: &str) -> Result<Option<User>> {
        let user_id = {
            let sessions = self.sessions.read().await;
            sessions.iter().find(|s| s.token == token).map(|s| s.user_id.clone())
        };
        match user_id {
            Some(id) => self.get_user(&id).await,
            None => Ok(None),
        }
    }

    /// Set-add: bookmarking a file twice leaves one entry. Returns the
    /// bookmark list after the operation.
    pub async fn add_bookmark(&self, user_id: &str, file_id: &str) -> Result<Vec<String>> {
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(PortalError::NotFound("User"))?;
        if !user.bookmarked_files.iter().any(|f| f == file_id) {
            user.bookmarked_files.push(file_id.to_string());
            let bookmarks = user.bookmarked_files.clone();
            save_collection(&self.users_path, &users)?;
            return Ok(bookmarks);
        }
        Ok(user.bookmarked_files.clone())
    }

    pub async fn remove_bookmark(&self, user_id: &str, file_id: &str) -> Result<Vec<String>> {
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(PortalError::NotFound("User"))?;
        let before = user.bookmarked_files.len();
        user.bookmarked_files.retain(|f| f != file_id);
        let bookmarks = user.bookmarked_files.clone();
        if bookmarks.len() != before {
            save_collection(&self.users_path, &users)?;
        }
        Ok(bookmarks)
    }

    pub async fn bookmarks(&self, user_id: &str) -> Result<Vec<String>> {
        let users = self.users.read().await;
        let user = users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or(PortalError::NotFound("User"))?;
        Ok(user.bookmarked_files.clone())
    }

    pub async fn is_bookmarked(&self, user_id: &str, file_id: &str) -> Result<bool> {
        Ok(self.bookmarks(user_id).await?.iter().any(|f| f == file_id))
    }

    /// Creates the collection, then pushes the back-reference onto the
    /// user's list. Two separate writes; a crash in between leaves an
    /// orphaned collection (known limitation carried from the original).
    pub async fn create_collection(&self, user_id: &str, name: &str) -> Result<Collection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PortalError::Validation("Collection name is required".to_string()));
        }

        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(PortalError::NotFound("User"))?;

        let collection = Collection::new(name.to_string(), user_id.to_string());
        let mut collections = self.collections.write().await;
        collections.push(collection.clone());
        save_collection(&self.collections_path, &collections)?;

        user.collections.push(collection.id.clone());
        save_collection(&self.users_path, &users)?;
        Ok(collection)
    }

    /// The caller's collections, most recently updated first.
    pub async fn list_collections(&self, user_id: &str) -> Result<Vec<Collection>> {
        let collections = self.collections.read().await;
        let mut owned: Vec<Collection> = collections
            .iter()
            .filter(|c| c.creator == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(owned)
    }

    /// NotFound when the id does not resolve; Forbidden when it does but
    /// the caller is not the creator. The distinction is part of the API.
    pub async fn get_collection(&self, id: &str, user_id: &str) -> Result<Collection> {
        let collections = self.collections.read().await;
        let collection = collections
            .iter()
            .find(|c| c.id == id)
            .ok_or(PortalError::NotFound("Collection"))?;
        if collection.creator != user_id {
            return Err(PortalError::Forbidden(NOT_AUTHORIZED));
        }
        Ok(collection.clone())
    }

    /// Set-add: re-adding a file already present is a no-op, not an error.
    /// `updatedAt` only moves when something was actually inserted.
    pub async fn add_file_to_collection(
        &self,
        id: &str,
        user_id: &str,
        file_id: &str,
    ) -> Result<Collection> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(PortalError::NotFound("Collection"))?;
        if collection.creator != user_id {
            return Err(PortalError::Forbidden(NOT_AUTHORIZED));
        }

        if !collection.files.iter().any(|f| f == file_id) {
            collection.files.push(file_id.to_string());
            collection.updated_at = Utc::now();
            let updated = collection.clone();
            save_collection(&self.collections_path, &collections)?;
            return Ok(updated);
        }
        Ok(collection.clone())
    }

    pub async fn remove_file_from_collection(
        &self,
        id: &str,
        user_id: &str,
        file_id: &str,
    ) -> Result<Collection> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(PortalError::NotFound("Collection"))?;
        if collection.creator != user_id {
            return Err(PortalError::Forbidden(NOT_AUTHORIZED));
        }

        let before = collection.files.len();
        collection.files.retain(|f| f != file_id);
        if collection.files.len() != before {
            collection.updated_at = Utc::now();
            let updated = collection.clone();
            save_collection(&self.collections_path, &collections)?;
            return Ok(updated);
        }
        Ok(collection.clone())
    }

    /// Removes the collection and its back-reference from the creator.
    pub async fn delete_collection(&self, id: &str, user_id: &str) -> Result<()> {
        let mut users = self.users.write().await;
        let mut collections = self.collections.write().await;
        let index = collections
            .iter()
            .position(|c| c.id == id)
            .ok_or(PortalError::NotFound("Collection"))?;
        if collections[index].creator != user_id {
            return Err(PortalError::Forbidden(NOT_AUTHORIZED));
        }

        collections.remove(index);
        save_collection(&self.collections_path, &collections)?;

        if let Some(user) = users.iter_mut().find(|u| u.id == user_id) {
            user.collections.retain(|c| c != id);
            save_collection(&self.users_path, &users)?;
        }
        Ok(())
    }

    /// True iff at least one of the user's collections contains the file.
    /// Drives the "already saved" affordance only.
    pub async fn is_file_in_any_collection(&self, user_id: &str, file_id: &str) -> Result<bool> {
        let collections = self.collections.read().await;
        Ok(collections
            .iter()
            .any(|c| c.creator == user_id && c.files.iter().any(|f| f == file_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage_with_user(dir: &Path) -> (UserStorage, User) {
        let storage = UserStorage::new(dir).unwrap();
        let user = storage
            .create_user(User::new(
                "ada@example.com".into(),
                "Ada Lovelace".into(),
                "hash".into(),
            ))
            .await
            .unwrap();
        (storage, user)
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, _) = storage_with_user(dir.path()).await;

        let err = storage
            .create_user(User::new("ada@example.com".into(), "Other Ada".into(), "hash".into()))
            .await;
        assert!(matches!(err, Err(PortalError::Validation(_))));
    }

    #[tokio::test]
    async fn bookmark_add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, user) = storage_with_user(dir.path()).await;

        storage.add_bookmark(&user.id, "file-1").await.unwrap();
        let bookmarks = storage.add_bookmark(&user.id, "file-1").await.unwrap();
        assert_eq!(bookmarks, vec!["file-1".to_string()]);

        assert!(storage.is_bookmarked(&user.id, "file-1").await.unwrap());
        let bookmarks = storage.remove_bookmark(&user.id, "file-1").await.unwrap();
        assert!(bookmarks.is_empty());
        // Removing again stays a no-op.
        storage.remove_bookmark(&user.id, "file-1").await.unwrap();
    }

    #[tokio::test]
    async fn collection_lifecycle_keeps_back_references() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, user) = storage_with_user(dir.path()).await;

        let collection = storage.create_collection(&user.id, "  Exam prep  ").await.unwrap();
        assert_eq!(collection.name, "Exam prep");
        let reloaded = storage.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.collections, vec![collection.id.clone()]);

        storage.delete_collection(&collection.id, &user.id).await.unwrap();
        let reloaded = storage.get_user(&user.id).await.unwrap().unwrap();
        assert!(reloaded.collections.is_empty());
    }

    #[tokio::test]
    async fn empty_collection_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, user) = storage_with_user(dir.path()).await;

        let err = storage.create_collection(&user.id, "   ").await;
        assert!(matches!(err, Err(PortalError::Validation(_))));
    }

    #[tokio::test]
    async fn foreign_collection_is_forbidden_not_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, owner) = storage_with_user(dir.path()).await;
        let intruder = storage
            .create_user(User::new("eve@example.com".into(), "Eve".into(), "hash".into()))
            .await
            .unwrap();

        let collection = storage.create_collection(&owner.id, "Notes").await.unwrap();

        let err = storage
            .add_file_to_collection(&collection.id, &intruder.id, "file-1")
            .await;
        assert!(matches!(err, Err(PortalError::Forbidden(_))));
        // The owner's collection is untouched by the rejected write.
        let unchanged = storage.get_collection(&collection.id, &owner.id).await.unwrap();
        assert!(unchanged.files.is_empty());

        let err = storage.add_file_to_collection("missing", &intruder.id, "file-1").await;
        assert!(matches!(err, Err(PortalError::NotFound("Collection"))));
    }

    #[tokio::test]
    async fn adding_a_file_twice_keeps_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, user) = storage_with_user(dir.path()).await;
        let collection = storage.create_collection(&user.id, "Notes").await.unwrap();

        storage
            .add_file_to_collection(&collection.id, &user.id, "file-1")
            .await
            .unwrap();
        let updated = storage
            .add_file_to_collection(&collection.id, &user.id, "file-1")
            .await
            .unwrap();
        assert_eq!(updated.files, vec!["file-1".to_string()]);
    }

    #[tokio::test]
    async fn membership_overlay_sees_any_owned_collection() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, user) = storage_with_user(dir.path()).await;

        let first = storage.create_collection(&user.id, "First").await.unwrap();
        storage.create_collection(&user.id, "Second").await.unwrap();
        storage
            .add_file_to_collection(&first.id, &user.id, "file-9")
            .await
            .unwrap();

        assert!(storage.is_file_in_any_collection(&user.id, "file-9").await.unwrap());
        assert!(!storage.is_file_in_any_collection(&user.id, "file-8").await.unwrap());
    }

    #[tokio::test]
    async fn sessions_resolve_and_expire_on_logout() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, user) = storage_with_user(dir.path()).await;

        let session = storage.create_session(user.id.clone()).await.unwrap();
        let resolved = storage.resolve_session(&session.token).await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);

        storage.delete_session(&session.token).await.unwrap();
        assert!(storage.resolve_session(&session.token).await.unwrap().is_none());
        // Idempotent.
        storage.delete_session(&session.token).await.unwrap();
    }
}
