use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Capability level of an account. Admin gates the catalog write routes;
/// an explicit role beats comparing email strings against an env var.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub role: Role,
    pub password_hash: String,
    pub collections: Vec<String>,
    pub bookmarked_files: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, display_name: String, password_hash: String) -> Self {
        let first_name = display_name
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            display_name,
            first_name,
            image: None,
            role: Role::User,
            password_hash,
            collections: Vec::new(),
            bookmarked_files: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The shape handed to clients; the password hash stays server-side.
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            first_name: self.first_name.clone(),
            image: self.image.clone(),
            role: self.role,
            collections: self.collections.clone(),
            bookmarked_files: self.bookmarked_files.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub role: Role,
    pub collections: Vec<String>,
    pub bookmarked_files: Vec<String>,
}

/// A user-owned, named group of files. Names are trimmed but not unique;
/// two collections may share one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub creator: String,
    pub files: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Collection {
    pub fn new(name: String, creator: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            creator,
            files: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// An opaque login session. The token is the bearer credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: String) -> Self {
        Self {
            token: Uuid::new_v4().to_string(),
            user_id,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Deserialize)]
pub struct CreateCollectionRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFileRequest {
    pub file_id: String,
}

/// Per-file overlay for the logged-in user, driving the bookmark and
/// "already saved" toggles.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStateResponse {
    pub bookmarked: bool,
    pub in_collection: bool,
}

/// A collection with its file ids resolved to full documents.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDetail {
    pub id: String,
    pub name: String,
    pub creator: String,
    pub files: Vec<crate::models::File>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollectionDetail {
    pub fn new(collection: Collection, files: Vec<crate::models::File>) -> Self {
        Self {
            id: collection.id,
            name: collection.name,
            creator: collection.creator,
            files,
            created_at: collection.created_at,
            updated_at: collection.updated_at,
        }
    }
}
