mod config;
mod error;
mod grouping;
mod models;
mod pyq;
mod slug;
mod storage;
pub mod user_models;
pub mod user_storage;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{PortalError, Result};
use grouping::{group_by_subfolder, merge_with_static, CatalogEntry, FileGroup};
use models::{
    CreateBranchRequest, CreateFileRequest, CreateSubjectRequest, DetailsQuery, EntityRef,
    FilesQuery, LikesResponse, SearchQuery, SubjectQuery, UpdateBranchRequest, UpdateFileRequest,
    UpdateSubjectRequest,
};
use pyq::PyqIndex;
use storage::CatalogStorage;
use user_models::{
    AddFileRequest, CollectionDetail, CreateCollectionRequest, FileStateResponse, LoginRequest,
    LoginResponse, Role, SignupRequest, User,
};
use user_storage::UserStorage;

struct AppState {
    catalog: CatalogStorage,
    users: UserStorage,
    pyq: PyqIndex,
    admin_email: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();

    let catalog =
        CatalogStorage::new(&config.data_dir).expect("Failed to initialize catalog storage");
    let users = UserStorage::new(&config.data_dir).expect("Failed to initialize user storage");
    let pyq = pyq::load_index(&config.pyq_index_file).expect("Failed to load PYQ index");
    if !pyq.is_empty() {
        info!("Loaded static PYQ records for {} subjects", pyq.len());
    }

    let app_state = Arc::new(AppState {
        catalog,
        users,
        pyq,
        admin_email: config.admin_email.clone(),
    });

    let app = Router::new()
        .route("/", get(root))
        .route("/api/branches", get(get_branches))
        .route("/api/branches/details", get(get_branch_details))
        .route("/api/subjects", get(get_subjects))
        .route("/api/subjects/details", get(get_subject_details))
        .route("/api/files", get(get_files))
        .route("/api/files/grouped", get(get_grouped_files))
        .route("/api/files/:id/like", put(like_file))
        .route("/api/files/:id/unlike", put(unlike_file))
        .route("/api/search", get(search_files))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/current_user", get(current_user))
        .route("/api/auth/logout", post(logout))
        .route("/api/user/bookmarks", get(get_bookmarks))
        .route(
            "/api/user/bookmarks/:file_id",
            put(add_bookmark).delete(remove_bookmark),
        )
        .route("/api/user/file-state/:file_id", get(get_file_state))
        .route("/api/collections", get(get_collections).post(create_collection))
        .route(
            "/api/collections/:id",
            get(get_collection).delete(delete_collection),
        )
        .route("/api/collections/:id/add-file", put(add_file_to_collection))
        .route(
            "/api/collections/:id/remove-file",
            put(remove_file_from_collection),
        )
        .route("/api/admin/branches", post(admin_create_branch))
        .route(
            "/api/admin/branches/:id",
            put(admin_update_branch).delete(admin_delete_branch),
        )
        .route("/api/admin/subjects", post(admin_create_subject))
        .route(
            "/api/admin/subjects/:id",
            put(admin_update_subject).delete(admin_delete_subject),
        )
        .route("/api/admin/files", post(admin_create_file))
        .route(
            "/api/admin/files/:id",
            put(admin_update_file).delete(admin_delete_file),
        )
        .layer(cors_layer(config.client_url.as_deref()))
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("Failed to bind port");

    info!("Study portal API listening on http://0.0.0.0:{}", config.port);

    axum::serve(listener, app).await.expect("Failed to start server");
}

fn cors_layer(client_url: Option<&str>) -> CorsLayer {
    let mut origins: Vec<HeaderValue> = vec!["http://localhost:3000".parse().unwrap()];
    if let Some(url) = client_url {
        if let Ok(value) = url.parse() {
            origins.push(value);
        }
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<User> {
    let token = bearer_token(headers).ok_or(PortalError::Unauthorized("You must be logged in!"))?;
    state
        .users
        .resolve_session(token)
        .await?
        .ok_or(PortalError::Unauthorized("You must be logged in!"))
}

async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<User> {
    let user = require_user(state, headers).await?;
    if !user.is_admin() {
        return Err(PortalError::Forbidden(
            "Forbidden: You are not authorized to perform this action.",
        ));
    }
    Ok(user)
}

async fn root() -> &'static str {
    "API is running..."
}

// --- Catalog reads ---

async fn get_branches(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let branches = state.catalog.list_branches().await?;
    Ok(Json(json!(branches)))
}

async fn get_branch_details(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DetailsQuery>,
) -> Result<Json<Value>> {
    let entity = query.entity_ref().ok_or(PortalError::NotFound("Branch"))?;
    let branch = state
        .catalog
        .find_branch(&entity)
        .await?
        .ok_or(PortalError::NotFound("Branch"))?;
    Ok(Json(json!(branch)))
}

async fn get_subjects(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubjectQuery>,
) -> Result<Json<Value>> {
    let selector = query.selector()?;
    let subjects = state.catalog.list_subjects(&selector).await?;
    Ok(Json(json!(subjects)))
}

async fn get_subject_details(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DetailsQuery>,
) -> Result<Json<Value>> {
    let entity = query.entity_ref().ok_or(PortalError::NotFound("Subject"))?;
    let subject = state
        .catalog
        .find_subject(&entity)
        .await?
        .ok_or(PortalError::NotFound("Subject"))?;
    Ok(Json(json!(subject)))
}

async fn get_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FilesQuery>,
) -> Result<Json<Value>> {
    let subject = query.subject_ref()?;
    let files = state.catalog.list_files(&subject).await?;
    Ok(Json(json!(files)))
}

/// Live files merged with any static PYQ records for the subject, then
/// bucketed by sub-folder. The static list rides behind the live one so
/// dynamic material keeps its position.
async fn get_grouped_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FilesQuery>,
) -> Result<Json<Vec<FileGroup<CatalogEntry>>>> {
    let entity = query.subject_ref()?;
    let subject = state
        .catalog
        .find_subject(&entity)
        .await?
        .ok_or(PortalError::NotFound("Subject"))?;

    let files = state.catalog.list_files(&EntityRef::Id(subject.id.clone())).await?;
    let statics = state.pyq.get(&subject.slug).map(Vec::as_slice);
    let entries = merge_with_static(files, statics);
    let groups = group_by_subfolder(entries, |entry| entry.relative_path());
    Ok(Json(groups))
}

async fn like_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LikesResponse>> {
    let likes = state.catalog.like_file(&id).await?;
    Ok(Json(LikesResponse { likes }))
}

async fn unlike_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LikesResponse>> {
    let likes = state.catalog.unlike_file(&id).await?;
    Ok(Json(LikesResponse { likes }))
}

async fn search_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>> {
    let q = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| PortalError::Validation("Search query (q) is required".to_string()))?
        .to_string();

    let branch = query.branch.as_deref().filter(|v| !v.is_empty());
    let subject = query.subject.as_deref().filter(|v| !v.is_empty());
    let hits = state.catalog.search(&q, branch, subject).await?;
    Ok(Json(json!(hits)))
}

// --- Auth ---

async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let email = payload.email.trim().to_string();
    let display_name = payload.display_name.trim().to_string();
    if email.is_empty() || display_name.is_empty() || payload.password.is_empty() {
        return Err(PortalError::Validation(
            "email, displayName and password are required".to_string(),
        ));
    }

    let password_hash =
        bcrypt::hash(&payload.password, bcrypt::DEFAULT_COST).map_err(anyhow::Error::new)?;
    let mut user = User::new(email, display_name, password_hash);
    if state.admin_email.as_deref() == Some(user.email.as_str()) {
        user.role = Role::Admin;
    }

    let user = state.users.create_user(user).await?;
    Ok((StatusCode::CREATED, Json(json!(user.public()))))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let user = state
        .users
        .find_user_by_email(payload.email.trim())
        .await?
        .ok_or(PortalError::Unauthorized("Invalid email or password"))?;

    let valid =
        bcrypt::verify(&payload.password, &user.password_hash).map_err(anyhow::Error::new)?;
    if !valid {
        return Err(PortalError::Unauthorized("Invalid email or password"));
    }

    let session = state.users.create_session(user.id.clone()).await?;
    Ok(Json(LoginResponse {
        token: session.token,
        user: user.public(),
    }))
}

async fn current_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    Ok(Json(json!(user.public())))
}

async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Json<Value>> {
    if let Some(token) = bearer_token(&headers) {
        state.users.delete_session(token).await?;
    }
    Ok(Json(json!({ "message": "Logged out" })))
}

// --- User library ---

async fn get_bookmarks(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let ids = state.users.bookmarks(&user.id).await?;
    let files = state.catalog.files_by_ids(&ids).await?;
    Ok(Json(json!(files)))
}

async fn add_bookmark(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    state
        .catalog
        .get_file(&file_id)
        .await?
        .ok_or(PortalError::NotFound("File"))?;
    let bookmarks = state.users.add_bookmark(&user.id, &file_id).await?;
    Ok(Json(json!(bookmarks)))
}

async fn remove_bookmark(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let bookmarks = state.users.remove_bookmark(&user.id, &file_id).await?;
    Ok(Json(json!(bookmarks)))
}

async fn get_file_state(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<FileStateResponse>> {
    let user = require_user(&state, &headers).await?;
    let bookmarked = state.users.is_bookmarked(&user.id, &file_id).await?;
    let in_collection = state.users.is_file_in_any_collection(&user.id, &file_id).await?;
    Ok(Json(FileStateResponse {
        bookmarked,
        in_collection,
    }))
}

async fn get_collections(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let collections = state.users.list_collections(&user.id).await?;
    Ok(Json(json!(collections)))
}

async fn create_collection(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateCollectionRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let user = require_user(&state, &headers).await?;
    let collection = state.users.create_collection(&user.id, &payload.name).await?;
    Ok((StatusCode::CREATED, Json(json!(collection))))
}

async fn get_collection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<CollectionDetail>> {
    let user = require_user(&state, &headers).await?;
    let collection = state.users.get_collection(&id, &user.id).await?;
    let files = state.catalog.files_by_ids(&collection.files).await?;
    Ok(Json(CollectionDetail::new(collection, files)))
}

async fn add_file_to_collection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<AddFileRequest>,
) -> Result<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    state
        .catalog
        .get_file(&payload.file_id)
        .await?
        .ok_or(PortalError::NotFound("File"))?;
    let collection = state
        .users
        .add_file_to_collection(&id, &user.id, &payload.file_id)
        .await?;
    Ok(Json(json!(collection)))
}

async fn remove_file_from_collection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<AddFileRequest>,
) -> Result<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let collection = state
        .users
        .remove_file_from_collection(&id, &user.id, &payload.file_id)
        .await?;
    Ok(Json(json!(collection)))
}

async fn delete_collection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    state.users.delete_collection(&id, &user.id).await?;
    Ok(Json(json!({ "message": "Collection removed" })))
}

// --- Admin catalog writes ---

async fn admin_create_branch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateBranchRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    require_admin(&state, &headers).await?;
    let branch = state.catalog.create_branch(payload).await?;
    Ok((StatusCode::CREATED, Json(json!(branch))))
}

async fn admin_update_branch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpdateBranchRequest>,
) -> Result<Json<Value>> {
    require_admin(&state, &headers).await?;
    let branch = state.catalog.update_branch(&id, payload).await?;
    Ok(Json(json!(branch)))
}

async fn admin_delete_branch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    require_admin(&state, &headers).await?;
    state.catalog.delete_branch(&id).await?;
    Ok(Json(json!({ "message": "Branch removed" })))
}

async fn admin_create_subject(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateSubjectRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    require_admin(&state, &headers).await?;
    let subject = state.catalog.create_subject(payload).await?;
    Ok((StatusCode::CREATED, Json(json!(subject))))
}

async fn admin_update_subject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpdateSubjectRequest>,
) -> Result<Json<Value>> {
    require_admin(&state, &headers).await?;
    let subject = state.catalog.update_subject(&id, payload).await?;
    Ok(Json(json!(subject)))
}

async fn admin_delete_subject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    require_admin(&state, &headers).await?;
    state.catalog.delete_subject(&id).await?;
    Ok(Json(json!({ "message": "Subject removed" })))
}

async fn admin_create_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateFileRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    require_admin(&state, &headers).await?;
    let file = state.catalog.create_file(payload).await?;
    Ok((StatusCode::CREATED, Json(json!(file))))
}

async fn admin_update_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpdateFileRequest>,
) -> Result<Json<Value>> {
    require_admin(&state, &headers).await?;
    let file = state.catalog.update_file(&id, payload).await?;
    Ok(Json(json!(file)))
}

async fn admin_delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    require_admin(&state, &headers).await?;
    state.catalog.delete_file(&id).await?;
    Ok(Json(json!({ "message": "File removed" })))
}
