// ABOUTME: Document upload and question-answering routes
// ABOUTME: Q&A streams answers through the same relay pipeline as plain chat
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::constants::{limits, rate_limits};
use crate::errors::{AppError, AppResult};
use crate::llm::ChatMessage;
use crate::middleware::rate_limit::{enforce, RateLimitScope};
use crate::middleware::RequestContext;
use crate::models::{MessageRole, SessionType};
use crate::resources::ServerResources;
use crate::streaming::resolve::{resolve_stream, StreamParams};
use crate::streaming::{error_only_stream, relay_stream, RelayContext};
use axum::extract::{Multipart, Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::info;

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

/// File extensions accepted for upload (plain-text formats only)
const ALLOWED_EXTENSIONS: &[&str] = &[
    "txt", "md", "py", "js", "json", "xml", "html", "css", "java", "cpp", "c", "h", "ts", "jsx",
    "tsx", "yaml", "yml", "toml", "ini", "cfg", "conf", "log", "csv", "rs",
];

/// Metadata for one uploaded document
#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentOut {
    /// Document id (the stored filename)
    pub id: String,
    /// Display name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Last-modified timestamp (ISO 8601)
    pub created_at: String,
}

/// Request to answer a question about a document
#[derive(Debug, Deserialize)]
pub struct DocumentQaRequest {
    /// The question (non-empty)
    pub question: String,
    /// Model to use: local catalog id or raw OpenRouter id
    pub model_id: String,
    /// Existing session to continue; a new documents session is created
    /// when absent
    #[serde(default)]
    pub session_id: Option<String>,
    /// Explicit profile override
    #[serde(default)]
    pub profile_id: Option<i64>,
    /// Explicit temperature override
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Explicit max-token override
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Document route handlers
pub struct DocumentRoutes;

impl DocumentRoutes {
    /// Create all document routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        let upload_limited = Router::new()
            .route("/api/documents/upload", post(Self::upload_document))
            .route_layer(axum::middleware::from_fn_with_state(
                RateLimitScope {
                    limiter: resources.rate_limiter.clone(),
                    scope: "document_upload",
                    preset: rate_limits::UPLOAD,
                },
                enforce,
            ));

        Router::new()
            .route("/api/documents", get(Self::list_documents))
            .route(
                "/api/documents/:document_id",
                axum::routing::delete(Self::delete_document),
            )
            .route("/api/documents/:document_id/qa", post(Self::document_qa))
            .route_layer(axum::middleware::from_fn_with_state(
                RateLimitScope {
                    limiter: resources.rate_limiter.clone(),
                    scope: "documents",
                    preset: rate_limits::CRUD,
                },
                enforce,
            ))
            .merge(upload_limited)
            .with_state(resources)
    }

    /// Upload a plain-text document for Q&A
    async fn upload_document(
        State(resources): State<Arc<ServerResources>>,
        mut multipart: Multipart,
    ) -> Result<Response, AppError> {
        let uploads_dir = resources.config.storage.uploads_dir.clone();
        tokio::fs::create_dir_all(&uploads_dir)
            .await
            .map_err(|e| AppError::storage(format!("Failed to create uploads dir: {e}")))?;

        let field = multipart
            .next_field()
            .await
            .map_err(|e| AppError::invalid_input(format!("Malformed multipart body: {e}")))?
            .ok_or_else(|| AppError::invalid_input("No file field in upload"))?;

        let filename = field
            .file_name()
            .map(ToOwned::to_owned)
            .ok_or_else(|| AppError::invalid_input("No filename provided"))?;

        let extension = Path::new(&filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(AppError::invalid_input(format!(
                "Invalid file type .{extension}; plain-text formats only"
            )));
        }

        let content = field
            .bytes()
            .await
            .map_err(|e| AppError::invalid_input(format!("Failed to read upload: {e}")))?;
        if content.len() > limits::MAX_UPLOAD_BYTES {
            return Err(AppError::invalid_input(format!(
                "File too large; maximum size is {} MB",
                limits::MAX_UPLOAD_BYTES / 1024 / 1024
            )));
        }

        // Strip any path components the client sent
        let safe_name = Path::new(&filename)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::invalid_input("Unusable filename"))?
            .to_owned();

        let (final_name, file_path) = unique_path(&uploads_dir, &safe_name).await;
        tokio::fs::write(&file_path, &content)
            .await
            .map_err(|e| AppError::storage(format!("Failed to save file: {e}")))?;

        info!(document = %final_name, bytes = content.len(), "document uploaded");

        let metadata = tokio::fs::metadata(&file_path)
            .await
            .map_err(|e| AppError::storage(format!("Failed to stat file: {e}")))?;

        Ok((
            StatusCode::CREATED,
            Json(DocumentOut {
                id: final_name.clone(),
                name: final_name,
                size: metadata.len(),
                created_at: modified_rfc3339(&metadata),
            }),
        )
            .into_response())
    }

    /// List uploaded documents, newest first
    async fn list_documents(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Response, AppError> {
        let uploads_dir = resources.config.storage.uploads_dir.clone();
        let mut documents = Vec::new();

        if uploads_dir.is_dir() {
            let mut entries = tokio::fs::read_dir(&uploads_dir)
                .await
                .map_err(|e| AppError::storage(format!("Failed to read uploads dir: {e}")))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| AppError::storage(format!("Failed to read uploads dir: {e}")))?
            {
                let metadata = match entry.metadata().await {
                    Ok(m) if m.is_file() => m,
                    _ => continue,
                };
                let name = entry.file_name().to_string_lossy().into_owned();
                documents.push(DocumentOut {
                    id: name.clone(),
                    name,
                    size: metadata.len(),
                    created_at: modified_rfc3339(&metadata),
                });
            }
        }

        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Json(documents).into_response())
    }

    /// Delete an uploaded document
    async fn delete_document(
        State(resources): State<Arc<ServerResources>>,
        UrlPath(document_id): UrlPath<String>,
    ) -> Result<Response, AppError> {
        let file_path = resolve_document_path(&resources.config.storage.uploads_dir, &document_id)?;

        tokio::fs::remove_file(&file_path)
            .await
            .map_err(|e| AppError::storage(format!("Failed to delete file: {e}")))?;

        Ok(Json(json!({ "message": "Document deleted", "id": document_id })).into_response())
    }

    /// Stream an answer about one document
    ///
    /// Builds a document-context system message on top of the resolved
    /// session history, persists the user question, and relays the
    /// completion through the standard pipeline with `document_id`
    /// correlation on the start and done events.
    async fn document_qa(
        State(resources): State<Arc<ServerResources>>,
        Extension(request_context): Extension<RequestContext>,
        UrlPath(document_id): UrlPath<String>,
        Json(request): Json<DocumentQaRequest>,
    ) -> Sse<EventStream> {
        let request_id = request_context.request_id;
        match Self::prepare_qa(&resources, &document_id, request).await {
            Ok((context, model, messages, temperature, max_tokens)) => {
                let openrouter = resources.openrouter.clone();
                let open = async move {
                    openrouter
                        .stream_chat_completions(&model, &messages, temperature, max_tokens)
                        .await
                };
                let context = RelayContext {
                    request_id,
                    ..context
                };
                let events: EventStream = Box::pin(
                    relay_stream(resources.database.clone(), context, open)
                        .map(|event| Ok::<_, Infallible>(event.into_sse())),
                );
                Sse::new(events).keep_alive(KeepAlive::default())
            }
            Err(e) => {
                let events: EventStream = Box::pin(
                    error_only_stream(&e, &request_id)
                        .map(|event| Ok::<_, Infallible>(event.into_sse())),
                );
                Sse::new(events).keep_alive(KeepAlive::default())
            }
        }
    }

    /// Everything that must succeed before the QA stream can start
    async fn prepare_qa(
        resources: &Arc<ServerResources>,
        document_id: &str,
        request: DocumentQaRequest,
    ) -> AppResult<(RelayContext, String, Vec<ChatMessage>, f64, u32)> {
        if request.question.is_empty() {
            return Err(AppError::invalid_input("question must not be empty"));
        }
        // Credential check precedes session creation
        if !resources.openrouter.has_credentials() {
            return Err(AppError::config_missing(
                "OPENROUTER_API_KEY is not configured. Set the OPENROUTER_API_KEY environment variable.",
            ));
        }

        let document = load_document(&resources.config.storage.uploads_dir, document_id).await?;

        let session_id = match request.session_id {
            Some(id) => {
                resources
                    .database
                    .get_session(&id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Session").with_resource_id(id.clone()))?;
                id
            }
            None => {
                resources
                    .database
                    .create_session(
                        SessionType::Documents,
                        Some(&document.name),
                        request.profile_id,
                    )
                    .await?
                    .id
            }
        };

        let resolved = resolve_stream(
            resources,
            StreamParams {
                session_id,
                model_id: request.model_id,
                temperature: request.temperature,
                max_tokens: request.max_tokens,
                profile_id: request.profile_id,
            },
        )
        .await?;

        let mut messages = resolved.messages;
        messages.push(ChatMessage::system(format!(
            "You are assisting with questions about the uploaded document '{}'.\n\n\
             Document content:\n{}\n\n\
             Always answer using only the document content. If the answer is not present, \
             say you don't have enough information.",
            document.name, document.content
        )));
        messages.push(ChatMessage::user(request.question.clone()));

        resources
            .database
            .add_message(
                &resolved.session_id,
                MessageRole::User,
                &format!("[Document:{document_id}] {}", request.question),
            )
            .await?;

        let mut extra = Map::new();
        extra.insert(
            "session_id".to_owned(),
            Value::String(resolved.session_id.clone()),
        );
        extra.insert(
            "document_id".to_owned(),
            Value::String(document_id.to_owned()),
        );

        let context = RelayContext {
            session_id: resolved.session_id,
            catalog_model_id: resolved.catalog_model_id,
            profile_id: resolved.profile_id,
            request_id: String::new(),
            extra,
        };

        Ok((
            context,
            resolved.upstream_model,
            messages,
            resolved.temperature,
            resolved.max_tokens,
        ))
    }
}

/// Loaded document content
struct LoadedDocument {
    name: String,
    content: String,
}

/// Resolve a document id to a path inside the uploads directory,
/// rejecting traversal attempts
fn resolve_document_path(uploads_dir: &Path, document_id: &str) -> AppResult<PathBuf> {
    let candidate = Path::new(document_id);
    if candidate.components().count() != 1
        || candidate
            .file_name()
            .and_then(|n| n.to_str())
            .is_none_or(|n| n != document_id)
    {
        return Err(AppError::not_found("Document").with_resource_id(document_id.to_owned()));
    }

    let file_path = uploads_dir.join(document_id);
    if !file_path.is_file() {
        return Err(AppError::not_found("Document").with_resource_id(document_id.to_owned()));
    }
    Ok(file_path)
}

async fn load_document(uploads_dir: &Path, document_id: &str) -> AppResult<LoadedDocument> {
    let file_path = resolve_document_path(uploads_dir, document_id)?;
    let content = tokio::fs::read_to_string(&file_path)
        .await
        .map_err(|e| AppError::storage(format!("Failed to read document: {e}")))?;

    Ok(LoadedDocument {
        name: document_id.to_owned(),
        content,
    })
}

/// Pick a filename that does not collide with an existing upload
async fn unique_path(uploads_dir: &Path, safe_name: &str) -> (String, PathBuf) {
    let mut candidate = safe_name.to_owned();
    let mut path = uploads_dir.join(&candidate);
    let stem = Path::new(safe_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(safe_name)
        .to_owned();
    let extension = Path::new(safe_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    let mut counter = 1;
    while path.exists() {
        candidate = format!("{stem}_{counter}{extension}");
        path = uploads_dir.join(&candidate);
        counter += 1;
    }

    (candidate, path)
}

fn modified_rfc3339(metadata: &std::fs::Metadata) -> String {
    metadata
        .modified()
        .ok()
        .map(chrono::DateTime::<chrono::Utc>::from)
        .map_or_else(String::new, |t| t.to_rfc3339())
}
