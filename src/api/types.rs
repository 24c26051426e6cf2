//! Wire types for the campus assistant REST API.
//!
//! Several list endpoints return trimmed records (e.g. conversation
//! summaries without `language`, send-message responses without
//! `conversation_id`), so optional bookkeeping fields carry serde
//! defaults and the client fills in what the server omits.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Chat ──────────────────────────────────────────────────────

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// How a message was entered by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Text,
    Voice,
}

impl InputType {
    /// Wire name of the input type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
        }
    }
}

/// A conversation thread between a user and the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Conversation language tag. The backend omits it on list responses;
    /// the assistant speaks Spanish.
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: String,
    /// Missing on just-created conversations; mirrors `created_at` then.
    #[serde(default)]
    pub updated_at: String,
}

fn default_language() -> String {
    "es".into()
}

fn default_true() -> bool {
    true
}

impl Conversation {
    /// Normalize a record parsed from a trimmed server response: a missing
    /// `updated_at` falls back to `created_at`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.updated_at.is_empty() {
            self.updated_at = self.created_at.clone();
        }
        self
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub input_type: InputType,
    #[serde(default)]
    pub tokens_used: Option<u32>,
    #[serde(default)]
    pub llm_provider: Option<String>,
    #[serde(default)]
    pub llm_model: Option<String>,
    #[serde(default)]
    pub response_time_ms: Option<u64>,
    #[serde(default)]
    pub created_at: String,
}

/// A retrieved document chunk cited as evidence for an assistant reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub chunk_id: String,
    pub document_title: String,
    pub content_preview: String,
    /// Relevance score in `[0, 1]`.
    pub score: f32,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub faculty: Option<String>,
}

/// Server response to a send-message call: the confirmed user message,
/// the assistant reply, and the sources that grounded it.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub user_message: Message,
    pub assistant_message: Message,
    #[serde(default)]
    pub sources: Vec<SourceInfo>,
}

// ── Auth ──────────────────────────────────────────────────────

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

/// An authenticated user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    pub role: UserRole,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Login/register response: bearer token plus the user it belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".into()
}

// ── Documents (admin) ─────────────────────────────────────────

/// Metadata attached to a document upload.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpload {
    pub title: String,
    pub faculty: Option<String>,
    pub program: Option<String>,
    pub document_type: Option<String>,
}

/// Upload acknowledgement from the ingestion pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUploadResponse {
    pub document_id: String,
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// A stored document and its ingestion state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub file_size_bytes: Option<u64>,
    #[serde(default)]
    pub faculty: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    pub ingestion_status: String,
    #[serde(default)]
    pub total_chunks: u32,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

// ── LLM administration ────────────────────────────────────────

/// An available LLM provider as advertised by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    #[serde(default)]
    pub models: Vec<String>,
    pub is_available: bool,
    #[serde(default)]
    pub is_default: bool,
}

/// Provider list response.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderInfo>,
}

/// Current LLM configuration as reported by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub default_provider: String,
    pub default_model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Partial LLM configuration update; unset fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LlmConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Whether a provider has an API key configured server-side.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyStatus {
    pub provider: String,
    pub has_key: bool,
}

// ── Misc ──────────────────────────────────────────────────────

/// Generic `{success}` acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Health status of a single backend service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
}

/// Backend health report.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub services: HashMap<String, ServiceStatus>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Speech-to-text response.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptResponse {
    #[serde(default)]
    pub transcript: String,
}
