//! HTTP client for the campus assistant REST API.
//!
//! Every call attaches the stored bearer token when one is present. A
//! non-success status is turned into a [`ClientError::Api`] carrying the
//! server's `detail` message; a 401 outside the login/register endpoints
//! is treated as session expiry: the persisted session is cleared and
//! the navigator is sent back to the login screen.

pub mod types;

use crate::error::{ClientError, Result};
use crate::nav::Navigator;
use crate::session::SessionStore;
use bytes::Bytes;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};
use types::{
    ApiKeyStatus, AuthResponse, AuthUser, ChatResponse, Conversation, DocumentInfo,
    DocumentUpload, DocumentUploadResponse, HealthResponse, InputType, LlmConfig,
    LlmConfigUpdate, Message, ProvidersResponse, SuccessResponse, TranscriptResponse, UserRole,
};

/// A conversation record with its message history attached.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ConversationDetail {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Authenticated API client, cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
    navigator: Navigator,
}

impl ApiClient {
    /// Create a client against the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>, session: SessionStore, navigator: Navigator) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            http: reqwest::Client::new(),
            base_url,
            session,
            navigator,
        }
    }

    /// Base URL this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The session store backing this client.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// The navigator backing this client.
    #[must_use]
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    // ── Request plumbing ──────────────────────────────────────

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn builder(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let mut req = self.http.request(method, self.url(endpoint));
        if let Some(token) = self.session.token() {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        req: RequestBuilder,
    ) -> Result<T> {
        let resp = req.send().await?;
        let resp = self.check_status(endpoint, resp).await?;
        Ok(resp.json::<T>().await?)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let mut req = self.builder(method, endpoint);
        if let Some(body) = body {
            req = req.json(&body);
        }
        self.execute(endpoint, req).await
    }

    /// Map a non-success response to a [`ClientError`], applying the
    /// session-expiry rule for 401s outside login/register.
    async fn check_status(&self, endpoint: &str, resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED && !is_auth_endpoint(endpoint) {
            info!("session expired on {endpoint}, clearing stored session");
            self.session.logout();
            self.navigator.goto_login();
            return Err(ClientError::SessionExpired);
        }

        let message = match resp.json::<serde_json::Value>().await {
            Ok(body) => body
                .get("detail")
                .and_then(|d| d.as_str())
                .map(str::to_owned)
                .unwrap_or_else(|| format!("Error {}", status.as_u16())),
            Err(_) => "Error del servidor".to_owned(),
        };

        debug!("API error {status} on {endpoint}: {message}");
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    // ── Auth ──────────────────────────────────────────────────

    /// Log in and persist the returned session.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let auth: AuthResponse = self
            .request(
                Method::POST,
                "/api/v1/auth/login",
                Some(json!({"email": email, "password": password})),
            )
            .await?;
        self.session.set_token(&auth.access_token);
        self.session.set_user(&auth.user);
        Ok(auth)
    }

    /// Register a new account and persist the returned session.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthResponse> {
        let auth: AuthResponse = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                Some(json!({
                    "email": email,
                    "password": password,
                    "display_name": display_name,
                })),
            )
            .await?;
        self.session.set_token(&auth.access_token);
        self.session.set_user(&auth.user);
        Ok(auth)
    }

    /// Fetch the authenticated user record.
    pub async fn me(&self) -> Result<AuthUser> {
        self.request(Method::GET, "/api/v1/auth/me", None).await
    }

    /// List all users (admin).
    pub async fn list_users(&self) -> Result<Vec<AuthUser>> {
        self.request(Method::GET, "/api/v1/auth/users", None).await
    }

    /// Change a user's role (admin).
    pub async fn update_user_role(&self, user_id: &str, role: UserRole) -> Result<SuccessResponse> {
        let endpoint = format!(
            "/api/v1/auth/users/{}/role",
            urlencoding::encode(user_id)
        );
        self.request(Method::PUT, &endpoint, Some(json!({"role": role.as_str()})))
            .await
    }

    // ── Conversations & messages ──────────────────────────────

    /// List the user's conversations, newest first.
    pub async fn list_conversations(&self, limit: u32, offset: u32) -> Result<Vec<Conversation>> {
        let endpoint = format!("/api/v1/chat/conversations?limit={limit}&offset={offset}");
        let conversations: Vec<Conversation> = self.request(Method::GET, &endpoint, None).await?;
        Ok(conversations
            .into_iter()
            .map(Conversation::normalized)
            .collect())
    }

    /// Create a conversation, optionally titled.
    pub async fn create_conversation(&self, title: Option<&str>) -> Result<Conversation> {
        let conversation: Conversation = self
            .request(
                Method::POST,
                "/api/v1/chat/conversations",
                Some(json!({"title": title})),
            )
            .await?;
        Ok(conversation.normalized())
    }

    /// Fetch a single conversation with its messages.
    pub async fn get_conversation(&self, id: &str) -> Result<ConversationDetail> {
        let endpoint = format!("/api/v1/chat/conversations/{}", urlencoding::encode(id));
        self.request(Method::GET, &endpoint, None).await
    }

    /// Delete a conversation.
    pub async fn delete_conversation(&self, id: &str) -> Result<SuccessResponse> {
        let endpoint = format!("/api/v1/chat/conversations/{}", urlencoding::encode(id));
        self.request(Method::DELETE, &endpoint, None).await
    }

    /// List messages in a conversation.
    pub async fn list_messages(
        &self,
        conversation_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>> {
        let endpoint = format!(
            "/api/v1/chat/conversations/{}/messages?limit={limit}&offset={offset}",
            urlencoding::encode(conversation_id)
        );
        self.request(Method::GET, &endpoint, None).await
    }

    /// Send a user message and receive the confirmed pair plus sources.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        input_type: InputType,
        llm_provider: Option<&str>,
    ) -> Result<ChatResponse> {
        let endpoint = format!(
            "/api/v1/chat/conversations/{}/messages",
            urlencoding::encode(conversation_id)
        );
        self.request(
            Method::POST,
            &endpoint,
            Some(json!({
                "content": content,
                "input_type": input_type.as_str(),
                "llm_provider": llm_provider,
            })),
        )
        .await
    }

    // ── Documents (admin) ─────────────────────────────────────

    /// Upload a document for ingestion. Multipart; reqwest sets the
    /// boundary, so no explicit content type here.
    pub async fn upload_document(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        meta: &DocumentUpload,
    ) -> Result<DocumentUploadResponse> {
        let part = reqwest::multipart::Part::bytes(contents).file_name(file_name.to_owned());
        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("title", meta.title.clone());
        if let Some(faculty) = &meta.faculty {
            form = form.text("faculty", faculty.clone());
        }
        if let Some(program) = &meta.program {
            form = form.text("program", program.clone());
        }
        if let Some(document_type) = &meta.document_type {
            form = form.text("document_type", document_type.clone());
        }

        let endpoint = "/api/v1/documents/upload";
        let req = self.builder(Method::POST, endpoint).multipart(form);
        self.execute(endpoint, req).await
    }

    /// List stored documents (admin).
    pub async fn list_documents(&self, page: u32, per_page: u32) -> Result<Vec<DocumentInfo>> {
        let endpoint = format!("/api/v1/documents/?page={page}&per_page={per_page}");
        self.request(Method::GET, &endpoint, None).await
    }

    /// Delete a document (admin).
    pub async fn delete_document(&self, id: &str) -> Result<SuccessResponse> {
        let endpoint = format!("/api/v1/documents/{}", urlencoding::encode(id));
        self.request(Method::DELETE, &endpoint, None).await
    }

    // ── Health & LLM administration ───────────────────────────

    /// Backend health report.
    pub async fn check_health(&self) -> Result<HealthResponse> {
        self.request(Method::GET, "/api/v1/health", None).await
    }

    /// List available LLM providers.
    pub async fn get_providers(&self) -> Result<ProvidersResponse> {
        self.request(Method::GET, "/api/v1/llm/providers", None).await
    }

    /// Current LLM configuration.
    pub async fn get_llm_config(&self) -> Result<LlmConfig> {
        self.request(Method::GET, "/api/v1/config/llm", None).await
    }

    /// Update the LLM configuration; unset fields are left unchanged.
    pub async fn update_llm_config(&self, update: &LlmConfigUpdate) -> Result<SuccessResponse> {
        self.request(
            Method::PUT,
            "/api/v1/config/llm",
            Some(serde_json::to_value(update)?),
        )
        .await
    }

    /// Set the API key for a provider (admin).
    pub async fn set_api_key(&self, provider: &str, api_key: &str) -> Result<SuccessResponse> {
        self.request(
            Method::PUT,
            "/api/v1/llm/api-key",
            Some(json!({"provider": provider, "api_key": api_key})),
        )
        .await
    }

    /// Whether a provider has an API key configured server-side.
    pub async fn check_api_key(&self, provider: &str) -> Result<ApiKeyStatus> {
        let endpoint = format!("/api/v1/llm/api-key/{}", urlencoding::encode(provider));
        self.request(Method::GET, &endpoint, None).await
    }

    // ── Audio ─────────────────────────────────────────────────

    /// Upload captured audio for transcription.
    pub async fn transcribe_audio(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        mime_type: &str,
    ) -> Result<TranscriptResponse> {
        let part = reqwest::multipart::Part::bytes(contents)
            .file_name(file_name.to_owned())
            .mime_str(mime_type)
            .map_err(|e| ClientError::Stt(format!("invalid audio mime type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let endpoint = "/api/v1/audio/stt";
        let req = self.builder(Method::POST, endpoint).multipart(form);
        self.execute(endpoint, req).await
    }

    /// Synthesize speech for a text; returns the raw audio bytes.
    pub async fn synthesize_speech(&self, text: &str, voice: &str) -> Result<Bytes> {
        let endpoint = "/api/v1/audio/tts";
        let req = self
            .builder(Method::POST, endpoint)
            .json(&json!({"text": text, "voice": voice}));
        let resp = req.send().await?;
        let resp = self.check_status(endpoint, resp).await?;
        Ok(resp.bytes().await?)
    }
}

/// Whether the endpoint issues sessions itself, in which case a 401 is an
/// ordinary failure (bad credentials) rather than an expired session.
fn is_auth_endpoint(endpoint: &str) -> bool {
    endpoint.starts_with("/api/v1/auth/login") || endpoint.starts_with("/api/v1/auth/register")
}

/// Client-side registration checks, run before any request is made.
///
/// # Errors
///
/// Returns the user-facing message when the passwords differ or the
/// password is shorter than six characters.
pub fn validate_registration(password: &str, confirm: &str) -> std::result::Result<(), String> {
    if password != confirm {
        return Err("Las contraseñas no coinciden".into());
    }
    if password.chars().count() < 6 {
        return Err("La contraseña debe tener al menos 6 caracteres".into());
    }
    Ok(())
}
