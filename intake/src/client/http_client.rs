//! HTTP implementation of [`IntakeBackend`]
//!
//! Handles URL building, tenant and auth headers, per-request timeouts,
//! status checking and envelope unwrapping. Failures carry the operation,
//! URL and collaborator message as report attachments.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::IntakeBackend;
use super::types::{ApiEnvelope, ReferenceListing, identity_from_response};
use crate::config::IntakeConfig;
use crate::constants::{
    REFERENCES_ADD_PATH, REFERENCES_BY_SUBJECT_PATH, REFERENCES_DELETE_PATH,
    REFERENCES_UPDATE_PATH, SCHEMA_PATH, SUBJECTS_PATH, TENANT_HEADER, USER_HEADER,
};
use crate::error::{Error, Result};
use crate::ids::{ReferenceId, SubjectId, TenantId};
use crate::schema::EntityName;

const RECORDS_SUFFIX: &str = "records";

/// reqwest-backed collaborator client
#[derive(Debug, Clone)]
pub struct IntakeHttpClient {
    client:       Client,
    base_url:     String,
    tenant:       TenantId,
    user_id:      Option<String>,
    access_token: Option<String>,
}

impl IntakeHttpClient {
    /// Build a client from configuration
    pub fn new(config: &IntakeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tenant: config.tenant_id,
            user_id: config.user_id.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header(TENANT_HEADER, self.tenant.to_string());
        if let Some(user_id) = &self.user_id {
            builder = builder.header(USER_HEADER, user_id);
        }
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Send a request and unwrap the envelope payload
    async fn send(&self, operation: &str, url: &str, builder: RequestBuilder) -> Result<Value> {
        debug!("{operation}: sending request to {url}");
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Err(Self::handle_error(operation, url, &e)),
        };
        Self::read_envelope(operation, url, response).await
    }

    async fn read_envelope(operation: &str, url: &str, response: Response) -> Result<Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Self::handle_error(operation, url, &e))?;
        let envelope = serde_json::from_str::<ApiEnvelope>(&body).ok();

        if !status.is_success() {
            warn!("{operation}: HTTP status error - status={status}");
            let message = envelope
                .and_then(|envelope| envelope.error.or(envelope.message))
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Unknown error")
                        .to_string()
                });
            return Err(error_stack::Report::new(Error::persistence(status.as_u16(), message))
                .attach(format!("Operation: {operation}"))
                .attach(format!("URL: {url}")));
        }

        let Some(envelope) = envelope else {
            return Err(error_stack::Report::new(Error::unexpected(
                "response body",
                "not a JSON envelope",
            ))
            .attach(format!("Operation: {operation}, URL: {url}"))
            .attach(format!(
                "Body (first 500 chars): {}",
                body.chars().take(500).collect::<String>()
            )));
        };
        envelope
            .into_data(operation, status.as_u16())
            .map_err(|report| report.attach(format!("URL: {url}")))
    }

    fn handle_error(operation: &str, url: &str, e: &reqwest::Error) -> error_stack::Report<Error> {
        warn!("{operation}: HTTP request failed - error={e}");

        let error_type = if e.is_timeout() {
            "Timeout"
        } else if e.is_connect() {
            "Connection failed"
        } else if e.is_request() {
            "Request error"
        } else if e.is_body() {
            "Body error"
        } else if e.is_decode() {
            "Decode error"
        } else {
            "Unknown error type"
        };

        error_stack::Report::new(Error::request_failed(operation, format!("{error_type}: {e}")))
            .attach(format!("URL: {url}"))
            .attach(format!("Full error: {e:?}"))
    }
}

#[async_trait]
impl IntakeBackend for IntakeHttpClient {
    async fn fetch_schema(&self, entity: EntityName, tenant: TenantId) -> Result<Value> {
        let url = self.build_url(&format!("{SCHEMA_PATH}/{entity}?tenant_id={tenant}"));
        self.send("fetch schema", &url, self.request(Method::GET, &url))
            .await
    }

    async fn fetch_aggregate(&self, subject: SubjectId, tenant: TenantId) -> Result<Value> {
        let url = self.build_url(&format!(
            "{SUBJECTS_PATH}/{subject}/{RECORDS_SUFFIX}?tenant_id={tenant}"
        ));
        self.send("fetch aggregate", &url, self.request(Method::GET, &url))
            .await
    }

    async fn update_aggregate(&self, subject: SubjectId, payload: &Value) -> Result<Value> {
        let url = self.build_url(&format!("{SUBJECTS_PATH}/{subject}/{RECORDS_SUFFIX}"));
        let builder = self.request(Method::PATCH, &url).json(payload);
        self.send("update aggregate", &url, builder).await
    }

    async fn add_reference(
        &self,
        subject: SubjectId,
        reference: &Map<String, Value>,
    ) -> Result<Option<ReferenceId>> {
        let url = self.build_url(REFERENCES_ADD_PATH);
        let body = json!({"subject_id": subject, "reference": reference});
        let data = self
            .send("add reference", &url, self.request(Method::POST, &url).json(&body))
            .await?;
        Ok(identity_from_response(&data))
    }

    async fn update_reference(
        &self,
        subject: SubjectId,
        identity: ReferenceId,
        updates: &Map<String, Value>,
    ) -> Result<()> {
        let url = self.build_url(REFERENCES_UPDATE_PATH);
        let body = json!({"subject_id": subject, "identity": identity, "updates": updates});
        self.send("update reference", &url, self.request(Method::PATCH, &url).json(&body))
            .await
            .map(|_| ())
    }

    async fn delete_reference(&self, subject: SubjectId, identity: ReferenceId) -> Result<()> {
        let url = self.build_url(REFERENCES_DELETE_PATH);
        let body = json!({"subject_id": subject, "identity": identity});
        self.send("delete reference", &url, self.request(Method::DELETE, &url).json(&body))
            .await
            .map(|_| ())
    }

    async fn list_references(&self, subject: SubjectId) -> Result<ReferenceListing> {
        let url = self.build_url(&format!("{REFERENCES_BY_SUBJECT_PATH}?subject_id={subject}"));
        let data = self
            .send("list references", &url, self.request(Method::GET, &url))
            .await?;
        ReferenceListing::from_value(data)
    }
}
