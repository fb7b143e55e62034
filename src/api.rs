use crate::error::{ClientError, Result};
use crate::types::{
    ChatHistory, ChatMessageIn, Document, LoginRequest, LoginResponse, RegisterRequest, Role,
};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::path::Path;

/// REST client for the documents, chat and auth endpoints.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    authorization: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().pool_max_idle_per_host(8).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            authorization: None,
        })
    }

    pub fn with_authorization(mut self, value: Option<String>) -> Self {
        self.authorization = value;
        self
    }

    pub fn set_authorization(&mut self, value: Option<String>) {
        self.authorization = value;
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.authorization {
            Some(value) => req.header(AUTHORIZATION, value),
            None => req,
        }
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        let resp = self
            .client
            .post(self.endpoint("/auth/login"))
            .json(request)
            .send()
            .await?;
        let resp = check(resp, "Login failed").await?;
        Ok(resp.json().await?)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<()> {
        let resp = self
            .client
            .post(self.endpoint("/auth/register"))
            .json(request)
            .send()
            .await?;
        check(resp, "Signup failed").await?;
        Ok(())
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let resp = self
            .authorized(self.client.get(self.endpoint("/api/documents")))
            .send()
            .await?;
        let resp = check(resp, "Failed to list documents").await?;
        let docs: Option<Vec<Document>> = resp.json().await?;
        Ok(docs.unwrap_or_default())
    }

    pub async fn upload_document(&self, path: &Path) -> Result<()> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::validation("upload path has no file name"))?
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ClientError::Storage {
                operation: "reading upload",
                path: path.to_path_buf(),
                source,
            })?;
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str(mime.essence_str())?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .authorized(self.client.post(self.endpoint("/api/documents/upload")))
            .multipart(form)
            .send()
            .await?;
        check(resp, "Upload failed").await?;
        Ok(())
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        let resp = self
            .authorized(
                self.client
                    .delete(self.endpoint(&format!("/api/documents/{document_id}"))),
            )
            .send()
            .await?;
        check(resp, "Delete failed").await?;
        Ok(())
    }

    pub async fn fetch_chat(&self, document_id: &str) -> Result<ChatHistory> {
        let resp = self
            .authorized(
                self.client
                    .get(self.endpoint(&format!("/api/chat/{document_id}"))),
            )
            .send()
            .await?;
        let resp = check(resp, "Failed to fetch chat").await?;
        Ok(resp.json().await?)
    }

    pub async fn post_chat(&self, document_id: &str, text: &str) -> Result<()> {
        let body = ChatMessageIn {
            role: Role::User,
            text: text.to_string(),
        };
        let resp = self
            .authorized(
                self.client
                    .post(self.endpoint(&format!("/api/chat/{document_id}"))),
            )
            .json(&body)
            .send()
            .await?;
        check(resp, "Failed to send chat message").await?;
        Ok(())
    }
}

async fn check(resp: Response, fallback: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Request {
        status: status.as_u16(),
        detail: error_detail(&body).unwrap_or_else(|| fallback.to_string()),
    })
}

/// Pulls the `detail` field out of an error body, as sent by the backend.
pub fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(s) => (!s.trim().is_empty()).then(|| s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let api = ApiClient::new("http://localhost:8000/").unwrap();
        assert_eq!(
            api.endpoint("/api/documents"),
            "http://localhost:8000/api/documents"
        );
    }

    #[test]
    fn error_detail_reads_string_and_structured_details() {
        assert_eq!(
            error_detail(r#"{"detail":"Invalid credentials"}"#).as_deref(),
            Some("Invalid credentials")
        );
        assert_eq!(
            error_detail(r#"{"detail":[{"msg":"field required"}]}"#).as_deref(),
            Some(r#"[{"msg":"field required"}]"#)
        );
        assert_eq!(error_detail(r#"{"detail":""}"#), None);
        assert_eq!(error_detail("<html>502</html>"), None);
    }
}
