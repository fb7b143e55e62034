use crate::api::ApiClient;
use crate::context;
use crate::error::{ClientError, Result};
use crate::types::{ChatHistory, Document, TranscriptMessage};
use async_trait::async_trait;
use std::path::Path;

const ALLOWED_UPLOAD_EXTENSIONS: [&str; 2] = ["txt", "pdf"];

#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<Document>>;
    async fn upload_document(&self, path: &Path) -> Result<()>;
    async fn delete_document(&self, document_id: &str) -> Result<()>;
    async fn fetch_chat(&self, document_id: &str) -> Result<ChatHistory>;
    async fn post_chat(&self, document_id: &str, text: &str) -> Result<()>;
}

#[async_trait]
impl DocumentBackend for ApiClient {
    async fn list_documents(&self) -> Result<Vec<Document>> {
        ApiClient::list_documents(self).await
    }

    async fn upload_document(&self, path: &Path) -> Result<()> {
        ApiClient::upload_document(self, path).await
    }

    async fn delete_document(&self, document_id: &str) -> Result<()> {
        ApiClient::delete_document(self, document_id).await
    }

    async fn fetch_chat(&self, document_id: &str) -> Result<ChatHistory> {
        ApiClient::fetch_chat(self, document_id).await
    }

    async fn post_chat(&self, document_id: &str, text: &str) -> Result<()> {
        ApiClient::post_chat(self, document_id, text).await
    }
}

/// The uploaded documents, the one selected for chat, and its chat history.
pub struct DocumentWorkspace<B> {
    backend: B,
    documents: Vec<Document>,
    selected: Option<Document>,
    messages: Vec<TranscriptMessage>,
}

impl<B: DocumentBackend> DocumentWorkspace<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            documents: Vec::new(),
            selected: None,
            messages: Vec::new(),
        }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn selected(&self) -> Option<&Document> {
        self.selected.as_ref()
    }

    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub async fn refresh(&mut self) -> Result<()> {
        match self.backend.list_documents().await {
            Ok(docs) => {
                tracing::debug!(count = docs.len(), "documents refreshed");
                self.documents = docs;
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to list documents");
                Err(err)
            }
        }
    }

    /// Selects a listed document. Switching documents drops the previous
    /// document's chat entries.
    pub fn select(&mut self, document_id: &str) -> Result<&Document> {
        let doc = self
            .documents
            .iter()
            .find(|d| d.document_id == document_id)
            .cloned()
            .ok_or_else(|| ClientError::validation(format!("unknown document: {document_id}")))?;
        if self.selected.as_ref().map(|d| &d.document_id) != Some(&doc.document_id) {
            self.messages.clear();
        }
        Ok(self.selected.insert(doc))
    }

    pub async fn upload(&mut self, path: &Path) -> Result<()> {
        validate_upload(path)?;
        if let Err(err) = self.backend.upload_document(path).await {
            tracing::error!(error = %err, path = %path.display(), "upload failed");
            return Err(err);
        }
        tracing::info!(path = %path.display(), "file uploaded");
        self.refresh().await
    }

    pub async fn delete(&mut self, document_id: &str) -> Result<()> {
        if let Err(err) = self.backend.delete_document(document_id).await {
            tracing::error!(error = %err, document_id = %document_id, "delete failed");
            return Err(err);
        }
        self.refresh().await?;
        if self
            .selected
            .as_ref()
            .is_some_and(|d| d.document_id == document_id)
        {
            self.selected = None;
            self.messages.clear();
        }
        Ok(())
    }

    /// Reloads the chat history of the selected document.
    pub async fn load_history(&mut self) -> Result<&[TranscriptMessage]> {
        let document_id = self.selected_id()?;
        let history = self.backend.fetch_chat(&document_id).await?;
        self.messages = context::flatten_history(&history);
        Ok(&self.messages)
    }

    /// Posts a question about the selected document, then reloads its
    /// history so the stored answer shows up.
    pub async fn send(&mut self, text: &str) -> Result<&[TranscriptMessage]> {
        let document_id = self.selected_id()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::validation("message must not be empty"));
        }
        if let Err(err) = self.backend.post_chat(&document_id, text).await {
            tracing::error!(error = %err, document_id = %document_id, "chat post failed");
            return Err(err);
        }
        match self.backend.fetch_chat(&document_id).await {
            Ok(history) => {
                self.messages = context::flatten_history(&history);
                Ok(&self.messages)
            }
            Err(err) => {
                tracing::error!(error = %err, document_id = %document_id, "fetching chat failed");
                Err(err)
            }
        }
    }

    fn selected_id(&self) -> Result<String> {
        self.selected
            .as_ref()
            .map(|d| d.document_id.clone())
            .ok_or_else(|| ClientError::validation("Select a document to enable chat"))
    }
}

pub fn validate_upload(path: &Path) -> Result<()> {
    let allowed = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ALLOWED_UPLOAD_EXTENSIONS
                .iter()
                .any(|a| a.eq_ignore_ascii_case(ext))
        });
    if !allowed {
        return Err(ClientError::validation(format!(
            "unsupported file type: {} (expected .txt or .pdf)",
            path.display()
        )));
    }
    Ok(())
}
