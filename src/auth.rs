use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::types::{LoginRequest, RegisterRequest};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(rename = "authToken", default, skip_serializing_if = "Option::is_none")]
    auth_token: Option<String>,
}

/// Client-local storage for the single auth token. The stored value is the
/// complete `Authorization` header value.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).map_err(|source| ClientError::Storage {
            operation: "reading token",
            path: self.path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        let stored: StoredCredentials =
            serde_json::from_str(&content).map_err(|source| ClientError::Parse {
                what: "stored credentials",
                source,
            })?;
        Ok(stored.auth_token.filter(|t| !t.trim().is_empty()))
    }

    /// Like `load`, but an unreadable credentials file counts as logged out
    /// so `login` and `logout` can still overwrite or remove it.
    pub fn load_or_discard(&self) -> Result<Option<String>> {
        match self.load() {
            Err(err @ ClientError::Parse { .. }) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "ignoring corrupt credentials file"
                );
                Ok(None)
            }
            other => other,
        }
    }

    pub fn save(&self, value: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ClientError::Storage {
                operation: "creating token dir",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let stored = StoredCredentials {
            auth_token: Some(value.to_string()),
        };
        let content = serde_json::to_string_pretty(&stored).map_err(|source| {
            ClientError::Parse {
                what: "stored credentials",
                source,
            }
        })?;
        fs::write(&self.path, content).map_err(|source| ClientError::Storage {
            operation: "writing token",
            path: self.path.clone(),
            source,
        })
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ClientError::Storage {
                operation: "removing token",
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(ClientError::validation("Email and password required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty()
            || self.email.trim().is_empty()
            || self.password.is_empty()
        {
            return Err(ClientError::validation("All fields are required"));
        }
        Ok(())
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Logs in and persists the resulting header value. Returns that value.
pub async fn login(api: &ApiClient, store: &TokenStore, form: &LoginForm) -> Result<String> {
    form.validate()?;
    let resp = api
        .login(&LoginRequest {
            username: form.username.trim().to_string(),
            password: form.password.clone(),
        })
        .await?;
    let value = bearer(&resp.token);
    store.save(&value)?;
    tracing::info!(user = %form.username.trim(), "logged in");
    Ok(value)
}

pub async fn signup(api: &ApiClient, form: &SignupForm) -> Result<()> {
    form.validate()?;
    api.register(&RegisterRequest {
        username: form.username.trim().to_string(),
        email: form.email.trim().to_string(),
        password: form.password.clone(),
    })
    .await?;
    tracing::info!(user = %form.username.trim(), "registered");
    Ok(())
}
