//! OAuth token storage for the Drive uploader.
//!
//! The access token is cached in `token.json` (0600 on Unix) next to the
//! client secrets downloaded from the cloud console. A missing token triggers
//! the installed-app consent flow; an expired one is refreshed in place.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::StockError;
use crate::fetcher::CLIENT;

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
const EXPIRY_SKEW_SECS: i64 = 60;

/// Supplies bearer tokens to the uploader.
pub trait AccessTokenProvider {
    fn access_token(&mut self) -> Result<String, StockError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: Url,
    pub token_uri: Url,
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: ClientSecrets,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expiry: DateTime<Utc>,
}

impl StoredToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) < self.expiry
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

fn credentials_err(context: &str, e: impl std::fmt::Display) -> StockError {
    StockError::Credentials(format!("{context}: {e}"))
}

pub fn load_client_secrets(path: &Path) -> Result<ClientSecrets, StockError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| credentials_err(&format!("cannot read {}", path.display()), e))?;
    let file: SecretsFile = serde_json::from_str(&contents)
        .map_err(|e| credentials_err("invalid client secrets", e))?;
    Ok(file.installed)
}

/// Loads a cached token. Missing or unreadable files count as no token.
pub fn load_token(path: &Path) -> Option<StoredToken> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

pub fn save_token(path: &Path, token: &StoredToken) -> Result<(), StockError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let contents =
        serde_json::to_string_pretty(token).map_err(|e| credentials_err("cannot encode token", e))?;
    std::fs::write(path, contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

pub struct FileTokenStore {
    secrets_path: PathBuf,
    token_path: PathBuf,
    secrets: Option<ClientSecrets>,
    token: Option<StoredToken>,
}

impl FileTokenStore {
    pub fn new(secrets_path: PathBuf, token_path: PathBuf) -> Self {
        Self {
            secrets_path,
            token_path,
            secrets: None,
            token: None,
        }
    }

    fn secrets(&mut self) -> Result<ClientSecrets, StockError> {
        if self.secrets.is_none() {
            self.secrets = Some(load_client_secrets(&self.secrets_path)?);
        }
        self.secrets
            .clone()
            .ok_or_else(|| StockError::Credentials("client secrets unavailable".into()))
    }

    fn exchange(
        secrets: &ClientSecrets,
        params: &[(&str, &str)],
        previous_refresh: Option<String>,
    ) -> Result<StoredToken, StockError> {
        let mut form = vec![
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
        ];
        form.extend_from_slice(params);

        let response: TokenResponse = CLIENT
            .post(secrets.token_uri.clone())
            .form(&form)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| credentials_err("token request failed", e))?;

        Ok(StoredToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            expiry: Utc::now() + Duration::seconds(response.expires_in),
        })
    }

    fn refresh(&mut self, refresh_token: String) -> Result<StoredToken, StockError> {
        debug!("Refreshing expired access token");
        let secrets = self.secrets()?;
        Self::exchange(
            &secrets,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ],
            Some(refresh_token.clone()),
        )
    }

    fn authorize(&mut self) -> Result<StoredToken, StockError> {
        let secrets = self.secrets()?;
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let redirect_uri = format!("http://127.0.0.1:{}", listener.local_addr()?.port());

        let mut consent = secrets.auth_uri.clone();
        consent
            .query_pairs_mut()
            .append_pair("client_id", &secrets.client_id)
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", DRIVE_SCOPE)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        info!("Please visit this URL to authorize this application: {consent}");

        let code = accept_redirect(&listener)?;
        Self::exchange(
            &secrets,
            &[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
            ],
            None,
        )
    }
}

/// Waits for the browser redirect and pulls the `code` out of it.
fn accept_redirect(listener: &TcpListener) -> Result<String, StockError> {
    let (mut stream, _) = listener.accept()?;
    let mut request_line = String::new();
    BufReader::new(&stream).read_line(&mut request_line)?;

    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| StockError::Credentials("malformed redirect request".into()))?;
    let code = code_from_redirect(target);

    let body = if code.is_ok() {
        "Authorization complete. You may close this window."
    } else {
        "Authorization failed. Check the terminal for details."
    };
    write!(
        stream,
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )?;
    code
}

fn code_from_redirect(target: &str) -> Result<String, StockError> {
    let url = Url::parse("http://127.0.0.1")
        .and_then(|base| base.join(target))
        .map_err(|e| credentials_err("malformed redirect target", e))?;
    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => return Err(StockError::Credentials(format!("consent denied: {value}"))),
            _ => {}
        }
    }
    code.ok_or_else(|| StockError::Credentials("redirect carried no authorization code".into()))
}

impl AccessTokenProvider for FileTokenStore {
    fn access_token(&mut self) -> Result<String, StockError> {
        if self.token.is_none() {
            self.token = load_token(&self.token_path);
        }

        let token = match self.token.take() {
            Some(token) if token.is_valid_at(Utc::now()) => token,
            Some(StoredToken {
                refresh_token: Some(refresh),
                ..
            }) => {
                let token = self.refresh(refresh)?;
                save_token(&self.token_path, &token)?;
                token
            }
            _ => {
                let token = self.authorize()?;
                save_token(&self.token_path, &token)?;
                token
            }
        };

        let access = token.access_token.clone();
        self.token = Some(token);
        Ok(access)
    }
}
