//! Command-line and environment configuration.
//!
//! Every flag can also come from a `RAINDROP_*` environment variable, and
//! `main` loads a `.env` file before parsing.

use crate::api::ApiClient;
use crate::credential::{load_token_file, save_token_file, Credential};
use crate::search::DEFAULT_PAGE_SIZE;
use crate::state::{LocalState, StateStore};
use crate::transport::{Connector, HttpConnector, Transport, DEFAULT_API_BASE, DEFAULT_REFRESH_URL};
use crate::{Error, Result};
use clap::Parser;
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Parser)]
#[command(name = "raindrop-shell", version, about = "Search, create and manage Raindrop.io bookmarks")]
pub struct Cli {
    /// Access token (a "test token" from the Raindrop integrations page works)
    #[arg(long, env = "RAINDROP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// OAuth refresh token
    #[arg(long, env = "RAINDROP_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    #[arg(long, env = "RAINDROP_CLIENT_ID")]
    pub client_id: Option<String>,

    #[arg(long, env = "RAINDROP_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// JSON token record; rewritten after every token refresh
    #[arg(long, env = "RAINDROP_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    #[arg(long, env = "RAINDROP_API_URL", default_value = DEFAULT_API_BASE)]
    pub api_url: String,

    #[arg(long, env = "RAINDROP_REFRESH_URL", default_value = DEFAULT_REFRESH_URL)]
    pub refresh_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "RAINDROP_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,

    /// Bookmarks fetched per search request (Raindrop allows at most 50)
    #[arg(long, env = "RAINDROP_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,

    /// Where the collection snapshot is kept between runs
    #[arg(long, env = "RAINDROP_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Neither read nor write the snapshot file
    #[arg(long)]
    pub no_cache: bool,

    /// Rebuild the collection snapshot at startup
    #[arg(long)]
    pub refresh: bool,
}

/// Resolved settings, validated before any network call.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credential: Credential,
    pub token_file: Option<PathBuf>,
    pub api_url: String,
    pub refresh_url: String,
    pub timeout: Duration,
    pub page_size: u32,
    pub state_file: Option<PathBuf>,
    pub force_refresh: bool,
}

impl Settings {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let credential = resolve_credential(&cli)?;
        let api_url = http_url("API URL", &cli.api_url)?;
        let refresh_url = http_url("refresh URL", &cli.refresh_url)?;
        if cli.timeout == 0 {
            return Err(Error::Config("timeout must be at least 1 second".to_string()));
        }
        if !(1..=DEFAULT_PAGE_SIZE).contains(&cli.page_size) {
            return Err(Error::Config(format!(
                "page size must be between 1 and {}",
                DEFAULT_PAGE_SIZE
            )));
        }

        let state_file = if cli.no_cache {
            None
        } else {
            let path = cli.state_file.or_else(StateStore::default_path);
            if path.is_none() {
                warn!("no config directory found, the collection snapshot won't be kept");
            }
            path
        };

        Ok(Self {
            credential,
            token_file: cli.token_file,
            api_url,
            refresh_url,
            timeout: Duration::from_secs(cli.timeout),
            page_size: cli.page_size,
            state_file,
            force_refresh: cli.refresh,
        })
    }

    /// API client over the real HTTP stack.
    pub fn connect(&self) -> Result<ApiClient> {
        let connector = HttpConnector::new(self.timeout)?;
        Ok(ApiClient::new(self.transport(Box::new(connector))))
    }

    /// Transport over `connector`. With a token file configured, every
    /// refreshed credential is written back to it.
    pub fn transport(&self, connector: Box<dyn Connector>) -> Transport {
        let mut transport = Transport::new(connector, self.api_url.as_str(), self.credential.clone())
            .with_refresh_url(self.refresh_url.as_str());
        if let Some(path) = self.token_file.clone() {
            transport.on_token_refresh(Box::new(move |credential: &Credential| {
                match save_token_file(&path, &credential.to_record()) {
                    Ok(()) => info!(path = %path.display(), "saved refreshed token"),
                    Err(e) => warn!(path = %path.display(), error = %e, "failed to save refreshed token"),
                }
            }));
        }
        transport
    }

    pub fn local_state(&self) -> LocalState {
        LocalState::new(self.state_file.clone().map(StateStore::new))
    }
}

/// The token file wins for the fields it carries; flags fill the rest.
fn resolve_credential(cli: &Cli) -> Result<Credential> {
    let from_file = match &cli.token_file {
        Some(path) if path.exists() => Some(load_token_file(path).map_err(|e| {
            Error::Config(format!("unable to read token file {}: {}", path.display(), e))
        })?),
        _ => None,
    };

    let mut credential = match (from_file, &cli.token) {
        (Some(record), _) => Credential::from_record(record),
        (None, Some(token)) if !token.trim().is_empty() => Credential::bearer(token.trim()),
        _ => {
            return Err(Error::Config(
                "no access token: set RAINDROP_TOKEN or point RAINDROP_TOKEN_FILE at a token record".to_string(),
            ))
        }
    };
    if credential.refresh_token.is_none() {
        if let Some(refresh) = &cli.refresh_token {
            credential = credential.with_refresh(refresh.as_str());
        }
    }
    if let (Some(id), Some(secret)) = (&cli.client_id, &cli.client_secret) {
        credential = credential.with_client(id.as_str(), secret.as_str());
    }
    Ok(credential)
}

fn http_url(label: &str, text: &str) -> Result<String> {
    let url = Url::parse(text).map_err(|e| Error::Config(format!("invalid {} '{}': {}", label, text, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!("{} '{}' must use http or https", label, text)));
    }
    Ok(text.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::TokenRecord;
    use crate::testing::{json_response, FakeConnector, TEST_REFRESH};
    use crate::transport::WireResponse;
    use serde_json::json;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["raindrop-shell"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_token_flag_builds_bearer_credential() {
        let settings = Settings::from_cli(cli(&["--token", "abc", "--no-cache"])).unwrap();
        assert_eq!(settings.credential.authorization(), "Bearer abc");
        assert_eq!(settings.api_url, DEFAULT_API_BASE);
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
        assert!(settings.state_file.is_none());
        assert!(!settings.force_refresh);
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let err = Settings::from_cli(cli(&["--token", "  "])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("no access token"));
    }

    #[test]
    fn test_token_file_wins_and_flags_fill_gaps() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"access_token": "from-file", "token_type": "bearer"}"#).unwrap();
        let path_text = path.display().to_string();

        let settings = Settings::from_cli(cli(&[
            "--token",
            "from-flag",
            "--refresh-token",
            "r1",
            "--client-id",
            "id",
            "--client-secret",
            "secret",
            "--token-file",
            &path_text,
        ]))
        .unwrap();

        assert_eq!(settings.credential.access_token, "from-file");
        assert_eq!(settings.credential.refresh_token.as_deref(), Some("r1"));
        assert_eq!(settings.credential.client_id.as_deref(), Some("id"));
        assert_eq!(settings.credential.token_type, "Bearer");
    }

    #[test]
    fn test_invalid_url_and_timeout_rejected() {
        assert!(matches!(
            Settings::from_cli(cli(&["--token", "t", "--api-url", "not a url"])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::from_cli(cli(&["--token", "t", "--api-url", "ftp://api.test"])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::from_cli(cli(&["--token", "t", "--timeout", "0"])),
            Err(Error::Config(_))
        ));
        for size in ["0", "51"] {
            assert!(matches!(
                Settings::from_cli(cli(&["--token", "t", "--page-size", size])),
                Err(Error::Config(_))
            ));
        }
        let small = Settings::from_cli(cli(&["--token", "t", "--page-size", "10", "--no-cache"])).unwrap();
        assert_eq!(small.page_size, 10);
    }

    #[test]
    fn test_explicit_state_file_and_trailing_slash() {
        let settings = Settings::from_cli(cli(&[
            "--token",
            "t",
            "--state-file",
            "/tmp/snapshot.json",
            "--api-url",
            "https://api.test/rest/v1/",
            "--refresh",
        ]))
        .unwrap();
        assert_eq!(settings.state_file, Some(PathBuf::from("/tmp/snapshot.json")));
        assert_eq!(settings.api_url, "https://api.test/rest/v1");
        assert!(settings.force_refresh);
    }

    #[test]
    fn test_refreshed_token_is_written_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let path_text = path.display().to_string();
        let settings = Settings::from_cli(cli(&[
            "--token",
            "old",
            "--refresh-token",
            "r1",
            "--token-file",
            &path_text,
            "--api-url",
            "https://api.test/rest/v1",
            "--refresh-url",
            TEST_REFRESH,
            "--no-cache",
        ]))
        .unwrap();

        let fake = FakeConnector::new(|req| {
            if req.url == TEST_REFRESH {
                return json_response(200, json!({"access_token": "new", "refresh_token": "r2", "token_type": "bearer"}));
            }
            match req.authorization.as_deref() {
                Some("Bearer new") => json_response(200, json!({"user": {"_id": 1}})),
                _ => WireResponse::new(401, ""),
            }
        });
        let mut api = ApiClient::new(settings.transport(Box::new(fake)));
        api.user().unwrap();

        let saved: TokenRecord = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.access_token, "new");
        assert_eq!(saved.refresh_token.as_deref(), Some("r2"));
    }
}
