//! Export of the generation client's saved browser session, for running the
//! client on another machine.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{ConfigError, Result};

/// File the client stores its session in
pub const STORAGE_STATE_FILE: &str = "storage_state.json";

/// Google session cookies a usable state is expected to contain
pub const REQUIRED_COOKIES: [&str; 3] = ["SID", "HSID", "SSID"];

/// Places a session file is looked for, most specific first
pub fn storage_candidates(client_home: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = client_home {
        candidates.push(home.join(STORAGE_STATE_FILE));
    }
    for var in ["HOME", "USERPROFILE"] {
        if let Some(user_home) = std::env::var_os(var) {
            let path = PathBuf::from(user_home).join(".notebooklm").join(STORAGE_STATE_FILE);
            if !candidates.contains(&path) {
                candidates.push(path);
            }
        }
    }
    candidates
}

/// First existing session file
pub fn find_storage_state(client_home: Option<&Path>) -> Option<PathBuf> {
    storage_candidates(client_home).into_iter().find(|p| p.is_file())
}

/// A validated session, ready to be exported
#[derive(Debug, Clone)]
pub struct AuthExport {
    pub source: PathBuf,
    pub cookie_count: usize,
    pub found_required: Vec<String>,
    compact: String,
}

impl AuthExport {
    /// Read and validate a session file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        let data: Value = serde_json::from_str(content).map_err(|_| ConfigError::AuthState {
            reason: "file is not valid JSON".to_string(),
        })?;

        let cookies = data
            .get("cookies")
            .and_then(Value::as_array)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ConfigError::AuthState {
                reason: "no cookies found, session may be invalid".to_string(),
            })?;

        let names: BTreeSet<&str> = cookies
            .iter()
            .filter_map(|c| c.get("name").and_then(Value::as_str))
            .collect();
        let found_required = REQUIRED_COOKIES
            .iter()
            .filter(|name| names.contains(*name))
            .map(|name| name.to_string())
            .collect();

        let compact = serde_json::to_string(&data).map_err(|e| ConfigError::AuthState {
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: path.to_path_buf(),
            cookie_count: cookies.len(),
            found_required,
            compact,
        })
    }

    /// Whether at least one expected session cookie is present
    pub fn has_session_cookies(&self) -> bool {
        !self.found_required.is_empty()
    }

    /// One-line JSON
    pub fn compact(&self) -> &str {
        &self.compact
    }

    /// `NOTEBOOKLM_AUTH_JSON=<json>` line for an env file
    pub fn env_line(&self) -> String {
        format!("NOTEBOOKLM_AUTH_JSON={}", self.compact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_valid_state_is_compacted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STORAGE_STATE_FILE);
        std::fs::write(
            &path,
            r#"{
                "cookies": [
                    {"name": "SID", "value": "a"},
                    {"name": "HSID", "value": "b"},
                    {"name": "NID", "value": "c"}
                ],
                "origins": []
            }"#,
        )
        .unwrap();

        let export = AuthExport::load(&path).unwrap();
        assert_eq!(export.cookie_count, 3);
        assert_eq!(export.found_required, vec!["SID", "HSID"]);
        assert!(export.has_session_cookies());
        assert!(!export.compact().contains('\n'));
        assert!(export.env_line().starts_with("NOTEBOOKLM_AUTH_JSON={"));
    }

    #[test]
    fn test_state_without_cookies_rejected() {
        let err = AuthExport::parse(Path::new("x.json"), r#"{"cookies": []}"#).unwrap_err();
        assert!(err.to_string().contains("no cookies"));
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(AuthExport::parse(Path::new("x.json"), "{not json").is_err());
    }

    #[test]
    fn test_client_home_is_searched_first() {
        let dir = tempdir().unwrap();
        let candidates = storage_candidates(Some(dir.path()));
        assert_eq!(candidates[0], dir.path().join(STORAGE_STATE_FILE));

        assert_ne!(find_storage_state(Some(dir.path())), Some(dir.path().join(STORAGE_STATE_FILE)));
        std::fs::write(dir.path().join(STORAGE_STATE_FILE), "{}").unwrap();
        assert_eq!(find_storage_state(Some(dir.path())), Some(dir.path().join(STORAGE_STATE_FILE)));
    }
}
