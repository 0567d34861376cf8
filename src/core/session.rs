use crate::errors::{HarnessError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Cookies and per-origin storage of one authenticated browser profile.
/// Field names follow the `storageState` layout other tools already read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub cookies: Vec<CookieData>,
    pub origins: Vec<OriginStorage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieData {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Seconds since the epoch; `-1` for session cookies.
    #[serde(default = "session_cookie")]
    pub expires: f64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

fn session_cookie() -> f64 {
    -1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginStorage {
    pub origin: String,
    #[serde(default)]
    pub local_storage: Vec<StorageEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub session_storage: Vec<StorageEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub name: String,
    pub value: String,
}

impl SessionState {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.origins.iter().all(|o| o.local_storage.is_empty())
    }

    pub fn origin(&self, origin: &str) -> Option<&OriginStorage> {
        self.origins.iter().find(|o| o.origin == origin)
    }

    /// Union of two captures. Cookies are keyed by (name, domain, path) and
    /// origins by origin; entries from `other` win.
    pub fn merge(mut self, other: SessionState) -> SessionState {
        for cookie in other.cookies {
            match self.cookies.iter_mut().find(|c| {
                c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path
            }) {
                Some(existing) => *existing = cookie,
                None => self.cookies.push(cookie),
            }
        }
        for origin in other.origins {
            match self.origins.iter_mut().find(|o| o.origin == origin.origin) {
                Some(existing) => *existing = origin,
                None => self.origins.push(origin),
            }
        }
        self.captured_at = other.captured_at.or(self.captured_at);
        self
    }

    /// Cookies whose domain covers `host` (exact or dot-prefixed parent).
    pub fn cookies_for_host<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a CookieData> {
        self.cookies.iter().filter(move |c| {
            let domain = c.domain.trim_start_matches('.');
            host == domain || host.ends_with(&format!(".{}", domain))
        })
    }
}

/// `scheme://host[:port]` of an http(s) URL; `None` for opaque origins
/// such as `about:blank` or `data:` frames.
pub fn origin_of(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    match parsed.scheme() {
        "http" | "https" => Some(parsed.origin().ascii_serialization()),
        _ => None,
    }
}

/// The on-disk session file. Written only by bootstrap, read by every run.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub async fn load(&self) -> Result<SessionState> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            HarnessError::SessionState(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let state: SessionState = serde_json::from_str(&raw)?;
        debug!(
            "Loaded session state from {} ({} cookies, {} origins)",
            self.path.display(),
            state.cookies.len(),
            state.origins.len()
        );
        Ok(state)
    }

    /// Write to a sibling temp file and rename it over the target, so readers
    /// see either the previous file or the complete new one.
    pub async fn save(&self, state: &SessionState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                HarnessError::SessionState(format!(
                    "invalid session file path: {}",
                    self.path.display()
                ))
            })?;
        let tmp = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        if let Err(e) = tokio::fs::write(&tmp, json.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        info!("Session state saved to {}", self.path.display());
        Ok(())
    }

    /// Returns whether a file was removed.
    pub async fn clear(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Session state cleared: {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> SessionState {
        SessionState {
            cookies: vec![CookieData {
                name: "_secure_admin_session_id".to_string(),
                value: "abc".to_string(),
                domain: ".myshopify.com".to_string(),
                path: "/".to_string(),
                expires: 1_900_000_000.0,
                http_only: true,
                secure: true,
                same_site: Some("Lax".to_string()),
            }],
            origins: vec![OriginStorage {
                origin: "https://rc.pagefly.io".to_string(),
                local_storage: vec![StorageEntry {
                    name: "no-auto-save".to_string(),
                    value: "1".to_string(),
                }],
                session_storage: vec![],
            }],
            captured_at: None,
        }
    }

    #[test]
    fn test_storage_state_layout() {
        let json = serde_json::to_value(sample_state()).unwrap();
        assert_eq!(json["cookies"][0]["httpOnly"], true);
        assert_eq!(json["cookies"][0]["sameSite"], "Lax");
        assert_eq!(json["origins"][0]["localStorage"][0]["name"], "no-auto-save");
        assert!(json["origins"][0].get("sessionStorage").is_none());
        assert!(json.get("capturedAt").is_none());
    }

    #[test]
    fn test_merge_prefers_later_capture() {
        let admin = sample_state();
        let mut app = SessionState::default();
        let mut refreshed = admin.cookies[0].clone();
        refreshed.value = "def".to_string();
        app.cookies.push(refreshed);
        let mut app_cookie = admin.cookies[0].clone();
        app_cookie.domain = "rc.pagefly.io".to_string();
        app.cookies.push(app_cookie);

        let merged = admin.merge(app);
        assert_eq!(merged.cookies.len(), 2);
        assert_eq!(merged.cookies[0].value, "def");
        assert_eq!(merged.origins.len(), 1);
    }

    #[test]
    fn test_origin_of_http_urls_only() {
        assert_eq!(
            origin_of("https://rc.pagefly.io/pages?shop=demo").as_deref(),
            Some("https://rc.pagefly.io")
        );
        assert_eq!(
            origin_of("http://localhost:3000/").as_deref(),
            Some("http://localhost:3000")
        );
        assert_eq!(origin_of("about:blank"), None);
        assert_eq!(origin_of("not a url"), None);
    }

    #[test]
    fn test_reads_files_without_optional_fields() {
        let raw = r#"{
            "cookies": [{"name": "a", "value": "b", "domain": "x.io", "path": "/"}],
            "origins": [{"origin": "https://x.io"}]
        }"#;
        let state: SessionState = serde_json::from_str(raw).unwrap();
        assert_eq!(state.cookies[0].expires, -1.0);
        assert!(!state.cookies[0].secure);
        assert!(state.origins[0].local_storage.is_empty());
        assert!(state.captured_at.is_none());
    }

    #[test]
    fn test_cookie_host_matching() {
        let state = sample_state();
        assert_eq!(state.cookies_for_host("demo.myshopify.com").count(), 1);
        assert_eq!(state.cookies_for_host("myshopify.com").count(), 1);
        assert_eq!(state.cookies_for_host("evilmyshopify.com").count(), 0);
    }

    #[tokio::test]
    async fn test_save_then_load_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested").join("auth-state.json"));
        assert!(!store.exists());

        store.save(&sample_state()).await.unwrap();
        assert!(store.exists());
        assert_eq!(store.load().await.unwrap(), sample_state());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        assert!(store.clear().await.unwrap());
        assert!(!store.clear().await.unwrap());
    }

    #[tokio::test]
    async fn test_load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("missing.json"));
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, HarnessError::SessionState(_)));
    }
}
