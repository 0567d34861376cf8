//! Runs one UI case the way the suite expects: fresh browser per attempt,
//! restored session, overall timeout, retries and screenshot artifacts.

use crate::core::config::BrowserProfile;
use crate::core::{BrowserLauncher, Config, SessionState, SessionStore};
use crate::errors::{HarnessError, Result};
use crate::pages::{sanitize_file_name, WebUi};
use crate::types::FailureHandling;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    /// Passed, but only after at least one retry.
    Flaky,
    Failed,
    Skipped,
}

/// One line of the JSON report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseReport {
    pub id: Uuid,
    pub run_id: Uuid,
    pub name: String,
    /// Browser profile the case ran under.
    pub profile: String,
    pub status: CaseStatus,
    pub attempts: u32,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<PathBuf>,
    /// Base64 PNG of the last failure, for reports that cannot follow paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_screenshot: Option<String>,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        matches!(self.status, CaseStatus::Passed | CaseStatus::Flaky)
    }
}

pub struct CaseRunner<L: BrowserLauncher> {
    launcher: L,
    config: Arc<Config>,
    run_id: Uuid,
}

impl<L: BrowserLauncher> CaseRunner<L> {
    pub fn new(launcher: L, config: Config) -> Self {
        if config.artifacts.video_record {
            warn!("VIDEO_RECORD is set but video capture is not supported, ignoring");
        }
        Self {
            launcher,
            config: Arc::new(config),
            run_id: Uuid::new_v4(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    async fn session_state(&self) -> Option<SessionState> {
        let store = SessionStore::new(&self.config.session.storage_state_path);
        if !store.exists() {
            warn!(
                "No session state at {}, running unauthenticated",
                store.path().display()
            );
            return None;
        }
        match store.load().await {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Ignoring unreadable session state: {}", e);
                None
            }
        }
    }

    /// Run `case` under the default profile.
    pub async fn run<F, Fut>(&self, name: &str, case: F) -> CaseReport
    where
        F: Fn(Arc<L::Page>, Arc<Config>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let profile = self.config.default_profile();
        self.run_on(&profile, name, case).await
    }

    /// Run `case` once under every configured profile, one report each.
    pub async fn run_each_profile<F, Fut>(&self, name: &str, case: F) -> Vec<CaseReport>
    where
        F: Fn(Arc<L::Page>, Arc<Config>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let profiles = match self.config.runner.profiles.as_slice() {
            [] => vec![self.config.default_profile()],
            profiles => profiles.to_vec(),
        };
        let mut reports = Vec::with_capacity(profiles.len());
        for profile in &profiles {
            reports.push(self.run_on(profile, name, &case).await);
        }
        reports
    }

    /// Run `case` under `profile` until it passes or the retry budget is
    /// spent. Every attempt gets a new browser; nothing carries over between
    /// attempts.
    pub async fn run_on<F, Fut>(&self, profile: &BrowserProfile, name: &str, case: F) -> CaseReport
    where
        F: Fn(Arc<L::Page>, Arc<Config>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let started_at = Utc::now();
        let started = Instant::now();
        let max_attempts = self.config.runner.retries.saturating_add(1);
        let label = format!("{}-{}", name, profile.name);
        let test_timeout = Duration::from_millis(self.config.runner.test_timeout_ms);

        let mut screenshots = Vec::new();
        let mut failure_screenshot = None;
        let mut last_error = None;
        let mut attempts = 0;

        while attempts < max_attempts {
            attempts += 1;
            info!(
                "Running {} on {} (attempt {}/{})",
                name, profile.name, attempts, max_attempts
            );

            let state = self.session_state().await;
            let page = match self
                .launcher
                .launch(profile, state.as_ref())
                .await
            {
                Ok(page) => Arc::new(page),
                Err(e) => {
                    error!("{}: browser launch failed: {}", name, e);
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            let outcome = match tokio::time::timeout(
                test_timeout,
                case(page.clone(), self.config.clone()),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(HarnessError::Timeout(format!(
                    "test exceeded {}ms",
                    test_timeout.as_millis()
                ))),
            };

            let ui = WebUi::new(page.as_ref(), &self.config);
            match outcome {
                Ok(()) => {
                    if self.config.artifacts.screenshot_passed {
                        if let Some(path) = capture(&ui, &label, attempts, "passed").await {
                            screenshots.push(path);
                        }
                    }
                    let status = if attempts == 1 {
                        CaseStatus::Passed
                    } else {
                        CaseStatus::Flaky
                    };
                    info!("{} {:?} after {} attempt(s)", name, status, attempts);
                    return self.finish(CaseReport {
                        id: Uuid::new_v4(),
                        run_id: self.run_id,
                        name: name.to_string(),
                        profile: profile.name.clone(),
                        status,
                        attempts,
                        duration_ms: elapsed_ms(started),
                        started_at,
                        error: None,
                        screenshots,
                        failure_screenshot: None,
                    })
                    .await;
                }
                Err(e) => {
                    error!("{} failed on attempt {}: {}", name, attempts, e);
                    if self.config.artifacts.screenshot_failed {
                        if let Some(path) = capture(&ui, &label, attempts, "failed").await {
                            failure_screenshot = encode_png(&path).await;
                            screenshots.push(path);
                        }
                    }
                    last_error = Some(e.to_string());
                }
            }
        }

        self.finish(CaseReport {
            id: Uuid::new_v4(),
            run_id: self.run_id,
            name: name.to_string(),
            profile: profile.name.clone(),
            status: CaseStatus::Failed,
            attempts,
            duration_ms: elapsed_ms(started),
            started_at,
            error: last_error,
            screenshots,
            failure_screenshot,
        })
        .await
    }

    /// Record a case that was not run.
    pub async fn skip(&self, name: &str, reason: &str) -> CaseReport {
        info!("Skipping {}: {}", name, reason);
        self.finish(CaseReport {
            id: Uuid::new_v4(),
            run_id: self.run_id,
            name: name.to_string(),
            profile: self.config.default_profile().name,
            status: CaseStatus::Skipped,
            attempts: 0,
            duration_ms: 0,
            started_at: Utc::now(),
            error: Some(reason.to_string()),
            screenshots: Vec::new(),
            failure_screenshot: None,
        })
        .await
    }

    async fn finish(&self, report: CaseReport) -> CaseReport {
        if let Err(e) = append_report(&self.config.runner.json_report_path, &report).await {
            warn!("Could not write report entry for {}: {}", report.name, e);
        }
        report
    }
}

async fn capture<D: crate::core::PageDriver>(
    ui: &WebUi<'_, D>,
    name: &str,
    attempt: u32,
    outcome: &str,
) -> Option<PathBuf> {
    let file = format!("{}-attempt{}-{}", sanitize_file_name(name), attempt, outcome);
    match ui.screenshot(&file).await {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("Screenshot for {} failed: {}", name, e);
            None
        }
    }
}

async fn encode_png(path: &Path) -> Option<String> {
    let bytes = tokio::fs::read(path).await.ok()?;
    Some(base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Append `report` as one JSON line.
pub async fn append_report(path: &Path, report: &CaseReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut line = serde_json::to_string(report)?;
    line.push('\n');
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    Ok(())
}

pub async fn read_reports(path: &Path) -> Result<Vec<CaseReport>> {
    let raw = tokio::fs::read_to_string(path).await?;
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(HarnessError::from))
        .collect()
}

/// Run one step of a case. `StopOnFailure` propagates the error; the other
/// modes log it and yield `None` so the case can go on.
pub async fn step<T, Fut>(name: &str, handling: FailureHandling, action: Fut) -> Result<Option<T>>
where
    Fut: Future<Output = Result<T>>,
{
    match action.await {
        Ok(value) => Ok(Some(value)),
        Err(e) => match handling {
            FailureHandling::StopOnFailure => Err(e),
            FailureHandling::ContinueOnFailure => {
                error!("Step {:?} failed, continuing: {}", name, e);
                Ok(None)
            }
            FailureHandling::Optional => {
                info!("Optional step {:?} skipped: {}", name, e);
                Ok(None)
            }
        },
    }
}
