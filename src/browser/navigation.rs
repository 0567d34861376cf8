use crate::core::{LoadState, PageDriver};
use crate::dom::script::READY_STATE_PROBE;
use crate::dom::FrameScope;
use crate::errors::{HarnessError, Result};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Polls `document.readyState` and the resource timeline until the requested
/// load state holds.
pub struct NavigationManager;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ReadySnapshot {
    ready_state: String,
    url: String,
    resources: u64,
}

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub state: LoadState,
    pub url: String,
    pub ready_state: String,
    pub polls: u32,
    pub duration_ms: u64,
}

impl NavigationManager {
    pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
    /// Consecutive polls with an unchanged resource count that count as idle.
    pub const IDLE_POLLS: u32 = 5;

    pub async fn wait_for_load_state<D: PageDriver + ?Sized>(
        driver: &D,
        state: LoadState,
        timeout: Duration,
    ) -> Result<NavigationResult> {
        let start_time = Instant::now();
        let max_polls = (timeout.as_millis() / Self::POLL_INTERVAL.as_millis()).max(1) as u32;
        let mut last_resources: Option<u64> = None;
        let mut quiet_polls = 0u32;
        let mut last_url = String::new();

        for poll in 1..=max_polls {
            match driver.evaluate(&FrameScope::top(), READY_STATE_PROBE).await {
                Ok(value) => {
                    let snapshot: ReadySnapshot = serde_json::from_value(value).unwrap_or_default();
                    last_url = snapshot.url.clone();

                    if last_resources == Some(snapshot.resources) {
                        quiet_polls += 1;
                    } else {
                        quiet_polls = 0;
                        last_resources = Some(snapshot.resources);
                    }

                    let reached = match state {
                        LoadState::DomContentLoaded => {
                            snapshot.ready_state == "interactive" || snapshot.ready_state == "complete"
                        }
                        LoadState::Load => snapshot.ready_state == "complete",
                        LoadState::NetworkIdle => {
                            snapshot.ready_state == "complete" && quiet_polls >= Self::IDLE_POLLS
                        }
                    };

                    if reached {
                        return Ok(NavigationResult {
                            state,
                            url: snapshot.url,
                            ready_state: snapshot.ready_state,
                            polls: poll,
                            duration_ms: start_time.elapsed().as_millis() as u64,
                        });
                    }
                }
                Err(e) => {
                    // The execution context is replaced while a navigation commits.
                    debug!("Load state probe failed, retrying: {}", e);
                }
            }

            driver.pause(Self::POLL_INTERVAL).await;
        }

        Err(HarnessError::Timeout(format!(
            "page did not reach {:?} within {}ms (url: {})",
            state,
            timeout.as_millis(),
            last_url
        )))
    }
}
