use crate::errors::{HarnessError, Result};
use crate::types::{DeviceMode, Viewport};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const DEFAULT_STORAGE_STATE_PATH: &str = "./auth-state.json";
pub const DEFAULT_RUNNER_CONFIG: &str = "harness.toml";
pub const DEFAULT_DOTENV: &str = ".env";

/// Everything the harness reads from the environment, plus the runner file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub waits: WaitConfig,
    pub artifacts: ArtifactConfig,
    pub report: ReportConfig,
    pub session: SessionConfig,
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    pub base_url: Option<String>,
    pub store: Option<String>,
    /// Storefront password of the host store.
    pub store_password: String,
    /// Fallback password typed into the app's own login form.
    pub login_password: String,
    pub app: String,
    pub app_iframe: String,
    pub editor_iframe: String,
    pub overlay_modal_iframe: String,
    pub drag_drop_iframe: String,
    pub helper_scripts_pattern: String,
    pub browser: String,
    pub headless: bool,
    pub user_data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitConfig {
    pub default_ms: u64,
    pub implicit_ms: u64,
    pub explicit_ms: u64,
    pub page_loaded_ms: u64,
    pub active_page_loaded: bool,
    pub sleep_step_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub screenshot_passed: bool,
    pub screenshot_failed: bool,
    pub screenshot_skipped: bool,
    pub screenshot_all_steps: bool,
    pub video_record: bool,
    pub screenshot_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub author: String,
    pub project_name: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub storage_state_path: PathBuf,
    /// DOM marker that only renders once the admin console is logged in.
    pub login_marker: String,
    pub login_ceiling_ms: u64,
    pub shell_ceiling_ms: u64,
}

/// Runner settings, read from `harness.toml` when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub test_timeout_ms: u64,
    pub expect_timeout_ms: u64,
    pub action_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    pub retries: u32,
    pub html_report_dir: PathBuf,
    pub allure_results_dir: PathBuf,
    pub json_report_path: PathBuf,
    pub profiles: Vec<BrowserProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserProfile {
    pub name: String,
    pub viewport: Viewport,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_true")]
    pub ignore_https_errors: bool,
    #[serde(default)]
    pub headless: Option<bool>,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            test_timeout_ms: 300_000,
            expect_timeout_ms: 10_000,
            action_timeout_ms: 15_000,
            navigation_timeout_ms: 30_000,
            retries: 2,
            html_report_dir: PathBuf::from("playwright-report"),
            allure_results_dir: PathBuf::from("allure-results"),
            json_report_path: PathBuf::from("test-results.json"),
            profiles: vec![BrowserProfile::chromium(), BrowserProfile::desktop_large()],
        }
    }
}

impl BrowserProfile {
    pub fn chromium() -> Self {
        Self {
            name: "chromium".to_string(),
            viewport: Viewport {
                width: 1440,
                height: 1080,
            },
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            ignore_https_errors: true,
            headless: Some(false),
            args: vec![],
        }
    }

    /// Second execution profile. Only Chromium is drivable over CDP, so the
    /// large-desktop profile reuses it with the wider viewport.
    pub fn desktop_large() -> Self {
        Self {
            name: "desktop-large".to_string(),
            viewport: Viewport {
                width: 1920,
                height: 1080,
            },
            user_agent: None,
            ignore_https_errors: true,
            headless: None,
            args: vec![],
        }
    }

    /// Chromium sized to a device's viewport, for responsive cases.
    pub fn for_device(mode: DeviceMode) -> Self {
        Self {
            name: format!("chromium-{}", mode),
            viewport: mode.viewport(),
            user_agent: None,
            ignore_https_errors: true,
            headless: None,
            args: vec![],
        }
    }
}

/// Application routes relative to `BASE_URL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRoute {
    Base,
    Pages,
    Sections,
    Trash,
    Themes,
    Settings,
}

impl AppRoute {
    pub fn path(&self) -> &'static str {
        match self {
            AppRoute::Base => "",
            AppRoute::Pages => "/pages",
            AppRoute::Sections => "/sections",
            AppRoute::Trash => "/trash",
            AppRoute::Themes => "/themes",
            AppRoute::Settings => "/settings",
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Process environment, then `.env` in the working directory for keys
    /// the environment lacks. The runner section comes from `runner_path`,
    /// else `HARNESS_CONFIG`, else `harness.toml`, when that file exists.
    pub fn load_with(runner_path: Option<&Path>) -> Result<Self> {
        let dotenv = read_dotenv(Path::new(DEFAULT_DOTENV))?;
        Self::load_layered(|key| std::env::var(key).ok(), &dotenv, runner_path)
    }

    fn load_layered<F>(
        env: F,
        dotenv: &HashMap<String, String>,
        runner_path: Option<&Path>,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).or_else(|| dotenv.get(key).cloned());
        let mut config = Self::from_lookup(&lookup)?;

        let runner_path = runner_path
            .map(Path::to_path_buf)
            .or_else(|| lookup("HARNESS_CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RUNNER_CONFIG));
        if runner_path.exists() {
            let retries = config.runner.retries;
            config.runner = RunnerConfig::from_file(&runner_path)?;
            if lookup("RETRY_TEST_FAIL").is_some() {
                config.runner.retries = retries;
            }
        }
        Ok(config)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup: &lookup };

        let app = AppConfig {
            environment: env.string("ENVIRONMENT", "RC"),
            base_url: env
                .optional("BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            store: env.optional("STORE"),
            store_password: env.string("PASSWORD", "your_shopify_store_password"),
            login_password: env.string("LOGIN_PASSWORD", "welcome2PF"),
            app: env.string("APP", "RC"),
            app_iframe: env.string("APP_IFRAME", "app-iframe"),
            editor_iframe: env.string(
                "EDITOR_IFRAME",
                "//iframe[starts-with(@name, 'frame://RC/modal/') and contains(@name, '/src')]",
            ),
            overlay_modal_iframe: env.string(
                "OVERLAY_MODAL_IFRAME",
                "//iframe[starts-with(@name, 'frame://RC/modal/') and not(contains(@name, '/src'))]",
            ),
            drag_drop_iframe: env.string("DRAG_DROP_IFRAME", "pf-sandbox"),
            helper_scripts_pattern: env.string(
                "HELPER_SCRIPTS_PATTERN",
                r"https://cdn\.shopify\.com/extensions/.*/pagefly-rc-\d+/assets/pagefly(-helper)?\.js",
            ),
            browser: env.string("BROWSER", "chromium"),
            headless: env.flag("HEADLESS"),
            user_data_dir: PathBuf::from(env.string("USER_DATA_DIR", "./user-data")),
        };

        let waits = WaitConfig {
            default_ms: env.number("WAIT_DEFAULT", 5_000)?,
            implicit_ms: env.number("WAIT_IMPLICIT", 20_000)?,
            explicit_ms: env.number("WAIT_EXPLICIT", 15_000)?,
            page_loaded_ms: env.number("WAIT_PAGE_LOADED", 60_000)?,
            active_page_loaded: env.flag("ACTIVE_PAGE_LOADED"),
            sleep_step_ms: env.number("WAIT_SLEEP_STEP", 0)?,
        };

        let artifacts = ArtifactConfig {
            screenshot_passed: env.flag("SCREENSHOT_PASSED_TCS"),
            screenshot_failed: env.flag("SCREENSHOT_FAILED_TCS"),
            screenshot_skipped: env.flag("SCREENSHOT_SKIPPED_TCS"),
            screenshot_all_steps: env.flag("SCREENSHOT_ALL_STEPS"),
            video_record: env.flag("VIDEO_RECORD"),
            screenshot_dir: PathBuf::from(env.string("SCREENSHOT_DIR", "screenshots")),
        };

        let report = ReportConfig {
            author: env.string("AUTHOR", "PageFly Team"),
            project_name: env.string("PROJECT_NAME", "PageFly Automation Test"),
            title: env.string("REPORT_TITLE", "PageFly Automation Test Report"),
        };

        let session = SessionConfig {
            storage_state_path: PathBuf::from(
                env.string("STORAGE_STATE_PATH", DEFAULT_STORAGE_STATE_PATH),
            ),
            login_marker: env.string("LOGIN_MARKER", ".Polaris-Navigation__Text"),
            login_ceiling_ms: env.number("LOGIN_CEILING_MS", 300_000)?,
            shell_ceiling_ms: env.number("SHELL_CEILING_MS", 60_000)?,
        };

        let runner = RunnerConfig {
            retries: env.count("RETRY_TEST_FAIL", 2)?,
            ..RunnerConfig::default()
        };

        Ok(Self {
            app,
            waits,
            artifacts,
            report,
            session,
            runner,
        })
    }

    pub fn require_base_url(&self) -> Result<&str> {
        self.app
            .base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| HarnessError::missing_env("BASE_URL"))
    }

    pub fn require_store(&self) -> Result<&str> {
        self.app
            .store
            .as_deref()
            .filter(|store| !store.is_empty())
            .ok_or_else(|| HarnessError::missing_env("STORE"))
    }

    pub fn route_url(&self, route: AppRoute) -> Result<String> {
        Ok(format!("{}{}", self.require_base_url()?, route.path()))
    }

    /// Login page of the host admin console for the configured store.
    pub fn admin_url(&self) -> Result<String> {
        Ok(format!("https://{}.myshopify.com/admin", self.require_store()?))
    }

    pub fn profile(&self, name: &str) -> Option<&BrowserProfile> {
        self.runner.profiles.iter().find(|p| p.name == name)
    }

    pub fn default_profile(&self) -> BrowserProfile {
        self.profile(&self.app.browser)
            .or_else(|| self.runner.profiles.first())
            .cloned()
            .unwrap_or_else(BrowserProfile::chromium)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.runner.action_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.runner.navigation_timeout_ms)
    }

    pub fn explicit_wait(&self) -> Duration {
        Duration::from_millis(self.waits.explicit_ms)
    }

    pub fn page_loaded_wait(&self) -> Duration {
        Duration::from_millis(self.waits.page_loaded_ms)
    }
}

impl RunnerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| HarnessError::Configuration(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

/// Entries of a dotenv file. A missing file has none.
pub fn read_dotenv(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    dotenvy::from_path_iter(path)
        .and_then(|entries| entries.collect::<std::result::Result<HashMap<_, _>, _>>())
        .map_err(|e| HarnessError::Configuration(format!("{}: {}", path.display(), e)))
}

struct EnvReader<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<'a, F: Fn(&str) -> Option<String>> EnvReader<'a, F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn flag(&self, key: &str) -> bool {
        self.optional(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    fn number(&self, key: &str, default: u64) -> Result<u64> {
        match self.optional(key) {
            Some(raw) => raw.parse().map_err(|_| {
                HarnessError::Configuration(format!("{} must be a number, got '{}'", key, raw))
            }),
            None => Ok(default),
        }
    }

    fn count(&self, key: &str, default: u32) -> Result<u32> {
        let value = self.number(key, u64::from(default))?;
        u32::try_from(value).map_err(|_| {
            HarnessError::Configuration(format!("{} is out of range, got {}", key, value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.app.app_iframe, "app-iframe");
        assert_eq!(config.app.login_password, "welcome2PF");
        assert_eq!(config.waits.implicit_ms, 20_000);
        assert_eq!(config.waits.page_loaded_ms, 60_000);
        assert_eq!(config.runner.retries, 2);
        assert_eq!(
            config.session.storage_state_path,
            PathBuf::from("./auth-state.json")
        );
        assert!(!config.app.headless);
        assert!(config.app.base_url.is_none());
    }

    #[test]
    fn test_required_variables_are_reported() {
        let config = config_with(&[]).unwrap();
        let err = config.require_base_url().unwrap_err();
        assert!(err.to_string().contains("BASE_URL"));
        let err = config.admin_url().unwrap_err();
        assert!(err.to_string().contains("STORE"));
    }

    #[test]
    fn test_routes_and_admin_url() {
        let config = config_with(&[
            ("BASE_URL", "https://rc.pagefly.io/"),
            ("STORE", "demo-shop"),
        ])
        .unwrap();
        assert_eq!(
            config.route_url(AppRoute::Pages).unwrap(),
            "https://rc.pagefly.io/pages"
        );
        assert_eq!(
            config.route_url(AppRoute::Base).unwrap(),
            "https://rc.pagefly.io"
        );
        assert_eq!(
            config.admin_url().unwrap(),
            "https://demo-shop.myshopify.com/admin"
        );
    }

    #[test]
    fn test_flags_and_numbers() {
        let config = config_with(&[
            ("HEADLESS", "TRUE"),
            ("VIDEO_RECORD", "yes"),
            ("WAIT_EXPLICIT", "2500"),
            ("RETRY_TEST_FAIL", "0"),
        ])
        .unwrap();
        assert!(config.app.headless);
        assert!(!config.artifacts.video_record);
        assert_eq!(config.explicit_wait(), Duration::from_millis(2500));
        assert_eq!(config.runner.retries, 0);
    }

    #[test]
    fn test_bad_number_is_a_configuration_error() {
        let err = config_with(&[("WAIT_IMPLICIT", "soon")]).unwrap_err();
        assert!(matches!(err, HarnessError::Configuration(_)));
        assert!(err.to_string().contains("WAIT_IMPLICIT"));
    }

    #[test]
    fn test_runner_toml_overrides_defaults() {
        let runner = RunnerConfig::from_toml_str(
            r#"
            action_timeout_ms = 5000
            retries = 1

            [[profiles]]
            name = "chromium"
            viewport = { width = 1280, height = 720 }
            headless = true
            "#,
        )
        .unwrap();
        assert_eq!(runner.action_timeout_ms, 5000);
        assert_eq!(runner.navigation_timeout_ms, 30_000);
        assert_eq!(runner.profiles.len(), 1);
        assert!(runner.profiles[0].ignore_https_errors);
        assert_eq!(runner.profiles[0].headless, Some(true));
    }

    #[test]
    fn test_default_profile_follows_browser_variable() {
        let config = config_with(&[("BROWSER", "desktop-large")]).unwrap();
        assert_eq!(config.default_profile().viewport.width, 1920);
        let config = config_with(&[("BROWSER", "webkit")]).unwrap();
        assert_eq!(config.default_profile().name, "chromium");
    }

    #[test]
    fn test_device_profile_uses_device_viewport() {
        let profile = BrowserProfile::for_device(DeviceMode::Mobile);
        assert_eq!(profile.name, "chromium-mobile");
        assert_eq!(profile.viewport.width, 375);
        assert_eq!(profile.viewport.height, 667);
    }

    #[test]
    fn test_retry_count_out_of_range_is_rejected() {
        let err = config_with(&[("RETRY_TEST_FAIL", "4294967296")]).unwrap_err();
        assert!(matches!(err, HarnessError::Configuration(_)));
        assert!(err.to_string().contains("RETRY_TEST_FAIL"));

        let config = config_with(&[("RETRY_TEST_FAIL", "4294967295")]).unwrap();
        assert_eq!(config.runner.retries, u32::MAX);
    }

    #[test]
    fn test_dotenv_fills_keys_missing_from_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# store under test\nSTORE=dotenv-store\nBASE_URL=\"https://rc.pagefly.io/\"\nRETRY_TEST_FAIL=1\n",
        )
        .unwrap();
        let dotenv = read_dotenv(&path).unwrap();
        assert_eq!(dotenv.get("STORE").map(String::as_str), Some("dotenv-store"));

        let env = |key: &str| (key == "STORE").then(|| "shell-store".to_string());
        let no_runner_file = dir.path().join("none.toml");
        let config = Config::load_layered(env, &dotenv, Some(&no_runner_file)).unwrap();
        assert_eq!(config.app.store.as_deref(), Some("shell-store"));
        assert_eq!(config.require_base_url().unwrap(), "https://rc.pagefly.io");
        assert_eq!(config.runner.retries, 1);
    }

    #[test]
    fn test_missing_dotenv_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_dotenv(&dir.path().join(".env")).unwrap().is_empty());
    }

    #[test]
    fn test_runner_file_path_wins_over_harness_config() {
        let dir = tempfile::tempdir().unwrap();
        let chosen = dir.path().join("chosen.toml");
        std::fs::write(&chosen, "retries = 5\naction_timeout_ms = 1234\n").unwrap();
        let other = dir.path().join("other.toml");
        std::fs::write(&other, "action_timeout_ms = 1\n").unwrap();

        let other_path = other.display().to_string();
        let env = move |key: &str| (key == "HARNESS_CONFIG").then(|| other_path.clone());
        let config = Config::load_layered(env, &HashMap::new(), Some(&chosen)).unwrap();
        assert_eq!(config.runner.action_timeout_ms, 1234);
        assert_eq!(config.runner.retries, 5);
    }
}
