use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct LabConfig {
    pub browser: BrowserSection,
    pub environments: EnvironmentSection,
    pub timing: TimingSection,
    pub adjustments: AdjustmentSection,
    pub selectors: SelectorSection,
}

/// Environment variables read by [`LabConfig::with_env_overrides`].
pub const ENV_OVERRIDE_VARS: [&str; 4] = [
    "LX_ROL_BASE_URL",
    "LX_FACTORY_BASE_URL",
    "LX_CHINA_BASE_URL",
    "LX_CHROMIUM_PATH",
];

impl LabConfig {
    /// Applies `LX_<ENV>_BASE_URL` overrides on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var("LX_ROL_BASE_URL") {
            self.environments.rol = Some(value);
        }
        if let Ok(value) = std::env::var("LX_FACTORY_BASE_URL") {
            self.environments.factory = Some(value);
        }
        if let Ok(value) = std::env::var("LX_CHINA_BASE_URL") {
            self.environments.china = Some(value);
        }
        if let Ok(value) = std::env::var("LX_CHROMIUM_PATH") {
            self.browser.executable_path = Some(value);
        }
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub window_size: [u32; 2],
    pub request_timeout_seconds: Option<u64>,
    pub extra_args: Vec<String>,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: false,
            sandbox: true,
            window_size: [1600, 1200],
            request_timeout_seconds: Some(30),
            extra_args: vec!["--ignore-certificate-errors".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnvironmentSection {
    pub default: String,
    pub rol: Option<String>,
    pub factory: Option<String>,
    pub china: Option<String>,
}

impl Default for EnvironmentSection {
    fn default() -> Self {
        Self {
            default: "rol".to_string(),
            rol: Some("https://rol.redhat.com/rol/app/courses/".to_string()),
            factory: None,
            china: None,
        }
    }
}

/// Every bound the lifecycle automaton waits on.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    pub poll_interval_ms: u64,
    pub interface_detect_seconds: u64,
    pub tab_select_seconds: u64,
    pub old_tab_select_seconds: u64,
    pub tab_recovery_pause_ms: u64,
    pub tab_settle_ms: u64,
    pub status_probe_seconds: u64,
    pub transition_poll_seconds: u64,
    pub dialog_confirm_seconds: u64,
    pub post_click_pause_ms: u64,
    pub create_transition_seconds: u64,
    pub start_transition_seconds: u64,
    pub stop_transition_seconds: u64,
    pub delete_transition_seconds: u64,
    pub delete_completion_seconds: u64,
    pub recreate_settle_seconds: u64,
    pub console_ready_seconds: u64,
    pub autostop_read_seconds: u64,
    pub site_ready_seconds: u64,
    pub impersonate_seconds: u64,
    pub max_recreate_passes: usize,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            interface_detect_seconds: 10,
            tab_select_seconds: 20,
            old_tab_select_seconds: 10,
            tab_recovery_pause_ms: 1000,
            tab_settle_ms: 200,
            status_probe_seconds: 5,
            transition_poll_seconds: 3,
            dialog_confirm_seconds: 10,
            post_click_pause_ms: 2000,
            create_transition_seconds: 60,
            start_transition_seconds: 60,
            stop_transition_seconds: 60,
            delete_transition_seconds: 120,
            delete_completion_seconds: 180,
            recreate_settle_seconds: 300,
            console_ready_seconds: 300,
            autostop_read_seconds: 30,
            site_ready_seconds: 10,
            impersonate_seconds: 20,
            max_recreate_passes: 3,
        }
    }
}

impl TimingSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn interface_detect(&self) -> Duration {
        Duration::from_secs(self.interface_detect_seconds)
    }

    pub fn tab_select(&self) -> Duration {
        Duration::from_secs(self.tab_select_seconds)
    }

    pub fn old_tab_select(&self) -> Duration {
        Duration::from_secs(self.old_tab_select_seconds)
    }

    pub fn tab_recovery_pause(&self) -> Duration {
        Duration::from_millis(self.tab_recovery_pause_ms)
    }

    pub fn tab_settle(&self) -> Duration {
        Duration::from_millis(self.tab_settle_ms)
    }

    pub fn status_probe(&self) -> Duration {
        Duration::from_secs(self.status_probe_seconds)
    }

    pub fn transition_poll(&self) -> Duration {
        Duration::from_secs(self.transition_poll_seconds)
    }

    pub fn dialog_confirm(&self) -> Duration {
        Duration::from_secs(self.dialog_confirm_seconds)
    }

    pub fn post_click_pause(&self) -> Duration {
        Duration::from_millis(self.post_click_pause_ms)
    }

    pub fn create_transition(&self) -> Duration {
        Duration::from_secs(self.create_transition_seconds)
    }

    pub fn start_transition(&self) -> Duration {
        Duration::from_secs(self.start_transition_seconds)
    }

    pub fn stop_transition(&self) -> Duration {
        Duration::from_secs(self.stop_transition_seconds)
    }

    pub fn delete_transition(&self) -> Duration {
        Duration::from_secs(self.delete_transition_seconds)
    }

    pub fn delete_completion(&self) -> Duration {
        Duration::from_secs(self.delete_completion_seconds)
    }

    pub fn recreate_settle(&self) -> Duration {
        Duration::from_secs(self.recreate_settle_seconds)
    }

    pub fn console_ready(&self) -> Duration {
        Duration::from_secs(self.console_ready_seconds)
    }

    pub fn autostop_read(&self) -> Duration {
        Duration::from_secs(self.autostop_read_seconds)
    }

    pub fn site_ready(&self) -> Duration {
        Duration::from_secs(self.site_ready_seconds)
    }

    pub fn impersonate(&self) -> Duration {
        Duration::from_secs(self.impersonate_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdjustmentSection {
    pub autostop_max_hours: u32,
    pub lifespan_clicks: u32,
    pub click_pause_ms: u64,
}

impl Default for AdjustmentSection {
    fn default() -> Self {
        Self {
            autostop_max_hours: 2,
            lifespan_clicks: 14,
            click_pause_ms: 100,
        }
    }
}

impl AdjustmentSection {
    pub fn click_pause(&self) -> Duration {
        Duration::from_millis(self.click_pause_ms)
    }
}

/// XPath templates. `{label}`, `{id}` and `{row}` are substituted at use.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorSection {
    pub new_interface_marker: String,
    pub old_interface_marker: String,
    pub new_tab: String,
    pub old_tab: String,
    pub lab_buttons: String,
    pub confirm_button: String,
    pub adjust_button: String,
    pub autostop_time: String,
    pub console_ready: String,
    pub site_ready: String,
    pub factory_site_ready: String,
    pub old_toc_links: String,
    pub new_toc_links: String,
    pub fallback_toc_links: String,
    pub switch_user_button: String,
    pub impersonate_username: String,
    pub impersonate_confirm: String,
}

impl Default for SelectorSection {
    fn default() -> Self {
        Self {
            new_interface_marker:
                r#"//button[contains(@aria-label, "Table of Contents") or contains(@aria-label, "Toggle Table of Contents")]"#
                    .to_string(),
            old_interface_marker: r#"//div[@class="progress-map"]"#.to_string(),
            new_tab: r#"//button[@role="tab" and .//span[contains(text(), "{label}")]]"#
                .to_string(),
            old_tab: r#"//*[@id="course-tabs-tab-{id}"]"#.to_string(),
            lab_buttons: r#"//*[@id="tab-course-lab-environment"]//*[@type="button"][contains(text(), "Creat") or contains(text(), "Delet") or contains(text(), "Start") or contains(text(), "Stop")]"#
                .to_string(),
            confirm_button:
                r#"//*[@role="dialog"]//*[@type="button"][contains(text(), "{label}")]"#.to_string(),
            adjust_button:
                r#"//*[@id="tab-course-lab-environment"]/div/table/tr[{row}]/td[2]/button"#
                    .to_string(),
            autostop_time: "//table/tr[1]/td[1]/time".to_string(),
            console_ready: r#"//button[text()="Open Console"]"#.to_string(),
            site_ready: "//header//nav//button".to_string(),
            factory_site_ready: r#"//div[contains(@class, "sb-avatar")]"#.to_string(),
            old_toc_links: r#"//*[@id="tab-course-toc"]/tbody/tr/td/div/a"#.to_string(),
            new_toc_links:
                r#"//a[contains(@href, "/pages/") and @data-analytics-id="toc-link-ole-lp"]"#
                    .to_string(),
            fallback_toc_links: r#"//a[contains(@href, "/pages/")]"#.to_string(),
            switch_user_button: r#"//*[(self::button or self::a) and normalize-space(.)="Switch user"] | //*[text()="Switch user"]"#
                .to_string(),
            impersonate_username: r#"//*[@id="formInlineUsername"]"#.to_string(),
            impersonate_confirm: r#"//button[normalize-space(.)="Switch User"]"#.to_string(),
        }
    }
}

pub fn load_lab_config<P: AsRef<Path>>(path: P) -> Result<LabConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lx.toml");
        fs::write(
            &path,
            r#"
[environments]
factory = "https://factory.example.com/courses/"

[timing]
delete_completion_seconds = 240
"#,
        )
        .unwrap();

        let config = load_lab_config(&path).unwrap();
        assert_eq!(
            config.environments.factory.as_deref(),
            Some("https://factory.example.com/courses/")
        );
        assert!(config.environments.rol.is_some());
        assert_eq!(config.timing.delete_completion(), Duration::from_secs(240));
        assert_eq!(config.timing.tab_select(), Duration::from_secs(20));
        assert_eq!(config.adjustments.lifespan_clicks, 14);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = load_lab_config(&path).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[timing\npoll_interval_ms = ").unwrap();
        assert!(matches!(
            load_lab_config(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
