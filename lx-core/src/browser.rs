use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::handler::viewport::Viewport as ChromiumViewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserSection;
use crate::lab::{LabError, LabResult, Locator, PageDriver, PageLink};

#[derive(Debug, Clone, Default)]
pub struct LaunchOverrides {
    pub headless: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct BrowserLauncher {
    config: Arc<BrowserSection>,
}

impl BrowserLauncher {
    pub fn new(config: BrowserSection) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub async fn launch_with_overrides(
        &self,
        overrides: LaunchOverrides,
    ) -> LabResult<BrowserAutomation> {
        let headless = overrides.headless.unwrap_or(self.config.headless);
        let chromium_config = self.build_chromium_config(headless)?;
        let [width, height] = self.config.window_size;
        info!(
            headless,
            width,
            height,
            executable = self.config.executable_path.as_deref().unwrap_or("auto"),
            "Launching Chromium instance"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| LabError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "Chromium handler reported error");
                }
            }
        });

        Ok(BrowserAutomation {
            browser,
            handler_task: Some(handler_task),
        })
    }

    fn build_chromium_config(&self, headless: bool) -> LabResult<ChromiumConfig> {
        let [width, height] = self.config.window_size;
        let mut builder = ChromiumConfig::builder().viewport(ChromiumViewport {
            width,
            height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: width >= height,
            has_touch: false,
        });

        if let Some(path) = &self.config.executable_path {
            builder = builder.chrome_executable(path);
        }
        if !headless {
            builder = builder.with_head();
        }
        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(timeout) = self.config.request_timeout_seconds {
            builder = builder.request_timeout(Duration::from_secs(timeout));
        }

        let mut args = vec![format!("--window-size={width},{height}")];
        args.extend(self.config.extra_args.iter().cloned());
        builder = builder.args(args);

        builder.build().map_err(LabError::Launch)
    }
}

#[derive(Debug)]
pub struct BrowserAutomation {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
}

impl BrowserAutomation {
    pub async fn new_driver(&self) -> LabResult<ChromiumDriver> {
        let page = self.browser.new_page("about:blank").await?;
        Ok(ChromiumDriver { page })
    }

    pub async fn shutdown(mut self) -> LabResult<()> {
        info!("Shutting down Chromium instance");
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "Failed to close browser gracefully");
        }
        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "Browser handler join error");
            }
        }
        Ok(())
    }
}

impl Drop for BrowserAutomation {
    fn drop(&mut self) {
        if let Some(handle) = &self.handler_task {
            if !handle.is_finished() {
                warn!("BrowserAutomation dropped without explicit shutdown");
            }
        }
    }
}

/// `PageDriver` over one Chromium tab. XPath lookups run in the page through
/// `document.evaluate`.
#[derive(Debug)]
pub struct ChromiumDriver {
    page: Page,
}

#[derive(Debug, Deserialize)]
struct AttributeProbe {
    found: bool,
    value: Option<String>,
}

const COOKIE_CONSENT_SCRIPT: &str = r#"
(() => {
    const frame = document.querySelector('iframe[title="TrustArc Cookie Consent Manager"]');
    if (!frame) return false;
    let doc = null;
    try {
        doc = frame.contentDocument;
    } catch (_) {
        return false;
    }
    if (!doc) return false;
    const agree = Array.from(doc.querySelectorAll('a.call'))
        .find((a) => (a.textContent || '').includes('Agree and proceed'));
    if (!agree) return false;
    agree.click();
    return true;
})()
"#;

impl ChromiumDriver {
    async fn eval<T: DeserializeOwned>(&self, script: String, what: &str) -> LabResult<T> {
        self.page
            .evaluate(script.as_str())
            .await
            .map_err(|err| LabError::Script(format!("failed to evaluate {what} script: {err}")))?
            .into_value()
            .map_err(|err| LabError::Script(format!("failed to decode {what} result: {err}")))
    }

    /// Wraps `body` in an IIFE with `nodes` bound to the snapshot of `locator`.
    fn snapshot_script(locator: &Locator, body: &str) -> LabResult<String> {
        let xpath = serde_json::to_string(locator.as_str())
            .map_err(|err| LabError::Script(format!("invalid locator {locator}: {err}")))?;
        Ok(format!(
            r#"(() => {{
    const snapshot = document.evaluate({xpath}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
    const nodes = [];
    for (let i = 0; i < snapshot.snapshotLength; i++) nodes.push(snapshot.snapshotItem(i));
    {body}
}})()"#
        ))
    }
}

#[async_trait(?Send)]
impl PageDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str) -> LabResult<()> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(LabError::Configuration)?;
        self.page.goto(params).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    async fn reload(&mut self) -> LabResult<()> {
        self.page.reload().await?;
        Ok(())
    }

    async fn current_url(&mut self) -> LabResult<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn count(&mut self, locator: &Locator) -> LabResult<usize> {
        let script = Self::snapshot_script(locator, "return nodes.length;")?;
        self.eval(script, "count").await
    }

    async fn texts(&mut self, locator: &Locator) -> LabResult<Vec<String>> {
        let script = Self::snapshot_script(
            locator,
            "return nodes.map((n) => (n.innerText || n.textContent || '').trim());",
        )?;
        self.eval(script, "text").await
    }

    async fn attribute(
        &mut self,
        locator: &Locator,
        index: usize,
        name: &str,
    ) -> LabResult<Option<String>> {
        let name = serde_json::to_string(name)
            .map_err(|err| LabError::Script(format!("invalid attribute name: {err}")))?;
        let body = format!(
            "const n = nodes[{index}]; return n ? {{ found: true, value: n.getAttribute({name}) }} : {{ found: false, value: null }};"
        );
        let script = Self::snapshot_script(locator, &body)?;
        let probe: AttributeProbe = self.eval(script, "attribute").await?;
        if !probe.found {
            return Err(LabError::ElementNotFound(locator.to_string()));
        }
        Ok(probe.value)
    }

    async fn click(&mut self, locator: &Locator, index: usize) -> LabResult<()> {
        let body = format!(
            "const n = nodes[{index}]; if (!n) return false; n.scrollIntoView({{ block: 'center' }}); n.click(); return true;"
        );
        let script = Self::snapshot_script(locator, &body)?;
        let clicked: bool = self.eval(script, "click").await?;
        if clicked {
            Ok(())
        } else {
            Err(LabError::ElementNotFound(locator.to_string()))
        }
    }

    async fn type_text(&mut self, locator: &Locator, index: usize, text: &str) -> LabResult<()> {
        let text = serde_json::to_string(text)
            .map_err(|err| LabError::Script(format!("invalid input text: {err}")))?;
        let body = format!(
            r#"const n = nodes[{index}]; if (!n) return false;
    n.focus();
    const setter = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(n), 'value');
    if (setter && setter.set) setter.set.call(n, {text}); else n.value = {text};
    n.dispatchEvent(new Event('input', {{ bubbles: true }}));
    n.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return true;"#
        );
        let script = Self::snapshot_script(locator, &body)?;
        let typed: bool = self.eval(script, "input").await?;
        if typed {
            Ok(())
        } else {
            Err(LabError::ElementNotFound(locator.to_string()))
        }
    }

    async fn links(&mut self, locator: &Locator) -> LabResult<Vec<PageLink>> {
        let script = Self::snapshot_script(
            locator,
            "return nodes.map((n) => ({ text: (n.innerText || n.textContent || '').trim(), href: n.href || n.getAttribute('href') || '' }));",
        )?;
        self.eval(script, "links").await
    }

    async fn execute(&mut self, script: &str) -> LabResult<()> {
        let wrapped = format!("(() => {{ {script}\n return true; }})()");
        let _: bool = self.eval(wrapped, "page").await?;
        Ok(())
    }

    async fn accept_cookie_consent(&mut self) -> LabResult<bool> {
        let accepted: bool = self
            .eval(COOKIE_CONSENT_SCRIPT.to_string(), "cookie consent")
            .await?;
        if accepted {
            debug!("cookie consent accepted, reloading page");
            self.page.reload().await?;
        }
        Ok(accepted)
    }
}
