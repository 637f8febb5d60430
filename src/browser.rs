//! Headless Chrome implementation of [`Renderer`].

use anyhow::Context;
use async_trait::async_trait;
use headless_chrome::browser::tab::RequestPausedDecision;
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::{FailRequest, RequestPattern, RequestStage};
use headless_chrome::protocol::cdp::Network::{ErrorReason, ResourceType};
use headless_chrome::{Browser, LaunchOptions, Tab};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::RenderError;
use crate::proxy::{auth_extension, Proxy};
use crate::renderer::{Region, RegionLocator, Renderer};
use crate::stealth;

static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    ]
});

const CLICK_POLL: Duration = Duration::from_millis(250);

/// JSON string literal, safe to splice into a page script.
fn js_str(s: &str) -> String {
    Value::from(s).to_string()
}

/// One browser process and the single tab all work goes through.
///
/// Dropping it closes the browser.
pub struct ChromeRenderer {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeRenderer {
    pub fn launch(config: &Config) -> anyhow::Result<Self> {
        use rand::seq::SliceRandom;
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36");

        let (width, height) = config.browser.window_size;
        let mut args: Vec<String> = vec![
            "--disable-blink-features=AutomationControlled".into(),
            "--no-sandbox".into(),
            "--disable-dev-shm-usage".into(),
            "--disable-infobars".into(),
            format!("--lang={}", config.browser.locale),
            format!("--user-agent={user_agent}"),
        ];
        if config.headless {
            args.push("--headless=new".into());
        }

        if let Some(raw) = config.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy = Proxy::parse(raw).with_context(|| format!("invalid proxy {raw:?}"))?;
            args.push(format!("--proxy-server={}", proxy.to_chrome_arg()));
            if let (Some(user), Some(pass)) = (&proxy.username, &proxy.password) {
                let ext = auth_extension(user, pass).context("writing proxy auth extension")?;
                args.push(format!("--load-extension={}", ext.display()));
                info!("Proxy auth extension loaded");
            }
            info!(proxy = %proxy.to_chrome_arg(), "Using proxy");
        } else {
            debug!("No proxy configured, using direct connection");
        }

        let os_args: Vec<&OsStr> = args.iter().map(OsStr::new).collect();
        let browser = Browser::new(LaunchOptions {
            // Headless mode goes through `--headless=new` above.
            headless: false,
            window_size: Some((width, height)),
            idle_browser_timeout: Duration::from_secs(300),
            args: os_args,
            ..Default::default()
        })?;

        let tab = browser.new_tab()?;
        tab.enable_debugger()?;
        if let Err(e) = stealth::install(&tab, &config.browser) {
            warn!("Failed to apply stealth settings: {}", e);
        }

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Evaluate `script` and decode its value. Scripts that build objects
    /// return them `JSON.stringify`-ed.
    fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T, RenderError> {
        let result = self.tab.evaluate(script, false)?;
        let value = match result.value {
            Some(Value::String(s)) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
            Some(other) => other,
            None => Value::Null,
        };
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        self.tab.set_default_timeout(timeout);
        self.tab.navigate_to(url)?;
        self.tab.wait_until_navigated()?;
        Ok(())
    }

    fn current_url(&self) -> String {
        self.tab.get_url()
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), RenderError> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map(|_| ())
            .map_err(|_| RenderError::timeout(selector, timeout))
    }

    async fn click_text(
        &self,
        selector: &str,
        label: &str,
        timeout: Duration,
    ) -> Result<bool, RenderError> {
        let script = format!(
            r#"(() => {{
                const label = {label}.toLowerCase();
                const visible = el => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
                const el = Array.from(document.querySelectorAll({selector}))
                    .find(el => visible(el) && (el.innerText || el.textContent || '').toLowerCase().includes(label));
                if (!el) return false;
                el.click();
                return true;
            }})()"#,
            label = js_str(label),
            selector = js_str(selector),
        );

        let deadline = Instant::now() + timeout;
        loop {
            if self.eval::<bool>(&script)? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(CLICK_POLL).await;
        }
    }

    async fn attribute(&self, selector: &str, attr: &str) -> Result<Option<String>, RenderError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({selector});
                return JSON.stringify(el ? el.getAttribute({attr}) : null);
            }})()"#,
            selector = js_str(selector),
            attr = js_str(attr),
        );
        self.eval(&script)
    }

    async fn attributes(&self, selector: &str, attr: &str) -> Result<Vec<String>, RenderError> {
        let script = format!(
            r#"(() => JSON.stringify(
                Array.from(document.querySelectorAll({selector}))
                    .map(el => el.getAttribute({attr}))
                    .filter(v => v !== null)
            ))()"#,
            selector = js_str(selector),
            attr = js_str(attr),
        );
        self.eval(&script)
    }

    async fn inner_text(&self, selector: &str, timeout: Duration) -> Result<String, RenderError> {
        self.wait_for(selector, timeout).await?;
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({selector});
                return JSON.stringify(el ? (el.innerText || el.textContent || '') : null);
            }})()"#,
            selector = js_str(selector),
        );
        self.eval::<Option<String>>(&script)?
            .map(|t| t.trim().to_string())
            .ok_or_else(|| RenderError::ElementNotFound(selector.to_string()))
    }

    async fn region(
        &self,
        locator: &RegionLocator,
        link_selector: &str,
    ) -> Result<Option<Region>, RenderError> {
        let script = format!(
            r#"(() => {{
                const loc = {locator};
                const visible = el => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
                const textOf = el => (el.innerText || el.textContent || '');
                let candidates = [];
                if (loc.kind === 'heading') {{
                    const wanted = loc.text.toLowerCase();
                    candidates = Array.from(document.querySelectorAll(loc.container))
                        .filter(c => Array.from(c.querySelectorAll(loc.heading))
                            .some(h => textOf(h).toLowerCase().includes(wanted)));
                }} else if (loc.kind === 'containing') {{
                    candidates = Array.from(document.querySelectorAll(loc.container))
                        .filter(c => c.querySelector(loc.selector));
                }} else {{
                    candidates = Array.from(document.querySelectorAll(loc.selector));
                }}
                const el = candidates.find(visible);
                if (!el) return JSON.stringify(null);
                const links = Array.from(el.querySelectorAll({links}))
                    .map(a => ({{ href: a.getAttribute('href') || '', text: textOf(a).trim() }}));
                return JSON.stringify({{ text: textOf(el), links }});
            }})()"#,
            locator = serde_json::to_string(locator)?,
            links = js_str(link_selector),
        );
        self.eval(&script)
    }

    async fn scroll_by(&self, delta_y: i64) -> Result<(), RenderError> {
        stealth::wheel(&self.tab, delta_y as f64).await?;
        Ok(())
    }

    async fn scroll_to(&self, fraction_of_height: f64) -> Result<(), RenderError> {
        let script = format!(
            "window.scrollTo(0, document.body.scrollHeight * {}); true",
            fraction_of_height.clamp(0.0, 1.0)
        );
        self.eval::<Value>(&script)?;
        Ok(())
    }

    async fn page_height(&self) -> Result<u64, RenderError> {
        let height: f64 = self.eval("document.body ? document.body.scrollHeight : 0")?;
        Ok(height.max(0.0) as u64)
    }

    async fn content(&self) -> Result<String, RenderError> {
        Ok(self.tab.get_content()?)
    }

    async fn block_heavy_resources(&self, blocked: bool) -> Result<(), RenderError> {
        if !blocked {
            self.tab.disable_fetch()?;
            return Ok(());
        }

        // Only these types are paused, so every paused request gets refused.
        let patterns: Vec<RequestPattern> = [ResourceType::Image, ResourceType::Font, ResourceType::Media]
            .into_iter()
            .map(|kind| RequestPattern {
                url_pattern: None,
                resource_Type: Some(kind),
                request_stage: Some(RequestStage::Request),
            })
            .collect();
        self.tab.enable_fetch(Some(patterns.as_slice()), None)?;
        self.tab.enable_request_interception(Arc::new(
            |_transport: Arc<Transport>, _session: SessionId, paused: RequestPausedEvent| {
                RequestPausedDecision::Fail(FailRequest {
                    request_id: paused.params.request_id,
                    error_reason: ErrorReason::BlockedByClient,
                })
            },
        ))?;
        debug!("Blocking images, fonts and media");
        Ok(())
    }
}
