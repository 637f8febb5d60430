//! Browser hardening applied to every tab before the first navigation.
//!
//! - automation markers hidden from page scripts
//! - timezone and locale overrides matching the browser profile
//! - trusted wheel events for scrolling that lazy loaders react to

use anyhow::Result;
use headless_chrome::protocol::cdp::Emulation::{SetLocaleOverride, SetTimezoneOverride};
use headless_chrome::protocol::cdp::Input::{
    DispatchMouseEvent, DispatchMouseEventPointer_TypeOption, DispatchMouseEventTypeOption,
};
use headless_chrome::protocol::cdp::Page::AddScriptToEvaluateOnNewDocument;
use headless_chrome::Tab;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::config::BrowserProfile;

/// Script evaluated before any page script (`Page.addScriptToEvaluateOnNewDocument`).
pub fn stealth_script(locale: &str) -> String {
    let languages = serde_json::json!([locale, locale.split('-').next().unwrap_or(locale)]);
    format!(
        r#"
        Object.defineProperty(navigator, 'webdriver', {{ get: () => undefined }});

        Object.defineProperty(navigator, 'languages', {{ get: () => {languages} }});

        if (!window.chrome) {{
            window.chrome = {{ runtime: {{}}, csi: function() {{}}, loadTimes: function() {{ return {{}}; }} }};
        }}

        const originalQuery = window.navigator.permissions && window.navigator.permissions.query;
        if (originalQuery) {{
            window.navigator.permissions.query = (parameters) => (
                parameters.name === 'notifications'
                    ? Promise.resolve({{ state: Notification.permission }})
                    : originalQuery(parameters)
            );
        }}

        Object.defineProperty(navigator, 'plugins', {{
            get: () => {{
                const pdf = {{ description: "Portable Document Format", filename: "internal-pdf-viewer", length: 1, name: "Chrome PDF Plugin" }};
                const p = [pdf, pdf, pdf];
                Object.setPrototypeOf(p, PluginArray.prototype);
                return p;
            }}
        }});
    "#
    )
}

/// Install the stealth script and the locale/timezone overrides on `tab`.
pub fn install(tab: &Arc<Tab>, profile: &BrowserProfile) -> Result<()> {
    tab.call_method(AddScriptToEvaluateOnNewDocument {
        source: stealth_script(&profile.locale),
        world_name: None,
        include_command_line_api: None,
        run_immediately: None,
    })?;
    tab.call_method(SetTimezoneOverride {
        timezone_id: profile.timezone.clone(),
    })?;
    tab.call_method(SetLocaleOverride {
        locale: Some(profile.locale.clone()),
    })?;
    Ok(())
}

/// Scroll with trusted wheel events, split into a few steps.
pub async fn wheel(tab: &Arc<Tab>, delta_y: f64) -> Result<()> {
    let steps = 5;
    let step_size = delta_y / steps as f64;

    for _ in 0..steps {
        tab.call_method(DispatchMouseEvent {
            Type: DispatchMouseEventTypeOption::MouseWheel,
            x: 200.0,
            y: 200.0,
            button: None,
            buttons: None,
            modifiers: None,
            timestamp: None,
            delta_x: Some(0.0),
            delta_y: Some(step_size),
            pointer_Type: Some(DispatchMouseEventPointer_TypeOption::Mouse),
            force: None,
            tangential_pressure: None,
            tilt_x: None,
            tilt_y: None,
            twist: None,
            click_count: None,
        })?;

        let delay = rand::thread_rng().gen_range(20..60);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    Ok(())
}
