use crate::scripts;
use extperf_browser::{BrowserDriver, with_timeout};
use extperf_core::page::{
    ButtonRole, DialogAction, DialogButton, DialogDetection, DialogElement, DialogRecord, ElementBounds,
    NativeDialog,
};
use extperf_core::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

lazy_static! {
    static ref DISMISSIVE_LABEL: Regex = Regex::new(
        r"(?i)\b(cancel|no|nope|close|dismiss|decline|reject|deny|not now|later|skip|don'?t|do not|without|necessary only|only necessary)\b"
    )
    .unwrap();
    static ref CLOSE_GLYPH: Regex = Regex::new(r"^\s*(x|×|✕|✖)\s*$").unwrap();
    static ref AFFIRMATIVE_LABEL: Regex = Regex::new(
        r"(?i)\b(ok|okay|yes|accept|agree|allow|continue|confirm|got it|sure|proceed|understood|i understand)\b"
    )
    .unwrap();
}

/// Role of a control, judged from its visible label. Negations win over affirmations so that
/// "Don't allow" and "Continue without accepting" read as dismissive.
pub fn classify_button(label: &str) -> ButtonRole {
    if CLOSE_GLYPH.is_match(label) || DISMISSIVE_LABEL.is_match(label) {
        ButtonRole::Dismissive
    } else if AFFIRMATIVE_LABEL.is_match(label) {
        ButtonRole::Affirmative
    } else {
        ButtonRole::Neutral
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawButton {
    label: String,
    selector: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDialog {
    tag_name: String,
    id: Option<String>,
    width: f64,
    height: f64,
    selector: Option<String>,
    message: String,
    buttons: Vec<RawButton>,
}

impl From<RawDialog> for DialogRecord {
    fn from(raw: RawDialog) -> Self {
        let buttons = raw
            .buttons
            .into_iter()
            .map(|b| {
                let role = classify_button(&b.label);
                DialogButton {
                    is_affirmative: role == ButtonRole::Affirmative,
                    role,
                    label: b.label,
                    selector: b.selector,
                }
            })
            .collect();

        DialogRecord {
            element: DialogElement {
                tag_name: raw.tag_name,
                id: raw.id.filter(|id| !id.is_empty()),
                bounds: Some(ElementBounds {
                    width: raw.width,
                    height: raw.height,
                }),
            },
            selector: raw.selector,
            message: raw.message,
            buttons,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClickOutcome {
    clicked: bool,
}

/// Finds blocking dialogs on the driven tab and accepts or dismisses them
pub struct DialogManager {
    driver: Arc<dyn BrowserDriver>,
    evaluation_timeout: Duration,
}

impl DialogManager {
    pub fn new(driver: Arc<dyn BrowserDriver>, evaluation_timeout: Duration) -> Self {
        Self {
            driver,
            evaluation_timeout,
        }
    }

    /// Native dialog plus visible custom modals. The DOM is left alone while a native dialog is
    /// open since the page cannot answer scripts then.
    pub async fn detect(&self) -> Result<DialogDetection> {
        if let Some(native) = self.driver.native_dialog().await? {
            tracing::debug!("Native {} dialog open, skipping DOM scan", native.kind.as_str());
            return Ok(DialogDetection::new(Vec::new(), Some(native)));
        }

        let custom = self.custom_dialogs(self.evaluation_timeout).await?;
        tracing::debug!("Found {} custom dialog(s)", custom.len());
        Ok(DialogDetection::new(custom, None))
    }

    /// Accept or dismiss the native dialog, or the modal matching `selector` (first one when
    /// `None`). Returns `false` when there is nothing to act on.
    pub async fn handle(&self, action: DialogAction, selector: Option<&str>, timeout: Duration) -> Result<bool> {
        if let Some(native) = self.driver.native_dialog().await? {
            self.handle_native(&native, action).await?;
            return Ok(true);
        }

        let dialogs = self.custom_dialogs(timeout).await?;
        let target = match selector {
            Some(wanted) => Some(
                dialogs
                    .iter()
                    .find(|d| d.selector.as_deref() == Some(wanted))
                    .ok_or_else(|| Error::ElementNotFound(wanted.to_string()))?,
            ),
            None => dialogs.first(),
        };

        let Some(dialog) = target else {
            tracing::debug!("No dialog to {}", action.as_str());
            return Ok(false);
        };

        let role = match action {
            DialogAction::Accept => ButtonRole::Affirmative,
            DialogAction::Dismiss => ButtonRole::Dismissive,
        };
        let Some(button) = dialog.first_button(role) else {
            tracing::debug!(
                "Dialog {:?} has no {:?} control to {}",
                dialog.selector,
                role,
                action.as_str()
            );
            return Ok(false);
        };
        let Some(button_selector) = button.selector.as_deref() else {
            return Ok(false);
        };

        self.click(button_selector, timeout).await?;
        tracing::info!("Clicked '{}' to {} dialog", button.label, action.as_str());
        Ok(true)
    }

    async fn handle_native(&self, dialog: &NativeDialog, action: DialogAction) -> Result<()> {
        tracing::info!("{} native {} dialog: {}", action.as_str(), dialog.kind.as_str(), dialog.message);
        match action {
            DialogAction::Accept => {
                self.driver
                    .accept_native_dialog(dialog.default_prompt.as_deref())
                    .await?
            }
            DialogAction::Dismiss => self.driver.dismiss_native_dialog().await?,
        }
        Ok(())
    }

    async fn custom_dialogs(&self, timeout: Duration) -> Result<Vec<DialogRecord>> {
        let script = scripts::detect_dialogs(scripts::MODAL_SELECTORS)?;
        let value = with_timeout("detect dialogs", timeout, self.driver.evaluate(&script)).await?;
        if value.is_null() {
            return Ok(Vec::new());
        }

        let raw: Vec<RawDialog> = serde_json::from_value(value)?;
        Ok(raw.into_iter().map(DialogRecord::from).collect())
    }

    async fn click(&self, selector: &str, timeout: Duration) -> Result<()> {
        let script = scripts::click(selector)?;
        let value = with_timeout("click", timeout, self.driver.evaluate(&script)).await?;
        let outcome: ClickOutcome = serde_json::from_value(value)?;

        if outcome.clicked {
            Ok(())
        } else {
            Err(Error::ElementNotFound(selector.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extperf_browser::testing::{DialogCall, ScriptedDriver};
    use extperf_core::page::NativeDialogKind;
    use serde_json::json;
    use std::sync::Mutex;

    fn cookie_banner() -> serde_json::Value {
        json!([{
            "tagName": "div",
            "id": "cookie-banner",
            "width": 800.0,
            "height": 120.0,
            "selector": "#cookie-banner",
            "message": "We use cookies. Accept all / Reject",
            "buttons": [
                { "label": "Accept all", "selector": "#cookie-banner > button:nth-of-type(1)" },
                { "label": "Reject", "selector": "#cookie-banner > button:nth-of-type(2)" },
                { "label": "Settings", "selector": "#cookie-banner > a" }
            ]
        }])
    }

    fn manager(driver: &Arc<ScriptedDriver>) -> DialogManager {
        DialogManager::new(driver.clone(), Duration::from_secs(1))
    }

    #[test]
    fn test_classify_button() {
        assert_eq!(classify_button("OK"), ButtonRole::Affirmative);
        assert_eq!(classify_button("Accept all cookies"), ButtonRole::Affirmative);
        assert_eq!(classify_button("Got it!"), ButtonRole::Affirmative);
        assert_eq!(classify_button("No thanks"), ButtonRole::Dismissive);
        assert_eq!(classify_button("Not now"), ButtonRole::Dismissive);
        assert_eq!(classify_button("Don't allow"), ButtonRole::Dismissive);
        assert_eq!(classify_button("Continue without accepting"), ButtonRole::Dismissive);
        assert_eq!(classify_button("Accept only necessary"), ButtonRole::Dismissive);
        assert_eq!(classify_button("Continue"), ButtonRole::Affirmative);
        assert_eq!(classify_button("×"), ButtonRole::Dismissive);
        assert_eq!(classify_button("Close"), ButtonRole::Dismissive);
        assert_eq!(classify_button("Settings"), ButtonRole::Neutral);
        assert_eq!(classify_button("Notification preferences"), ButtonRole::Neutral);
    }

    #[tokio::test]
    async fn test_page_without_modals() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.on_evaluate(|_| Ok(json!([])));

        let detection = manager(&driver).detect().await.unwrap();
        assert!(detection.custom_dialogs.is_empty());
        assert!(!detection.browser_dialog_visible);
        assert_eq!(detection.summary.total_buttons, 0);
    }

    #[tokio::test]
    async fn test_detects_custom_modal_with_roles() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.on_evaluate(|_| Ok(cookie_banner()));

        let detection = manager(&driver).detect().await.unwrap();
        assert_eq!(detection.summary.custom_dialog_count, 1);
        assert_eq!(detection.summary.total_buttons, 3);

        let dialog = &detection.custom_dialogs[0];
        assert_eq!(dialog.element.id.as_deref(), Some("cookie-banner"));
        assert_eq!(dialog.buttons[0].role, ButtonRole::Affirmative);
        assert!(dialog.buttons[0].is_affirmative);
        assert_eq!(dialog.buttons[1].role, ButtonRole::Dismissive);
        assert_eq!(dialog.buttons[2].role, ButtonRole::Neutral);
    }

    #[tokio::test(start_paused = true)]
    async fn test_native_dialog_skips_dom() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.set_native_dialog(Some(NativeDialog {
            kind: NativeDialogKind::Confirm,
            message: "Leave site?".to_string(),
            default_prompt: None,
        }));

        let detection = manager(&driver).detect().await.unwrap();
        assert!(detection.browser_dialog_visible);
        assert_eq!(detection.summary.browser_dialog_count, 1);
        assert_eq!(driver.evaluation_count(), 0);
    }

    #[tokio::test]
    async fn test_handle_native_dialog() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.set_native_dialog(Some(NativeDialog {
            kind: NativeDialogKind::Prompt,
            message: "Your name?".to_string(),
            default_prompt: Some("guest".to_string()),
        }));

        let handled = manager(&driver)
            .handle(DialogAction::Accept, None, Duration::from_secs(1))
            .await
            .unwrap();

        assert!(handled);
        assert_eq!(driver.dialog_calls(), vec![DialogCall::Accept(Some("guest".to_string()))]);
        assert!(driver.native_dialog().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dismiss_clicks_dismissive_control() {
        let driver = Arc::new(ScriptedDriver::new());
        let clicked = Arc::new(Mutex::new(Vec::new()));
        let log = clicked.clone();
        driver.on_evaluate(move |script| {
            if script.starts_with(scripts::CLICK_TAG) {
                log.lock().unwrap().push(script.to_string());
                Ok(json!({ "clicked": true }))
            } else {
                Ok(cookie_banner())
            }
        });

        let handled = manager(&driver)
            .handle(DialogAction::Dismiss, None, Duration::from_secs(1))
            .await
            .unwrap();

        assert!(handled);
        let clicked = clicked.lock().unwrap();
        assert_eq!(clicked.len(), 1);
        assert!(clicked[0].contains("#cookie-banner > button:nth-of-type(2)"));
    }

    #[tokio::test]
    async fn test_nothing_to_handle() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.on_evaluate(|_| Ok(json!([])));

        let handled = manager(&driver)
            .handle(DialogAction::Accept, None, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!handled);
    }

    #[tokio::test]
    async fn test_stale_selector_is_element_not_found() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.on_evaluate(|_| Ok(cookie_banner()));

        let err = manager(&driver)
            .handle(DialogAction::Accept, Some("#gone"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElementNotFound(ref s) if s == "#gone"));
    }

    #[tokio::test]
    async fn test_vanished_button_is_element_not_found() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.on_evaluate(|script| {
            if script.starts_with(scripts::CLICK_TAG) {
                Ok(json!({ "clicked": false }))
            } else {
                Ok(cookie_banner())
            }
        });

        let err = manager(&driver)
            .handle(DialogAction::Accept, Some("#cookie-banner"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ElementNotFound");
    }
}
