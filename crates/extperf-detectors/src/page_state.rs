use crate::dialogs::DialogManager;
use extperf_core::page::{
    BlockingElement, BlockingKind, ButtonRole, DialogAction, DialogDetection, NativeDialogKind, PageState,
};
use extperf_core::{Error, Result};
use std::time::Duration;
use tokio::time::Instant;

/// Classifies the driven tab as normal or blocked, and clears blocks that are safe to clear
pub struct PageStateDetector {
    dialogs: DialogManager,
    detection_timeout: Duration,
}

impl PageStateDetector {
    pub fn new(dialogs: DialogManager, detection_timeout: Duration) -> Self {
        Self {
            dialogs,
            detection_timeout,
        }
    }

    pub fn dialogs(&self) -> &DialogManager {
        &self.dialogs
    }

    /// One bounded detection pass; exceeding the bound is a `DetectionTimeout`
    pub async fn detect(&self) -> Result<PageState> {
        let started = Instant::now();

        let detection = match tokio::time::timeout(self.detection_timeout, self.dialogs.detect()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::DetectionTimeout {
                    operation: "page state detection".to_string(),
                    timeout_ms: self.detection_timeout.as_millis() as u64,
                });
            }
        };

        let elapsed = started.elapsed().as_secs_f64() * 1000.0;
        Ok(state_from_detection(&detection, elapsed))
    }

    /// Like [`detect`](Self::detect), but failures become an `unknown` state
    pub async fn classify(&self) -> PageState {
        let started = Instant::now();
        match self.detect().await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Page state detection failed: {}", e);
                PageState::unknown(
                    format!("Page state could not be determined: {}", e),
                    started.elapsed().as_secs_f64() * 1000.0,
                )
            }
        }
    }

    /// Resolve `state` if it is an auto-handleable block. Returns whether anything was cleared.
    ///
    /// Native confirms and prompts are declined so no page action is triggered; alerts and
    /// beforeunload prompts are acknowledged. Custom modals are closed through their dismissive
    /// control, falling back to the affirmative one.
    pub async fn resolve(&self, state: &PageState) -> Result<bool> {
        if !state.can_auto_handle() {
            return Ok(false);
        }
        let Some(element) = &state.blocking_element else {
            return Ok(false);
        };

        match element.kind {
            BlockingKind::BrowserDialog => {
                let detection = self.dialogs.detect().await?;
                let Some(native) = detection.browser_dialog else {
                    tracing::debug!("Native dialog closed before it could be handled");
                    return Ok(false);
                };
                let action = native_remediation(native.kind);
                tracing::info!("Clearing native {} dialog with {}", native.kind.as_str(), action.as_str());
                self.dialogs.handle(action, None, self.detection_timeout).await
            }
            BlockingKind::CustomModal => {
                let selector = element.selector.as_deref();
                tracing::info!("Clearing custom modal {:?}", selector);
                if self
                    .dialogs
                    .handle(DialogAction::Dismiss, selector, self.detection_timeout)
                    .await?
                {
                    return Ok(true);
                }
                self.dialogs
                    .handle(DialogAction::Accept, selector, self.detection_timeout)
                    .await
            }
        }
    }

    /// Detect and, when the page is blocked by something safe to clear, clear it
    pub async fn clear_if_blocked(&self) -> Result<bool> {
        let state = self.detect().await?;
        if !state.is_blocked {
            return Ok(false);
        }
        if !state.can_auto_handle() {
            tracing::warn!(
                "Page is blocked but the block cannot be cleared automatically: {:?}",
                state.blocking_element.as_ref().map(|e| &e.message)
            );
            return Ok(false);
        }
        self.resolve(&state).await
    }
}

fn native_remediation(kind: NativeDialogKind) -> DialogAction {
    match kind {
        NativeDialogKind::Confirm | NativeDialogKind::Prompt => DialogAction::Dismiss,
        NativeDialogKind::Alert | NativeDialogKind::Beforeunload => DialogAction::Accept,
    }
}

fn state_from_detection(detection: &DialogDetection, execution_time: f64) -> PageState {
    if let Some(native) = &detection.browser_dialog {
        let element = BlockingElement {
            kind: BlockingKind::BrowserDialog,
            message: native.message.clone(),
            selector: None,
            can_auto_handle: true,
        };
        let advice = match native.kind {
            NativeDialogKind::Confirm | NativeDialogKind::Prompt => {
                format!("A native {} dialog is open; it will be dismissed", native.kind.as_str())
            }
            NativeDialogKind::Alert | NativeDialogKind::Beforeunload => {
                format!("A native {} dialog is open; it will be accepted", native.kind.as_str())
            }
        };
        return PageState::blocked(element, vec![advice], execution_time);
    }

    let Some(dialog) = detection.custom_dialogs.first() else {
        return PageState::normal(execution_time);
    };

    let control = dialog
        .first_button(ButtonRole::Dismissive)
        .or_else(|| dialog.first_button(ButtonRole::Affirmative));
    let recommendation = match control {
        Some(button) => format!("An in-page modal covers the page; it can be closed with '{}'", button.label),
        None => "An in-page modal covers the page and has no recognizable close control; clear it manually"
            .to_string(),
    };

    PageState::blocked(
        BlockingElement {
            kind: BlockingKind::CustomModal,
            message: dialog.message.clone(),
            selector: dialog.selector.clone(),
            can_auto_handle: control.is_some() && dialog.selector.is_some(),
        },
        vec![recommendation],
        execution_time,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripts;
    use extperf_browser::testing::{DialogCall, ScriptedDriver};
    use extperf_core::page::{NativeDialog, PageStatus};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn detector(driver: &Arc<ScriptedDriver>) -> PageStateDetector {
        PageStateDetector::new(
            DialogManager::new(driver.clone(), Duration::from_secs(1)),
            Duration::from_millis(2000),
        )
    }

    fn newsletter(buttons: serde_json::Value) -> serde_json::Value {
        json!([{
            "tagName": "div",
            "id": null,
            "width": 500.0,
            "height": 300.0,
            "selector": "body > div.newsletter-popup",
            "message": "Subscribe to our newsletter",
            "buttons": buttons
        }])
    }

    #[tokio::test]
    async fn test_normal_page() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.on_evaluate(|_| Ok(json!([])));

        let state = detector(&driver).detect().await.unwrap();
        assert_eq!(state.state, PageStatus::Normal);
        assert!(!state.is_blocked);
        assert!(state.blocking_element.is_none());
    }

    #[tokio::test]
    async fn test_custom_modal_blocks() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.on_evaluate(|_| {
            Ok(newsletter(json!([{ "label": "No thanks", "selector": "body > div.newsletter-popup > a" }])))
        });

        let state = detector(&driver).detect().await.unwrap();
        assert_eq!(state.state, PageStatus::Blocked);
        let element = state.blocking_element.as_ref().unwrap();
        assert_eq!(element.kind, BlockingKind::CustomModal);
        assert_eq!(element.selector.as_deref(), Some("body > div.newsletter-popup"));
        assert!(element.can_auto_handle);
        assert!(state.recommendations[0].contains("No thanks"));
    }

    #[tokio::test]
    async fn test_modal_without_controls_is_not_auto_handleable() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.on_evaluate(|_| Ok(newsletter(json!([{ "label": "Learn more", "selector": "a" }]))));

        let detector = detector(&driver);
        let state = detector.detect().await.unwrap();
        assert!(state.is_blocked);
        assert!(!state.can_auto_handle());
        assert!(!detector.clear_if_blocked().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_detection_times_out() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.set_evaluate_delay(Some(Duration::from_secs(10)));

        let detector = PageStateDetector::new(
            DialogManager::new(driver.clone(), Duration::from_secs(30)),
            Duration::from_millis(2000),
        );

        let err = detector.detect().await.unwrap_err();
        assert!(matches!(err, Error::DetectionTimeout { timeout_ms: 2000, .. }));

        let state = detector.classify().await;
        assert_eq!(state.state, PageStatus::Unknown);
        assert!(!state.is_blocked);
    }

    #[tokio::test]
    async fn test_native_confirm_is_dismissed() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.set_native_dialog(Some(NativeDialog {
            kind: NativeDialogKind::Confirm,
            message: "Delete everything?".to_string(),
            default_prompt: None,
        }));

        let detector = detector(&driver);
        let state = detector.detect().await.unwrap();
        assert_eq!(state.blocking_element.as_ref().unwrap().kind, BlockingKind::BrowserDialog);

        assert!(detector.clear_if_blocked().await.unwrap());
        assert_eq!(driver.dialog_calls(), vec![DialogCall::Dismiss]);
    }

    #[tokio::test]
    async fn test_clear_if_blocked_clicks_and_clears() {
        let driver = Arc::new(ScriptedDriver::new());
        let open = Arc::new(AtomicBool::new(true));
        let modal = open.clone();
        driver.on_evaluate(move |script| {
            if script.starts_with(scripts::CLICK_TAG) {
                modal.store(false, Ordering::SeqCst);
                return Ok(json!({ "clicked": true }));
            }
            if modal.load(Ordering::SeqCst) {
                Ok(newsletter(json!([
                    { "label": "Sign up", "selector": "body > div.newsletter-popup > button" },
                    { "label": "×", "selector": "body > div.newsletter-popup > span" }
                ])))
            } else {
                Ok(json!([]))
            }
        });

        let detector = detector(&driver);
        assert!(detector.clear_if_blocked().await.unwrap());
        assert!(!open.load(Ordering::SeqCst));
        assert_eq!(detector.detect().await.unwrap().state, PageStatus::Normal);
        assert!(!detector.clear_if_blocked().await.unwrap());
    }
}
