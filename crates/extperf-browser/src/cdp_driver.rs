use crate::driver::{BrowserDriver, NetworkEvent, PerformanceCounters, TabInfo};
use crate::timeout::with_timeout;
use crate::{Error, Result};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventLoadingFailed, EventLoadingFinished,
    EventRequestServedFromCache, EventRequestWillBeSent, EventResponseReceived,
};
use chromiumoxide::cdp::browser_protocol::page::{
    DialogType, EventJavascriptDialogClosed, EventJavascriptDialogOpening,
    HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::browser_protocol::performance::{
    EnableParams as PerfEnableParams, GetMetricsParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use extperf_core::page::{NativeDialog, NativeDialogKind};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// [`BrowserDriver`] over the Chrome DevTools Protocol, driving one tab of a running Chrome
pub struct CdpDriver {
    browser: Browser,
    page: Page,
    dialog: Arc<RwLock<Option<NativeDialog>>>,
    handler_task: JoinHandle<()>,
    dialog_task: JoinHandle<()>,
}

impl CdpDriver {
    /// Attach to Chrome listening on `debugging_port` and drive its first tab
    pub async fn attach(debugging_port: u16) -> Result<Self> {
        tracing::info!("CDP: connecting to Chrome on port {}", debugging_port);

        // Chrome may not be accepting connections yet
        let ws_url = format!("http://localhost:{}", debugging_port);
        let (browser, mut handler) = {
            let mut retries = CONNECT_ATTEMPTS;
            loop {
                tracing::debug!("Attempting CDP connection to {}...", ws_url);
                match Browser::connect(&ws_url).await {
                    Ok(result) => {
                        tracing::info!("CDP connection established");
                        break result;
                    }
                    Err(e) => {
                        retries -= 1;
                        if retries == 0 {
                            return Err(Error::Cdp(format!(
                                "Failed to connect to Chrome after {} attempts: {}",
                                CONNECT_ATTEMPTS, e
                            )));
                        }
                        tracing::debug!("CDP connection attempt failed, retrying... ({} left)", retries);
                        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                    }
                }
            }
        };

        // The handler must be polled for any command to complete
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error (continuing): {}", e);
                }
            }
        });

        let page = match browser.pages().await?.into_iter().next() {
            Some(page) => {
                tracing::debug!("CDP: using existing page");
                page
            }
            None => {
                tracing::debug!("CDP: no existing pages, creating one");
                browser.new_page("about:blank").await?
            }
        };

        page.execute(PerfEnableParams::default()).await?;

        let dialog = Arc::new(RwLock::new(None));
        let dialog_task = watch_dialogs(&page, dialog.clone()).await?;

        tracing::info!("CDP: attached to tab {}", page.target_id().inner());

        Ok(Self {
            browser,
            page,
            dialog,
            handler_task,
            dialog_task,
        })
    }

    async fn handle_dialog(&self, accept: bool, prompt: Option<&str>) -> Result<()> {
        let mut params = HandleJavaScriptDialogParams::new(accept);
        params.prompt_text = prompt.map(str::to_string);
        self.page.execute(params).await?;
        *self.dialog.write().await = None;
        Ok(())
    }
}

impl Drop for CdpDriver {
    fn drop(&mut self) {
        self.dialog_task.abort();
        self.handler_task.abort();
    }
}

/// Keep `slot` in sync with the tab's native dialog. Evaluation hangs while a dialog is open, so
/// this state has to come from events rather than from the page.
async fn watch_dialogs(page: &Page, slot: Arc<RwLock<Option<NativeDialog>>>) -> Result<JoinHandle<()>> {
    let mut opened = page.event_listener::<EventJavascriptDialogOpening>().await?;
    let mut closed = page.event_listener::<EventJavascriptDialogClosed>().await?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(event) = opened.next() => {
                    let kind = match event.r#type {
                        DialogType::Alert => NativeDialogKind::Alert,
                        DialogType::Confirm => NativeDialogKind::Confirm,
                        DialogType::Prompt => NativeDialogKind::Prompt,
                        DialogType::Beforeunload => NativeDialogKind::Beforeunload,
                    };
                    tracing::debug!("Native {} dialog opened: {}", kind.as_str(), event.message);
                    *slot.write().await = Some(NativeDialog {
                        kind,
                        message: event.message.clone(),
                        default_prompt: event.default_prompt.clone(),
                    });
                }
                Some(_) = closed.next() => {
                    tracing::debug!("Native dialog closed");
                    *slot.write().await = None;
                }
                else => break,
            }
        }
    }))
}

fn millis(seconds: f64) -> f64 {
    seconds * 1000.0
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>> {
        let mut tabs = Vec::new();
        for page in self.browser.pages().await? {
            tabs.push(TabInfo {
                target_id: page.target_id().inner().clone(),
                url: page.url().await.ok().flatten(),
                title: page.get_title().await.ok().flatten(),
            });
        }
        Ok(tabs)
    }

    async fn open_tab(&self, url: &str) -> Result<TabInfo> {
        let page = self.browser.new_page(url).await?;
        Ok(TabInfo {
            target_id: page.target_id().inner().clone(),
            url: Some(url.to_string()),
            title: None,
        })
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        tracing::debug!("Navigating to {}", url);
        with_timeout("navigate", timeout, async {
            self.page.goto(url).await?;
            Ok(())
        })
        .await
    }

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(Error::Evaluation)?;

        let result = self.page.evaluate_expression(params).await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn performance_counters(&self) -> Result<PerformanceCounters> {
        let response = self.page.execute(GetMetricsParams::default()).await?;
        Ok(PerformanceCounters::from_metrics(
            response.metrics.iter().map(|m| (m.name.as_str(), m.value)),
        ))
    }

    async fn record_network(&self, window: Duration, navigate_to: Option<&str>) -> Result<Vec<NetworkEvent>> {
        self.page.execute(NetworkEnableParams::default()).await?;

        let mut requests = self.page.event_listener::<EventRequestWillBeSent>().await?;
        let mut responses = self.page.event_listener::<EventResponseReceived>().await?;
        let mut finished = self.page.event_listener::<EventLoadingFinished>().await?;
        let mut failed = self.page.event_listener::<EventLoadingFailed>().await?;
        let mut cached = self.page.event_listener::<EventRequestServedFromCache>().await?;

        tracing::debug!("Recording network events for {:?}", window);

        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);

        let navigation = async {
            match navigate_to {
                Some(url) => self.page.goto(url).await.map(|_| ()),
                None => futures::future::pending().await,
            }
        };
        tokio::pin!(navigation);
        let mut navigating = navigate_to.is_some();

        let mut events = Vec::new();
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                result = &mut navigation, if navigating => {
                    navigating = false;
                    if let Err(e) = result {
                        tracing::warn!("Navigation during network recording failed: {}", e);
                    }
                }
                Some(event) = requests.next() => events.push(NetworkEvent::RequestWillBeSent {
                    request_id: event.request_id.inner().clone(),
                    url: event.request.url.clone(),
                    method: event.request.method.clone(),
                    resource_type: event.r#type.as_ref().map(|t| t.as_ref().to_string()),
                    initiator_url: event.initiator.url.clone(),
                    timestamp_ms: millis(*event.timestamp.inner()),
                }),
                Some(event) = responses.next() => events.push(NetworkEvent::ResponseReceived {
                    request_id: event.request_id.inner().clone(),
                    status: u16::try_from(event.response.status).unwrap_or(0),
                    mime_type: Some(event.response.mime_type.clone()).filter(|m| !m.is_empty()),
                    resource_type: Some(event.r#type.as_ref().to_string()),
                    from_disk_cache: event.response.from_disk_cache.unwrap_or(false),
                    from_prefetch_cache: event.response.from_prefetch_cache.unwrap_or(false),
                    from_service_worker: event.response.from_service_worker.unwrap_or(false),
                    timestamp_ms: millis(*event.timestamp.inner()),
                }),
                Some(event) = finished.next() => events.push(NetworkEvent::LoadingFinished {
                    request_id: event.request_id.inner().clone(),
                    encoded_data_length: event.encoded_data_length.max(0.0) as u64,
                    timestamp_ms: millis(*event.timestamp.inner()),
                }),
                Some(event) = failed.next() => events.push(NetworkEvent::LoadingFailed {
                    request_id: event.request_id.inner().clone(),
                    error_text: event.error_text.clone(),
                    canceled: event.canceled.unwrap_or(false),
                    timestamp_ms: millis(*event.timestamp.inner()),
                }),
                Some(event) = cached.next() => events.push(NetworkEvent::ServedFromCache {
                    request_id: event.request_id.inner().clone(),
                }),
            }
        }

        tracing::debug!("Recorded {} network events", events.len());
        Ok(events)
    }

    async fn native_dialog(&self) -> Result<Option<NativeDialog>> {
        Ok(self.dialog.read().await.clone())
    }

    async fn accept_native_dialog(&self, prompt: Option<&str>) -> Result<()> {
        self.handle_dialog(true, prompt).await
    }

    async fn dismiss_native_dialog(&self) -> Result<()> {
        self.handle_dialog(false, None).await
    }
}
