use crate::driver::NetworkEvent;
use extperf_core::network::{NetworkRequestRecord, RequestCategory};
use std::collections::HashMap;

/// Error text given to requests that never finished inside the window
pub const PENDING_AT_WINDOW_CLOSE: &str = "still pending when the monitoring window closed";

/// A request seen during the window, with whatever response data arrived for it
#[derive(Debug, Clone)]
struct TrackedRequest {
    url: String,
    method: String,
    resource_type: Option<String>,
    initiator_url: Option<String>,
    started_ms: f64,
    status: Option<u16>,
    mime_type: Option<String>,
    cached: bool,
    encoded_data_length: u64,
    finished_ms: Option<f64>,
    failure: Option<String>,
}

/// Folds raw network events into per-request records
pub struct NetworkCapture {
    extension_prefix: String,
    requests: HashMap<String, TrackedRequest>,
    order: Vec<String>,
}

impl NetworkCapture {
    pub fn new(extension_id: &str) -> Self {
        Self {
            extension_prefix: format!("chrome-extension://{}/", extension_id),
            requests: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Apply one event. Events for requests that started before the window are ignored.
    pub fn apply(&mut self, event: &NetworkEvent) {
        match event {
            NetworkEvent::RequestWillBeSent {
                request_id,
                url,
                method,
                resource_type,
                initiator_url,
                timestamp_ms,
            } => {
                if let Some(req) = self.requests.get_mut(request_id) {
                    // Redirect: same id, new URL; the original start time stays
                    req.url = url.clone();
                    return;
                }

                tracing::debug!("Request: {} {}", method, url);
                self.order.push(request_id.clone());
                self.requests.insert(
                    request_id.clone(),
                    TrackedRequest {
                        url: url.clone(),
                        method: method.clone(),
                        resource_type: resource_type.clone(),
                        initiator_url: initiator_url.clone(),
                        started_ms: *timestamp_ms,
                        status: None,
                        mime_type: None,
                        cached: false,
                        encoded_data_length: 0,
                        finished_ms: None,
                        failure: None,
                    },
                );
            }
            NetworkEvent::ResponseReceived {
                request_id,
                status,
                mime_type,
                resource_type,
                from_disk_cache,
                from_prefetch_cache,
                from_service_worker,
                ..
            } => {
                if let Some(req) = self.requests.get_mut(request_id) {
                    req.status = Some(*status);
                    req.mime_type = mime_type.clone();
                    if req.resource_type.is_none() {
                        req.resource_type = resource_type.clone();
                    }
                    req.cached |= *from_disk_cache || *from_prefetch_cache || *from_service_worker;
                }
            }
            NetworkEvent::ServedFromCache { request_id } => {
                if let Some(req) = self.requests.get_mut(request_id) {
                    req.cached = true;
                }
            }
            NetworkEvent::LoadingFinished {
                request_id,
                encoded_data_length,
                timestamp_ms,
            } => {
                if let Some(req) = self.requests.get_mut(request_id) {
                    req.encoded_data_length = *encoded_data_length;
                    req.finished_ms = Some(*timestamp_ms);
                }
            }
            NetworkEvent::LoadingFailed {
                request_id,
                error_text,
                canceled,
                timestamp_ms,
            } => {
                if let Some(req) = self.requests.get_mut(request_id) {
                    tracing::debug!("Request failed: {} ({})", req.url, error_text);
                    req.finished_ms = Some(*timestamp_ms);
                    req.failure = Some(if *canceled {
                        format!("{} (canceled)", error_text)
                    } else {
                        error_text.clone()
                    });
                }
            }
        }
    }

    pub fn extend<'a, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = &'a NetworkEvent>,
    {
        for event in events {
            self.apply(event);
        }
    }

    /// Number of requests seen so far
    pub fn count(&self) -> usize {
        self.order.len()
    }

    /// Close the window and emit records in request order. Unfinished requests count as failed.
    pub fn finish(mut self) -> Vec<NetworkRequestRecord> {
        let mut records = Vec::with_capacity(self.order.len());

        for request_id in self.order {
            let Some(req) = self.requests.remove(&request_id) else {
                continue;
            };

            let pending = req.finished_ms.is_none();
            let failed = pending || req.failure.is_some();
            let error_text = if pending {
                Some(PENDING_AT_WINDOW_CLOSE.to_string())
            } else {
                req.failure
            };
            let duration_ms = if failed {
                None
            } else {
                req.finished_ms.map(|end| (end - req.started_ms).max(0.0))
            };
            let from_extension = req.url.starts_with(&self.extension_prefix)
                || req
                    .initiator_url
                    .as_deref()
                    .is_some_and(|u| u.starts_with(&self.extension_prefix));

            records.push(NetworkRequestRecord {
                category: RequestCategory::classify(req.resource_type.as_deref(), req.mime_type.as_deref()),
                request_id,
                url: req.url,
                method: req.method,
                mime_type: req.mime_type,
                status: req.status,
                encoded_data_length: if failed { 0 } else { req.encoded_data_length },
                duration_ms,
                failed,
                cached: req.cached,
                from_extension,
                error_text,
            });
        }

        records
    }
}
