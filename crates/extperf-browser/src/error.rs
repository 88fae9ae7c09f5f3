use chromiumoxide::error::CdpError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("CDP error: {0}")]
    Cdp(String),

    /// The tab or the DevTools connection went away
    #[error("Target closed: {0}")]
    TargetClosed(String),

    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// A page script threw or returned something unusable
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CdpError> for Error {
    fn from(err: CdpError) -> Self {
        match err {
            CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
                Error::TargetClosed(err.to_string())
            }
            CdpError::JavascriptException(details) => Error::Evaluation(details.text.clone()),
            other => Error::Cdp(other.to_string()),
        }
    }
}

impl From<Error> for extperf_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::TargetClosed(msg) => extperf_core::Error::TargetUnreachable(msg),
            Error::Timeout {
                operation,
                timeout_ms,
            } => extperf_core::Error::Timeout {
                operation,
                timeout_ms,
            },
            Error::Evaluation(msg) => extperf_core::Error::Collection(msg),
            Error::Io(e) => extperf_core::Error::Io(e),
            Error::Browser(msg) | Error::Cdp(msg) => extperf_core::Error::Browser(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_closed_maps_to_unreachable() {
        let err: extperf_core::Error = Error::TargetClosed("tab crashed".to_string()).into();
        assert_eq!(err.kind(), "TargetUnreachable");
    }

    #[test]
    fn test_timeout_keeps_operation() {
        let err: extperf_core::Error = Error::Timeout {
            operation: "navigate".to_string(),
            timeout_ms: 30_000,
        }
        .into();
        assert_eq!(err.to_string(), "navigate timed out after 30000 ms");
    }
}
