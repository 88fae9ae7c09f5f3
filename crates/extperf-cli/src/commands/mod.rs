pub mod analyze;
pub mod completion;
pub mod config;
pub mod dialogs;
pub mod impact;
pub mod monitor;
pub mod network;
pub mod page_state;
pub mod session;

use anyhow::{Result, bail};
use serde::Serialize;
use url::Url;

/// Reject relative or malformed URLs before any browser is touched
pub fn require_absolute_url(url: &str) -> Result<()> {
    if let Err(e) = Url::parse(url) {
        bail!("'{}' is not an absolute URL: {}", url, e);
    }
    Ok(())
}

pub fn output_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// `1536` -> `1.5 KB`
pub fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{:.0} {}", value, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0.0), "0 B");
        assert_eq!(format_bytes(512.0), "512 B");
        assert_eq!(format_bytes(1536.0), "1.5 KB");
        assert_eq!(format_bytes(5.0 * 1024.0 * 1024.0), "5.0 MB");
    }

    #[test]
    fn test_require_absolute_url() {
        assert!(require_absolute_url("https://example.com/shop").is_ok());
        assert!(require_absolute_url("example.com").is_err());
    }
}
