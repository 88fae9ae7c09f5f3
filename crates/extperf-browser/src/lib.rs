//! Browser access for extperf: the [`BrowserDriver`] boundary, its Chrome DevTools Protocol
//! implementation and the helpers needed to start Chrome with an unpacked extension.

mod cdp_driver;
mod chrome_finder;
mod driver;
mod error;
mod launcher;
mod network_capture;
mod profile;
mod timeout;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cdp_driver::CdpDriver;
pub use chrome_finder::{CHROME_PATH_ENV, ChromeFinder};
pub use driver::{BrowserDriver, NetworkEvent, PerformanceCounters, TabInfo};
pub use error::{Error, Result};
pub use launcher::{ChromeLauncher, DEFAULT_DEBUGGING_PORT};
pub use network_capture::{NetworkCapture, PENDING_AT_WINDOW_CLOSE};
pub use profile::ProfileManager;
pub use timeout::with_timeout;
