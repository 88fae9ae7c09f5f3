mod dialogs;
mod monitor;
mod page_state;
pub mod scripts;

pub use dialogs::{DialogManager, classify_button};
pub use monitor::{MonitorOptions, MonitoringStatus, PageStateMonitor, StateChangeCallback, StopOutcome};
pub use page_state::PageStateDetector;
