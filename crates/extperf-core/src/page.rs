use serde::{Deserialize, Serialize};

/// Classification of the page under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Normal,
    Blocked,
    /// Detection itself failed or timed out
    Unknown,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Normal => "normal",
            PageStatus::Blocked => "blocked",
            PageStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockingKind {
    BrowserDialog,
    CustomModal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingElement {
    #[serde(rename = "type")]
    pub kind: BlockingKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    pub can_auto_handle: bool,
}

/// Result of a single page-state detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    pub state: PageStatus,
    pub is_blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking_element: Option<BlockingElement>,
    pub recommendations: Vec<String>,
    /// Time spent detecting, in ms
    pub execution_time: f64,
}

impl PageState {
    pub fn normal(execution_time: f64) -> Self {
        Self {
            state: PageStatus::Normal,
            is_blocked: false,
            blocking_element: None,
            recommendations: Vec::new(),
            execution_time,
        }
    }

    pub fn blocked(element: BlockingElement, recommendations: Vec<String>, execution_time: f64) -> Self {
        Self {
            state: PageStatus::Blocked,
            is_blocked: true,
            blocking_element: Some(element),
            recommendations,
            execution_time,
        }
    }

    /// State reported when detection could not complete
    pub fn unknown(reason: impl Into<String>, execution_time: f64) -> Self {
        Self {
            state: PageStatus::Unknown,
            is_blocked: false,
            blocking_element: None,
            recommendations: vec![reason.into()],
            execution_time,
        }
    }

    /// Whether a monitor with auto-handling enabled may clear this state on its own
    pub fn can_auto_handle(&self) -> bool {
        self.is_blocked
            && self
                .blocking_element
                .as_ref()
                .is_some_and(|element| element.can_auto_handle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementBounds {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogElement {
    pub tag_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<ElementBounds>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonRole {
    Affirmative,
    Dismissive,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogButton {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    pub is_affirmative: bool,
    pub role: ButtonRole,
}

/// A visible in-page modal found by a detection pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogRecord {
    pub element: DialogElement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    pub message: String,
    pub buttons: Vec<DialogButton>,
}

impl DialogRecord {
    pub fn first_button(&self, role: ButtonRole) -> Option<&DialogButton> {
        self.buttons
            .iter()
            .find(|b| b.role == role && b.selector.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeDialogKind {
    Alert,
    Confirm,
    Prompt,
    Beforeunload,
}

impl NativeDialogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NativeDialogKind::Alert => "alert",
            NativeDialogKind::Confirm => "confirm",
            NativeDialogKind::Prompt => "prompt",
            NativeDialogKind::Beforeunload => "beforeunload",
        }
    }
}

/// A native `alert`/`confirm`/`prompt`/`beforeunload` dialog currently open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeDialog {
    #[serde(rename = "type")]
    pub kind: NativeDialogKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_prompt: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogSummary {
    pub custom_dialog_count: usize,
    pub browser_dialog_count: usize,
    pub total_buttons: usize,
}

/// Everything a detection pass found on the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogDetection {
    pub custom_dialogs: Vec<DialogRecord>,
    pub browser_dialog_visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_dialog: Option<NativeDialog>,
    pub summary: DialogSummary,
}

impl DialogDetection {
    pub fn new(custom_dialogs: Vec<DialogRecord>, browser_dialog: Option<NativeDialog>) -> Self {
        let summary = DialogSummary {
            custom_dialog_count: custom_dialogs.len(),
            browser_dialog_count: usize::from(browser_dialog.is_some()),
            total_buttons: custom_dialogs.iter().map(|d| d.buttons.len()).sum(),
        };

        Self {
            browser_dialog_visible: browser_dialog.is_some(),
            custom_dialogs,
            browser_dialog,
            summary,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.custom_dialogs.is_empty() && !self.browser_dialog_visible
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogAction {
    Accept,
    Dismiss,
}

impl DialogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogAction::Accept => "accept",
            DialogAction::Dismiss => "dismiss",
        }
    }
}
