//! Page scripts. Each starts with a `/* extperf:<name> */` tag so scripted drivers can tell them apart.

use extperf_core::Result;

pub const DETECT_DIALOGS_TAG: &str = "/* extperf:detect-dialogs */";
pub const CLICK_TAG: &str = "/* extperf:click */";

/// Containers that commonly host modals, overlays and consent banners, most specific first
pub const MODAL_SELECTORS: &[&str] = &[
    "dialog[open]",
    "[role=\"alertdialog\"]",
    "[role=\"dialog\"]",
    "[aria-modal=\"true\"]",
    "#onetrust-banner-sdk",
    "#CybotCookiebotDialog",
    ".modal.show",
    ".modal.in",
    ".modal.is-open",
    ".cookie-banner",
    ".cookie-consent",
    "[class*=\"consent-banner\"]",
    "[class*=\"newsletter-popup\"]",
    ".popup-overlay",
    ".lightbox",
    ".overlay[style*=\"display: block\"]",
];

const DETECT_DIALOGS_BODY: &str = r##"
(() => {
  const selectors = __SELECTORS__;
  const buttonSelector = 'button, [role="button"], input[type="button"], input[type="submit"], a[class*="btn"], a[class*="button"], [aria-label*="close" i]';
  const isVisible = (el) => {
    const style = window.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden' || parseFloat(style.opacity) === 0) {
      return false;
    }
    const rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
  };
  const cssPath = (el) => {
    if (el.id) return '#' + CSS.escape(el.id);
    const parts = [];
    let node = el;
    while (node && node.nodeType === 1 && node !== document.documentElement) {
      if (node.id) {
        parts.unshift('#' + CSS.escape(node.id));
        break;
      }
      let part = node.tagName.toLowerCase();
      const parent = node.parentElement;
      if (parent) {
        const same = Array.from(parent.children).filter((c) => c.tagName === node.tagName);
        if (same.length > 1) part += ':nth-of-type(' + (same.indexOf(node) + 1) + ')';
      }
      parts.unshift(part);
      node = parent;
    }
    return parts.join(' > ');
  };
  const found = [];
  for (const selector of selectors) {
    let matches;
    try {
      matches = document.querySelectorAll(selector);
    } catch (e) {
      continue;
    }
    for (const el of matches) {
      if (!isVisible(el)) continue;
      if (found.some((d) => d.node.contains(el) || el.contains(d.node))) continue;
      const rect = el.getBoundingClientRect();
      const buttons = Array.from(el.querySelectorAll(buttonSelector)).filter(isVisible).map((b) => ({
        label: (b.innerText || b.value || b.getAttribute('aria-label') || b.title || '').trim(),
        selector: cssPath(b),
      }));
      found.push({
        node: el,
        tagName: el.tagName.toLowerCase(),
        id: el.id || null,
        width: rect.width,
        height: rect.height,
        selector: cssPath(el),
        message: (el.innerText || '').trim().replace(/\s+/g, ' ').slice(0, 300),
        buttons,
      });
    }
  }
  return found.map(({ node, ...rest }) => rest);
})()
"##;

const CLICK_BODY: &str = r##"
(() => {
  const el = document.querySelector(__SELECTOR__);
  if (!el) return { clicked: false };
  el.click();
  return { clicked: true };
})()
"##;

/// Script returning every visible modal matching `selectors`, outermost match only
pub fn detect_dialogs(selectors: &[&str]) -> Result<String> {
    let list = serde_json::to_string(selectors)?;
    Ok(format!(
        "{}{}",
        DETECT_DIALOGS_TAG,
        DETECT_DIALOGS_BODY.replace("__SELECTORS__", &list)
    ))
}

/// Script clicking the first element matching `selector`; answers `{ clicked: bool }`
pub fn click(selector: &str) -> Result<String> {
    let quoted = serde_json::to_string(selector)?;
    Ok(format!("{}{}", CLICK_TAG, CLICK_BODY.replace("__SELECTOR__", &quoted)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors_are_embedded_as_json() {
        let script = detect_dialogs(&["[role=\"dialog\"]", ".modal"]).unwrap();
        assert!(script.starts_with(DETECT_DIALOGS_TAG));
        assert!(script.contains(r#"const selectors = ["[role=\"dialog\"]",".modal"];"#));
        assert!(!script.contains("__SELECTORS__"));
    }

    #[test]
    fn test_click_selector_is_quoted() {
        let script = click("div.modal > button:nth-of-type(2)").unwrap();
        assert!(script.starts_with(CLICK_TAG));
        assert!(script.contains(r#"document.querySelector("div.modal > button:nth-of-type(2)")"#));
    }
}
