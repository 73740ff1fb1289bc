use std::time::Duration;

use scraper::{ElementRef, Html, Selector};

use crate::site::visible_text;

/// Wait between an apply click and extraction, so the page has settled.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

const APPLY_TEXTS: [&str; 3] = ["apply", "apply now", "easy apply"];
const APPLY_LABELS: [&str; 2] = ["apply to job", "easy apply"];
const EXCLUDED_CLASSES: [&str; 3] = ["nav", "menu", "tab"];

/// What the capture client knows about a clicked element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickTarget {
    /// Lowercase tag name.
    pub tag: String,
    pub text: String,
    pub aria_label: Option<String>,
    pub class: String,
    pub role: Option<String>,
    pub in_dialog: bool,
    pub in_extension_popup: bool,
}

impl ClickTarget {
    pub fn from_element(element: ElementRef) -> Self {
        let value = element.value();
        // `closest()` semantics: the element itself counts as an ancestor.
        let lineage = std::iter::once(element).chain(element.ancestors().filter_map(ElementRef::wrap));

        let mut in_dialog = false;
        let mut in_extension_popup = false;
        for node in lineage {
            let v = node.value();
            in_dialog |= v.attr("role") == Some("dialog");
            in_extension_popup |= v.classes().any(|c| c == "extension-popup");
        }

        ClickTarget {
            tag: value.name().to_ascii_lowercase(),
            text: visible_text(element),
            aria_label: value.attr("aria-label").map(str::to_string),
            class: value.attr("class").unwrap_or_default().to_string(),
            role: value.attr("role").map(str::to_string),
            in_dialog,
            in_extension_popup,
        }
    }

    /// Whether clicking this element means the user is applying.
    pub fn is_apply_action(&self) -> bool {
        let text = self.text.trim().to_lowercase();
        let label = self.aria_label.as_deref().unwrap_or_default().to_lowercase();

        let says_apply = APPLY_TEXTS.contains(&text.as_str())
            || APPLY_LABELS.iter().any(|l| label.contains(l));
        let clickable = matches!(self.tag.as_str(), "button" | "a")
            || self.role.as_deref() == Some("button");

        let class = self.class.to_lowercase();
        let excluded = EXCLUDED_CLASSES.iter().any(|c| class.contains(c))
            || self.in_dialog
            || self.in_extension_popup;

        says_apply && clickable && !excluded
    }
}

/// Every element on the page that would trigger an auto-capture.
pub fn find_apply_actions(document: &Html) -> Vec<ClickTarget> {
    let Ok(candidates) = Selector::parse("button, a, [role=\"button\"]") else {
        return Vec::new();
    };
    document
        .select(&candidates)
        .map(ClickTarget::from_element)
        .filter(ClickTarget::is_apply_action)
        .collect()
}
