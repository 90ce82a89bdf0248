//! Regex-backed extraction of the handful of markup shapes the back office
//! emits: the sign-in form, WS-Federation auto-submit forms, hidden inputs
//! carrying id batches, and `<select>` option lists.
//!
//! The pages are machine-generated ASP.NET output, stable enough that a
//! full HTML parser would buy nothing over a few anchored patterns.

use std::sync::LazyLock;

use regex::Regex;

static LOGIN_FORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<form\b[^>]*class=["'][^"']*form-signin[^"']*["'][^>]*>"#)
        .expect("valid regex")
});
static HIDDEN_FORM_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<form[^>]+name=["']hiddenform["'][^>]*>"#).expect("valid regex")
});
static HIDDEN_FORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<form[^>]+name=["']hiddenform["'][^>]*>(?P<body>.*?)</form>"#)
        .expect("valid regex")
});
static INPUT_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<input\b[^>]*>").expect("valid regex"));
static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)action=["'](?P<action>[^"']+)["']"#).expect("valid regex")
});
static WORKING_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<title>\s*working").expect("valid regex"));

/// An auto-submit form extracted from a federation hand-off page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenForm {
    pub action: String,
    pub fields: Vec<(String, String)>,
}

/// One `<option>` of a named select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// Pulls one attribute value out of a single tag's text.
fn attr(tag: &str, name: &str) -> Option<String> {
    let pattern = format!(r#"(?i)\b{}\s*=\s*["'](?P<value>[^"']*)["']"#, regex::escape(name));
    let re = Regex::new(&pattern).expect("valid attr regex");
    re.captures(tag)
        .map(|caps| unescape(&caps["value"]))
}

/// The action of the sign-in form, entity-unescaped and still relative.
#[must_use]
pub fn login_form_action(html: &str) -> Option<String> {
    let tag = LOGIN_FORM_RE.find(html)?.as_str();
    ACTION_RE
        .captures(tag)
        .map(|caps| unescape(&caps["action"]))
}

/// The federation auto-submit form, if the page carries one.
///
/// A `javascript:` action means the page expects script-driven submission
/// and is treated as no form at all.
#[must_use]
pub fn hidden_form(html: &str) -> Option<HiddenForm> {
    let tag = HIDDEN_FORM_TAG_RE.find(html)?.as_str();
    let action = ACTION_RE.captures(tag).map(|caps| unescape(&caps["action"]))?;
    if action.to_lowercase().starts_with("javascript:") {
        return None;
    }

    let body = HIDDEN_FORM_RE
        .captures(html)
        .and_then(|caps| caps.name("body").map(|m| m.as_str()))
        .unwrap_or(html);
    let fields = INPUT_TAG_RE
        .find_iter(body)
        .map(|m| m.as_str())
        .filter(|tag| {
            attr(tag, "type").is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
        })
        .filter_map(|tag| {
            let name = attr(tag, "name")?;
            Some((name, attr(tag, "value").unwrap_or_default()))
        })
        .collect();
    Some(HiddenForm { action, fields })
}

/// The value of the first `<input>` with this name, hidden or not.
#[must_use]
pub fn hidden_input_value(html: &str, name: &str) -> Option<String> {
    INPUT_TAG_RE
        .find_iter(html)
        .map(|m| m.as_str())
        .find(|tag| attr(tag, "name").is_some_and(|n| n == name))
        .and_then(|tag| attr(tag, "value"))
}

/// All options of the `<select>` with this name, in document order.
/// Option labels are entity-unescaped and whitespace-trimmed.
#[must_use]
pub fn select_options(html: &str, select_name: &str) -> Vec<SelectOption> {
    let select_re = Regex::new(&format!(
        r#"(?is)<select[^>]+name=["']{}["'][^>]*>(?P<body>.*?)</select>"#,
        regex::escape(select_name)
    ))
    .expect("valid select regex");
    let Some(caps) = select_re.captures(html) else {
        return Vec::new();
    };
    let option_re =
        Regex::new(r#"(?is)<option[^>]*value=["'](?P<value>[^"']*)["'][^>]*>(?P<label>[^<]*)"#)
            .expect("valid option regex");
    option_re
        .captures_iter(&caps["body"])
        .map(|caps| SelectOption {
            value: unescape(&caps["value"]),
            label: unescape(caps["label"].trim()),
        })
        .collect()
}

/// Whether the body shows the sign-in page.
#[must_use]
pub fn contains_login_form(html: &str) -> bool {
    html.to_lowercase().contains("form-signin")
}

/// Whether the body carries a federation auto-submit form.
#[must_use]
pub fn contains_hidden_form(html: &str) -> bool {
    HIDDEN_FORM_TAG_RE.is_match(html)
}

/// Whether the body is the interstitial "working" hand-off page.
#[must_use]
pub fn contains_working_title(html: &str) -> bool {
    WORKING_TITLE_RE.is_match(html)
}

/// Decodes the named and numeric entities that actually occur in these
/// pages. Unknown entities pass through untouched.
#[must_use]
pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let Some(end) = rest.find(';') else {
            out.push_str(rest);
            return out;
        };
        let entity = &rest[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix('#')
                .and_then(|num| {
                    if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        num.parse::<u32>().ok()
                    }
                })
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
#[path = "markup_test.rs"]
mod tests;
