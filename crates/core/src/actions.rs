//! Action markers embedded by the generation model in its reply.
//!
//! Two tokens are recognized:
//!
//! ```text
//! contact  := "[[CONTACT_COMPLETE:" ws* json-object ws* "]]"
//! navigate := "[[SHOW_PROJECTS]]"
//! ```
//!
//! The contact marker is searched first and takes precedence. The navigation
//! marker is never stripped from the text, so a client still sees it even when
//! a contact marker was also present.

use crate::domain::contact::ContactSubmission;

pub const SHOW_PROJECTS_MARKER: &str = "[[SHOW_PROJECTS]]";
pub const CONTACT_MARKER_OPEN: &str = "[[CONTACT_COMPLETE:";
const MARKER_CLOSE: &str = "]]";

pub const CONTACT_CONFIRMATION: &str =
    "Thanks! Your message has been sent, and you can expect a reply soon.";
pub const CONTACT_PARSE_FAILURE_NOTICE: &str =
    "(Note: an internal error occurred while saving your contact details.)";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionTag {
    None,
    ShowProjects,
    ContactComplete(ContactSubmission),
    ContactMalformed { raw_payload: String },
}

impl ActionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ShowProjects => "show_projects",
            Self::ContactComplete(_) => "contact_complete",
            Self::ContactMalformed { .. } => "contact_malformed",
        }
    }
}

/// Result of scanning one reply: the user-visible text, the single derived
/// tag, and whether the navigation marker appeared anywhere in the reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedAction {
    pub text: String,
    pub tag: ActionTag,
    pub navigation_hint: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ActionExtractor;

impl ActionExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str) -> ExtractedAction {
        let navigation_hint = text.contains(SHOW_PROJECTS_MARKER);

        let Some(marker) = scan_contact_marker(text) else {
            let tag = if navigation_hint { ActionTag::ShowProjects } else { ActionTag::None };
            return ExtractedAction { text: text.to_string(), tag, navigation_hint };
        };

        match marker.payload {
            Ok(submission) => {
                let mut remaining = String::with_capacity(text.len());
                remaining.push_str(&text[..marker.start]);
                remaining.push_str(&text[marker.end..]);

                let visible = remaining.trim();
                let visible = if visible.is_empty() { CONTACT_CONFIRMATION } else { visible };

                ExtractedAction {
                    text: visible.to_string(),
                    tag: ActionTag::ContactComplete(submission),
                    navigation_hint,
                }
            }
            Err(raw_payload) => ExtractedAction {
                text: format!("{text}\n\n{CONTACT_PARSE_FAILURE_NOTICE}"),
                tag: ActionTag::ContactMalformed { raw_payload },
                navigation_hint,
            },
        }
    }
}

struct ContactMarker {
    start: usize,
    end: usize,
    payload: Result<ContactSubmission, String>,
}

fn scan_contact_marker(text: &str) -> Option<ContactMarker> {
    let start = text.find(CONTACT_MARKER_OPEN)?;
    let body_offset = start + CONTACT_MARKER_OPEN.len();
    let body = &text[body_offset..];
    let object_offset = body_offset + leading_whitespace(body);

    if let Some(object_len) = object_end(&text[object_offset..]) {
        let object = &text[object_offset..object_offset + object_len];
        let after_object = object_offset + object_len;
        let close_offset = after_object + leading_whitespace(&text[after_object..]);

        if text[close_offset..].starts_with(MARKER_CLOSE) {
            let payload = serde_json::from_str::<ContactSubmission>(object)
                .map_err(|error| error.to_string())
                .and_then(|submission| submission.validate().map(|()| submission))
                .map_err(|_| object.to_string());
            return Some(ContactMarker { start, end: close_offset + MARKER_CLOSE.len(), payload });
        }
    }

    // Not a well-formed object followed by the closing token: report whatever
    // sits between the opening token and the next `]]` (or the end of text).
    let (raw, end) = match body.find(MARKER_CLOSE) {
        Some(close) => (&body[..close], body_offset + close + MARKER_CLOSE.len()),
        None => (body, text.len()),
    };
    Some(ContactMarker { start, end, payload: Err(raw.trim().to_string()) })
}

fn leading_whitespace(input: &str) -> usize {
    input.len() - input.trim_start().len()
}

/// Byte length of the JSON object at the start of `input`, matching braces
/// outside of string literals.
fn object_end(input: &str) -> Option<usize> {
    if !input.starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, ch) in input.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(index + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}
