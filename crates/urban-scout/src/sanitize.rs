//! Helpers for keeping secrets and bulky payloads out of logs and span fields.

use std::path::Path;

/// Maximum length of an upstream error body kept in logs and errors.
pub const MAX_BODY_LENGTH: usize = 200;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Masks the value of any `key=` query parameter in a URL.
///
/// - `https://host/api?location=1,2&key=abc` → `https://host/api?location=1,2&key=****`
pub fn redact_key(url: &str) -> String {
    let Some(query_start) = url.find('?') else {
        return url.to_string();
    };
    let (base, query) = url.split_at(query_start + 1);
    let redacted: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if name.eq_ignore_ascii_case("key") => format!("{}=****", name),
            _ => pair.to_string(),
        })
        .collect();
    format!("{}{}", base, redacted.join("&"))
}

/// Truncates an upstream response body on a char boundary.
pub fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_BODY_LENGTH {
        let head: String = body.chars().take(MAX_BODY_LENGTH).collect();
        format!("{}... (truncated)", head)
    } else {
        body.to_string()
    }
}

/// Escapes chat-template control sequences so detector labels cannot
/// smuggle instructions into the prompt.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("[INST]", "[ INST ]")
        .replace("[/INST]", "[ / INST ]")
        .replace("<<SYS>>", "< < SYS > >")
        .replace("<</SYS>>", "< < / SYS > >")
}
