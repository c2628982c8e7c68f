//! Final-answer cleanup.

const FENCE: &str = "```";

/// Trim whitespace and strip one layer of triple-backtick fencing.
///
/// A bare language tag on the opening fence line (` ```wirefilter `) goes with
/// the fence. Cleaning an already clean string returns it unchanged.
pub fn clean_output(text: &str) -> String {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix(FENCE) {
        body = strip_language_tag(rest);
    }
    if let Some(rest) = body.strip_suffix(FENCE) {
        body = rest;
    }

    body.trim().to_string()
}

fn strip_language_tag(rest: &str) -> &str {
    match rest.split_once('\n') {
        Some((tag, body)) if is_language_tag(tag.trim()) && !body.trim().is_empty() => body,
        _ => rest,
    }
}

fn is_language_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+'))
}
