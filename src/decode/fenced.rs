//! Fenced-block dialects
//!
//! Models that answer in markdown put each action in a back-tick fence. The
//! planner variant keeps only primitive fences and otherwise hands the whole
//! text to the grounder as commentary.

use std::sync::OnceLock;

use regex::Regex;

use crate::decode::{Action, DecodeContext};
use crate::primitive;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```([\s\S]*?)```").expect("valid fence regex"))
}

fn code_tag_regex() -> &'static Regex {
    static CODE: OnceLock<Regex> = OnceLock::new();
    CODE.get_or_init(|| Regex::new(r"<code>([\s\S]*?)</code>").expect("valid code regex"))
}

/// Trimmed contents of every fenced block, in order. A first line that is a
/// lone language tag (`python`, empty) is dropped when code follows it.
pub fn fenced_blocks(text: &str) -> Vec<String> {
    fence_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|inner| strip_language_tag(inner.as_str()).trim().to_string())
        .collect()
}

fn strip_language_tag(inner: &str) -> &str {
    match inner.split_once('\n') {
        Some((first, rest))
            if first.trim().chars().all(|c| c.is_alphanumeric() || c == '_')
                && primitive::classify(first).is_none()
                && !rest.trim().is_empty() =>
        {
            rest
        }
        _ => inner,
    }
}

/// Every fenced block becomes an executable action
pub fn decode_fenced(text: &str, _ctx: &DecodeContext) -> Vec<Action> {
    fenced_blocks(text).into_iter().map(Action::code).collect()
}

/// Primitive blocks become actions; without any, the text is commentary
pub fn decode_planner(text: &str, ctx: &DecodeContext) -> Vec<Action> {
    let actions: Vec<Action> = fenced_blocks(text)
        .into_iter()
        .map(Action::code)
        .filter(|a| a.is_primitive(&ctx.primitives))
        .collect();

    if actions.is_empty() {
        vec![Action::commentary(text)]
    } else {
        actions
    }
}

/// Contents of the first `<code>…</code>` section, trimmed
pub fn code_section(text: &str) -> Option<String> {
    code_tag_regex()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Text after the last `Action:` marker with trailing semicolons removed
pub fn action_line(text: &str) -> String {
    let tail = match text.rfind("Action:") {
        Some(idx) => &text[idx + "Action:".len()..],
        None => text,
    };
    tail.trim().trim_end_matches(';').trim().to_string()
}

/// Wrap code in a fence so it can go through the fenced decoder
pub fn wrap_fence(code: &str) -> String {
    format!("```\n{}\n```", code)
}
