//! Structured-thought dialect
//!
//! Responses look like
//!
//! ```text
//! Thought: The File menu is at the top left.
//! Action: click(start_box='<|box_start|>(31,22)<|box_end|>')
//! ```
//!
//! The part after `Action:` holds one call per line. Calls are parsed into
//! [`StructuredAction`]s on a 0–1000 grid and rewritten into canonical
//! statements. Consecutive executable statements are combined into one action
//! with a pause between them; primitives stay separate actions.

use std::sync::OnceLock;

use regex::Regex;

use crate::core::ScreenSize;
use crate::decode::{scale_grid, script, Action, DecodeContext};
use crate::primitive::{self, Primitive};

const ACTION_MARKER: &str = "Action:";

/// Scroll magnitude for structured scrolls
const SCROLL_CLICKS: i64 = 5;

/// Scroll direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// One parsed call, with coordinates already in screen pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredAction {
    Click(i64, i64),
    DoubleClick(i64, i64),
    RightClick(i64, i64),
    Drag { from: (i64, i64), to: (i64, i64) },
    Hotkey(Vec<String>),
    Type(String),
    Scroll {
        at: Option<(i64, i64)>,
        direction: Direction,
    },
    /// A control primitive, as its canonical invocation text
    Primitive(String),
}

impl StructuredAction {
    /// Canonical statement for this call
    pub fn to_code(&self) -> String {
        match self {
            StructuredAction::Click(x, y) => script::click(*x, *y),
            StructuredAction::DoubleClick(x, y) => script::double_click(*x, *y),
            StructuredAction::RightClick(x, y) => script::right_click(*x, *y),
            StructuredAction::Drag { from, to } => script::drag(*from, *to),
            StructuredAction::Hotkey(keys) => {
                let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
                match keys.as_slice() {
                    [single] => script::press(single),
                    _ => script::hotkey(&keys),
                }
            }
            StructuredAction::Type(text) => match text.strip_suffix('\n') {
                Some(body) => format!("{}; {}", script::type_text(body), script::press("enter")),
                None => script::type_text(text),
            },
            StructuredAction::Scroll { at, direction } => {
                let scroll = match direction {
                    Direction::Up => script::scroll(SCROLL_CLICKS),
                    Direction::Down => script::scroll(-SCROLL_CLICKS),
                    Direction::Left => script::hscroll(-SCROLL_CLICKS),
                    Direction::Right => script::hscroll(SCROLL_CLICKS),
                };
                match at {
                    Some((x, y)) => format!("{}; {}", script::move_to(*x, *y), scroll),
                    None => scroll,
                }
            }
            StructuredAction::Primitive(code) => code.clone(),
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, StructuredAction::Primitive(_))
    }
}

/// A parse that failed part-way. `parsed` holds every call before and after
/// the failing ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialParse {
    pub parsed: Vec<StructuredAction>,
    pub errors: Vec<String>,
}

impl std::fmt::Display for PartialParse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.errors.join("; "))
    }
}

fn call_regex() -> &'static Regex {
    static CALL: OnceLock<Regex> = OnceLock::new();
    CALL.get_or_init(|| Regex::new(r"^(\w+)\((.*)\)$").expect("valid call regex"))
}

fn arg_regex() -> &'static Regex {
    static ARG: OnceLock<Regex> = OnceLock::new();
    ARG.get_or_init(|| {
        Regex::new(r#"(\w+)\s*=\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")"#)
            .expect("valid argument regex")
    })
}

fn number_regex() -> &'static Regex {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    NUMBER.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid number regex"))
}

/// Byte offset of the `Action:` marker that opens a line. Markers quoted
/// inside call arguments are not line starts and are skipped.
pub fn action_marker(text: &str) -> Option<usize> {
    if text.starts_with(ACTION_MARKER) {
        return Some(0);
    }
    text.find(&format!("\n{}", ACTION_MARKER)).map(|idx| idx + 1)
}

/// Split a response into thought and action parts at the first marker
pub fn split_thought(text: &str) -> Option<(&str, &str)> {
    let idx = action_marker(text)?;
    let thought = text[..idx].trim();
    let thought = thought.strip_prefix("Thought:").unwrap_or(thought).trim();
    Some((thought, text[idx + ACTION_MARKER.len()..].trim()))
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn parse_args(args: &str) -> Vec<(String, String)> {
    arg_regex()
        .captures_iter(args)
        .map(|caps| {
            let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            (caps[1].to_string(), unescape(value))
        })
        .collect()
}

fn arg<'a>(args: &'a [(String, String)], names: &[&str]) -> Option<&'a str> {
    args.iter()
        .find(|(k, _)| names.contains(&k.as_str()))
        .map(|(_, v)| v.as_str())
}

/// Point of a `(x,y)` or `(x1,y1,x2,y2)` box on the 0–1000 grid, in pixels
fn parse_box(value: &str, screen: ScreenSize) -> Result<(i64, i64), String> {
    let numbers: Vec<f64> = number_regex()
        .find_iter(value)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    let (x, y) = match numbers.as_slice() {
        [x, y] => (*x, *y),
        [x1, y1, x2, y2] => ((x1 + x2) / 2.0, (y1 + y2) / 2.0),
        _ => return Err(format!("malformed box '{}'", value)),
    };
    Ok((scale_grid(x, screen.width), scale_grid(y, screen.height)))
}

fn required_box(
    args: &[(String, String)],
    names: &[&str],
    screen: ScreenSize,
) -> Result<(i64, i64), String> {
    let value = arg(args, names).ok_or_else(|| format!("missing {}", names[0]))?;
    parse_box(value, screen)
}

fn parse_call(line: &str, screen: ScreenSize) -> Result<StructuredAction, String> {
    if let Some(primitive) = primitive::classify(line) {
        if primitive != Primitive::Timeout {
            return Ok(StructuredAction::Primitive(line.trim().to_string()));
        }
    }

    let caps = call_regex()
        .captures(line)
        .ok_or_else(|| format!("not a call: '{}'", line))?;
    let name = &caps[1];
    let args = parse_args(&caps[2]);
    let start = ["start_box", "point"];

    match name {
        "click" | "left_single" => {
            required_box(&args, &start, screen).map(|(x, y)| StructuredAction::Click(x, y))
        }
        "left_double" => {
            required_box(&args, &start, screen).map(|(x, y)| StructuredAction::DoubleClick(x, y))
        }
        "right_single" => {
            required_box(&args, &start, screen).map(|(x, y)| StructuredAction::RightClick(x, y))
        }
        "drag" | "select" => Ok(StructuredAction::Drag {
            from: required_box(&args, &start, screen)?,
            to: required_box(&args, &["end_box", "end_point"], screen)?,
        }),
        "hotkey" => {
            let keys: Vec<String> = arg(&args, &["key", "hotkey"])
                .ok_or("hotkey without key")?
                .split_whitespace()
                .map(|k| k.to_lowercase())
                .collect();
            if keys.is_empty() {
                return Err("hotkey without key".to_string());
            }
            Ok(StructuredAction::Hotkey(keys))
        }
        "type" => arg(&args, &["content", "text"])
            .map(|text| StructuredAction::Type(text.to_string()))
            .ok_or_else(|| "type without content".to_string()),
        "scroll" => {
            let direction = match arg(&args, &["direction"]).map(str::to_lowercase).as_deref() {
                Some("up") => Direction::Up,
                Some("down") => Direction::Down,
                Some("left") => Direction::Left,
                Some("right") => Direction::Right,
                other => return Err(format!("bad scroll direction {:?}", other)),
            };
            let at = match arg(&args, &start) {
                Some(value) => Some(parse_box(value, screen)?),
                None => None,
            };
            Ok(StructuredAction::Scroll { at, direction })
        }
        "wait" => Ok(StructuredAction::Primitive(Primitive::Wait.name().to_string())),
        "finished" => Ok(StructuredAction::Primitive(Primitive::Done.name().to_string())),
        "call_user" => Ok(StructuredAction::Primitive(Primitive::Fail.name().to_string())),
        other => Err(format!("unknown action '{}'", other)),
    }
}

/// Parse the action part of a response, one call per line
pub fn parse_actions(action_text: &str, screen: ScreenSize) -> Result<Vec<StructuredAction>, PartialParse> {
    let mut parsed = Vec::new();
    let mut errors = Vec::new();

    for line in action_text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match parse_call(line, screen) {
            Ok(action) => parsed.push(action),
            Err(e) => errors.push(e),
        }
    }

    if parsed.is_empty() && errors.is_empty() {
        errors.push("no action found".to_string());
    }

    if errors.is_empty() {
        Ok(parsed)
    } else {
        Err(PartialParse { parsed, errors })
    }
}

/// Parse a whole `Thought/Action` response
pub fn parse_response(text: &str, screen: ScreenSize) -> Result<Vec<StructuredAction>, PartialParse> {
    match split_thought(text) {
        Some((_, action_text)) => parse_actions(action_text, screen),
        None => Err(PartialParse {
            parsed: Vec::new(),
            errors: vec![format!("missing '{}' marker", ACTION_MARKER)],
        }),
    }
}

/// Canonical actions for parsed calls: runs of executable statements are
/// combined, primitives are kept on their own
pub fn to_actions(parsed: &[StructuredAction]) -> Vec<Action> {
    let mut actions = Vec::new();
    let mut run: Vec<String> = Vec::new();

    for item in parsed {
        if item.is_primitive() {
            if !run.is_empty() {
                actions.push(Action::code(script::combine(&run)));
                run.clear();
            }
            actions.push(Action::code(item.to_code()));
        } else {
            run.push(item.to_code());
        }
    }
    if !run.is_empty() {
        actions.push(Action::code(script::combine(&run)));
    }

    actions
}

/// Decoder entry point. A partial parse keeps whatever was understood.
pub fn decode_structured(text: &str, ctx: &DecodeContext) -> Vec<Action> {
    match parse_response(text, ctx.screen) {
        Ok(parsed) => to_actions(&parsed),
        Err(partial) => {
            tracing::debug!(error = %partial, "Structured response only partly parsed");
            to_actions(&partial.parsed)
        }
    }
}
