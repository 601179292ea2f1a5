//! Decoder registry
//!
//! Turns raw model text into canonical [`Action`]s. Each dialect has one pure
//! decoder; the dialect is chosen from configuration, never from the text.
//! When on-screen tags are supplied, executable non-primitive actions get a
//! `tag_i = (x, y)` prefix so the code can refer to tags by name.

pub mod fenced;
pub mod keyword;
pub mod script;
pub mod thought;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{GrounderDialect, ScreenSize, Tag};
use crate::primitive::{self, Primitive};

/// Canonical action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Executable statement or primitive invocation
    pub code: String,
    /// Prose for a downstream role; never executed
    pub is_commentary: bool,
    /// Context prepended before execution
    pub prefix: Option<String>,
}

impl Action {
    /// Executable action
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            is_commentary: false,
            prefix: None,
        }
    }

    /// Prose handed to another role
    pub fn commentary(text: impl Into<String>) -> Self {
        Self {
            code: text.into(),
            is_commentary: true,
            prefix: None,
        }
    }

    /// Whether the code starts with one of `names`
    pub fn is_primitive(&self, names: &[String]) -> bool {
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        primitive::starts_with_any(&self.code, &names)
    }

    /// Append a prefix block, separated from any existing one by a blank line
    pub fn push_prefix(&mut self, prefix: &str) {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return;
        }
        self.prefix = Some(match self.prefix.take() {
            Some(existing) if !existing.is_empty() => format!("{}\n\n{}", existing, prefix),
            _ => prefix.to_string(),
        });
    }

    /// Prefix and code joined the way the executor receives them
    pub fn script(&self) -> String {
        match self.prefix.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => format!("{}\n\n{}", prefix, self.code),
            _ => self.code.clone(),
        }
    }
}

/// Inputs shared by all decoders for one step
#[derive(Debug, Clone)]
pub struct DecodeContext {
    /// Names that mark a primitive invocation
    pub primitives: Vec<String>,
    /// Set-of-marks boxes, if the observation carried them
    pub tags: Option<Vec<Tag>>,
    /// Target space for grid-normalised coordinates
    pub screen: ScreenSize,
}

impl DecodeContext {
    pub fn new(screen: ScreenSize) -> Self {
        Self {
            primitives: Primitive::names().into_iter().map(String::from).collect(),
            tags: None,
            screen,
        }
    }

    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = Some(tags);
        self
    }
}

impl Default for DecodeContext {
    fn default() -> Self {
        Self::new(ScreenSize::default())
    }
}

/// Supported output grammars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Every fenced block is an action
    Fenced,
    /// Fenced primitive blocks, otherwise the whole text as commentary
    Planner,
    /// `CLICK <point>[[x,y]]</point>`, `TYPE [..]`, `SCROLL [..]`
    Atlas,
    /// A single `(x, y)` point
    Uground,
    /// `Thought: ... Action: ...` with structured calls
    StructuredThought,
}

/// Decoder signature
pub type DecoderFn = fn(&str, &DecodeContext) -> Vec<Action>;

impl Dialect {
    pub const ALL: [Dialect; 5] = [
        Dialect::Fenced,
        Dialect::Planner,
        Dialect::Atlas,
        Dialect::Uground,
        Dialect::StructuredThought,
    ];

    /// Registry lookup
    pub fn decoder(&self) -> DecoderFn {
        match self {
            Dialect::Fenced => fenced::decode_fenced,
            Dialect::Planner => fenced::decode_planner,
            Dialect::Atlas => keyword::decode_atlas,
            Dialect::Uground => keyword::decode_uground,
            Dialect::StructuredThought => thought::decode_structured,
        }
    }

    /// Whether decoded coordinates are grid-normalised
    pub fn uses_grid(&self) -> bool {
        matches!(
            self,
            Dialect::Atlas | Dialect::Uground | Dialect::StructuredThought
        )
    }
}

impl From<GrounderDialect> for Dialect {
    fn from(dialect: GrounderDialect) -> Self {
        match dialect {
            GrounderDialect::Fenced => Dialect::Fenced,
            GrounderDialect::Atlas => Dialect::Atlas,
            GrounderDialect::Uground => Dialect::Uground,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::Fenced => "fenced",
            Dialect::Planner => "planner",
            Dialect::Atlas => "atlas",
            Dialect::Uground => "uground",
            Dialect::StructuredThought => "structured_thought",
        };
        f.write_str(name)
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::ALL
            .into_iter()
            .find(|d| d.to_string() == s)
            .ok_or_else(|| format!("unknown dialect '{}'", s))
    }
}

/// Decode `text` with the dialect's decoder, then apply tag rewriting
pub fn decode(dialect: Dialect, text: &str, ctx: &DecodeContext) -> Vec<Action> {
    let mut actions = (dialect.decoder())(text, ctx);
    if let Some(tags) = ctx.tags.as_deref() {
        apply_tags(&mut actions, tags, &ctx.primitives);
    }
    actions
}

/// `tag_1=(cx, cy)` lines, 1-indexed
pub fn tag_prefix(tags: &[Tag]) -> String {
    tags.iter()
        .enumerate()
        .map(|(i, tag)| {
            let (x, y) = tag.center();
            format!("tag_{}=({}, {})", i + 1, x, y)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prefix every executable, non-primitive action with the tag table
pub fn apply_tags(actions: &mut [Action], tags: &[Tag], primitives: &[String]) {
    if tags.is_empty() {
        return;
    }
    let prefix = tag_prefix(tags);
    for action in actions
        .iter_mut()
        .filter(|a| !a.is_commentary && !a.is_primitive(primitives))
    {
        action.push_prefix(&prefix);
    }
}

/// Scale a 0–1000 grid value into `extent` pixels
pub fn scale_grid(value: f64, extent: u32) -> i64 {
    (value * f64::from(extent) / 1000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_prefix_format() {
        let tags = [Tag::new(0, 0, 10, 10), Tag::new(100, 50, 20, 30)];
        assert_eq!(tag_prefix(&tags), "tag_1=(5, 5)\ntag_2=(110, 65)");
    }

    #[test]
    fn test_tags_skip_primitives() {
        let ctx = DecodeContext::default().with_tags(vec![Tag::new(0, 0, 10, 10)]);
        let actions = decode(
            Dialect::Fenced,
            "```pyautogui.click(tag_1)``` then ```DONE```",
            &ctx,
        );

        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].prefix.as_deref(), Some("tag_1=(5, 5)"));
        assert_eq!(actions[1].prefix, None);
    }

    #[test]
    fn test_empty_tags_leave_actions_alone() {
        let ctx = DecodeContext::default().with_tags(Vec::new());
        let actions = decode(Dialect::Fenced, "```pyautogui.press('enter')```", &ctx);
        assert_eq!(actions[0].prefix, None);
    }

    #[test]
    fn test_tags_skip_commentary() {
        let ctx = DecodeContext::default().with_tags(vec![Tag::new(0, 0, 2, 2)]);
        let actions = decode(Dialect::Planner, "Open the File menu.", &ctx);
        assert!(actions[0].is_commentary);
        assert_eq!(actions[0].prefix, None);
    }

    #[test]
    fn test_push_prefix_joins_blocks() {
        let mut action = Action::code("pyautogui.click(tag_1)");
        action.push_prefix("import time");
        action.push_prefix("  tag_1=(1, 1)\n");
        assert_eq!(action.prefix.as_deref(), Some("import time\n\ntag_1=(1, 1)"));
        assert_eq!(
            action.script(),
            "import time\n\ntag_1=(1, 1)\n\npyautogui.click(tag_1)"
        );
    }

    #[test]
    fn test_scale_grid_midpoint() {
        let screen = ScreenSize::new(1280, 800);
        assert_eq!(scale_grid(500.0, screen.width), 640);
        assert_eq!(scale_grid(500.0, screen.height), 400);
        assert_eq!(scale_grid(1000.0, screen.width), 1280);
        assert_eq!(scale_grid(0.0, screen.height), 0);
    }

    #[test]
    fn test_dialect_names_parse_back() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.to_string().parse::<Dialect>(), Ok(dialect));
        }
        assert!("ui-tars".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_every_dialect_has_a_decoder() {
        let ctx = DecodeContext::default();
        for dialect in Dialect::ALL {
            // must not panic on arbitrary text
            let _ = decode(dialect, "nothing to see", &ctx);
        }
    }
}
