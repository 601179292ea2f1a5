//! Keyword-grammar grounder dialects
//!
//! Both grammars address the screen on a 0–1000 grid; points are scaled into
//! the configured screen size.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::core::ScreenSize;
use crate::decode::{scale_grid, script, Action, DecodeContext};

/// Scroll magnitude for keyword scrolls
const SCROLL_CLICKS: i64 = 10;

fn atlas_regex() -> &'static Regex {
    static ATLAS: OnceLock<Regex> = OnceLock::new();
    ATLAS.get_or_init(|| {
        Regex::new(concat!(
            r"(?P<click>CLICK <point>\[\[(?P<cx>\d+), ?(?P<cy>\d+)\]\]</point>)",
            r"|(?P<type>TYPE \[(?P<text>.+?)\])",
            r"|(?P<scroll>SCROLL \[(?P<dir>UP|DOWN|LEFT|RIGHT)\])",
        ))
        .expect("valid atlas regex")
    })
}

fn point_regex() -> &'static Regex {
    static POINT: OnceLock<Regex> = OnceLock::new();
    POINT.get_or_init(|| Regex::new(r"\((\d+), ?(\d+)\)").expect("valid point regex"))
}

fn grid_point(x: &str, y: &str, screen: ScreenSize) -> Option<(i64, i64)> {
    let x: f64 = x.parse().ok()?;
    let y: f64 = y.parse().ok()?;
    Some((scale_grid(x, screen.width), scale_grid(y, screen.height)))
}

fn atlas_statement(caps: &Captures<'_>, screen: ScreenSize) -> Option<String> {
    if caps.name("click").is_some() {
        let (x, y) = grid_point(caps.name("cx")?.as_str(), caps.name("cy")?.as_str(), screen)?;
        Some(script::click(x, y))
    } else if caps.name("type").is_some() {
        Some(script::type_text(caps.name("text")?.as_str()))
    } else if caps.name("scroll").is_some() {
        Some(match caps.name("dir")?.as_str() {
            "UP" => script::scroll(SCROLL_CLICKS),
            "DOWN" => script::scroll(-SCROLL_CLICKS),
            "LEFT" => script::hscroll(-SCROLL_CLICKS),
            _ => script::hscroll(SCROLL_CLICKS),
        })
    } else {
        None
    }
}

/// `CLICK <point>[[x,y]]</point>`, `TYPE [text]`, `SCROLL [dir]`, each
/// match one action
pub fn decode_atlas(text: &str, ctx: &DecodeContext) -> Vec<Action> {
    atlas_regex()
        .captures_iter(text)
        .filter_map(|caps| atlas_statement(&caps, ctx.screen))
        .map(Action::code)
        .collect()
}

/// Every `(x, y)` point becomes a click
pub fn decode_uground(text: &str, ctx: &DecodeContext) -> Vec<Action> {
    point_regex()
        .captures_iter(text)
        .filter_map(|caps| grid_point(&caps[1], &caps[2], ctx.screen))
        .map(|(x, y)| Action::code(script::click(x, y)))
        .collect()
}
