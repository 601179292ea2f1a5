//! Shared types used across Screenwright modules
//!
//! Contains observations, task descriptors, and screen geometry.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// PNG-encoded bitmap, as captured by the screenshot collaborator
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    png: Vec<u8>,
}

impl ImageData {
    /// Wrap already PNG-encoded bytes
    pub fn from_png(png: impl Into<Vec<u8>>) -> Self {
        Self { png: png.into() }
    }

    /// Raw PNG bytes
    pub fn as_png(&self) -> &[u8] {
        &self.png
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageData({} bytes)", self.png.len())
    }
}

/// Modalities an observation can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObsKey {
    /// Plain screenshot of the desktop
    Screenshot,
    /// Screenshot annotated with numbered element tags
    SetOfMarks,
    /// Textual accessibility dump
    A11yTree,
    /// Plan text injected by the planner for the grounder
    Schedule,
}

impl ObsKey {
    /// All keys, in prompt order
    pub const ALL: [ObsKey; 4] = [
        ObsKey::Screenshot,
        ObsKey::SetOfMarks,
        ObsKey::A11yTree,
        ObsKey::Schedule,
    ];

    /// Natural-language description used when telling the model what it sees
    pub fn describe(&self) -> &'static str {
        match self {
            ObsKey::Screenshot => "a screenshot of the current screen",
            ObsKey::SetOfMarks => {
                "a screenshot with interactive elements marked by numbered tags"
            }
            ObsKey::A11yTree => "an accessibility tree of the current screen",
            ObsKey::Schedule => "the plan for this step written by the planner",
        }
    }

    /// Whether this modality carries an image
    pub fn is_visual(&self) -> bool {
        matches!(self, ObsKey::Screenshot | ObsKey::SetOfMarks)
    }
}

impl fmt::Display for ObsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObsKey::Screenshot => write!(f, "screenshot"),
            ObsKey::SetOfMarks => write!(f, "set_of_marks"),
            ObsKey::A11yTree => write!(f, "a11y_tree"),
            ObsKey::Schedule => write!(f, "schedule"),
        }
    }
}

/// Payload of a single modality
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObsPayload {
    Image(ImageData),
    Text(String),
}

/// One step's observation: at most one payload per modality
#[derive(Debug, Clone, Default)]
pub struct Observation {
    entries: BTreeMap<ObsKey, ObsPayload>,
}

impl Observation {
    /// Create an empty observation
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: ObsKey, payload: ObsPayload) -> Self {
        self.insert(key, payload);
        self
    }

    /// Insert or replace a modality
    pub fn insert(&mut self, key: ObsKey, payload: ObsPayload) {
        self.entries.insert(key, payload);
    }

    /// Get a modality
    pub fn get(&self, key: ObsKey) -> Option<&ObsPayload> {
        self.entries.get(&key)
    }

    /// Present modalities, in key order
    pub fn keys(&self) -> impl Iterator<Item = ObsKey> + '_ {
        self.entries.keys().copied()
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (ObsKey, &ObsPayload)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Position of a step within a task. Used for logging and formatting only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDescriptor {
    pub index: usize,
    pub total: usize,
}

impl StepDescriptor {
    pub fn new(index: usize, total: usize) -> Self {
        Self { index, total }
    }

    /// First step of a task seeds the conversations
    pub fn is_first(&self) -> bool {
        self.index == 0
    }
}

impl fmt::Display for StepDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index + 1, self.total)
    }
}

/// Where the produced code will run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvSort {
    /// Directly in the application's own CLI or REPL
    Raw,
    /// On a virtual machine driving mouse and keyboard
    Vm,
}

/// Capability descriptor: which environment family a task targets and the
/// application-specific hints handed to the prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub sort: EnvSort,
    /// Application name, e.g. "ChimeraX"
    pub app: String,
    /// One-line introduction of the application
    #[serde(default)]
    pub brief: Option<String>,
    /// What the model should write in raw mode ("ChimeraX commands")
    #[serde(default)]
    pub media: Option<String>,
    #[serde(default)]
    pub usage: Vec<String>,
    #[serde(default)]
    pub tips: Vec<String>,
}

impl Capability {
    pub fn vm(app: impl Into<String>) -> Self {
        Self {
            sort: EnvSort::Vm,
            app: app.into(),
            brief: None,
            media: None,
            usage: Vec::new(),
            tips: Vec::new(),
        }
    }

    pub fn raw(app: impl Into<String>) -> Self {
        Self {
            sort: EnvSort::Raw,
            ..Self::vm(app)
        }
    }
}

/// Read-only description of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub instruction: String,
    pub capability: Capability,
}

impl TaskSpec {
    pub fn new(instruction: impl Into<String>, capability: Capability) -> Self {
        Self {
            instruction: instruction.into(),
            capability,
        }
    }
}

/// On-screen element bounding box offered to the model as a numbered tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Tag {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Centre of the box, rounding towards the origin
    pub fn center(&self) -> (i64, i64) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Target coordinate space for grid-normalised dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self::new(1280, 800)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_keys_are_ordered() {
        let obs = Observation::new()
            .with(ObsKey::A11yTree, ObsPayload::Text("tree".into()))
            .with(ObsKey::Screenshot, ObsPayload::Image(ImageData::from_png(vec![1])));

        let keys: Vec<_> = obs.keys().collect();
        assert_eq!(keys, vec![ObsKey::Screenshot, ObsKey::A11yTree]);
    }

    #[test]
    fn test_observation_insert_replaces() {
        let mut obs = Observation::new();
        obs.insert(ObsKey::Schedule, ObsPayload::Text("a".into()));
        obs.insert(ObsKey::Schedule, ObsPayload::Text("b".into()));
        assert_eq!(obs.len(), 1);
        assert_eq!(
            obs.get(ObsKey::Schedule),
            Some(&ObsPayload::Text("b".into()))
        );
    }

    #[test]
    fn test_tag_center() {
        assert_eq!(Tag::new(10, 20, 31, 40).center(), (25, 40));
    }

    #[test]
    fn test_step_descriptor_display() {
        let step = StepDescriptor::new(0, 15);
        assert!(step.is_first());
        assert_eq!(step.to_string(), "1/15");
    }
}
