//! CLI commands
//!
//! Each command returns the text to print.

use std::path::Path;

use crate::core::{Config, Result, ScreenSize, ScreenwrightError, Tag};
use crate::decode::{self, DecodeContext, Dialect};
use crate::primitive::{self, ControlSignal};

/// What the `config` command shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Default configuration as TOML
    Default,
    /// Path of the configuration file
    Path,
    /// Effective configuration after file and environment
    Show,
}

/// Decode `text` with `dialect` and render the actions as pretty JSON
pub fn decode_command(
    dialect: Dialect,
    text: &str,
    screen: ScreenSize,
    tags: Option<Vec<Tag>>,
) -> Result<String> {
    let mut ctx = DecodeContext::new(screen);
    if let Some(tags) = tags {
        ctx = ctx.with_tags(tags);
    }
    let actions = decode::decode(dialect, text, &ctx);
    Ok(serde_json::to_string_pretty(&actions)?)
}

/// Classify one line as a primitive and show the resulting signal
pub fn dispatch_command(line: &str) -> String {
    let Some(primitive) = primitive::classify(line) else {
        return format!("not a primitive: {}", line.trim());
    };

    match primitive::dispatch(line) {
        Ok(signal @ ControlSignal::Wait(_)) | Ok(signal @ ControlSignal::Timeout) => {
            format!("{} -> {} (step continues)", primitive, signal)
        }
        Ok(signal) => format!("{} -> {} (task ends)", primitive, signal),
        Err(e) => format!("{} -> forfeited: {}", primitive, e),
    }
}

/// Render configuration information
pub fn config_command(action: ConfigAction, path: Option<&Path>) -> Result<String> {
    match action {
        ConfigAction::Default => Ok(Config::default_config_toml()),
        ConfigAction::Path => Ok(Config::config_file().display().to_string()),
        ConfigAction::Show => {
            let config = match path {
                Some(path) => Config::load_from_path(path)?,
                None => Config::load(),
            };
            config.validate()?;
            toml::to_string_pretty(&config)
                .map_err(|e| ScreenwrightError::config(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_command_outputs_json() {
        let out = decode_command(
            Dialect::Fenced,
            "```pyautogui.click(10,20)```",
            ScreenSize::default(),
            None,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["code"], "pyautogui.click(10,20)");
        assert_eq!(value[0]["is_commentary"], false);
    }

    #[test]
    fn test_dispatch_command() {
        assert_eq!(dispatch_command("WAIT 2"), "WAIT -> WAIT 2 (step continues)");
        assert_eq!(dispatch_command("ANS 42"), "ANS -> ANS 42 (task ends)");
        assert!(dispatch_command("WAIT x").contains("forfeited"));
        assert!(dispatch_command("pyautogui.click(1, 1)").starts_with("not a primitive"));
    }

    #[test]
    fn test_config_default_is_toml() {
        let out = config_command(ConfigAction::Default, None).unwrap();
        assert!(out.contains("[retry]"));
    }
}
