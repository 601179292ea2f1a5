//! Canonical automation statements
//!
//! Every dialect is rewritten into this pyautogui subset so the executor
//! only ever sees one language.

/// Pause inserted between combined statements, in seconds
pub const INTER_ACTION_PAUSE: f64 = 0.5;

pub fn click(x: i64, y: i64) -> String {
    format!("pyautogui.click({}, {})", x, y)
}

pub fn double_click(x: i64, y: i64) -> String {
    format!("pyautogui.doubleClick({}, {})", x, y)
}

pub fn right_click(x: i64, y: i64) -> String {
    format!("pyautogui.rightClick({}, {})", x, y)
}

pub fn move_to(x: i64, y: i64) -> String {
    format!("pyautogui.moveTo({}, {})", x, y)
}

pub fn drag(from: (i64, i64), to: (i64, i64)) -> String {
    format!(
        "{}; pyautogui.dragTo({}, {}, duration=0.5)",
        move_to(from.0, from.1),
        to.0,
        to.1
    )
}

pub fn type_text(text: &str) -> String {
    format!("pyautogui.typewrite({}, interval=0.1)", quote(text))
}

pub fn press(key: &str) -> String {
    format!("pyautogui.press({})", single_quote(key))
}

pub fn hotkey(keys: &[&str]) -> String {
    let keys: Vec<String> = keys.iter().map(|k| single_quote(k)).collect();
    format!("pyautogui.hotkey({})", keys.join(", "))
}

/// Vertical scroll; positive is up
pub fn scroll(amount: i64) -> String {
    format!("pyautogui.scroll({})", amount)
}

/// Horizontal scroll; positive is right
pub fn hscroll(amount: i64) -> String {
    format!("pyautogui.hscroll({})", amount)
}

pub fn sleep(secs: f64) -> String {
    format!("time.sleep({})", secs)
}

/// Combine statements into one action, pausing after each
pub fn combine(statements: &[String]) -> String {
    match statements {
        [single] => single.clone(),
        _ => statements
            .iter()
            .map(|s| format!("{}; {};", s.trim_end_matches(';'), sleep(INTER_ACTION_PAUSE)))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// JSON-style double-quoted literal, valid in Python
fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text.replace('"', "\\\"")))
}

fn single_quote(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_text_escapes() {
        assert_eq!(
            type_text("say \"hi\"\n"),
            r#"pyautogui.typewrite("say \"hi\"\n", interval=0.1)"#
        );
    }

    #[test]
    fn test_hotkey_quotes_keys() {
        assert_eq!(hotkey(&["ctrl", "c"]), "pyautogui.hotkey('ctrl', 'c')");
    }

    #[test]
    fn test_combine_single_is_unchanged() {
        assert_eq!(combine(&[click(1, 2)]), "pyautogui.click(1, 2)");
    }

    #[test]
    fn test_combine_inserts_pauses() {
        let combined = combine(&[click(1, 2), press("enter")]);
        assert_eq!(
            combined,
            "pyautogui.click(1, 2); time.sleep(0.5);\npyautogui.press('enter'); time.sleep(0.5);"
        );
    }
}
