//! Control primitives
//!
//! A closed vocabulary of commands a model may emit instead of GUI code.
//! Dispatching one yields a [`ControlSignal`]; terminal signals end the task,
//! `Wait` and `Timeout` do not.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{Result, ScreenwrightError};

/// Default pause for a bare `WAIT`, in seconds
pub const DEFAULT_WAIT_SECS: u64 = 5;

/// Reserved control keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    #[serde(rename = "DONE")]
    Done,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "WAIT")]
    Wait,
    #[serde(rename = "ANS")]
    Ans,
    #[serde(rename = "TIMEOUT")]
    Timeout,
}

impl Primitive {
    pub const ALL: [Primitive; 5] = [
        Primitive::Done,
        Primitive::Fail,
        Primitive::Wait,
        Primitive::Ans,
        Primitive::Timeout,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Done => "DONE",
            Primitive::Fail => "FAIL",
            Primitive::Wait => "WAIT",
            Primitive::Ans => "ANS",
            Primitive::Timeout => "TIMEOUT",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Prompt documentation. `«` and `»` mark code and are rendered as
    /// fences by the prompt builders. `TIMEOUT` is harness bookkeeping and is
    /// never offered to the model.
    pub fn doc(&self) -> Option<&'static str> {
        match self {
            Primitive::Done => Some("When you think the task is done, return «DONE»"),
            Primitive::Fail => Some(
                "When you think the task can not be done, return «FAIL». Don't easily say «FAIL»; try your best to do the task",
            ),
            Primitive::Wait => Some(
                "When you think you have to wait for some time, return «WAIT» or «WAIT n», in which n defaults to 5(s)",
            ),
            Primitive::Ans => Some(
                "When you are asked to submit an answer, return «ANS s» without quotation marks surrounding s, and use «FAIL» if there is no answer to the question",
            ),
            Primitive::Timeout => None,
        }
    }

    /// Primitives documented to the model, in order
    pub fn documented() -> impl Iterator<Item = (Primitive, &'static str)> {
        Self::ALL
            .into_iter()
            .filter_map(|p| p.doc().map(|doc| (p, doc)))
    }

    /// Names of every primitive, for decoders
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Primitive::name).collect()
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Planned outcome of a primitive. Not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlSignal {
    Done,
    Fail,
    /// Pause for the given seconds, then continue
    Wait(u64),
    Answer(String),
    Timeout,
}

impl ControlSignal {
    /// Whether the signal ends the task
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ControlSignal::Done | ControlSignal::Fail | ControlSignal::Answer(_)
        )
    }
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlSignal::Done => write!(f, "DONE"),
            ControlSignal::Fail => write!(f, "FAIL"),
            ControlSignal::Wait(secs) => write!(f, "WAIT {}", secs),
            ControlSignal::Answer(payload) => write!(f, "ANS {}", payload),
            ControlSignal::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// The primitive `code` invokes, if any: the stripped code must start with a
/// known name followed by whitespace or the end of the string.
pub fn classify(code: &str) -> Option<Primitive> {
    let code = code.trim();
    Primitive::ALL.into_iter().find(|p| {
        code.strip_prefix(p.name())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
    })
}

/// Whether `code` starts with one of `names` followed by whitespace or end
pub fn starts_with_any(code: &str, names: &[&str]) -> bool {
    let code = code.trim();
    names.iter().any(|name| {
        code.strip_prefix(name)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
    })
}

/// Dispatch a primitive invocation: split on whitespace, look the name up,
/// and apply it to the remaining tokens.
pub fn dispatch(code: &str) -> Result<ControlSignal> {
    let mut tokens = code.split_whitespace();
    let name = tokens.next().unwrap_or_default();
    let primitive = Primitive::from_name(name)
        .ok_or_else(|| ScreenwrightError::primitive(format!("unknown primitive '{}'", name)))?;
    let args: Vec<&str> = tokens.collect();

    match primitive {
        Primitive::Done => no_args(primitive, &args).map(|_| ControlSignal::Done),
        Primitive::Fail => no_args(primitive, &args).map(|_| ControlSignal::Fail),
        Primitive::Timeout => no_args(primitive, &args).map(|_| ControlSignal::Timeout),
        Primitive::Wait => match args.as_slice() {
            [] => Ok(ControlSignal::Wait(DEFAULT_WAIT_SECS)),
            [secs] => secs.parse().map(ControlSignal::Wait).map_err(|_| {
                ScreenwrightError::primitive(format!("WAIT expects whole seconds, got '{}'", secs))
            }),
            _ => Err(ScreenwrightError::primitive(format!(
                "WAIT takes at most one argument, got {}",
                args.len()
            ))),
        },
        Primitive::Ans => Ok(ControlSignal::Answer(args.join(" "))),
    }
}

fn no_args(primitive: Primitive, args: &[&str]) -> Result<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(ScreenwrightError::primitive(format!(
            "{} takes no arguments, got '{}'",
            primitive,
            args.join(" ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_requires_word_boundary() {
        assert_eq!(classify("  DONE  "), Some(Primitive::Done));
        assert_eq!(classify("WAIT 3"), Some(Primitive::Wait));
        assert_eq!(classify("ANS\tforty two"), Some(Primitive::Ans));
        assert_eq!(classify("DONEXYZ"), None);
        assert_eq!(classify("pyautogui.click(1, 2)"), None);
    }

    #[test]
    fn test_wait_default_and_explicit() {
        assert_eq!(dispatch("WAIT").unwrap(), ControlSignal::Wait(5));
        assert_eq!(dispatch("WAIT 2").unwrap(), ControlSignal::Wait(2));
        assert!(!ControlSignal::Wait(2).is_terminal());
    }

    #[test]
    fn test_answer_keeps_payload() {
        assert_eq!(
            dispatch("ANS hello world").unwrap(),
            ControlSignal::Answer("hello world".into())
        );
        assert!(dispatch("ANS 5").unwrap().is_terminal());
    }

    #[test]
    fn test_malformed_calls_are_errors() {
        assert!(matches!(
            dispatch("WAIT soon"),
            Err(ScreenwrightError::Primitive(_))
        ));
        assert!(dispatch("DONE now").is_err());
        assert!(dispatch("CLICK").is_err());
        assert!(dispatch("").is_err());
    }

    #[test]
    fn test_timeout_is_a_marker() {
        let signal = dispatch("TIMEOUT").unwrap();
        assert_eq!(signal, ControlSignal::Timeout);
        assert!(!signal.is_terminal());
    }

    #[test]
    fn test_documented_excludes_timeout() {
        let documented: Vec<_> = Primitive::documented().map(|(p, _)| p).collect();
        assert_eq!(
            documented,
            vec![Primitive::Done, Primitive::Fail, Primitive::Wait, Primitive::Ans]
        );
    }
}
