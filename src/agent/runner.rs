//! Step execution
//!
//! Pushes a step's actions to the environment collaborator in order.
//! Primitives are dispatched here: a wait pauses and continues, a terminal
//! signal stops the list, and a malformed primitive only forfeits itself.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::core::{Observation, Result, Tag};
use crate::decode::Action;
use crate::primitive::{self, ControlSignal};

/// The machine the actions run on
#[async_trait]
pub trait Environment: Send {
    /// Capture the next observation
    async fn observe(&mut self) -> Result<Observation>;

    /// Set-of-marks boxes of the last observation, if any were drawn
    fn tags(&self) -> Option<Vec<Tag>> {
        None
    }

    /// Run one script; `false` if the environment refused or failed it
    async fn execute(&mut self, script: &str) -> bool;

    /// Suspend the task
    async fn pause(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// What happened to a step's actions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepRun {
    /// Scripts the environment accepted
    pub executed: usize,
    /// Scripts the environment refused
    pub failed: usize,
    /// Primitives dropped because they could not be dispatched
    pub forfeited: usize,
    /// Terminal signal that stopped the list
    pub signal: Option<ControlSignal>,
}

/// Execute `actions` until a terminal signal
pub async fn run_actions<E>(env: &mut E, actions: &[Action], primitives: &[String]) -> StepRun
where
    E: Environment + ?Sized,
{
    let mut run = StepRun::default();

    for action in actions {
        if action.is_commentary {
            warn!("Refusing to execute commentary");
            continue;
        }

        if !action.is_primitive(primitives) {
            let script = action.script();
            if env.execute(&script).await {
                run.executed += 1;
            } else {
                warn!(script = %script, "Environment failed to execute action");
                run.failed += 1;
            }
            continue;
        }

        match primitive::dispatch(&action.code) {
            Ok(ControlSignal::Wait(secs)) => {
                debug!(secs, "Pausing");
                env.pause(Duration::from_secs(secs)).await;
            }
            Ok(ControlSignal::Timeout) => {}
            Ok(signal) => {
                run.signal = Some(signal);
                break;
            }
            Err(e) => {
                error!(code = %action.code, error = %e, "Error calling primitive");
                run.forfeited += 1;
            }
        }
    }

    run
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        scripts: Vec<String>,
        pauses: Vec<Duration>,
    }

    #[async_trait]
    impl Environment for Recorder {
        async fn observe(&mut self) -> Result<Observation> {
            Ok(Observation::new())
        }

        async fn execute(&mut self, script: &str) -> bool {
            self.scripts.push(script.to_string());
            !script.contains("fail")
        }

        async fn pause(&mut self, duration: Duration) {
            self.pauses.push(duration);
        }
    }

    fn names() -> Vec<String> {
        primitive::Primitive::names().into_iter().map(String::from).collect()
    }

    #[tokio::test]
    async fn test_wait_pauses_and_continues() {
        let mut env = Recorder::default();
        let actions = vec![
            Action::code("WAIT"),
            Action::code("WAIT 2"),
            Action::code("pyautogui.click(1, 1)"),
        ];
        let run = run_actions(&mut env, &actions, &names()).await;

        assert_eq!(env.pauses, vec![Duration::from_secs(5), Duration::from_secs(2)]);
        assert_eq!(run.executed, 1);
        assert_eq!(run.signal, None);
    }

    #[tokio::test]
    async fn test_terminal_signal_stops_the_list() {
        let mut env = Recorder::default();
        let actions = vec![
            Action::code("pyautogui.press('enter')"),
            Action::code("ANS hello world"),
            Action::code("pyautogui.click(1, 1)"),
        ];
        let run = run_actions(&mut env, &actions, &names()).await;

        assert_eq!(env.scripts.len(), 1);
        assert_eq!(run.signal, Some(ControlSignal::Answer("hello world".into())));
    }

    #[tokio::test]
    async fn test_malformed_primitive_is_forfeited() {
        let mut env = Recorder::default();
        let actions = vec![Action::code("WAIT soon"), Action::code("pyautogui.click(2, 2)")];
        let run = run_actions(&mut env, &actions, &names()).await;

        assert_eq!(run.forfeited, 1);
        assert_eq!(run.executed, 1);
    }

    #[tokio::test]
    async fn test_commentary_and_prefix() {
        let mut env = Recorder::default();
        let mut tagged = Action::code("pyautogui.click(*tag_1)");
        tagged.push_prefix("tag_1=(5, 5)");
        let actions = vec![Action::commentary("click the button"), tagged, Action::code("fail()")];
        let run = run_actions(&mut env, &actions, &names()).await;

        assert_eq!(env.scripts[0], "tag_1=(5, 5)\n\npyautogui.click(*tag_1)");
        assert_eq!(run.executed, 1);
        assert_eq!(run.failed, 1);
    }

    #[tokio::test]
    async fn test_timeout_marker_is_noop() {
        let mut env = Recorder::default();
        let run = run_actions(&mut env, &[Action::code("TIMEOUT")], &names()).await;
        assert_eq!(run, StepRun::default());
    }
}
