//! Task loop
//!
//! Drives a community through the steps of one task until a terminal signal,
//! the step budget, or an unrecoverable step error.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::agent::community::{Community, StepOutcome};
use crate::agent::log::{LogContext, LogRecord};
use crate::agent::runner::{run_actions, Environment};
use crate::core::{Config, Observation, Result, ScreenSize, StepDescriptor, TaskSpec};
use crate::decode::DecodeContext;
use crate::primitive::ControlSignal;

/// What to do when a step fails with an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorPolicy {
    /// End the task on the first failed step
    #[default]
    Abort,
    /// Re-run a failed step up to n more times before aborting. The re-run
    /// starts over with the same observation, so a role that already
    /// answered in the failed attempt (a planner whose grounder then failed)
    /// keeps that exchange and records a second one.
    RetryStep(u32),
}

/// State of the task loop
#[derive(Debug, Clone)]
pub struct TaskState {
    /// Current step (0-indexed)
    pub step: usize,
    /// Step budget
    pub max_steps: usize,
    /// Terminal signal, once one was raised
    pub signal: Option<ControlSignal>,
    /// Error that ended the task
    pub aborted: Option<String>,
}

impl TaskState {
    pub fn new(max_steps: usize) -> Self {
        Self {
            step: 0,
            max_steps,
            signal: None,
            aborted: None,
        }
    }

    /// Check if the loop should continue
    pub fn should_continue(&self) -> bool {
        self.step < self.max_steps && self.signal.is_none() && self.aborted.is_none()
    }

    pub fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::new(self.step, self.max_steps)
    }

    pub fn next_step(&mut self) {
        self.step += 1;
    }

    /// Final signal: the raised one, or a timeout once the budget ran out
    pub fn outcome(&self) -> Option<ControlSignal> {
        match (&self.signal, &self.aborted) {
            (Some(signal), _) => Some(signal.clone()),
            (None, None) if self.step >= self.max_steps => Some(ControlSignal::Timeout),
            _ => None,
        }
    }
}

/// Summary of one task run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    pub task: String,
    /// `None` only when the task was aborted
    pub signal: Option<ControlSignal>,
    pub steps: usize,
    pub executed: usize,
    pub failed: usize,
    pub aborted: Option<String>,
    pub records: Vec<LogRecord>,
}

impl TaskReport {
    /// Whether the task ended with `DONE` or an answer
    pub fn is_success(&self) -> bool {
        matches!(
            self.signal,
            Some(ControlSignal::Done) | Some(ControlSignal::Answer(_))
        )
    }
}

/// Runs tasks with one community
pub struct TaskRunner {
    community: Box<dyn Community>,
    log: LogContext,
    max_steps: usize,
    timeout: Duration,
    screen: ScreenSize,
    policy: StepErrorPolicy,
}

impl TaskRunner {
    pub fn new(community: Box<dyn Community>, log: LogContext) -> Self {
        Self {
            community,
            log,
            max_steps: 15,
            timeout: Duration::from_secs(60),
            screen: ScreenSize::default(),
            policy: StepErrorPolicy::default(),
        }
    }

    /// Take step budget, timeout and screen size from configuration
    pub fn with_config(mut self, config: &Config) -> Self {
        self.max_steps = config.agent.max_steps;
        self.timeout = Duration::from_secs(config.agent.timeout_secs);
        self.screen = config.screen;
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn policy(mut self, policy: StepErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn community(&self) -> &dyn Community {
        self.community.as_ref()
    }

    async fn run_step(
        &mut self,
        step: StepDescriptor,
        task: &TaskSpec,
        obs: Observation,
        ctx: &DecodeContext,
    ) -> Result<StepOutcome> {
        let retries = match self.policy {
            StepErrorPolicy::Abort => 0,
            StepErrorPolicy::RetryStep(n) => n,
        };

        let mut attempt = 0;
        loop {
            match self
                .community
                .run(step, task, obs.clone(), ctx, self.timeout)
                .await
            {
                Err(e) if attempt < retries => {
                    attempt += 1;
                    warn!(step = %step, attempt, error = %e, "Retrying step");
                }
                result => return result,
            }
        }
    }

    /// Run `task` against `env` until it terminates
    pub async fn run<E>(&mut self, name: &str, task: &TaskSpec, env: &mut E) -> TaskReport
    where
        E: Environment + ?Sized,
    {
        self.log.attach(name);
        let mut state = TaskState::new(self.max_steps);
        let (mut executed, mut failed) = (0, 0);

        info!(task = name, max_steps = self.max_steps, "Starting task");

        while state.should_continue() {
            let step = state.descriptor();

            let obs = match env.observe().await {
                Ok(obs) => obs,
                Err(e) => {
                    state.aborted = Some(e.to_string());
                    break;
                }
            };
            let mut ctx = DecodeContext::new(self.screen);
            if let Some(tags) = env.tags() {
                ctx = ctx.with_tags(tags);
            }

            match self.run_step(step, task, obs, &ctx).await {
                Ok(StepOutcome::Actions(actions)) => {
                    let run = run_actions(env, &actions, &ctx.primitives).await;
                    executed += run.executed;
                    failed += run.failed;
                    state.signal = run.signal;
                }
                Ok(StepOutcome::Control(ControlSignal::Wait(secs))) => {
                    env.pause(Duration::from_secs(secs)).await;
                }
                Ok(StepOutcome::Control(ControlSignal::Timeout)) => {}
                Ok(StepOutcome::Control(signal)) => state.signal = Some(signal),
                Err(e) => {
                    warn!(step = %step, error = %e, "Step failed, aborting task");
                    state.aborted = Some(e.to_string());
                }
            }

            state.next_step();
        }

        let signal = state.outcome();
        info!(task = name, steps = state.step, signal = ?signal, "Task finished");

        self.log.detach();
        TaskReport {
            task: name.to_string(),
            signal,
            steps: state.step,
            executed,
            failed,
            aborted: state.aborted,
            records: self.log.drain(),
        }
    }
}
