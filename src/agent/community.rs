//! Communities of cooperating roles
//!
//! A community runs one step of a task: it feeds the observation to its
//! agents in order and turns their replies into either canonical actions or
//! a control signal.
//!
//! - [`AllInOne`]: a single actor, read according to its [`ActorMode`]
//! - [`SeeAct`]: a planner whose plan is grounded into code by a grounder

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::agent::log::LogContext;
use crate::agent::prompt::{self, PromptKind};
use crate::agent::role::Agent;
use crate::core::{
    ActorMode, Config, ModelConfig, ObsKey, ObsPayload, Observation, Result, ScreenwrightError,
    StepDescriptor, TaskSpec, Topology, WireStyle,
};
use crate::decode::fenced::{action_line, code_section, wrap_fence};
use crate::decode::thought::{self, StructuredAction};
use crate::decode::{self, Action, DecodeContext, Dialect};
use crate::llm::{ContentItem, HttpTransport, Message, ModelTransport, Redaction, Role};
use crate::primitive::{self, ControlSignal, DEFAULT_WAIT_SECS};

/// Result of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Actions to execute; never empty
    Actions(Vec<Action>),
    /// Planned exit or pause instead of actions
    Control(ControlSignal),
}

impl StepOutcome {
    /// Wrap decoded actions. An empty list becomes a default wait, and a
    /// leading terminal primitive ends the step before anything executes.
    pub fn from_actions(actions: Vec<Action>, primitives: &[String]) -> Self {
        let Some(first) = actions.first() else {
            return StepOutcome::Control(ControlSignal::Wait(DEFAULT_WAIT_SECS));
        };

        if first.is_primitive(primitives) {
            if let Ok(signal) = primitive::dispatch(&first.code) {
                if signal.is_terminal() {
                    return StepOutcome::Control(signal);
                }
            }
        }
        StepOutcome::Actions(actions)
    }

    pub fn is_control(&self) -> bool {
        matches!(self, StepOutcome::Control(_))
    }
}

/// Trait for step protocols
#[async_trait]
pub trait Community: Send {
    /// Run one step. `task` is only used to seed conversations on the first
    /// step.
    async fn run(
        &mut self,
        step: StepDescriptor,
        task: &TaskSpec,
        obs: Observation,
        ctx: &DecodeContext,
        timeout: Duration,
    ) -> Result<StepOutcome>;

    /// Agents in calling order, for history dumps
    fn agents(&self) -> Vec<&Agent>;
}

/// Secondary grounding endpoint for [`ActorMode::PlannerWithGrounding`]
struct Grounding {
    transport: Arc<dyn ModelTransport>,
    attempts: usize,
}

/// Single actor
pub struct AllInOne {
    mono: Agent,
    mode: ActorMode,
    grounding: Option<Grounding>,
    log: LogContext,
}

impl AllInOne {
    pub fn new(mono: Agent, mode: ActorMode, log: LogContext) -> Self {
        Self {
            mono,
            mode,
            grounding: None,
            log,
        }
    }

    /// Endpoint and attempt budget of the secondary grounding call
    pub fn with_grounding(mut self, transport: Arc<dyn ModelTransport>, attempts: usize) -> Self {
        self.grounding = Some(Grounding {
            transport,
            attempts: attempts.max(1),
        });
        self
    }

    /// Prompt and dialect the actor needs for `mode`
    pub fn role_for(mode: ActorMode) -> (PromptKind, Dialect) {
        match mode {
            ActorMode::Fenced => (PromptKind::Actor { reasoning: false }, Dialect::Fenced),
            ActorMode::Reasoning { .. } => (PromptKind::Actor { reasoning: true }, Dialect::Fenced),
            ActorMode::ActionLine => (PromptKind::ActionLine, Dialect::Fenced),
            ActorMode::StructuredThought => {
                (PromptKind::StructuredThought, Dialect::StructuredThought)
            }
            ActorMode::PlannerWithGrounding => (PromptKind::ThoughtPlanner, Dialect::Fenced),
        }
    }

    fn decode_reasoning(&self, text: &str, split: bool, ctx: &DecodeContext) -> Vec<Action> {
        let code = code_section(text).unwrap_or_default();
        if code.is_empty() {
            return Vec::new();
        }

        if split {
            code.split("; ")
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .flat_map(|statement| self.mono.decode(&wrap_fence(statement), ctx))
                .collect()
        } else {
            self.mono.decode(&wrap_fence(&code), ctx)
        }
    }

    fn decode_action_line(&self, text: &str, ctx: &DecodeContext) -> Vec<Action> {
        let line = action_line(text);
        if line.is_empty() {
            return Vec::new();
        }
        self.mono.decode(&wrap_fence(&line), ctx)
    }

    /// Payload for the grounding model: the actor's history with the system
    /// turn replaced by the grounding prompt, and the last reply cut back to
    /// its thought followed by an open `Action:` line
    fn grounding_payload(&self, style: WireStyle, instruction: &str, reasoning: &str) -> Vec<Value> {
        let conversation = self.mono.conversation();
        let mut payload: Vec<Value> = conversation
            .messages()
            .into_iter()
            .map(|m| m.to_wire(style, Redaction::NONE, false))
            .collect();

        if conversation.system().is_some() {
            if let Some(first) = payload.first_mut() {
                let intro = ContentItem::text(prompt::grounding_prompt(instruction));
                *first = Message::new(Role::User, vec![intro]).to_wire(style, Redaction::NONE, false);
            }
        }
        if let Some(last) = payload.last_mut() {
            last["content"] = json!([{ "type": "text", "text": format!("{}\nAction: ", reasoning) }]);
        }

        payload
    }

    /// Bounded loop around the secondary grounding call. Falls back to the
    /// best partial parse, then to the parsed action line of the actor, then
    /// to a wait.
    async fn ground(
        &mut self,
        step: StepDescriptor,
        task: &TaskSpec,
        text: &str,
        ctx: &DecodeContext,
        timeout: Duration,
    ) -> Result<Vec<Action>> {
        let reasoning = thought::action_marker(text).map_or(text, |idx| &text[..idx]).trim();
        let planned = action_line(text);
        let planned = planned.trim_matches('`').trim();

        // answers and other primitives need no grounding
        if primitive::classify(planned).is_some() {
            return Ok(self.mono.decode(&wrap_fence(planned), ctx));
        }

        let grounding = self
            .grounding
            .as_ref()
            .ok_or_else(|| ScreenwrightError::config("planner_with_grounding requires a grounding endpoint"))?;
        let transport = grounding.transport.clone();
        let attempts = grounding.attempts;
        let payload = self.grounding_payload(transport.style(), &task.instruction, reasoning);

        let mut best: Vec<StructuredAction> = Vec::new();
        for attempt in 1..=attempts {
            let reply = match transport.send(&payload, timeout).await {
                Ok(response) => transport.access(&response),
                Err(e) => {
                    warn!(attempt, error = %e, "Grounding call failed");
                    None
                }
            };
            let Some(action) = reply.as_ref().and_then(Message::text) else {
                self.log.record(step, "grounding", &format!("attempt {} returned no message", attempt));
                continue;
            };

            let full = format!("{}\nAction: {}", reasoning, action.trim());
            if let Some(last) = self.mono.conversation_mut().last_assistant_mut() {
                last.set_text(full.as_str());
            }
            self.log.record(step, "grounding", &full);

            match thought::parse_response(&full, ctx.screen) {
                Ok(parsed) => return Ok(with_tags(thought::to_actions(&parsed), ctx)),
                Err(partial) => {
                    warn!(attempt, error = %partial, "Grounding reply did not parse");
                    self.log.record(step, "grounding", &format!("attempt {} failed: {}", attempt, action));
                    if partial.parsed.len() >= best.len() {
                        best = partial.parsed;
                    }
                }
            }
        }

        if !best.is_empty() {
            info!(actions = best.len(), "Using partial grounding result");
            return Ok(with_tags(thought::to_actions(&best), ctx));
        }

        // the actor's line uses the structured grammar as well
        let own = thought::parse_actions(planned, ctx.screen).unwrap_or_else(|partial| partial.parsed);
        if own.is_empty() {
            warn!("No usable grounding, waiting instead");
            Ok(vec![Action::code(primitive::Primitive::Wait.name())])
        } else {
            info!(actions = own.len(), "Using the actor's own action line");
            Ok(with_tags(thought::to_actions(&own), ctx))
        }
    }
}

fn with_tags(mut actions: Vec<Action>, ctx: &DecodeContext) -> Vec<Action> {
    if let Some(tags) = ctx.tags.as_deref() {
        decode::apply_tags(&mut actions, tags, &ctx.primitives);
    }
    actions
}

#[async_trait]
impl Community for AllInOne {
    async fn run(
        &mut self,
        step: StepDescriptor,
        task: &TaskSpec,
        obs: Observation,
        ctx: &DecodeContext,
        timeout: Duration,
    ) -> Result<StepOutcome> {
        let init = step.is_first().then_some(task);
        let content = self.mono.step_content(&obs, init);
        let reply = self.mono.call(content, timeout).await?;
        let text = reply.text().unwrap_or_default().to_string();
        self.mono.record(step, &text);

        let mode = self.mode;
        let actions = match mode {
            ActorMode::Fenced | ActorMode::StructuredThought => self.mono.decode(&text, ctx),
            ActorMode::Reasoning { split_statements } => {
                self.decode_reasoning(&text, split_statements, ctx)
            }
            ActorMode::ActionLine => self.decode_action_line(&text, ctx),
            ActorMode::PlannerWithGrounding => {
                self.ground(step, task, &text, ctx, timeout).await?
            }
        };

        Ok(StepOutcome::from_actions(actions, &ctx.primitives))
    }

    fn agents(&self) -> Vec<&Agent> {
        vec![&self.mono]
    }
}

/// Planner followed by grounder
pub struct SeeAct {
    planner: Agent,
    grounder: Agent,
}

impl SeeAct {
    pub fn new(planner: Agent, grounder: Agent) -> Self {
        Self { planner, grounder }
    }
}

#[async_trait]
impl Community for SeeAct {
    async fn run(
        &mut self,
        step: StepDescriptor,
        task: &TaskSpec,
        mut obs: Observation,
        ctx: &DecodeContext,
        timeout: Duration,
    ) -> Result<StepOutcome> {
        let first_step = step.is_first();
        let init = first_step.then_some(task);

        let content = self.planner.step_content(&obs, init);
        let reply = self.planner.call(content, timeout).await?;
        let text = reply.text().unwrap_or_default().to_string();
        self.planner.record(step, &text);

        let codes = self.planner.decode(&text, ctx);

        if first_step {
            let mut keys: Vec<ObsKey> = obs.keys().collect();
            if !keys.contains(&ObsKey::Schedule) {
                keys.push(ObsKey::Schedule);
            }
            self.grounder.seed(task, &keys);
        }

        let plan = match codes.first() {
            Some(action) if action.is_commentary => action.code.clone(),
            // the planner answered with primitives; the grounder is skipped
            _ => return Ok(StepOutcome::from_actions(codes, &ctx.primitives)),
        };

        obs.insert(ObsKey::Schedule, ObsPayload::Text(plan));
        let content = self.grounder.step_content(&obs, None);
        let reply = self.grounder.call(content, timeout).await?;
        let text = reply.text().unwrap_or_default().to_string();
        self.grounder.record(step, &text);

        let actions = self.grounder.decode(&text, ctx);
        Ok(StepOutcome::from_actions(actions, &ctx.primitives))
    }

    fn agents(&self) -> Vec<&Agent> {
        vec![&self.planner, &self.grounder]
    }
}

/// Create a community from configuration
pub fn create_community(config: &Config, log: LogContext) -> Result<Box<dyn Community>> {
    let transport = |model: &ModelConfig| -> Result<Arc<dyn ModelTransport>> {
        Ok(Arc::new(HttpTransport::from_config(model, &config.retry)?))
    };
    let window = config.agent.context_window;
    let hide_text = config.agent.hide_text;

    let community: Box<dyn Community> = match config.community.topology {
        Topology::SingleActor { actor } => {
            let (prompt, dialect) = AllInOne::role_for(actor);
            let mono = Agent::new("actor", transport(&config.actor)?, prompt, dialect, window, log.clone())
                .hide_text(hide_text);
            let mut community = AllInOne::new(mono, actor, log);

            if actor == ActorMode::PlannerWithGrounding {
                let model = config.secondary_grounding.as_ref().ok_or_else(|| {
                    ScreenwrightError::config("planner_with_grounding requires [secondary_grounding]")
                })?;
                community = community.with_grounding(transport(model)?, config.community.grounding_attempts);
            }
            Box::new(community)
        }
        Topology::PlannerGrounder { grounder } => {
            let grounder_model = config.grounder.as_ref().ok_or_else(|| {
                ScreenwrightError::config("planner_grounder topology requires [grounder]")
            })?;
            let planner = Agent::new(
                "planner",
                transport(&config.actor)?,
                PromptKind::Planner,
                Dialect::Planner,
                window,
                log.clone(),
            )
            .hide_text(hide_text);
            let grounder = Agent::new(
                "grounder",
                transport(grounder_model)?,
                PromptKind::Grounder(grounder),
                Dialect::from(grounder),
                window,
                log,
            )
            .hide_text(hide_text);
            Box::new(SeeAct::new(planner, grounder))
        }
    };

    Ok(community)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        primitive::Primitive::names().into_iter().map(String::from).collect()
    }

    #[test]
    fn test_empty_actions_become_wait() {
        assert_eq!(
            StepOutcome::from_actions(Vec::new(), &names()),
            StepOutcome::Control(ControlSignal::Wait(5))
        );
    }

    #[test]
    fn test_leading_answer_short_circuits() {
        let outcome = StepOutcome::from_actions(vec![Action::code("ANS 42")], &names());
        assert_eq!(outcome, StepOutcome::Control(ControlSignal::Answer("42".into())));
    }

    #[test]
    fn test_leading_wait_stays_an_action() {
        let actions = vec![Action::code("WAIT 2"), Action::code("pyautogui.click(1, 1)")];
        assert_eq!(
            StepOutcome::from_actions(actions.clone(), &names()),
            StepOutcome::Actions(actions)
        );
    }

    #[test]
    fn test_role_for_modes() {
        assert_eq!(
            AllInOne::role_for(ActorMode::StructuredThought).1,
            Dialect::StructuredThought
        );
        assert_eq!(
            AllInOne::role_for(ActorMode::Reasoning { split_statements: true }).0,
            PromptKind::Actor { reasoning: true }
        );
    }

    #[test]
    fn test_factory_requires_grounder_section() {
        let mut config = Config::default();
        config.community.topology = Topology::PlannerGrounder {
            grounder: crate::core::GrounderDialect::Uground,
        };
        config.grounder = None;
        assert!(matches!(
            create_community(&config, LogContext::new()),
            Err(ScreenwrightError::Config(_))
        ));
    }
}
