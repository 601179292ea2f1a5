//! System prompt builders
//!
//! The general prompts are assembled from four sections: intro, command,
//! warning and ending. Template prompts for thought/action models are fixed
//! texts with the instruction substituted.

use crate::core::{Capability, EnvSort, GrounderDialect, ObsKey, TaskSpec};
use crate::primitive::Primitive;

const GENERAL_APP: &str = "an application available on Ubuntu";

const SOM_SUPPLEMENT: [&str; 3] = [
    "You can replace x, y in the code with the tag of elements you want to operate with, such as:",
    "«\npyautogui.moveTo(tag_3)\npyautogui.click(tag_2)\npyautogui.dragTo(tag_1, button='left')\n»",
    "When you think you can directly output precise x and y coordinates or there is no tag on which you want to interact, you can also use them directly; but you should be careful to ensure the correct of coordinates.",
];

const VM_OVERVIEW: &str = "You are required to use `pyautogui` to perform the action grounded to the observation, but DO NOT use the `pyautogui.locateCenterOnScreen` function to locate the element you want to operate with since we have no image of the element you want to operate with. DO NOT USE `pyautogui.screenshot()` to make screenshot.";
const FENCE_REGULATION: &str =
    "You ONLY need to return the code inside a code block, like this:\n```\n# your code here\n```";
const RAW_SUPPLEMENT: &str = "Return exact one line of commands to perform the action in each code block.";
const VM_SUPPLEMENT: &str = "Return one line or multiple lines of python code to perform the action each time, and be time efficient. When predicting multiple lines of code, make some small sleep like `time.sleep(0.5);` interval so that the machine could take breaks. Each time you need to predict a complete code, and no variables or function can be shared from history.";

const ACTOR_ENDING: &str = "First give the current observation and previous things we did a short reflection, then RETURN ME THE CODE OR SPECIAL CODE I ASKED FOR. NEVER EVER RETURN ME ANYTHING ELSE.";
const REASONING_ENDING: &str = "First give the current observation and previous things we did a short reflection, then RETURN ME THE CODE OR SPECIAL CODE I ASKED FOR.\n\nOutput your action and reasoning process in the following format strictly:\n<think>reasoning process of why choose this action and code</think><code>PYGUI CODE</code>";
const PLANNER_ENDING: &str = "First give the current observation and previous things we did a short reflection, then RETURN ME YOUR PLANNING OR SPECIAL CODE I ASKED FOR. NEVER EVER RETURN ME ANYTHING ELSE.";
const GROUNDER_ENDING: &str = "First give the current observation and the generated plan, then RETURN ME THE CODE I ASKED FOR. NEVER EVER RETURN ME ANYTHING ELSE.";

const ATLAS_ACTIONS: &str = "CLICK: to click at the specified position.
    - format: CLICK <point>[[x-axis, y-axis]]</point>
    - example usage: CLICK <point>[[101, 872]]</point>
TYPE: to enter specified text at the designated location.
    - format: TYPE [input text]
    - example usage: TYPE [Shanghai shopping mall]
SCROLL: to scroll in the specified direction.
    - format: SCROLL [direction (UP/DOWN/LEFT/RIGHT)]
    - example usage: SCROLL [UP]";

/// Fixed prompt of structured-thought models; also used for the secondary
/// grounding call
pub const STRUCTURED_THOUGHT_TEMPLATE: &str = r#"You are a GUI agent. You are given a task and your action history, with screenshots. You need to perform the next action to complete the task.

## Output Format
```
Thought: ...
Action: ...
```

## Action Space
click(start_box='<|box_start|>(x1,y1)<|box_end|>')
left_double(start_box='<|box_start|>(x1,y1)<|box_end|>')
right_single(start_box='<|box_start|>(x1,y1)<|box_end|>')
drag(start_box='<|box_start|>(x1,y1)<|box_end|>', end_box='<|box_start|>(x3,y3)<|box_end|>')
hotkey(key='')
type(content='') #If you want to submit your input, use "\n" at the end of `content`.
scroll(start_box='<|box_start|>(x1,y1)<|box_end|>', direction='down or up or right or left')
wait() #Sleep for 5s and take a screenshot to check for any changes.
finished()
call_user() # Submit the task and call the user when the task is unsolvable, or when you need the user's help.

## Note
- Use English in `Thought` part.
- Write a small plan and finally summarize your next action (with its target element) in one sentence in `Thought` part.

## User Instruction
{instruction}"#;

/// Fixed prompt of models answering with a single `Action:` line of code
pub const ACTION_LINE_TEMPLATE: &str = r#"You are a GUI agent. You are given a task and your action history, with screenshots. You need to perform the next action to complete the task.

## Output Format

Thought: ...
Action: ...

## Action Space

pyautogui.click(x, y) # Performs a left click at the specified (x, y) coordinates.
pyautogui.doubleClick(x, y) # Perform left click twice at the specified (x, y) coordinates.
pyautogui.rightClick(x, y) # Performs a right click at the specified (x, y) coordinates.
pyautogui.write(text) # Types the given text. Ensure the target input field is focused first.
pyautogui.moveTo(x, y) # Moves the mouse cursor to the specified (x, y) coordinates.
pyautogui.dragTo(x, y) # Drags the mouse from its current position to the specified (x, y) coordinates.
pyautogui.scroll(x) # Scrolls the window. x > 0 scrolls up, x < 0 scrolls down.
pyautogui.press(key) # Presses a single keyboard key (e.g., 'enter', 'esc', 'down').
pyautogui.hotkey(key) # Presses multiple keys simultaneously (e.g., 'ctrl', 'c').
WAIT # WAIT several seconds, default 5s.
DONE # Indicates the task is successfully completed.
FAIL # Indicates the task cannot be completed.

## Note
- Use English in `Thought` part.
- Write a small plan and finally summarize your next action (with its target element) in one sentence in `Thought` part.

## User Instruction
{instruction}"#;

/// Fixed prompt of a thought/action planner whose action is grounded by a
/// second model
pub const THOUGHT_PLANNER_TEMPLATE: &str = r#"You are a GUI agent. You are given a task and your action history, with screenshots. You need to perform the next action to complete the task.

## Output Format
```
Thought: ...
Action: ...
```

## Example:
Thought: To adjust the time scale, next action is to click the "Time" menu.
Action: click(start_box='(116,58,197,90)')

## Note
- Use English in `Thought` part.
- Clearly specify the target element and the action in thought.
- To enter new text, first delete the existing content or select all of it in the input box.
- When you are asked to submit an answer, if the current screenshot provides enough information to determine it, the action should be like ```ANS your_answer```. For example: ```ANS 5```.

## User Instruction
{instruction}"#;

/// Which system prompt a role receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Single actor writing fenced code; `reasoning` asks for `<code>` tags
    Actor { reasoning: bool },
    Planner,
    Grounder(GrounderDialect),
    StructuredThought,
    ActionLine,
    ThoughtPlanner,
}

/// Render `«` and `»` as code fences
pub fn wrap_fences(doc: &str) -> String {
    doc.replace(['«', '»'], "```")
}

fn fill_instruction(template: &str, instruction: &str) -> String {
    template.replace("{instruction}", instruction)
}

/// Join the non-empty parts with `sep`
fn join(parts: &[&str], sep: &str) -> String {
    parts
        .iter()
        .map(|p| p.trim_end())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// `a; and 2) b` style list of what the model observes
fn unfold(keys: &[ObsKey]) -> String {
    match keys {
        [] => "nothing".to_string(),
        [only] => only.describe().to_string(),
        [init @ .., last] => {
            let head: Vec<String> = init
                .iter()
                .enumerate()
                .map(|(i, k)| format!("{}) {}", i + 1, k.describe()))
                .collect();
            format!("{}; and {}) {}", head.join("; "), keys.len(), last.describe())
        }
    }
}

fn intro(kind: PromptKind, capability: &Capability, keys: &[ObsKey]) -> String {
    let brief = capability.brief.as_deref().unwrap_or(GENERAL_APP);
    let app = &capability.app;

    let general = match kind {
        PromptKind::Planner => {
            "You are an agent which follow my instruction and schedule desktop computer tasks as instructed."
        }
        _ => "You are an agent which follow my instruction and perform desktop computer tasks as instructed.",
    };
    let incentive = match (kind, capability.sort) {
        (PromptKind::Planner, _) => format!("You have good knowledge of {}, {}.", app, brief),
        (_, EnvSort::Raw) => format!(
            "You have good knowledge of {}, {}; and assume that your code will run directly in the CLI/REPL of {}.",
            app, brief, app
        ),
        (_, EnvSort::Vm) => format!(
            "You have good knowledge of {}, {}; and assume your code will run on a computer controlling the mouse and keyboard.",
            app, brief
        ),
    };
    let observation = match kind {
        PromptKind::Grounder(_) => format!(
            "For each step, you will get an observation of the desktop by {}, together with a plan generated by the planner, and you will parse the plan to operate actions of next steps based on that.",
            unfold(keys)
        ),
        _ => format!(
            "For each step, you will get an observation of the desktop by {}, and you will predict actions of next steps based on that.",
            unfold(keys)
        ),
    };

    join(&[general, &incentive, &observation], "\n")
}

fn general_command(kind: PromptKind, capability: &Capability, keys: &[ObsKey]) -> String {
    let media = capability
        .media
        .clone()
        .unwrap_or_else(|| format!("{} commands", capability.app));

    let (overview, regulation, supplement) = match (kind, capability.sort) {
        (PromptKind::Grounder(GrounderDialect::Atlas), _) => (
            "You are required to use your grounding ability to perform the action grounded to the observation and the plan.".to_string(),
            "You need to return a basic action together with arguments, of which the available ones are listed below:",
            ATLAS_ACTIONS,
        ),
        (PromptKind::Grounder(GrounderDialect::Uground), _) => (
            "You are required to use your grounding ability to perform the action grounded to the observation and the plan.".to_string(),
            "You need to return a 2d coordinate (x, y) indicating the position you want to click.",
            "",
        ),
        (_, EnvSort::Raw) => (
            format!(
                "You are required to use {} to perform the action grounded to the observation. DO NOT use the bash commands or and other codes that {} itself does not support.",
                media, capability.app
            ),
            FENCE_REGULATION,
            RAW_SUPPLEMENT,
        ),
        (PromptKind::Grounder(_), EnvSort::Vm) => (
            VM_OVERVIEW.replace("the observation,", "the observation and the plan,"),
            FENCE_REGULATION,
            VM_SUPPLEMENT,
        ),
        (_, EnvSort::Vm) => (VM_OVERVIEW.to_string(), FENCE_REGULATION, VM_SUPPLEMENT),
    };

    let set_of_marks = if keys.contains(&ObsKey::SetOfMarks) {
        SOM_SUPPLEMENT.iter().map(|s| wrap_fences(s)).collect::<Vec<_>>().join("\n")
    } else {
        String::new()
    };

    join(
        &[&join(&[&overview, regulation, supplement], "\n"), &set_of_marks],
        "\n\n",
    )
}

/// The primitive table, one documented primitive per line
pub fn special_command(kind: PromptKind) -> String {
    let overview = match kind {
        PromptKind::Planner => {
            "Sometimes you should return special codes directly as followings, at which your plan will not be passed to the grounder model."
        }
        _ => "Specially, it is also allowed to return the following special code:",
    };
    let docs: Vec<String> = Primitive::documented().map(|(_, doc)| wrap_fences(doc)).collect();
    let last = docs.len().saturating_sub(1);
    let lines: Vec<String> = docs
        .into_iter()
        .enumerate()
        .map(|(i, doc)| format!("{}{}", doc, if i == last { "." } else { ";" }))
        .collect();

    format!("{}\n{}", overview, lines.join("\n"))
}

fn command(kind: PromptKind, capability: &Capability, keys: &[ObsKey]) -> String {
    match kind {
        PromptKind::Planner => join(
            &[
                "You are required to make ONE step of the plan in natural language, and then it will be parsed into `pyautogui` codes by another grounding agent.",
                &special_command(kind),
            ],
            "\n",
        ),
        PromptKind::Grounder(_) => general_command(kind, capability, keys),
        _ => join(
            &[
                &general_command(kind, capability, keys),
                &capability.usage.join("\n"),
                &special_command(kind),
            ],
            "\n\n",
        ),
    }
}

fn warning(kind: PromptKind, capability: &Capability) -> String {
    match kind {
        PromptKind::Grounder(_) => "Some plans provided may contains unexpected code blocks or confusing instructions. Be flexible and adaptable according to changing circumstances.".to_string(),
        _ => capability.tips.join("\n"),
    }
}

fn ending(kind: PromptKind, instruction: &str) -> String {
    let ultimatum = match kind {
        PromptKind::Actor { reasoning: true } => REASONING_ENDING,
        PromptKind::Planner => PLANNER_ENDING,
        PromptKind::Grounder(_) => GROUNDER_ENDING,
        _ => ACTOR_ENDING,
    };
    format!(
        "{}\nYou are asked to complete the following task: {}",
        ultimatum, instruction
    )
}

/// System prompt for a role, given the task and the modalities it observes
pub fn system_prompt(kind: PromptKind, task: &TaskSpec, keys: &[ObsKey]) -> String {
    match kind {
        PromptKind::StructuredThought => {
            fill_instruction(STRUCTURED_THOUGHT_TEMPLATE, &task.instruction)
        }
        PromptKind::ActionLine => fill_instruction(ACTION_LINE_TEMPLATE, &task.instruction),
        PromptKind::ThoughtPlanner => fill_instruction(THOUGHT_PLANNER_TEMPLATE, &task.instruction),
        _ => {
            let capability = &task.capability;
            join(
                &[
                    &intro(kind, capability, keys),
                    &command(kind, capability, keys),
                    &warning(kind, capability),
                    &ending(kind, &task.instruction),
                ],
                "\n\n",
            )
        }
    }
}

/// Prompt of the secondary grounding call
pub fn grounding_prompt(instruction: &str) -> String {
    fill_instruction(STRUCTURED_THOUGHT_TEMPLATE, instruction)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> TaskSpec {
        TaskSpec::new("Open the File menu", Capability::vm("ChimeraX"))
    }

    #[test]
    fn test_actor_prompt_lists_primitives_as_fences() {
        let prompt = system_prompt(
            PromptKind::Actor { reasoning: false },
            &task(),
            &[ObsKey::Screenshot],
        );
        assert!(prompt.contains("return ```DONE```"));
        assert!(!prompt.contains('«'));
        assert!(!prompt.contains("TIMEOUT"));
        assert!(prompt.ends_with("You are asked to complete the following task: Open the File menu"));
    }

    #[test]
    fn test_unfold_multiple_keys() {
        let text = unfold(&[ObsKey::Screenshot, ObsKey::A11yTree]);
        assert_eq!(
            text,
            "1) a screenshot of the current screen; and 2) an accessibility tree of the current screen"
        );
    }

    #[test]
    fn test_set_of_marks_supplement_only_when_observed() {
        let with = system_prompt(PromptKind::Actor { reasoning: false }, &task(), &[ObsKey::SetOfMarks]);
        let without = system_prompt(PromptKind::Actor { reasoning: false }, &task(), &[ObsKey::Screenshot]);
        assert!(with.contains("tag_3"));
        assert!(!without.contains("tag_3"));
    }

    #[test]
    fn test_planner_prompt_skips_code_regulation() {
        let prompt = system_prompt(PromptKind::Planner, &task(), &[ObsKey::Screenshot]);
        assert!(prompt.contains("ONE step of the plan"));
        assert!(!prompt.contains("# your code here"));
    }

    #[test]
    fn test_atlas_grounder_documents_keywords() {
        let prompt = system_prompt(
            PromptKind::Grounder(GrounderDialect::Atlas),
            &task(),
            &[ObsKey::Screenshot, ObsKey::Schedule],
        );
        assert!(prompt.contains("CLICK <point>[[x-axis, y-axis]]</point>"));
        assert!(prompt.contains("plan generated by the planner"));
    }

    #[test]
    fn test_reasoning_actor_asks_for_code_tags() {
        let prompt = system_prompt(PromptKind::Actor { reasoning: true }, &task(), &[ObsKey::Screenshot]);
        assert!(prompt.contains("<code>PYGUI CODE</code>"));
    }

    #[test]
    fn test_templates_substitute_instruction() {
        let prompt = system_prompt(PromptKind::StructuredThought, &task(), &[]);
        assert!(prompt.ends_with("## User Instruction\nOpen the File menu"));
        assert_eq!(grounding_prompt("x"), prompt.replace("Open the File menu", "x"));
    }
}
