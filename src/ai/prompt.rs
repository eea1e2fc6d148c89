//! Reusable prompts using Handlebars for templating. Handlebars adds
//! additional security controls since it can't do much out of the box
//! without registering your own helpers. This is ideal since text
//! typed by the user ends up verbatim in the prompt and Handlebars
//! forces you to add only what you need.

use std::fmt;
use std::sync::LazyLock;

use handlebars::{Handlebars, RenderError};
use serde_json::json;

use super::stage::{QUESTION_CAP, Stage};

#[derive(Debug)]
pub enum Prompt {
    Counselor,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Shown once at the start of every session before the user says
/// anything.
pub const GREETING: &str = "Hello! I'm a counselor who helps you work through decisions you're stuck on.
What choice is weighing on you right now? Take your time and tell me about it.";

pub const HEADING_SITUATION: &str = "Current situation analysis";
pub const HEADING_CORE: &str = "Core of the concern";
pub const HEADING_ACTION: &str = "Recommended action";

const COUNSELOR_PROMPT: &str = r#"
You are a kind counselor who listens to people struggling to make a decision, empathizes with them, and helps them understand the real feelings hidden behind their indecision.

Current question count: {{question_count}}

Strict question rules:
1. Never ask more than {{question_cap}} questions in total.
2. Once the question count reaches {{question_cap}}, do not ask anything else and give your final conclusion.
3. Every response contains at most one question.

{{#if asking_first~}}
Stage: first question (the count is 0).
- Ask exactly one concrete question that helps you understand the situation in more detail.
- Example: "Which options exactly are you torn between?"
{{/if~}}
{{#if asking_second~}}
Stage: second question (the count is 1).
- Ask exactly one deeper question that uncovers the root cause of the dilemma.
- Example: "Is there one option you already feel more drawn to?"
{{/if~}}
{{#if concluding~}}
Stage: conclusion (the count is {{question_cap}} or more).
- Do not ask any question. Give your final answer using exactly this structure:

**{{heading_situation}}**:
(A summary of the user's situation based on the conversation so far)

**{{heading_core}}**:
(The real cause of the dilemma uncovered through your questions)

**{{heading_action}}**:
(Concrete, practical steps the user can take)
{{/if}}
Empathy and tone:
- Always open your response by expressing empathy.
- Keep a warm and friendly tone.
- Acknowledge the user's feelings fully.

How to give advice:
- Help the user reach the decision on their own.
- Never use a pushy or coercive tone.
- Suggest concrete steps the user can actually take.

The user's latest message: {{message}}
"#;

pub fn templates<'a>() -> Handlebars<'a> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    // Prompts are plain text for the model, not HTML
    registry.register_escape_fn(handlebars::no_escape);
    registry
        .register_template_string(&Prompt::Counselor.to_string(), COUNSELOR_PROMPT)
        .expect("Failed to register template");
    registry
}

static TEMPLATES: LazyLock<Handlebars<'static>> = LazyLock::new(templates);

/// Builds the instruction sent to the model for the next turn. The
/// stage block is picked from `question_count` at the time of the
/// call.
pub fn counselor_prompt(question_count: u8, message: &str) -> Result<String, RenderError> {
    let stage = Stage::from_count(question_count);
    TEMPLATES.render(
        &Prompt::Counselor.to_string(),
        &json!({
            "question_count": question_count,
            "question_cap": QUESTION_CAP,
            "asking_first": stage == Stage::AskingFirst,
            "asking_second": stage == Stage::AskingSecond,
            "concluding": stage == Stage::Concluding,
            "heading_situation": HEADING_SITUATION,
            "heading_core": HEADING_CORE,
            "heading_action": HEADING_ACTION,
            "message": message,
        }),
    )
}
