// Shared prompt fragments.
// Each stage that calls the completion port keeps its own prompts.rs alongside it.
// This file contains cross-cutting fragments only.

/// Appended to every prompt: the reply is parsed as JSON and nothing else.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    Return ONLY valid JSON in exactly the format specified. \
    Do NOT use markdown code fences. \
    Do NOT include explanations, comments or any text outside the JSON.";

/// Substitutes `{content}` in a template and appends the JSON-only rule.
pub fn render(template: &str, content: &str) -> String {
    format!(
        "{}\n\n{}",
        template.replace("{content}", content),
        JSON_ONLY_INSTRUCTION
    )
}
