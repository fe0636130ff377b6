use crate::llm::PromptMessage;
use crate::llm::prompts;

/// Build the commit-message prompt: system rules, the formatting instruction for
/// `language`/`delimiter`, then the diff itself as the last message, untouched.
pub fn commit_message_prompt(diff: &str, language: &str, delimiter: &str) -> Vec<PromptMessage> {
    let instructions = prompts::USER_INSTRUCTIONS
        .replace("{language}", language)
        .replace("{delimiter}", delimiter);

    vec![
        PromptMessage::system(prompts::SYSTEM_INSTRUCTIONS),
        PromptMessage::user(instructions),
        PromptMessage::user(diff),
    ]
}
