use crate::llm_manager::{GatewayError, GenerationParams, LLMManager, Prompt};

/// Heading shown when the greeting call fails.
pub const FALLBACK_GREETING: &str = "Welcome back, taskmaster!";

pub(crate) const GREETING_SYSTEM: &str = r#"You are the manager of a to-do list application and your users need to finish tasks in their to-do lists.
Your job is to greet the user to refresh and recharge them.
Greet your users in a funny and quirky fashion like the examples below:
- Greetings, taskmaster! Shall we make those tasks disappear?
- Working-Maniac! Unleash your task-ninja powers! Let's roll!
- Ah, the chosen one returns! Ready to fulfill your destiny (and your to-do list)?
- DUN-DUN-DUN! The Task Titan has entered the chat. Let's crush it!
- Player 1, press Start! The quest for productivity begins now!
- Beware, To-Do Wizard! The task creatures await your magic!

Make sure your response is brief and no more than 10 words."#;

const GREETING_REQUEST: &str = "Greet me in a funny and quirky fashion please.";

/// One-line page heading. Cosmetic only.
pub async fn greet(llm: &LLMManager) -> Result<String, GatewayError> {
    let config = llm.config();
    let params = GenerationParams {
        model: config.models.greeting.clone(),
        temperature: config.temperatures.greeting,
    };
    let text = llm
        .generate(&Prompt::new(GREETING_SYSTEM, GREETING_REQUEST), &params)
        .await?;
    Ok(text.trim().trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_manager::tests::scripted_manager;

    #[tokio::test]
    async fn test_greeting_uses_creative_temperature() {
        let (llm, seen) = scripted_manager(vec![Ok("\"Player 1, press Start!\"\n")]);
        assert_eq!(greet(&llm).await.unwrap(), "Player 1, press Start!");

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].1.temperature, 1.2);
        assert_eq!(seen[0].1.model, "gpt-4o");
    }
}
