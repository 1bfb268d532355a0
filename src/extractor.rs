use log::info;

use crate::llm_manager::{GatewayError, GenerationParams, LLMManager, Prompt};

/// Title returned when the description carries nothing actionable.
pub const INVALID_TASK: &str = "Invalid Task";

/// Deadline returned when the description states none.
pub const NO_DEADLINE: &str = "None";

pub(crate) const TITLE_SYSTEM: &str = r#"You are an assistant that extracts and analyzes information from user input.
The user input describes a task that needs to be done, possibly with its deadline and importance.
Your mission is to only summarize what the task is.

For example, if the user input is:
"Finish my experiment report before next Tuesday"
then you should output:
Experiment Report

If the user input is:
"Read Lilian Weng's blogs"
then you should output:
Lilian Weng's Blogs

Output only the task name."#;

pub(crate) const DEADLINE_SYSTEM: &str = r#"You are an assistant that extracts and analyzes information from user input.
The user input describes a task that needs to be done. Your job is to extract information about that task's deadline.

For example, if the user input is:
"Finish my experiment report before next Tuesday"
then you should output:
Next Tuesday

If the user input is:
"Read blogs"
then, because no time limit was mentioned, you should output:
None"#;

/// Marks the start of the raw description inside a user instruction.
pub(crate) const DESCRIPTION_OPEN: &str = "<description>";
pub(crate) const DESCRIPTION_CLOSE: &str = "</description>";

fn wrap_description(description: &str) -> String {
    format!("{}{}{}", DESCRIPTION_OPEN, description, DESCRIPTION_CLOSE)
}

fn title_instruction(description: &str) -> String {
    format!(
        "I have a task description: {}\nPlease give a brief name for my task. \
         Your response can not be longer than the description. \
         If the necessary information is missing, simply return\n{}",
        wrap_description(description),
        INVALID_TASK
    )
}

fn deadline_instruction(description: &str) -> String {
    format!(
        "I have a task description: {}\nPlease extract information about this task's deadline. \
         If you can't find deadline information, just output \"{}\". \
         If you found deadline information, output only the deadline information.",
        wrap_description(description),
        NO_DEADLINE
    )
}

/// Strip whitespace and one pair of wrapping quotes from a one-line answer.
fn clean_answer(raw: &str) -> String {
    let trimmed = raw.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”')] {
        if let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Turns free-text descriptions into a short name and an optional deadline.
pub struct FieldExtractor<'a> {
    llm: &'a LLMManager,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(llm: &'a LLMManager) -> Self {
        Self { llm }
    }

    fn params(&self) -> GenerationParams {
        let config = self.llm.config();
        GenerationParams {
            model: config.models.extraction.clone(),
            temperature: config.temperatures.extraction,
        }
    }

    /// Short task name, or exactly [`INVALID_TASK`].
    pub async fn extract_title(&self, description: &str) -> Result<String, GatewayError> {
        let prompt = Prompt::new(TITLE_SYSTEM, title_instruction(description));
        let raw = self.llm.generate(&prompt, &self.params()).await?;
        let title = clean_answer(&raw);

        if title.is_empty() || title.eq_ignore_ascii_case(INVALID_TASK) {
            info!("No actionable task found in {:?}", description);
            return Ok(INVALID_TASK.to_string());
        }
        Ok(title)
    }

    /// Deadline phrase, or `None` when the model answers the sentinel.
    pub async fn extract_deadline(&self, description: &str) -> Result<Option<String>, GatewayError> {
        let prompt = Prompt::new(DEADLINE_SYSTEM, deadline_instruction(description));
        let raw = self.llm.generate(&prompt, &self.params()).await?;
        let deadline = clean_answer(&raw);

        if deadline.is_empty() || deadline.eq_ignore_ascii_case(NO_DEADLINE) {
            Ok(None)
        } else {
            Ok(Some(deadline))
        }
    }
}

/// Pull the raw description back out of an extractor instruction.
pub(crate) fn description_from_instruction(instruction: &str) -> Option<&str> {
    let start = instruction.find(DESCRIPTION_OPEN)? + DESCRIPTION_OPEN.len();
    let end = instruction[start..].find(DESCRIPTION_CLOSE)? + start;
    Some(&instruction[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_manager::tests::scripted_manager;

    #[test]
    fn test_clean_answer() {
        assert_eq!(clean_answer("  \"Experiment Report\"\n"), "Experiment Report");
        assert_eq!(clean_answer("'Next Tuesday'"), "Next Tuesday");
        assert_eq!(clean_answer("Lilian Weng's Blogs"), "Lilian Weng's Blogs");
        assert_eq!(clean_answer("\""), "\"");
    }

    #[tokio::test]
    async fn test_end_to_end_example() {
        let (llm, seen) = scripted_manager(vec![Ok("\"Experiment Report\""), Ok("Next Tuesday")]);
        let extractor = FieldExtractor::new(&llm);
        let input = "Finish my experiment report before next Tuesday";

        assert_eq!(extractor.extract_title(input).await.unwrap(), "Experiment Report");
        assert_eq!(
            extractor.extract_deadline(input).await.unwrap().as_deref(),
            Some("Next Tuesday")
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0.system, TITLE_SYSTEM);
        assert_eq!(seen[1].0.system, DEADLINE_SYSTEM);
        assert_eq!(seen[0].1.model, "gpt-4o-mini");
        assert_eq!(seen[0].1.temperature, 0.0);
        assert_eq!(description_from_instruction(&seen[0].0.user), Some(input));
    }

    #[tokio::test]
    async fn test_sentinels_are_normalized() {
        let (llm, _) = scripted_manager(vec![Ok("invalid task"), Ok("\"None\""), Ok("  ")]);
        let extractor = FieldExtractor::new(&llm);

        assert_eq!(extractor.extract_title("hmm").await.unwrap(), INVALID_TASK);
        assert_eq!(extractor.extract_deadline("Read blogs").await.unwrap(), None);
        assert_eq!(extractor.extract_title("...").await.unwrap(), INVALID_TASK);
    }

    #[tokio::test]
    async fn test_gateway_error_is_not_a_title() {
        let (llm, _) = scripted_manager(vec![Err(GatewayError::Auth("bad key".to_string()))]);
        let extractor = FieldExtractor::new(&llm);

        let err = extractor.extract_title("Read blogs").await.unwrap_err();
        assert!(matches!(err, GatewayError::Auth(_)));
    }
}
