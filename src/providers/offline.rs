use async_trait::async_trait;

use crate::extractor::{self, DEADLINE_SYSTEM, INVALID_TASK, NO_DEADLINE, TITLE_SYSTEM};
use crate::greeter::GREETING_SYSTEM;
use crate::llm_manager::{Completion, GatewayError, GenerationParams, LLMProvider, Prompt};
use crate::recommender::{RECOMMEND_SYSTEM, TASK_LINE_PREFIX};
use crate::response_parser::{PriorityItem, PriorityResponse};
use crate::task_store::PriorityLevel;

const MAX_TITLE_WORDS: usize = 4;
const DEADLINE_MARKERS: [&str; 5] = [" before ", " by ", " until ", " due ", " on "];

/// Provider used when no remote LLM is available.
///
/// Recognizes the prompts this crate sends and answers them with simple
/// word heuristics.
pub struct OfflineProvider;

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn offline_title(description: &str) -> String {
    if !description.chars().any(char::is_alphabetic) {
        return INVALID_TASK.to_string();
    }
    // ASCII lowering keeps byte offsets valid for `description`
    let lower = description.to_ascii_lowercase();
    // " on " is left in titles ("Work on the thesis")
    let head = DEADLINE_MARKERS[..4]
        .iter()
        .filter_map(|m| lower.find(m))
        .min()
        .and_then(|i| description.get(..i))
        .unwrap_or(description);
    let words: Vec<&str> = head.split_whitespace().take(MAX_TITLE_WORDS).collect();
    title_case(&words.join(" "))
}

fn offline_deadline(description: &str) -> String {
    let lower = format!(" {}", description.to_ascii_lowercase());
    DEADLINE_MARKERS
        .iter()
        .filter_map(|m| lower.find(m).map(|i| i + m.len()))
        .min()
        .map(|start| {
            // `lower` has one leading space and is the same length otherwise
            let phrase = description
                .get(start - 1..)
                .unwrap_or_default()
                .trim_end_matches(['.', '!']);
            title_case(phrase)
        })
        .filter(|phrase| !phrase.is_empty())
        .unwrap_or_else(|| NO_DEADLINE.to_string())
}

fn offline_ranking(instruction: &str) -> String {
    let priority = instruction
        .lines()
        .filter_map(|line| line.strip_prefix(TASK_LINE_PREFIX))
        .filter_map(|line| {
            let (id, rest) = line.split_once(": ")?;
            let (task, deadline) = rest.rsplit_once(" | Deadline: ")?;
            let id = id.trim().parse().ok()?;
            let (priority, explanation) = if deadline.trim() == NO_DEADLINE {
                (PriorityLevel::Medium, "No deadline was given.".to_string())
            } else {
                (PriorityLevel::High, format!("It is due {}.", deadline.trim()))
            };
            Some(PriorityItem {
                id,
                task: task.to_string(),
                priority,
                explanation,
            })
        })
        .collect();
    serde_json::to_string(&PriorityResponse { priority }).unwrap_or_default()
}

#[async_trait]
impl LLMProvider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        _params: &GenerationParams,
    ) -> Result<Completion, GatewayError> {
        let description = extractor::description_from_instruction(&prompt.user).unwrap_or_default();
        let text = match prompt.system.as_str() {
            TITLE_SYSTEM => offline_title(description),
            DEADLINE_SYSTEM => offline_deadline(description),
            RECOMMEND_SYSTEM => offline_ranking(&prompt.user),
            GREETING_SYSTEM => "Offline mode engaged! Tasks fear no network.".to_string(),
            _ => {
                return Err(GatewayError::MalformedResponse(
                    "offline provider does not recognize this prompt".to_string(),
                ));
            }
        };
        Ok(Completion { text, usage: None })
    }
}
