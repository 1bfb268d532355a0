use log::info;
use thiserror::Error;

use crate::extractor::NO_DEADLINE;
use crate::llm_manager::{GatewayError, GenerationParams, LLMManager, Prompt};
use crate::response_parser::{self, ParseError, PriorityItem};
use crate::task_store::TaskRecord;

pub(crate) const RECOMMEND_SYSTEM: &str = r#"You are a sophisticated assistant adept at analyzing tasks and determining priorities.
When you are asked to help decide priorities, always consider the following:
- Urgency of each task. If provided, take the deadline of each task into consideration.
- Importance. Analyze why the user needs to do a specific task and how important the task is.
- Dependencies between tasks. One task could benefit from another task.
- Resource constraints. That means how much time, money, effort or any other resource the task would require.

Weigh these factors across the whole list rather than for each task in isolation,
so that tasks which benefit each other are ranked consistently.
Provide clear, concise priority recommendations with brief explanations."#;

/// Marks one task line in the request so it can be read back.
pub(crate) const TASK_LINE_PREFIX: &str = "- Id ";

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Decoded answer of one recommendation call.
#[derive(Debug, Clone)]
pub struct Recommendation {
    /// Model text as received
    pub raw: String,
    pub items: Vec<PriorityItem>,
}

fn task_lines(records: &[TaskRecord]) -> String {
    records
        .iter()
        .map(|r| {
            format!(
                "{}{}: {} | Deadline: {}",
                TASK_LINE_PREFIX,
                r.id,
                r.task,
                r.deadline.as_deref().unwrap_or(NO_DEADLINE)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn recommend_instruction(records: &[TaskRecord]) -> String {
    format!(
        "Please analyze and prioritize these tasks:\n{}\n\n\
         A deadline of {} means no deadline information was provided.\n\
         Respond with a single JSON object matching this JSON Schema, with one entry per task. \
         Copy each task's Id and Task exactly as given. \
         Priority must be exactly one of High, Medium or Low. \
         Explanation is one sentence justifying your recommendation.\n{}",
        task_lines(records),
        NO_DEADLINE,
        response_parser::priority_schema()
    )
}

/// Ranks the whole task list in one model call.
pub struct PriorityRecommender<'a> {
    llm: &'a LLMManager,
}

impl<'a> PriorityRecommender<'a> {
    pub fn new(llm: &'a LLMManager) -> Self {
        Self { llm }
    }

    pub async fn recommend(&self, records: &[TaskRecord]) -> Result<Recommendation, RecommendError> {
        let config = self.llm.config();
        let params = GenerationParams {
            model: config.models.recommendation.clone(),
            temperature: config.temperatures.recommendation,
        };
        let prompt = Prompt::new(RECOMMEND_SYSTEM, recommend_instruction(records));

        let raw = self.llm.generate(&prompt, &params).await?;
        let response =
            response_parser::decode_priority_response(&raw, config.recommendation.lenient_fallback)?;

        info!(
            "Recommendation covers {} of {} tasks",
            response.priority.len(),
            records.len()
        );
        Ok(Recommendation {
            raw,
            items: response.priority,
        })
    }
}
