use std::sync::Arc;

use chrono::NaiveDate;
use log::{info, warn};

use crate::event_bus::{Event, EventBus, EventEmitter};
use crate::extractor::{FieldExtractor, INVALID_TASK};
use crate::greeter::{self, FALLBACK_GREETING};
use crate::llm_manager::{GatewayError, LLMManager};
use crate::recommender::{PriorityRecommender, RecommendError};
use crate::session::Session;
use crate::task_store::{MergeReport, StoreError, TaskId};

/// What happened to one add-task submission.
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added { id: TaskId, title: String, deadline: Option<String> },
    /// Title already in the list; nothing was stored
    Duplicate(String),
    /// Blank input
    Ignored,
}

impl AddOutcome {
    /// Whether the stored title is the no-content sentinel.
    pub fn is_invalid_task(&self) -> bool {
        matches!(self, AddOutcome::Added { title, .. } if title == INVALID_TASK)
    }
}

/// Handles user actions against an explicitly passed session.
pub struct TodoController<'a> {
    llm: &'a LLMManager,
    event_bus: Option<Arc<EventBus>>,
}

impl<'a> TodoController<'a> {
    pub fn new(llm: &'a LLMManager) -> Self {
        Self { llm, event_bus: None }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.set_event_bus(bus);
        self
    }

    /// Fetch the heading on first use; later calls reuse it.
    pub async fn greeting(&self, session: &mut Session) -> String {
        if let Some(greeting) = &session.greeting {
            return greeting.clone();
        }
        let greeting = match greeter::greet(self.llm).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => FALLBACK_GREETING.to_string(),
            Err(e) => {
                warn!("Greeting failed: {}", e);
                FALLBACK_GREETING.to_string()
            }
        };
        session.greeting = Some(greeting.clone());
        greeting
    }

    /// Extract a title and deadline from `input` and append the task.
    ///
    /// The title is extracted first so a duplicate costs a single call.
    /// On any error the store is left unchanged.
    pub async fn add_task(
        &self,
        session: &mut Session,
        input: &str,
        today: NaiveDate,
    ) -> Result<AddOutcome, GatewayError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(AddOutcome::Ignored);
        }

        let extractor = FieldExtractor::new(self.llm);
        let title = extractor.extract_title(input).await?;
        if session.store.contains_title(&title) {
            return Ok(self.reject(input, title).await);
        }

        let deadline = extractor.extract_deadline(input).await?;
        match session.store.insert(title.clone(), deadline.clone(), today) {
            Ok(id) => {
                let _ = self
                    .emit_event(Event::TaskAdded {
                        task_id: id,
                        task: title.clone(),
                    })
                    .await;
                Ok(AddOutcome::Added { id, title, deadline })
            }
            Err(StoreError::DuplicateTask(title)) => Ok(self.reject(input, title).await),
        }
    }

    async fn reject(&self, input: &str, title: String) -> AddOutcome {
        info!("Skipping duplicate task {:?}", title);
        let _ = self
            .emit_event(Event::TaskRejected {
                input: input.to_string(),
                reason: format!("duplicate of {}", title),
            })
            .await;
        AddOutcome::Duplicate(title)
    }

    /// Rank every task in one call and merge the result.
    ///
    /// Returns `Ok(None)` when the list is empty. On error, priorities keep
    /// their previous values.
    pub async fn recommend(&self, session: &mut Session) -> Result<Option<MergeReport>, RecommendError> {
        if !session.can_recommend() {
            return Ok(None);
        }

        let recommender = PriorityRecommender::new(self.llm);
        let recommendation = match recommender.recommend(session.store.records()).await {
            Ok(rec) => rec,
            Err(e) => {
                let _ = self
                    .emit_event(Event::RecommendationFailed { error: e.to_string() })
                    .await;
                return Err(e);
            }
        };

        let report = session.store.apply(&recommendation.items);
        session.last_recommendation = Some(recommendation);
        let _ = self
            .emit_event(Event::RecommendationApplied {
                updated: report.updated.len(),
                unmatched: report.unmatched.len(),
            })
            .await;
        Ok(Some(report))
    }
}

#[async_trait::async_trait]
impl<'a> EventEmitter for TodoController<'a> {
    fn set_event_bus(&mut self, bus: Arc<EventBus>) {
        self.event_bus = Some(bus);
    }

    async fn emit_event(&self, event: Event) -> anyhow::Result<()> {
        match &self.event_bus {
            Some(bus) => bus.emit(event).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_manager::tests::scripted_manager;
    use crate::response_parser::ParseError;
    use crate::task_store::PriorityLevel;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()
    }

    #[tokio::test]
    async fn test_add_then_duplicate() {
        let bus = Arc::new(EventBus::new(16));
        let (llm, seen) = scripted_manager(vec![
            Ok("Experiment Report"),
            Ok("Next Tuesday"),
            Ok("experiment report"),
        ]);
        let controller = TodoController::new(&llm).with_event_bus(bus.clone());
        let mut session = Session::new(true);

        let first = controller
            .add_task(&mut session, "Finish my experiment report before next Tuesday", today())
            .await
            .unwrap();
        assert_eq!(
            first,
            AddOutcome::Added {
                id: 1,
                title: "Experiment Report".to_string(),
                deadline: Some("Next Tuesday".to_string()),
            }
        );

        let second = controller
            .add_task(&mut session, "write up the experiment report", today())
            .await
            .unwrap();
        assert_eq!(second, AddOutcome::Duplicate("experiment report".to_string()));
        assert_eq!(session.store.len(), 1);
        // Duplicate detected after the title call, no deadline call issued
        assert_eq!(seen.lock().unwrap().len(), 3);

        let metrics = bus.get_metrics().await;
        assert_eq!(metrics.tasks_added, 1);
        assert_eq!(metrics.tasks_rejected, 1);
    }

    #[tokio::test]
    async fn test_add_without_deadline() {
        let (llm, _) = scripted_manager(vec![Ok("Read Blogs"), Ok("None")]);
        let controller = TodoController::new(&llm);
        let mut session = Session::new(true);

        let outcome = controller.add_task(&mut session, "Read blogs", today()).await.unwrap();
        assert!(matches!(outcome, AddOutcome::Added { deadline: None, .. }));
        assert_eq!(session.store.records()[0].deadline, None);
    }

    #[tokio::test]
    async fn test_invalid_task_is_flagged() {
        let (llm, _) = scripted_manager(vec![Ok("Invalid Task"), Ok("None")]);
        let controller = TodoController::new(&llm);
        let mut session = Session::new(true);

        let outcome = controller.add_task(&mut session, "hmm", today()).await.unwrap();
        assert!(outcome.is_invalid_task());
    }

    #[tokio::test]
    async fn test_blank_input_makes_no_call() {
        let (llm, seen) = scripted_manager(vec![]);
        let controller = TodoController::new(&llm);
        let mut session = Session::new(true);

        assert_eq!(
            controller.add_task(&mut session, "   ", today()).await.unwrap(),
            AddOutcome::Ignored
        );
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_deadline_call_leaves_store_unchanged() {
        let (llm, _) = scripted_manager(vec![
            Ok("Read Blogs"),
            Err(GatewayError::Quota("limit".to_string())),
        ]);
        let controller = TodoController::new(&llm);
        let mut session = Session::new(true);

        let err = controller.add_task(&mut session, "Read blogs", today()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Quota(_)));
        assert!(session.store.is_empty());
    }

    #[tokio::test]
    async fn test_recommend_on_empty_store_is_noop() {
        let (llm, seen) = scripted_manager(vec![]);
        let controller = TodoController::new(&llm);
        let mut session = Session::new(true);

        assert_eq!(controller.recommend(&mut session).await.unwrap(), None);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recommend_merges_and_sorts() {
        let (llm, _) = scripted_manager(vec![
            Ok("Read Blogs"),
            Ok("None"),
            Ok("Experiment Report"),
            Ok("Next Tuesday"),
            Ok(r#"{"priority": [
                {"Id": 2, "Task": "Experiment Report", "Priority": "High", "Explanation": "Deadline is close."},
                {"Id": 1, "Task": "Read Blogs", "Priority": "Low", "Explanation": "Can wait."}
            ]}"#),
        ]);
        let controller = TodoController::new(&llm);
        let mut session = Session::new(true);
        controller.add_task(&mut session, "Read blogs", today()).await.unwrap();
        controller
            .add_task(&mut session, "Finish my experiment report before next Tuesday", today())
            .await
            .unwrap();

        let report = controller.recommend(&mut session).await.unwrap().unwrap();
        assert_eq!(report.updated, vec![2, 1]);

        let rows: Vec<(&str, Option<PriorityLevel>)> = session
            .store
            .records()
            .iter()
            .map(|r| (r.task.as_str(), r.priority))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("Experiment Report", Some(PriorityLevel::High)),
                ("Read Blogs", Some(PriorityLevel::Low)),
            ]
        );
        assert_eq!(session.last_recommendation.as_ref().unwrap().items.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_recommendation_keeps_priorities() {
        let (llm, _) = scripted_manager(vec![
            Ok("Read Blogs"),
            Ok("None"),
            Ok(r#"{"priority": [{"Id": 1, "Task": "Read Blogs", "Priority": "Medium", "Explanation": "ok"}]}"#),
            Ok(r#"{"priority":[{"Id":1,"Task":"Read Blogs""#),
        ]);
        let controller = TodoController::new(&llm);
        let mut session = Session::new(true);
        controller.add_task(&mut session, "Read blogs", today()).await.unwrap();
        controller.recommend(&mut session).await.unwrap();

        let err = controller.recommend(&mut session).await.unwrap_err();
        assert!(matches!(err, RecommendError::Parse(ParseError::InvalidJson(_))));
        assert_eq!(session.store.records()[0].priority, Some(PriorityLevel::Medium));
    }

    #[tokio::test]
    async fn test_greeting_cached_and_falls_back() {
        let (llm, seen) = scripted_manager(vec![Err(GatewayError::Auth("no key".to_string()))]);
        let controller = TodoController::new(&llm);
        let mut session = Session::new(true);

        assert_eq!(controller.greeting(&mut session).await, FALLBACK_GREETING);
        assert_eq!(controller.greeting(&mut session).await, FALLBACK_GREETING);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
