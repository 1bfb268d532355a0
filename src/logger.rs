use log::{debug, warn};
use simplelog::{ColorChoice, Config, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::event_bus::{Event, EventBus};

/// Map `-v` occurrences to a log level.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

pub fn init(verbosity: u8) {
    let config: Config = ConfigBuilder::new()
        .add_filter_allow_str("todo_ranker")
        .build();
    // Logs go to stderr so the task table on stdout stays clean
    let _ = TermLogger::init(level_for(verbosity), config, TerminalMode::Stderr, ColorChoice::Auto);
}

/// One log line per bus event.
pub fn describe(event: &Event) -> String {
    match event {
        Event::TaskAdded { task_id, task } => format!("task {} added: {}", task_id, task),
        Event::TaskRejected { input, reason } => format!("task rejected ({}): {}", reason, input),
        Event::RecommendationApplied { updated, unmatched } => {
            format!("recommendation applied: {} updated, {} unmatched", updated, unmatched)
        }
        Event::RecommendationFailed { error } => format!("recommendation failed: {}", error),
        Event::APICallStarted { provider, model } => format!("{} call started ({})", provider, model),
        Event::APICallCompleted { provider, tokens, cost } => {
            format!("{} call completed: {} tokens, ${:.4}", provider, tokens, cost)
        }
        Event::APIError { provider, error } => format!("{} call failed: {}", provider, error),
        Event::ConfigLoaded { path: Some(path) } => format!("config loaded from {}", path),
        Event::ConfigLoaded { path: None } => "using default config".to_string(),
        Event::SessionStarted { session_id } => format!("session {} started", session_id),
    }
}

/// Log every event on the bus at debug level until the bus is dropped.
pub fn spawn_event_logger(bus: &EventBus) -> JoinHandle<()> {
    let mut receiver = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => debug!("event: {}", describe(&event)),
                Err(RecvError::Lagged(skipped)) => warn!("Event logger skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_events() {
        assert_eq!(
            describe(&Event::TaskAdded { task_id: 3, task: "Read Blogs".to_string() }),
            "task 3 added: Read Blogs"
        );
        assert_eq!(describe(&Event::ConfigLoaded { path: None }), "using default config");
        assert_eq!(
            describe(&Event::RecommendationFailed { error: "quota".to_string() }),
            "recommendation failed: quota"
        );
    }

    #[tokio::test]
    async fn test_event_logger_stops_with_bus() {
        let bus = EventBus::new(8);
        let handle = spawn_event_logger(&bus);
        bus.emit(Event::SessionStarted { session_id: "abc".to_string() }).await.unwrap();
        drop(bus);
        handle.await.unwrap();
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(1), LevelFilter::Info);
        assert_eq!(level_for(3), LevelFilter::Debug);
    }
}
