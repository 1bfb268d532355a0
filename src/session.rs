use uuid::Uuid;

use crate::recommender::Recommendation;
use crate::task_store::TaskStore;

/// Everything one interactive run knows. Dropped when the run ends.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub store: TaskStore,
    /// Last successfully decoded recommendation
    pub last_recommendation: Option<Recommendation>,
    /// Cached page heading, fetched once
    pub greeting: Option<String>,
    /// Whether the sorting hint banner is still shown
    pub show_info: bool,
}

impl Session {
    pub fn new(show_info: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            store: TaskStore::new(),
            last_recommendation: None,
            greeting: None,
            show_info,
        }
    }

    pub fn dismiss_info(&mut self) {
        self.show_info = false;
    }

    /// Recommendations are only offered once there is something to rank.
    pub fn can_recommend(&self) -> bool {
        !self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_new_session_state() {
        let mut session = Session::new(true);
        assert!(session.show_info);
        assert!(!session.can_recommend());
        assert!(session.greeting.is_none());

        session.dismiss_info();
        assert!(!session.show_info);

        let day = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        session.store.insert("Read Blogs".to_string(), None, day).unwrap();
        assert!(session.can_recommend());
    }

    #[test]
    fn test_sessions_get_distinct_ids() {
        assert_ne!(Session::new(false).id, Session::new(false).id);
    }
}
