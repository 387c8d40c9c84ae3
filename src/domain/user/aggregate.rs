use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::events::DomainEvent;
use crate::event_sourcing::core::{Aggregate, AggregateKind, AnomalyKind};
use super::value_objects::UserStats;

// ============================================================================
// User Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAggregate {
    pub id: String,
    pub external_id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    pub stats: UserStats,
}

impl Aggregate for UserAggregate {
    const KIND: AggregateKind = AggregateKind::User;

    fn apply_first_event(event: &DomainEvent) -> Option<Self> {
        match event {
            DomainEvent::UserRegistered(e) => Some(Self {
                id: e.id.clone(),
                external_id: e.external_id.clone(),
                email: e.email.clone(),
                name: e.name.clone(),
                picture: e.picture.clone(),
                created_at: e.created_at,
                updated_at: e.created_at,
                is_active: true,
                stats: UserStats::default(),
            }),
            _ => None,
        }
    }

    fn apply_event(&mut self, event: &DomainEvent) -> Option<AnomalyKind> {
        match event {
            DomainEvent::UserRegistered(_) => Some(AnomalyKind::DuplicateCreation),
            DomainEvent::UserProfileUpdated(e) => {
                self.name = e.name.clone();
                self.picture = e.picture.clone();
                self.updated_at = e.updated_at;
                None
            }
            DomainEvent::UserDeactivated(e) => {
                self.is_active = false;
                self.updated_at = e.updated_at;
                None
            }
            _ => None,
        }
    }

    fn aggregate_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{UserDeactivated, UserProfileUpdated, UserRegistered};
    use chrono::Duration;

    fn registered() -> UserRegistered {
        UserRegistered {
            id: "U1".to_string(),
            external_id: "google-123".to_string(),
            email: "test@example.com".to_string(),
            name: "Test User".to_string(),
            picture: "https://example.com/pic.jpg".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_registration() {
        let event = registered();
        let user = UserAggregate::apply_first_event(&DomainEvent::UserRegistered(event.clone())).unwrap();

        assert_eq!(user.external_id, "google-123");
        assert!(user.is_active);
        assert_eq!(user.updated_at, event.created_at);
        assert_eq!(user.stats, UserStats::default());
    }

    #[test]
    fn test_profile_update_then_deactivation() {
        let event = registered();
        let mut user = UserAggregate::apply_first_event(&DomainEvent::UserRegistered(event.clone())).unwrap();
        let later = event.created_at + Duration::minutes(5);

        user.apply_event(&DomainEvent::UserProfileUpdated(UserProfileUpdated {
            user_id: "U1".to_string(),
            name: "Renamed".to_string(),
            picture: "https://example.com/new.jpg".to_string(),
            updated_at: later,
        }));
        assert_eq!(user.name, "Renamed");
        assert_eq!(user.updated_at, later);
        assert_eq!(user.email, "test@example.com"); // unchanged

        user.apply_event(&DomainEvent::UserDeactivated(UserDeactivated {
            user_id: "U1".to_string(),
            updated_at: later + Duration::minutes(1),
        }));
        assert!(!user.is_active);
    }
}
