use chrono::{DateTime, Utc};

use crate::domain::events::DomainEvent;
use super::aggregate::UserAggregate;
use super::errors::UserError;
use super::events::{UserDeactivated, UserProfileUpdated, UserRegistered};

// ============================================================================
// User Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone)]
pub enum UserCommand {
    Register {
        user_id: String,
        external_id: String,
        email: String,
        name: String,
        picture: String,
    },
    UpdateProfile {
        user_id: String,
        name: String,
        picture: String,
    },
    Deactivate {
        user_id: String,
    },
}

impl UserCommand {
    pub fn user_id(&self) -> &str {
        match self {
            UserCommand::Register { user_id, .. }
            | UserCommand::UpdateProfile { user_id, .. }
            | UserCommand::Deactivate { user_id } => user_id,
        }
    }

    pub fn handle(
        &self,
        current: Option<&UserAggregate>,
        now: DateTime<Utc>,
    ) -> Result<DomainEvent, UserError> {
        match (self, current) {
            (UserCommand::Register { user_id, .. }, Some(_)) => {
                Err(UserError::AlreadyExists(user_id.clone()))
            }
            (
                UserCommand::Register {
                    user_id,
                    external_id,
                    email,
                    name,
                    picture,
                },
                None,
            ) => {
                let email = validate_email(email)?;
                let name = validate_name(name)?;

                Ok(DomainEvent::UserRegistered(UserRegistered {
                    id: user_id.clone(),
                    external_id: external_id.clone(),
                    email,
                    name,
                    picture: picture.clone(),
                    created_at: now,
                }))
            }

            (_, None) => Err(UserError::NotFound(self.user_id().to_string())),

            (
                UserCommand::UpdateProfile {
                    user_id,
                    name,
                    picture,
                },
                Some(_),
            ) => Ok(DomainEvent::UserProfileUpdated(UserProfileUpdated {
                user_id: user_id.clone(),
                name: validate_name(name)?,
                picture: picture.clone(),
                updated_at: now,
            })),

            (UserCommand::Deactivate { user_id }, Some(user)) => {
                if !user.is_active {
                    return Err(UserError::AlreadyDeactivated(user_id.clone()));
                }
                Ok(DomainEvent::UserDeactivated(UserDeactivated {
                    user_id: user_id.clone(),
                    updated_at: now,
                }))
            }
        }
    }
}

fn validate_email(email: &str) -> Result<String, UserError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(UserError::EmptyEmail);
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(email.to_lowercase())
        }
        _ => Err(UserError::InvalidEmail(email.to_string())),
    }
}

fn validate_name(name: &str) -> Result<String, UserError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(UserError::EmptyName);
    }
    Ok(name.to_string())
}
