// ============================================================================
// User Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("User already exists: {0}")]
    AlreadyExists(String),

    #[error("User is already deactivated: {0}")]
    AlreadyDeactivated(String),

    #[error("Email cannot be empty")]
    EmptyEmail,

    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("Name cannot be empty")]
    EmptyName,
}
