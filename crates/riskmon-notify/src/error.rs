/// Errors that can occur within the notification subsystem.
///
/// # Examples
///
/// ```rust
/// use riskmon_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("missing recipient list".to_string());
/// assert!(err.to_string().contains("recipient"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Channel configuration is missing a required field or contains an
    /// invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// The delivery backend is unreachable or refused the connection.
    #[error("Notify: channel unavailable: {0}")]
    Unavailable(String),

    /// The backend accepted the connection but delivery failed.
    #[error("Notify: delivery failed: {0}")]
    Delivery(String),

    /// Generic notification error for cases not covered by other variants.
    #[error("Notify: {0}")]
    Other(String),
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
