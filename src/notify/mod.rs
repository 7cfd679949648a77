//! Alert notification dispatch.
//!
//! Delivery transport is a collaborator concern: the engine only knows the
//! recipient string from the project's notification settings and hands it to
//! whatever [`Notifier`] was wired in.

mod webhook;

pub use webhook::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// Sends one formatted alert to a recipient.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, website_id: i64, message: &str, recipient: &str)
        -> Result<(), NotifyError>;
}
