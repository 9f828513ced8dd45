//! Outbound collaborators the request client reports to: a notification sink
//! for human-readable errors and a navigation hook used on forced logout.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
}

pub const NETWORK_ERROR_MESSAGE: &str = "Network error: unable to reach the server.";
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";
pub const FORBIDDEN_MESSAGE: &str = "You do not have permission to perform this action.";
pub const NOT_FOUND_MESSAGE: &str = "The requested resource was not found.";
pub const SERVER_ERROR_MESSAGE: &str = "A server error occurred. Please try again later.";
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred.";

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self);
}
