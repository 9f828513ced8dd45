use crate::domain::{Navigator, Notifier, Severity};

/// Terminal front-end: notifications go to stderr, and a forced logout tells
/// the user to log in again.
#[derive(Clone, Copy, Default)]
pub struct ConsoleShell;

impl Notifier for ConsoleShell {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Error => eprintln!("error: {}", message),
        }
    }
}

impl Navigator for ConsoleShell {
    fn redirect_to_login(&self) {
        tracing::debug!("Redirecting to login");
        eprintln!("Session ended. Run `course-client login` to sign in again.");
    }
}
