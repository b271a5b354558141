use log::error;
use std::fmt;

/// Decides whether query failures are written to the log. Failures are always
/// swallowed by the caller; this only controls diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPolicy {
    log_errors: bool,
}

impl ErrorPolicy {
    pub fn new(log_errors: bool) -> Self {
        Self { log_errors }
    }

    pub fn should_log(&self) -> bool {
        self.log_errors
    }

    pub fn report(&self, args: fmt::Arguments<'_>) {
        if self.log_errors {
            error!("{args}");
        }
    }
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::new(true)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_log() {
        assert!(ErrorPolicy::new(true).should_log());
        assert!(!ErrorPolicy::new(false).should_log());
        assert!(ErrorPolicy::default().should_log());
    }

    #[test]
    fn test_report_when_disabled_is_silent() {
        capture::start();
        ErrorPolicy::new(false).report(format_args!("Failed to query server {}", "AWP #1"));
        assert!(capture::errors().is_empty());
    }

    #[test]
    fn test_report_when_enabled_logs_once() {
        capture::start();
        ErrorPolicy::new(true).report(format_args!("Failed to query server {}", "AWP #1"));
        assert_eq!(capture::errors(), vec!["Failed to query server AWP #1".to_string()]);
    }
}
