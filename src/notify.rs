use crate::{log_error, log_info, log_warn};

/// Fire-and-forget user notifications.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str, detail: Option<&str>);
    fn error(&self, title: &str, err: &dyn std::error::Error, message: &str);
    fn warning(&self, title: &str, message: &str);
}

/// Prints notifications to the terminal and mirrors them into the log.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn success(&self, message: &str, detail: Option<&str>) {
        log_info!("{}", message);
        match detail {
            Some(detail) => println!("✅ {} ({})", message, detail),
            None => println!("✅ {}", message),
        }
    }

    fn error(&self, title: &str, err: &dyn std::error::Error, message: &str) {
        log_error!("{}: {} ({})", title, message, err);
        eprintln!("❌ {}: {}", title, message);
    }

    fn warning(&self, title: &str, message: &str) {
        log_warn!("{}: {}", title, message);
        eprintln!("⚠️  {}: {}", title, message);
    }
}
