//! Security event logging helpers.

use tracing::{info, warn};

/// Logs a security-relevant event with standardized formatting.
///
/// Successful events land at info, failures at warn, always under the
/// `security` target so they can be routed independently of normal logs.
pub fn log_security_event(event_type: &str, details: &str, success: bool) {
    if success {
        info!(target: "security", event = event_type, success, "{details}");
    } else {
        warn!(target: "security", event = event_type, success, "{details}");
    }
}
