use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Moderation payloads.
pub mod admin;
/// Signup, login and session payloads.
pub mod auth;
/// Chat messages and WebSocket frames.
pub mod chat;
/// Small shared responses.
pub mod common;
/// Game payloads and list filters.
pub mod game;
/// Health check response.
pub mod health;
/// Notification inbox payloads.
pub mod notification;
/// Report payloads and the admin queue.
pub mod report;
/// Profile payloads.
pub mod user;
/// Custom validators shared by the payloads.
pub mod validation;

/// Render a timestamp as RFC 3339, the format used on the wire.
pub fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Parse an RFC 3339 timestamp supplied by a client.
pub(crate) fn parse_system_time(value: &str) -> Result<SystemTime, time::error::Parse> {
    OffsetDateTime::parse(value, &Rfc3339).map(SystemTime::from)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;

    #[test]
    fn timestamps_use_rfc3339() {
        let time = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let formatted = format_system_time(time);
        assert_eq!(formatted, "2023-11-14T22:13:20Z");
        assert_eq!(parse_system_time(&formatted).unwrap(), time);
        assert_eq!(
            parse_system_time("2023-11-14T23:13:20+01:00").unwrap(),
            time
        );
        assert!(parse_system_time("next tuesday").is_err());
    }
}
