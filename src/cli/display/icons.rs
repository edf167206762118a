use chrono::{DateTime, Duration, Utc};

pub struct StatusIcon;

impl StatusIcon {
    pub const SUCCESS: &'static str = "✓";
    pub const WARNING: &'static str = "⚠";
    pub const ERROR: &'static str = "✗";
    pub const MUTED: &'static str = "○";
    pub const UNKNOWN: &'static str = "?";

    /// Cluster health from when it last reported in.
    pub fn cluster_status(
        muted: bool,
        last_seen: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> (&'static str, &'static str) {
        if muted {
            return (Self::MUTED, "Muted");
        }
        match last_seen {
            None => (Self::UNKNOWN, "Never seen"),
            Some(seen) if now - seen <= Duration::hours(1) => (Self::SUCCESS, "Active"),
            Some(seen) if now - seen <= Duration::days(1) => (Self::WARNING, "Stale"),
            Some(_) => (Self::ERROR, "Silent"),
        }
    }
}
