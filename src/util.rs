use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Local;

/// Current time as nanoseconds since the Unix epoch.
///
/// Wall-clock on purpose: dataset consumers join sessions recorded by
/// different processes, so timestamps must be portable. Do not swap in a
/// monotonic clock.
pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Session directory name: `<prefix>_YYYYMMDD_HHMMSS` (local time).
pub fn session_name(prefix: &str) -> String {
    format!("{}_{}", prefix, Local::now().format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_nanos_advances() {
        let a = now_nanos();
        let b = now_nanos();
        assert!(a > 1_600_000_000_000_000_000, "expected post-2020 epoch nanos");
        assert!(b >= a);
    }

    #[test]
    fn test_session_name_shape() {
        let name = session_name("drive");
        assert!(name.starts_with("drive_"));
        // drive_YYYYMMDD_HHMMSS
        assert_eq!(name.len(), "drive_".len() + 8 + 1 + 6);
    }
}
