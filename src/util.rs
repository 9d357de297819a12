//! Shared utility functions

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Generate a unique request ID
///
/// Format: `<unix millis>-<process-wide counter>`. Unique within one process,
/// roughly sortable by arrival time.
pub fn generate_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let count = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", Utc::now().timestamp_millis(), count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_id_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_generate_id_format() {
        let id = generate_id();
        let (millis, count) = id.split_once('-').unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
        assert!(count.parse::<u64>().is_ok());
    }
}
