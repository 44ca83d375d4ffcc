//! Cross-transport duplicate suppression
//!
//! The robot sends each request over every connected transport, so the same
//! `arrived` can come in over TCP and serial. Each category keeps the last
//! accepted id and only strictly greater ids pass:
//!
//! | category     | id field      | gate                          |
//! |--------------|---------------|-------------------------------|
//! | speech       | `request_id`  | [`RequestDeduplicator`]       |
//! | navigation   | `request_id`  | [`RequestDeduplicator`]       |
//! | log response | `response_id` | [`RequestDeduplicator`]       |
//! | shared state | `info_id`     | [`SharedStateGate`], per kind |

use crate::messages::{SharedInfo, SharedKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Speech,
    Navigation,
    LogResponse,
}

/// Monotonic id filter, one lock-free slot per category
#[derive(Debug, Default)]
pub struct RequestDeduplicator {
    speech: AtomicI64,
    navigation: AtomicI64,
    log_response: AtomicI64,
}

impl RequestDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, category: Category) -> &AtomicI64 {
        match category {
            Category::Speech => &self.speech,
            Category::Navigation => &self.navigation,
            Category::LogResponse => &self.log_response,
        }
    }

    /// True if `id` is greater than every id accepted so far in `category`
    pub fn accept(&self, category: Category, id: i64) -> bool {
        self.slot(category).fetch_max(id, Ordering::SeqCst) < id
    }

    pub fn last(&self, category: Category) -> i64 {
        self.slot(category).load(Ordering::SeqCst)
    }
}

/// Shared-state filter keyed by update kind.
///
/// The mutex is held only for the compare-and-update.
#[derive(Debug, Default)]
pub struct SharedStateGate {
    last: Mutex<HashMap<SharedKind, i64>>,
}

impl SharedStateGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&self, info: &SharedInfo) -> bool {
        let mut last = self.last.lock();
        match last.get(&info.kind) {
            Some(&previous) if previous >= info.info_id => false,
            _ => {
                last.insert(info.kind, info.info_id);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_strictly_increasing() {
        let dedup = RequestDeduplicator::new();
        assert!(dedup.accept(Category::Navigation, 5));
        assert!(!dedup.accept(Category::Navigation, 5));
        assert!(!dedup.accept(Category::Navigation, 4));
        assert!(dedup.accept(Category::Navigation, 6));
        assert_eq!(dedup.last(Category::Navigation), 6);
        // Categories are independent
        assert!(dedup.accept(Category::Speech, 1));
        assert!(!dedup.accept(Category::LogResponse, 0));
    }

    #[test]
    fn test_concurrent_duplicates_pass_once() {
        let dedup = Arc::new(RequestDeduplicator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dedup = Arc::clone(&dedup);
                thread::spawn(move || (1..=100).filter(|&id| dedup.accept(Category::Speech, id)).count())
            })
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert!(total >= 1 && total <= 100);
        assert_eq!(dedup.last(Category::Speech), 100);
    }

    fn info(kind: SharedKind, id: i64) -> SharedInfo {
        let mut info = SharedInfo::new(kind, "v");
        info.info_id = id;
        info
    }

    #[test]
    fn test_shared_state_per_kind() {
        let gate = SharedStateGate::new();
        assert!(gate.accept(&info(SharedKind::ChangeLanguage, 10)));
        assert!(!gate.accept(&info(SharedKind::ChangeLanguage, 10)));
        // A different kind with an older id still passes
        assert!(gate.accept(&info(SharedKind::Skip, 3)));
        assert!(gate.accept(&info(SharedKind::ChangeLanguage, 11)));
        assert!(!gate.accept(&info(SharedKind::Skip, 2)));
    }
}
