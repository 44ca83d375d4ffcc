//! Transport selection
//!
//! Commands go to the user's selected transport while it is connected,
//! otherwise to the first connected transport in registration order. With
//! nothing connected every command fails with `false`.

use crate::messages::{LogRequest, ManageCommand, SharedInfo, TransportKind};
use crate::service::{CommandService, TransportService};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;

pub struct FallbackService {
    services: Vec<Arc<dyn TransportService>>,
    selected: RwLock<Option<TransportKind>>,
}

impl FallbackService {
    pub fn new(services: Vec<Arc<dyn TransportService>>) -> Self {
        Self {
            services,
            selected: RwLock::new(None),
        }
    }

    /// Prefer `kind` while it is connected
    pub fn select(&self, kind: Option<TransportKind>) {
        *self.selected.write() = kind;
    }

    pub fn selected(&self) -> Option<TransportKind> {
        *self.selected.read()
    }

    /// Service that would carry the next command
    pub fn active(&self) -> Option<Arc<dyn TransportService>> {
        let selected = self.selected();
        if let Some(kind) = selected
            && let Some(service) = self
                .services
                .iter()
                .find(|s| s.kind() == kind && s.is_connected())
        {
            return Some(Arc::clone(service));
        }
        self.services.iter().find(|s| s.is_connected()).cloned()
    }

    pub fn active_kind(&self) -> Option<TransportKind> {
        self.active().map(|s| s.kind())
    }

    fn with_active(&self, op: impl FnOnce(&dyn TransportService) -> bool) -> bool {
        match self.active() {
            Some(service) => op(service.as_ref()),
            None => {
                log::debug!("No connected transport");
                false
            }
        }
    }
}

impl CommandService for FallbackService {
    fn is_connected(&self) -> bool {
        self.services.iter().any(|s| s.is_connected())
    }

    fn activity_log(&self, category: &str, text: &str, memo: &str) -> bool {
        self.with_active(|s| s.activity_log(category, text, memo))
    }

    fn send_destination(&self, destination: &str) -> bool {
        self.with_active(|s| s.send_destination(destination))
    }

    fn summon(&self, destination: &str) -> bool {
        self.with_active(|s| s.summon(destination))
    }

    fn manage(&self, command: ManageCommand, param: Option<&str>) -> bool {
        self.with_active(|s| s.manage(command, param))
    }

    fn log_request(&self, request: &LogRequest) -> bool {
        self.with_active(|s| s.log_request(request))
    }

    fn send_log(&self, request: &LogRequest, app_logs: &[String], files: &[PathBuf]) -> bool {
        self.with_active(|s| s.send_log(request, app_logs, files))
    }

    fn share(&self, info: &SharedInfo) -> bool {
        self.with_active(|s| s.share(info))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records commands instead of sending them
    pub(crate) struct FakeService {
        kind: TransportKind,
        connected: AtomicBool,
        pub(crate) sent: Mutex<Vec<String>>,
    }

    impl FakeService {
        pub(crate) fn new(kind: TransportKind, connected: bool) -> Arc<Self> {
            Arc::new(Self {
                kind,
                connected: AtomicBool::new(connected),
                sent: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn set_connected(&self, connected: bool) {
            self.connected.store(connected, Ordering::SeqCst);
        }

        pub(crate) fn sent(&self) -> Vec<String> {
            self.sent.lock().clone()
        }

        fn record(&self, entry: String) -> bool {
            if !self.is_connected() {
                return false;
            }
            self.sent.lock().push(entry);
            true
        }
    }

    impl TransportService for FakeService {
        fn kind(&self) -> TransportKind {
            self.kind
        }
    }

    impl CommandService for FakeService {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
        fn activity_log(&self, category: &str, _text: &str, _memo: &str) -> bool {
            self.record(format!("log:{}", category))
        }
        fn send_destination(&self, destination: &str) -> bool {
            self.record(format!("destination:{}", destination))
        }
        fn summon(&self, destination: &str) -> bool {
            self.record(format!("summon:{}", destination))
        }
        fn manage(&self, command: ManageCommand, param: Option<&str>) -> bool {
            self.record(format!("manage:{}", command.format(param)))
        }
        fn log_request(&self, _request: &LogRequest) -> bool {
            self.record("log_request".to_string())
        }
        fn send_log(&self, _request: &LogRequest, app_logs: &[String], _files: &[PathBuf]) -> bool {
            self.record(format!("send_log:{}", app_logs.len()))
        }
        fn share(&self, info: &SharedInfo) -> bool {
            self.record(format!("share:{:?}", info.kind))
        }
    }

    #[test]
    fn test_sticky_selection_and_fallback() {
        let tcp = FakeService::new(TransportKind::Tcp, true);
        let serial = FakeService::new(TransportKind::Serial, true);
        let fallback = FallbackService::new(vec![
            tcp.clone() as Arc<dyn TransportService>,
            serial.clone(),
        ]);

        // No selection: first connected in order
        assert_eq!(fallback.active_kind(), Some(TransportKind::Tcp));

        fallback.select(Some(TransportKind::Serial));
        assert!(fallback.send_destination("lobby"));
        assert_eq!(serial.sent(), vec!["destination:lobby"]);

        // Selected transport drops: fall back, then return when it is back
        serial.set_connected(false);
        assert!(fallback.summon("lobby"));
        assert_eq!(tcp.sent(), vec!["summon:lobby"]);
        serial.set_connected(true);
        assert_eq!(fallback.active_kind(), Some(TransportKind::Serial));
    }

    #[test]
    fn test_nothing_connected_fails() {
        let tcp = FakeService::new(TransportKind::Tcp, false);
        let fallback = FallbackService::new(vec![tcp.clone() as Arc<dyn TransportService>]);
        assert!(!fallback.is_connected());
        assert!(!fallback.manage(ManageCommand::Reboot, None));
        assert!(!fallback.share(&SharedInfo::new(crate::messages::SharedKind::Skip, "")));
        assert!(tcp.sent().is_empty());
    }
}
