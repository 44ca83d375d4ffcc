//! Inbound event dispatch
//!
//! Every [`TransportClient`](crate::client::TransportClient) reports on its
//! own channel sender; the [`Dispatcher`] sits between those streams and the
//! navigation layer. It drops requests that already arrived over another
//! transport and requests the current mode does not handle, and turns the
//! rest into [`SessionEvent`]s.
//!
//! | inbound          | gate                                               |
//! |------------------|----------------------------------------------------|
//! | `speak`          | Normal mode, new `request_id`                      |
//! | `navigate`       | Normal mode (or `getspeakeraudiofiles`), new id    |
//! | `log_response`   | new `response_id`                                  |
//! | `share`          | new `info_id` for its kind                         |
//! | status, version  | none                                               |

use crate::client::{ClientEvent, TransportEvent};
use crate::dedup::{Category, RequestDeduplicator, SharedStateGate};
use crate::messages::{
    Inbound, LogEntry, LogRequestType, LogResponse, LogStatus, ModeType, NavigationEventRequest,
    NavigationEventType, SharedInfo, SpeakRequest, TransportKind,
};
use crate::status::{BatteryStatus, DeviceStatus, SystemStatusView, TouchStatus};
use parking_lot::Mutex;

/// What the navigation layer sees
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connection {
        transport: TransportKind,
        connected: bool,
    },
    Version {
        transport: TransportKind,
        version: String,
        matched: bool,
    },
    Name {
        transport: TransportKind,
        name: String,
    },
    DeviceStatus(DeviceStatus),
    SystemStatus(SystemStatusView),
    BatteryStatus(BatteryStatus),
    Touch(TouchStatus),
    Speak(SpeakRequest),
    Navigate(NavigationEventRequest),
    LogList {
        status: LogStatus,
        entries: Vec<LogEntry>,
    },
    LogDetail(LogEntry),
    LogReport(LogEntry),
    Share(SharedInfo),
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    requests: RequestDeduplicator,
    shared: SharedStateGate,
    mode: Mutex<ModeType>,
}

impl Dispatcher {
    pub fn new(mode: ModeType) -> Self {
        Self {
            mode: Mutex::new(mode),
            ..Self::default()
        }
    }

    pub fn mode(&self) -> ModeType {
        *self.mode.lock()
    }

    pub fn set_mode(&self, mode: ModeType) {
        *self.mode.lock() = mode;
    }

    /// Map one transport event; `None` when it is suppressed
    pub fn filter(&self, event: TransportEvent) -> Option<SessionEvent> {
        let transport = event.transport;
        match event.event {
            ClientEvent::Connection(connected) => Some(SessionEvent::Connection {
                transport,
                connected,
            }),
            ClientEvent::VersionChecked { version, matched } => Some(SessionEvent::Version {
                transport,
                version,
                matched,
            }),
            ClientEvent::Message(message) => self.inbound(transport, message),
        }
    }

    fn inbound(&self, transport: TransportKind, message: Inbound) -> Option<SessionEvent> {
        match message {
            Inbound::Ack { .. } | Inbound::Version(_) => None,
            Inbound::Name(name) => Some(SessionEvent::Name { transport, name }),
            Inbound::DeviceStatus(status) => Some(SessionEvent::DeviceStatus(status)),
            Inbound::SystemStatus(status) => Some(SessionEvent::SystemStatus(
                SystemStatusView::from_status(&status),
            )),
            Inbound::BatteryStatus(status) => Some(SessionEvent::BatteryStatus(status)),
            Inbound::Touch(status) => Some(SessionEvent::Touch(status)),
            Inbound::Speak(request) => {
                if self.mode() != ModeType::Normal {
                    log::debug!("{}: speak {} ignored in {:?} mode", transport, request.request_id, self.mode());
                    return None;
                }
                self.fresh(transport, Category::Speech, request.request_id)
                    .then_some(SessionEvent::Speak(request))
            }
            Inbound::Navigate(request) => {
                if self.mode() != ModeType::Normal
                    && request.kind != NavigationEventType::GetSpeakerAudioFiles
                {
                    log::debug!("{}: navigate {:?} ignored in {:?} mode", transport, request.kind, self.mode());
                    return None;
                }
                self.fresh(transport, Category::Navigation, request.request_id)
                    .then_some(SessionEvent::Navigate(request))
            }
            Inbound::LogResponse(response) => {
                if !self.fresh(transport, Category::LogResponse, response.response_id) {
                    return None;
                }
                log_event(response)
            }
            Inbound::Share(info) => {
                if !self.shared.accept(&info) {
                    log::debug!("{}: share {:?} {} already seen", transport, info.kind, info.info_id);
                    return None;
                }
                Some(SessionEvent::Share(info))
            }
        }
    }

    fn fresh(&self, transport: TransportKind, category: Category, id: i64) -> bool {
        let accepted = self.requests.accept(category, id);
        if !accepted {
            log::debug!(
                "{}: {:?} {} already handled (last {})",
                transport,
                category,
                id,
                self.requests.last(category)
            );
        }
        accepted
    }
}

fn log_event(response: LogResponse) -> Option<SessionEvent> {
    match response.kind {
        LogRequestType::List => Some(SessionEvent::LogList {
            status: response.status.unwrap_or_default(),
            entries: response.log_list.unwrap_or_default(),
        }),
        LogRequestType::Detail => response.log.map(SessionEvent::LogDetail),
        LogRequestType::Report => response.log.map(SessionEvent::LogReport),
        LogRequestType::AppLog => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn message(transport: TransportKind, kind: &str, data: Value) -> TransportEvent {
        let envelope = crate::wire::Envelope::new(kind, data);
        TransportEvent {
            transport,
            event: ClientEvent::Message(Inbound::from_envelope(envelope).unwrap()),
        }
    }

    fn navigate(transport: TransportKind, id: i64, kind: &str) -> TransportEvent {
        message(transport, "navigate", json!({"request_id": id, "type": kind, "param": ""}))
    }

    #[test]
    fn test_arrived_twice_across_transports() {
        let dispatcher = Dispatcher::new(ModeType::Normal);
        let first = dispatcher.filter(navigate(TransportKind::Tcp, 5, "arrived"));
        assert!(matches!(
            first,
            Some(SessionEvent::Navigate(NavigationEventRequest { request_id: 5, kind: NavigationEventType::Arrived, .. }))
        ));
        assert_eq!(dispatcher.filter(navigate(TransportKind::Serial, 5, "arrived")), None);
        assert_eq!(dispatcher.filter(navigate(TransportKind::Serial, 4, "next")), None);
    }

    #[test]
    fn test_mode_gating() {
        let dispatcher = Dispatcher::new(ModeType::Advanced);
        let speak = message(TransportKind::Tcp, "speak", json!({"request_id": 1, "text": "hi"}));
        assert_eq!(dispatcher.filter(speak), None);
        assert_eq!(dispatcher.filter(navigate(TransportKind::Tcp, 1, "next")), None);
        assert!(dispatcher
            .filter(navigate(TransportKind::Tcp, 2, "getspeakeraudiofiles"))
            .is_some());

        // Suppressed requests do not consume their id
        dispatcher.set_mode(ModeType::Normal);
        let speak = message(TransportKind::Tcp, "speak", json!({"request_id": 1, "text": "hi"}));
        assert!(matches!(dispatcher.filter(speak), Some(SessionEvent::Speak(_))));
    }

    #[test]
    fn test_log_responses() {
        let dispatcher = Dispatcher::new(ModeType::Normal);
        let list = message(
            TransportKind::Tcp,
            "log_response",
            json!({"response_id": 1, "type": "list", "log_list": [{"name": "a"}]}),
        );
        match dispatcher.filter(list) {
            Some(SessionEvent::LogList { status, entries }) => {
                assert_eq!(status, LogStatus::Ok);
                assert_eq!(entries.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }

        let detail = message(
            TransportKind::Serial,
            "log_response",
            json!({"response_id": 2, "type": "detail", "log": {"name": "a", "title": "t"}}),
        );
        assert!(matches!(dispatcher.filter(detail), Some(SessionEvent::LogDetail(_))));

        let app_log = message(
            TransportKind::Tcp,
            "log_response",
            json!({"response_id": 3, "type": "appLog"}),
        );
        assert_eq!(dispatcher.filter(app_log), None);
    }

    #[test]
    fn test_share_gate_and_passthrough() {
        let dispatcher = Dispatcher::new(ModeType::Normal);
        let share = json!({"info_id": 10, "type": "ChangeLanguage", "value": "ja"});
        assert!(dispatcher
            .filter(message(TransportKind::Tcp, "share", share.clone()))
            .is_some());
        assert_eq!(dispatcher.filter(message(TransportKind::Serial, "share", share)), None);

        let connected = TransportEvent {
            transport: TransportKind::Serial,
            event: ClientEvent::Connection(true),
        };
        assert_eq!(
            dispatcher.filter(connected),
            Some(SessionEvent::Connection {
                transport: TransportKind::Serial,
                connected: true
            })
        );
    }
}
