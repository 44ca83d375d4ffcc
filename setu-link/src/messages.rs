//! Message catalogue
//!
//! Outbound (client → robot):
//!
//! | type                | data                                              |
//! |---------------------|---------------------------------------------------|
//! | `heartbeat`         | `{device_id, mode}`                               |
//! | `req_version`       | `null`                                            |
//! | `req_name`          | `null`                                            |
//! | `destination`       | destination value, `__cancel__` cancels           |
//! | `summon`            | destination value                                 |
//! | `manage`            | `cmd` or `cmd-param`                              |
//! | `log`               | `{category, text, memo}`                          |
//! | `log_request`       | [`LogRequest`] or upload manifest                 |
//! | `log_request_chunk` | [`LogChunk`]                                      |
//! | `share`             | [`SharedInfo`]                                    |
//!
//! Inbound (robot → client): `ack`, `version`, `name`, `device_status`,
//! `system_status`, `battery_status`, `touch`, `speak`, `navigate`,
//! `log_response`, `share`.

use crate::error::{LinkError, Result};
use crate::status::{BatteryStatus, DeviceStatus, SystemStatus, TouchStatus};
use crate::wire::Envelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Protocol version this client speaks; compared against the peer's `version`
pub const PROTOCOL_VERSION: &str = "20240507";

/// Destination value that cancels the current navigation
pub const CANCEL_DESTINATION: &str = "__cancel__";

/// Operating mode reported in heartbeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModeType {
    #[default]
    Normal,
    Advanced,
    Debug,
}

/// Physical link a session runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Tcp,
    Serial,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Tcp => write!(f, "TCP"),
            TransportKind::Serial => write!(f, "Serial"),
        }
    }
}

/// Robot management commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManageCommand {
    Reboot,
    Poweroff,
    Start,
    Stop,
    Lang,
    ReqFeatures,
    HandleSide,
    TouchMode,
    RestartLocalization,
    ResetGnss,
    SpeakerEnable,
    SpeakerAudioFile,
    SpeakerVolume,
    SpeakerAlert,
    EnableWifi,
    DisableWifi,
    ReleaseEmergencyStop,
}

impl ManageCommand {
    pub const ALL: [ManageCommand; 17] = [
        ManageCommand::Reboot,
        ManageCommand::Poweroff,
        ManageCommand::Start,
        ManageCommand::Stop,
        ManageCommand::Lang,
        ManageCommand::ReqFeatures,
        ManageCommand::HandleSide,
        ManageCommand::TouchMode,
        ManageCommand::RestartLocalization,
        ManageCommand::ResetGnss,
        ManageCommand::SpeakerEnable,
        ManageCommand::SpeakerAudioFile,
        ManageCommand::SpeakerVolume,
        ManageCommand::SpeakerAlert,
        ManageCommand::EnableWifi,
        ManageCommand::DisableWifi,
        ManageCommand::ReleaseEmergencyStop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ManageCommand::Reboot => "reboot",
            ManageCommand::Poweroff => "poweroff",
            ManageCommand::Start => "start",
            ManageCommand::Stop => "stop",
            ManageCommand::Lang => "lang",
            ManageCommand::ReqFeatures => "reqfeatures",
            ManageCommand::HandleSide => "handleside",
            ManageCommand::TouchMode => "touchmode",
            ManageCommand::RestartLocalization => "restart_localization",
            ManageCommand::ResetGnss => "reset_gnss",
            ManageCommand::SpeakerEnable => "speaker_enable",
            ManageCommand::SpeakerAudioFile => "speaker_audio_file",
            ManageCommand::SpeakerVolume => "speaker_volume",
            ManageCommand::SpeakerAlert => "speaker_alert",
            ManageCommand::EnableWifi => "enablewifi",
            ManageCommand::DisableWifi => "disablewifi",
            ManageCommand::ReleaseEmergencyStop => "release_emergencystop",
        }
    }

    /// Wire form: `cmd` or `cmd-param`
    pub fn format(&self, param: Option<&str>) -> String {
        match param {
            Some(param) => format!("{}-{}", self.as_str(), param),
            None => self.as_str().to_string(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SharedKind {
    Speak,
    SpeakProgress,
    Tour,
    OverrideTour,
    OverrideDestination,
    Skip,
    RequestUserInfo,
    ClearDestinations,
    ChangeLanguage,
    ChangeUserVoiceRate,
    ChangeUserVoiceType,
    PossibleHandleSide,
    PossibleTouchMode,
    ChangeHandleSide,
    ChangeTouchMode,
    ChatRequest,
    ChatStatus,
    ChangeEnableSpeaker,
    ChangeSelectedSpeakerAudioFile,
    ChangeSpeakerVolume,
    UpdateSpeakerSettings,
    SpeakState,
    PlayAudio,
    RequestPlayAudio,
    #[serde(rename = "StartBGM")]
    StartBgm,
    #[serde(rename = "StopBGM")]
    StopBgm,
    #[serde(other)]
    None,
}

/// Shared-state update exchanged between the phones attached to one robot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedInfo {
    pub info_id: i64,
    #[serde(rename = "type")]
    pub kind: SharedKind,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub flag1: bool,
    #[serde(default)]
    pub flag2: bool,
    #[serde(default)]
    pub location: i64,
    #[serde(default)]
    pub length: i64,
}

impl SharedInfo {
    /// New update stamped with the wall clock in nanoseconds
    pub fn new(kind: SharedKind, value: impl Into<String>) -> Self {
        let info_id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or_default();
        Self {
            info_id,
            kind,
            value: value.into(),
            flag1: false,
            flag2: false,
            location: 0,
            length: 0,
        }
    }
}

/// Speech request from the robot
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpeakRequest {
    pub request_id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub rate: i8,
    #[serde(default)]
    pub pitch: i8,
    #[serde(default)]
    pub volume: i8,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub voice: String,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub timeout: f32,
    #[serde(default)]
    pub channels: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationEventType {
    Next,
    Arrived,
    Content,
    Sound,
    Subtour,
    Skip,
    GetLanguage,
    GetHandleSide,
    GetTouchMode,
    GetSpeakerAudioFiles,
    ToggleConversation,
    ToggleSpeakState,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Navigation event from the robot
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NavigationEventRequest {
    pub request_id: i64,
    #[serde(rename = "type", default)]
    pub kind: NavigationEventType,
    #[serde(default)]
    pub param: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogStatus {
    #[default]
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "NG")]
    Ng,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogRequestType {
    List,
    Detail,
    Report,
    AppLog,
}

/// One robot-side log bundle
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogEntry {
    pub name: String,
    #[serde(default)]
    pub nanoseconds: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub is_report_submitted: Option<bool>,
    #[serde(default)]
    pub is_uploaded_to_box: Option<bool>,
}

impl LogEntry {
    /// A report needs both a title and a detail
    pub fn can_submit(&self) -> bool {
        matches!(
            (&self.title, &self.detail),
            (Some(title), Some(detail)) if !title.is_empty() && !detail.is_empty()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogResponse {
    #[serde(default)]
    pub status: Option<LogStatus>,
    pub response_id: i64,
    #[serde(rename = "type")]
    pub kind: LogRequestType,
    #[serde(default)]
    pub log_list: Option<Vec<LogEntry>>,
    #[serde(default)]
    pub log: Option<LogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRequest {
    #[serde(rename = "type")]
    pub kind: LogRequestType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl LogRequest {
    pub fn new(kind: LogRequestType) -> Self {
        Self {
            kind,
            log_name: None,
            title: None,
            detail: None,
        }
    }
}

/// One base64 slice of an uploaded file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogChunk {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub chunk_index: usize,
    pub data: String,
    pub app_log_name: String,
    pub cabot_log_name: String,
}

/// Trailer sent after every chunk of an upload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadManifest {
    #[serde(rename = "type")]
    pub kind: LogRequestType,
    pub cabot_log_name: String,
    pub app_log_name: String,
    pub total_chunks: usize,
}

/// Everything the client can send
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Heartbeat { device_id: String, mode: ModeType },
    ReqVersion,
    ReqName,
    Destination(String),
    Summon(String),
    Manage(String),
    ActivityLog { category: String, text: String, memo: String },
    LogRequest(LogRequest),
    UploadManifest(UploadManifest),
    LogChunk(LogChunk),
    Share(SharedInfo),
}

impl Outbound {
    pub fn kind(&self) -> &'static str {
        match self {
            Outbound::Heartbeat { .. } => "heartbeat",
            Outbound::ReqVersion => "req_version",
            Outbound::ReqName => "req_name",
            Outbound::Destination(_) => "destination",
            Outbound::Summon(_) => "summon",
            Outbound::Manage(_) => "manage",
            Outbound::ActivityLog { .. } => "log",
            Outbound::LogRequest(_) | Outbound::UploadManifest(_) => "log_request",
            Outbound::LogChunk(_) => "log_request_chunk",
            Outbound::Share(_) => "share",
        }
    }

    fn data(&self) -> Result<Value> {
        let value = match self {
            Outbound::Heartbeat { device_id, mode } => {
                serde_json::json!({ "device_id": device_id, "mode": mode })
            }
            Outbound::ReqVersion | Outbound::ReqName => Value::Null,
            Outbound::Destination(s) | Outbound::Summon(s) | Outbound::Manage(s) => {
                Value::String(s.clone())
            }
            Outbound::ActivityLog {
                category,
                text,
                memo,
            } => serde_json::json!({ "category": category, "text": text, "memo": memo }),
            Outbound::LogRequest(r) => serde_json::to_value(r)?,
            Outbound::UploadManifest(m) => serde_json::to_value(m)?,
            Outbound::LogChunk(c) => serde_json::to_value(c)?,
            Outbound::Share(s) => serde_json::to_value(s)?,
        };
        Ok(value)
    }

    pub fn to_envelope(&self, seq: u64) -> Result<Envelope> {
        Ok(Envelope::new(self.kind(), self.data()?).with_seq(seq))
    }
}

/// Everything the client can receive
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Ack { seq: u64 },
    Version(String),
    Name(String),
    DeviceStatus(DeviceStatus),
    SystemStatus(SystemStatus),
    BatteryStatus(BatteryStatus),
    Touch(TouchStatus),
    Speak(SpeakRequest),
    Navigate(NavigationEventRequest),
    LogResponse(LogResponse),
    Share(SharedInfo),
}

#[derive(Deserialize)]
struct AckData {
    seq: u64,
}

impl Inbound {
    pub fn from_envelope(envelope: Envelope) -> Result<Self> {
        let data = envelope.data;
        let message = match envelope.kind.as_str() {
            "ack" => Inbound::Ack {
                seq: serde_json::from_value::<AckData>(data)?.seq,
            },
            "version" => Inbound::Version(serde_json::from_value(data)?),
            "name" => Inbound::Name(serde_json::from_value(data)?),
            "device_status" => Inbound::DeviceStatus(serde_json::from_value(data)?),
            "system_status" => Inbound::SystemStatus(serde_json::from_value(data)?),
            "battery_status" => Inbound::BatteryStatus(serde_json::from_value(data)?),
            "touch" => Inbound::Touch(serde_json::from_value(data)?),
            "speak" => Inbound::Speak(serde_json::from_value(data)?),
            "navigate" => Inbound::Navigate(serde_json::from_value(data)?),
            "log_response" => Inbound::LogResponse(serde_json::from_value(data)?),
            "share" => Inbound::Share(serde_json::from_value(data)?),
            other => {
                return Err(LinkError::Protocol(format!("Unknown message type: {}", other)));
            }
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inbound(kind: &str, data: Value) -> Result<Inbound> {
        Inbound::from_envelope(Envelope::new(kind, data))
    }

    #[test]
    fn test_manage_format() {
        assert_eq!(ManageCommand::Reboot.format(None), "reboot");
        assert_eq!(ManageCommand::Lang.format(Some("ja")), "lang-ja");
        assert_eq!(
            ManageCommand::parse("release_emergencystop"),
            Some(ManageCommand::ReleaseEmergencyStop)
        );
        assert_eq!(ManageCommand::parse("dance"), None);
    }

    #[test]
    fn test_outbound_envelopes() {
        let heartbeat = Outbound::Heartbeat {
            device_id: "phone".into(),
            mode: ModeType::Advanced,
        }
        .to_envelope(1)
        .unwrap();
        assert_eq!(heartbeat.kind, "heartbeat");
        assert_eq!(heartbeat.data, json!({"device_id": "phone", "mode": "Advanced"}));

        let manifest = Outbound::UploadManifest(UploadManifest {
            kind: LogRequestType::AppLog,
            cabot_log_name: "cabot_2024".into(),
            app_log_name: "app.log".into(),
            total_chunks: 3,
        })
        .to_envelope(2)
        .unwrap();
        assert_eq!(manifest.kind, "log_request");
        assert_eq!(manifest.data["type"], "appLog");
        assert_eq!(manifest.data["totalChunks"], 3);

        let chunk = Outbound::LogChunk(LogChunk {
            kind: "data-chunk",
            chunk_index: 0,
            data: "QUJD".into(),
            app_log_name: "app.log".into(),
            cabot_log_name: "cabot_2024".into(),
        })
        .to_envelope(3)
        .unwrap();
        assert_eq!(chunk.data["chunkIndex"], 0);
        assert_eq!(chunk.data["cabotLogName"], "cabot_2024");

        let request = Outbound::LogRequest(LogRequest::new(LogRequestType::List))
            .to_envelope(4)
            .unwrap();
        assert_eq!(request.data, json!({"type": "list"}));
    }

    #[test]
    fn test_inbound_decoding() {
        assert_eq!(inbound("ack", json!({"seq": 9})).unwrap(), Inbound::Ack { seq: 9 });
        assert_eq!(
            inbound("version", json!("1.0")).unwrap(),
            Inbound::Version("1.0".into())
        );

        match inbound("navigate", json!({"request_id": 5, "type": "arrived"})).unwrap() {
            Inbound::Navigate(n) => {
                assert_eq!(n.request_id, 5);
                assert_eq!(n.kind, NavigationEventType::Arrived);
                assert_eq!(n.param, "");
            }
            other => panic!("unexpected {:?}", other),
        }

        match inbound("navigate", json!({"request_id": 6, "type": "dance"})).unwrap() {
            Inbound::Navigate(n) => assert_eq!(n.kind, NavigationEventType::Unknown),
            other => panic!("unexpected {:?}", other),
        }

        match inbound("speak", json!({"request_id": 1, "text": "Hello", "force": true})).unwrap() {
            Inbound::Speak(s) => {
                assert_eq!(s.text, "Hello");
                assert!(s.force);
                assert_eq!(s.priority, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_inbound_errors() {
        assert!(matches!(
            inbound("teleport", Value::Null),
            Err(LinkError::Protocol(_))
        ));
        assert!(matches!(inbound("speak", json!({"text": "x"})), Err(LinkError::Json(_))));
    }

    #[test]
    fn test_log_response_and_entries() {
        let response = match inbound(
            "log_response",
            json!({
                "response_id": 3,
                "type": "list",
                "log_list": [
                    {"name": "cabot_2024-01-01-10-00-00", "title": "t", "detail": "d"},
                    {"name": "cabot_2024-01-02-10-00-00", "title": ""}
                ]
            }),
        )
        .unwrap()
        {
            Inbound::LogResponse(r) => r,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(response.kind, LogRequestType::List);
        assert_eq!(response.status, None);
        let list = response.log_list.unwrap();
        assert!(list[0].can_submit());
        assert!(!list[1].can_submit());
    }

    #[test]
    fn test_shared_info() {
        let info = SharedInfo::new(SharedKind::ChangeLanguage, "ja");
        assert!(info.info_id > 0);
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["type"], "ChangeLanguage");

        let bgm: SharedInfo =
            serde_json::from_value(json!({"info_id": 2, "type": "StartBGM"})).unwrap();
        assert_eq!(bgm.kind, SharedKind::StartBgm);
        let unknown: SharedInfo =
            serde_json::from_value(json!({"info_id": 2, "type": "Future"})).unwrap();
        assert_eq!(unknown.kind, SharedKind::None);
    }
}
