//! Robot status reports and their aggregation
//!
//! The robot pushes four kinds of status:
//!
//! | message          | level type                  | notes                          |
//! |------------------|-----------------------------|--------------------------------|
//! | `device_status`  | [`DeviceLevel`] (string)    | per-device entries             |
//! | `system_status`  | [`SystemLevel`] (string)    | flat diagnostics, `/`-named    |
//! | `battery_status` | [`DiagnosticLevel`] (0..=3) | one diagnostic                 |
//! | `touch`          | [`TouchLevel`] (-1..=1)     | handle touch sensor            |
//!
//! Diagnostics arrive flat with hierarchical names (`root/child`);
//! [`SystemStatusView`] folds them into components with child details.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceLevel {
    #[serde(rename = "OK")]
    Ok,
    Error,
    #[default]
    Unknown,
}

impl DeviceLevel {
    /// Display order: errors first, healthy last
    fn rank(self) -> u8 {
        match self {
            DeviceLevel::Error => 0,
            DeviceLevel::Unknown => 1,
            DeviceLevel::Ok => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub model: String,
    pub level: DeviceLevel,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub values: Vec<KeyValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct DeviceStatus {
    pub level: DeviceLevel,
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

impl DeviceStatus {
    /// Sort devices Error → Unknown → OK, stable within a level
    pub fn sort_devices(&mut self) {
        self.devices.sort_by_key(|d| d.level.rank());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SystemLevel {
    #[default]
    Unknown,
    Inactive,
    Active,
    Activating,
    Deactivating,
    Error,
}

/// Integer-coded diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum DiagnosticLevel {
    Ok = 0,
    Warning = 1,
    Error = 2,
    #[default]
    Stale = 3,
}

impl DiagnosticLevel {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(DiagnosticLevel::Ok),
            1 => Some(DiagnosticLevel::Warning),
            2 => Some(DiagnosticLevel::Error),
            3 => Some(DiagnosticLevel::Stale),
            _ => None,
        }
    }
}

impl Serialize for DiagnosticLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for DiagnosticLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        DiagnosticLevel::from_code(code).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid diagnostic level {}", code))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiagnosticStatus {
    pub level: DiagnosticLevel,
    pub name: String,
    #[serde(default)]
    pub hardware_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub values: Vec<KeyValue>,
}

impl DiagnosticStatus {
    /// Last `/` segment of the name
    pub fn component_name(&self) -> &str {
        self.name
            .split('/')
            .filter(|s| !s.is_empty())
            .next_back()
            .unwrap_or(&self.name)
    }

    /// First `/` segment, `None` for a top-level diagnostic
    pub fn root_name(&self) -> Option<&str> {
        let root = self.name.split('/').find(|s| !s.is_empty())?;
        (root != self.component_name()).then_some(root)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct SystemStatus {
    pub level: SystemLevel,
    #[serde(default)]
    pub diagnostics: Vec<DiagnosticStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatteryStatus {
    pub level: DiagnosticLevel,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub hardware_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub values: Vec<KeyValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "i8")]
pub enum TouchLevel {
    #[default]
    Stale,
    NoTouch,
    Touching,
}

impl TryFrom<i8> for TouchLevel {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, String> {
        match value {
            -1 => Ok(TouchLevel::Stale),
            0 => Ok(TouchLevel::NoTouch),
            1 => Ok(TouchLevel::Touching),
            other => Err(format!("invalid touch level {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct TouchStatus {
    pub level: TouchLevel,
}

/// Status tree node: a diagnostic on its own, or a component with details
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusNode {
    Leaf(DiagnosticStatus),
    Composite {
        status: DiagnosticStatus,
        details: BTreeMap<String, StatusNode>,
    },
}

impl StatusNode {
    pub fn status(&self) -> &DiagnosticStatus {
        match self {
            StatusNode::Leaf(status) | StatusNode::Composite { status, .. } => status,
        }
    }

    pub fn level(&self) -> DiagnosticLevel {
        self.status().level
    }

    fn status_mut(&mut self) -> &mut DiagnosticStatus {
        match self {
            StatusNode::Leaf(status) | StatusNode::Composite { status, .. } => status,
        }
    }

    /// Attach a child diagnostic; a repeated child merges its values
    fn attach(&mut self, child: &DiagnosticStatus) {
        if let StatusNode::Leaf(status) = self {
            let status = status.clone();
            *self = StatusNode::Composite {
                status,
                details: BTreeMap::new(),
            };
        }
        if let StatusNode::Composite { details, .. } = self {
            match details.get_mut(child.component_name()) {
                Some(existing) => {
                    let detail = existing.status_mut();
                    for kv in &child.values {
                        match detail.values.iter_mut().find(|v| v.key == kv.key) {
                            Some(v) => v.value = kv.value.clone(),
                            None => detail.values.push(kv.clone()),
                        }
                    }
                }
                None => {
                    details.insert(
                        child.component_name().to_string(),
                        StatusNode::Leaf(child.clone()),
                    );
                }
            }
        }
    }
}

/// System status folded into components, in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemStatusView {
    pub level: SystemLevel,
    pub summary: DiagnosticLevel,
    pub components: Vec<(String, StatusNode)>,
}

impl SystemStatusView {
    pub fn from_status(status: &SystemStatus) -> Self {
        let mut components: Vec<(String, StatusNode)> = Vec::new();
        for diagnostic in status.diagnostics.iter().filter(|d| d.root_name().is_none()) {
            let name = diagnostic.component_name().to_string();
            let node = StatusNode::Leaf(diagnostic.clone());
            match components.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => slot.1 = node,
                None => components.push((name, node)),
            }
        }

        // Stale components do not make the summary worse than Error
        let summary = components
            .iter()
            .map(|(_, node)| node.level().min(DiagnosticLevel::Error))
            .max()
            .unwrap_or(DiagnosticLevel::Stale);

        for diagnostic in &status.diagnostics {
            let Some(root) = diagnostic.root_name() else {
                continue;
            };
            if let Some((_, node)) = components.iter_mut().find(|(n, _)| n == root) {
                node.attach(diagnostic);
            }
        }

        Self {
            level: status.level,
            summary,
            components,
        }
    }

    pub fn component(&self, name: &str) -> Option<&StatusNode> {
        self.components
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    pub fn can_start(&self) -> bool {
        self.level == SystemLevel::Inactive
    }

    pub fn can_stop(&self) -> bool {
        self.level == SystemLevel::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn diag(name: &str, level: u8) -> DiagnosticStatus {
        serde_json::from_value(json!({"name": name, "level": level})).unwrap()
    }

    #[test]
    fn test_device_sort_order() {
        let mut status: DeviceStatus = serde_json::from_value(json!({
            "level": "Error",
            "devices": [
                {"type": "lidar", "model": "a", "level": "OK"},
                {"type": "imu", "model": "b", "level": "Unknown"},
                {"type": "motor", "model": "c", "level": "Error"},
                {"type": "camera", "model": "d", "level": "OK"}
            ]
        }))
        .unwrap();
        status.sort_devices();
        let kinds: Vec<&str> = status.devices.iter().map(|d| d.kind.as_str()).collect();
        assert_eq!(kinds, vec!["motor", "imu", "lidar", "camera"]);
    }

    #[test]
    fn test_names() {
        let leaf = diag("/Localization/GNSS", 0);
        assert_eq!(leaf.component_name(), "GNSS");
        assert_eq!(leaf.root_name(), Some("Localization"));
        let top = diag("/Localization", 0);
        assert_eq!(top.component_name(), "Localization");
        assert_eq!(top.root_name(), None);
    }

    #[test]
    fn test_levels_reject_out_of_range() {
        assert!(serde_json::from_value::<DiagnosticStatus>(json!({"name": "x", "level": 7})).is_err());
        let touch: TouchStatus = serde_json::from_value(json!({"level": -1})).unwrap();
        assert_eq!(touch.level, TouchLevel::Stale);
        assert!(serde_json::from_value::<TouchStatus>(json!({"level": 2})).is_err());
    }

    #[test]
    fn test_system_view_aggregation() {
        let status = SystemStatus {
            level: SystemLevel::Inactive,
            diagnostics: vec![
                diag("/Motor", 0),
                diag("/Localization", 3),
                diag("/Localization/GNSS", 1),
                diag("/Localization/Map", 0),
                diag("/Orphan/Child", 2),
            ],
        };
        let view = SystemStatusView::from_status(&status);
        assert_eq!(view.components.len(), 2);
        assert_eq!(view.summary, DiagnosticLevel::Error);
        assert!(view.can_start());
        assert!(!view.can_stop());

        match view.component("Localization").unwrap() {
            StatusNode::Composite { details, .. } => {
                assert_eq!(details.len(), 2);
                assert_eq!(details["GNSS"].level(), DiagnosticLevel::Warning);
            }
            other => panic!("expected composite, got {:?}", other),
        }
        assert!(matches!(view.component("Motor"), Some(StatusNode::Leaf(_))));
    }

    #[test]
    fn test_empty_view_is_stale() {
        let view = SystemStatusView::from_status(&SystemStatus::default());
        assert_eq!(view.summary, DiagnosticLevel::Stale);
        assert!(!view.can_start());
    }
}
