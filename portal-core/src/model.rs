use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque record id. The collaborator mixes uuids, integers and synthetic
/// keys (national helplines), so every id is kept as a string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => EntityId(s),
            Raw::Int(n) => EntityId(n.to_string()),
        })
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Low,
    Medium,
    High,
    Critical,
}

impl Criticality {
    pub const ALL: [Criticality; 4] = [
        Criticality::Low,
        Criticality::Medium,
        Criticality::High,
        Criticality::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::Low => "low",
            Criticality::Medium => "medium",
            Criticality::High => "high",
            Criticality::Critical => "critical",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Criticality::Low => "Low",
            Criticality::Medium => "Medium",
            Criticality::High => "High",
            Criticality::Critical => "Critical",
        }
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Criticality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Criticality::Low),
            "medium" => Ok(Criticality::Medium),
            "high" => Ok(Criticality::High),
            "critical" => Ok(Criticality::Critical),
            other => Err(format!("invalid criticality '{other}'")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 4] = [
        IncidentStatus::Open,
        IncidentStatus::InProgress,
        IncidentStatus::Resolved,
        IncidentStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::InProgress => "in_progress",
            IncidentStatus::Resolved => "resolved",
            IncidentStatus::Closed => "closed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "Open",
            IncidentStatus::InProgress => "In Progress",
            IncidentStatus::Resolved => "Resolved",
            IncidentStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "open" => Ok(IncidentStatus::Open),
            "in_progress" => Ok(IncidentStatus::InProgress),
            "resolved" => Ok(IncidentStatus::Resolved),
            "closed" => Ok(IncidentStatus::Closed),
            other => Err(format!("invalid status '{other}'")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: EntityId,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub address: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: EntityId,
    pub site: EntityId,
    #[serde(default)]
    pub site_name: Option<String>,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub designation: String,
    pub phone_number: String,
}

/// Numbers the collaborator prepends to every site's contact lookup.
pub const NATIONAL_HELPLINES: [&str; 4] = ["100", "101", "102", "1098"];

impl EmergencyContact {
    pub fn is_national_helpline(&self) -> bool {
        NATIONAL_HELPLINES.contains(&self.phone_number.trim())
    }

    pub fn tel_link(&self) -> String {
        format!("tel:{}", self.phone_number.trim())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncidentType {
    pub id: EntityId,
    pub site: EntityId,
    pub name: String,
    pub display_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default = "default_true")]
    pub requires_criticality: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl IncidentType {
    pub fn blurb(&self) -> &str {
        if self.description.trim().is_empty() {
            "Report an incident or provide feedback"
        } else {
            &self.description
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncidentImage {
    #[serde(alias = "image")]
    pub image_url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "IncidentWire")]
pub struct Incident {
    pub id: EntityId,
    pub site: EntityId,
    pub site_name: Option<String>,
    pub incident_type: EntityId,
    pub incident_type_display: Option<String>,
    pub criticality: Option<Criticality>,
    pub description: String,
    pub images: Vec<IncidentImage>,
    pub is_anonymous: bool,
    pub reporter_name: Option<String>,
    pub reporter_phone: Option<String>,
    pub status: IncidentStatus,
    pub created_at: Option<DateTime<Utc>>,
}

impl Incident {
    pub fn reporter_label(&self) -> &str {
        if self.is_anonymous {
            "Anonymous"
        } else {
            self.reporter_name.as_deref().unwrap_or("Unknown")
        }
    }
}

#[derive(Deserialize)]
struct IncidentWire {
    id: EntityId,
    site: EntityId,
    #[serde(default)]
    site_name: Option<String>,
    incident_type: EntityId,
    #[serde(default)]
    incident_type_display: Option<String>,
    #[serde(default)]
    criticality: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    description: String,
    #[serde(default)]
    images: Vec<IncidentImage>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    is_anonymous: bool,
    #[serde(default)]
    reporter_name: Option<String>,
    #[serde(default)]
    reporter_phone: Option<String>,
    #[serde(default)]
    status: IncidentStatus,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl From<IncidentWire> for Incident {
    fn from(wire: IncidentWire) -> Self {
        let mut images = wire.images;
        if let Some(url) = wire.image.filter(|u| !u.trim().is_empty()) {
            if !images.iter().any(|i| i.image_url == url) {
                images.insert(
                    0,
                    IncidentImage {
                        image_url: url,
                        caption: None,
                    },
                );
            }
        }

        let (reporter_name, reporter_phone) = if wire.is_anonymous {
            (None, None)
        } else {
            (
                wire.reporter_name.filter(|s| !s.trim().is_empty()),
                wire.reporter_phone.filter(|s| !s.trim().is_empty()),
            )
        };

        Incident {
            id: wire.id,
            site: wire.site,
            site_name: wire.site_name,
            incident_type: wire.incident_type,
            incident_type_display: wire.incident_type_display,
            criticality: wire.criticality.as_deref().and_then(|c| c.parse().ok()),
            description: wire.description,
            images,
            is_anonymous: wire.is_anonymous,
            reporter_name,
            reporter_phone,
            status: wire.status,
            created_at: wire.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotificationEmail {
    pub id: EntityId,
    pub email: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Answer of the session probe and of login.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthStatus {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub username: String,
}

impl AuthStatus {
    pub fn display_name(&self) -> Option<&str> {
        self.username
            .as_deref()
            .or_else(|| self.user.as_ref().map(|u| u.username.as_str()))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteDraft {
    pub name: String,
    pub address: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactDraft {
    pub site: Option<EntityId>,
    pub name: String,
    pub designation: String,
    pub phone_number: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncidentTypeDraft {
    pub site: Option<EntityId>,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub requires_criticality: bool,
    pub is_active: bool,
    pub order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Default for IncidentTypeDraft {
    fn default() -> Self {
        Self {
            site: None,
            name: String::new(),
            display_name: String::new(),
            description: String::new(),
            requires_criticality: true,
            is_active: true,
            order: 0,
            icon: None,
            color: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationEmailDraft {
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_numbers_and_strings() {
        let a: EntityId = serde_json::from_value(serde_json::json!(7)).expect("int id");
        let b: EntityId = serde_json::from_value(serde_json::json!("national-police")).expect("str id");
        assert_eq!(a.as_str(), "7");
        assert_eq!(b.as_str(), "national-police");
    }

    #[test]
    fn legacy_single_image_is_folded_into_images() {
        let incident: Incident = serde_json::from_value(serde_json::json!({
            "id": "i-1",
            "site": "s-1",
            "incident_type": "near_miss",
            "criticality": "high",
            "description": "loose railing",
            "image": "/media/incident_images/a.jpg",
            "is_anonymous": true,
            "reporter_name": "should be dropped",
            "status": "in_progress"
        }))
        .expect("incident");

        assert_eq!(incident.images.len(), 1);
        assert_eq!(incident.images[0].image_url, "/media/incident_images/a.jpg");
        assert_eq!(incident.criticality, Some(Criticality::High));
        assert_eq!(incident.status, IncidentStatus::InProgress);
        assert!(incident.reporter_name.is_none());
        assert_eq!(incident.reporter_label(), "Anonymous");
    }

    #[test]
    fn blank_criticality_reads_as_absent() {
        let incident: Incident = serde_json::from_value(serde_json::json!({
            "id": 1,
            "site": 2,
            "incident_type": 3,
            "criticality": "",
            "description": "feedback",
            "images": [{"image_url": "/media/x.jpg", "caption": "left side"}]
        }))
        .expect("incident");
        assert_eq!(incident.criticality, None);
        assert_eq!(incident.status, IncidentStatus::Open);
        assert_eq!(incident.images[0].caption.as_deref(), Some("left side"));
    }

    #[test]
    fn incident_type_defaults_when_fields_missing() {
        let t: IncidentType = serde_json::from_value(serde_json::json!({
            "id": 4,
            "site": 1,
            "name": "near_miss",
            "display_name": "Near Miss",
            "description": null
        }))
        .expect("type");
        assert!(t.requires_criticality);
        assert!(t.is_active);
        assert_eq!(t.blurb(), "Report an incident or provide feedback");
    }

    #[test]
    fn status_parses_loose_spellings() {
        assert_eq!("In Progress".parse::<IncidentStatus>(), Ok(IncidentStatus::InProgress));
        assert_eq!("in-progress".parse::<IncidentStatus>(), Ok(IncidentStatus::InProgress));
        assert!("done".parse::<IncidentStatus>().is_err());
    }

    #[test]
    fn national_helplines_are_recognised_by_number() {
        let c = EmergencyContact {
            id: "national-fire".into(),
            site: "s-1".into(),
            site_name: Some("National Emergency".into()),
            name: "Fire Brigade".into(),
            designation: "Fire Emergency".into(),
            phone_number: "101".into(),
        };
        assert!(c.is_national_helpline());
        assert_eq!(c.tel_link(), "tel:101");
    }
}
