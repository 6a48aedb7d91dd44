//! Public incident report form and its submission lifecycle.

use crate::api::{PortalClient, Transport};
use crate::error::{ApiError, ApiResult};
use crate::model::{Criticality, EntityId, Incident, IncidentType};
use crate::upload::{ImageFile, MultipartForm, PendingImages, IMAGE_FIELD};
use crate::validation::{require, FieldErrors, DESCRIPTION_MAX_CHARS, NON_FIELD};
use tracing::{debug, info};

pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_CRITICALITY: &str = "criticality";
pub const FIELD_REPORTER_NAME: &str = "reporter_name";
pub const FIELD_REPORTER_PHONE: &str = "reporter_phone";
pub const FIELD_IMAGES: &str = IMAGE_FIELD;

#[derive(Clone, Debug, PartialEq)]
pub enum SubmissionPhase {
    Idle,
    Validating,
    Submitting,
    Submitted(Box<Incident>),
    /// Server refused or could not be reached; the message is for display.
    Error(String),
}

impl SubmissionPhase {
    pub fn is_busy(&self) -> bool {
        matches!(self, SubmissionPhase::Validating | SubmissionPhase::Submitting)
    }
}

/// Which inputs the form shows. Typing into a field never changes it, so a
/// view keyed on it survives keystrokes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormLayout {
    pub title: String,
    pub requires_criticality: bool,
    pub is_anonymous: bool,
    pub image_count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IncidentForm {
    site: EntityId,
    incident_type: EntityId,
    type_title: String,
    requires_criticality: bool,
    description: String,
    criticality: Criticality,
    images: PendingImages,
    is_anonymous: bool,
    reporter_name: String,
    reporter_phone: String,
    errors: FieldErrors,
    phase: SubmissionPhase,
}

impl IncidentForm {
    /// A fresh form bound to one site and one incident type.
    pub fn new(site: EntityId, incident_type: &IncidentType) -> Self {
        Self {
            site,
            incident_type: incident_type.id.clone(),
            type_title: incident_type.display_name.clone(),
            requires_criticality: incident_type.requires_criticality,
            description: String::new(),
            criticality: Criticality::Medium,
            images: PendingImages::new(),
            is_anonymous: false,
            reporter_name: String::new(),
            reporter_phone: String::new(),
            errors: FieldErrors::new(),
            phase: SubmissionPhase::Idle,
        }
    }

    pub fn title(&self) -> String {
        format!("Report {}", self.type_title)
    }

    pub fn layout(&self) -> FormLayout {
        FormLayout {
            title: self.title(),
            requires_criticality: self.requires_criticality,
            is_anonymous: self.is_anonymous,
            image_count: self.images.len(),
        }
    }

    pub fn site(&self) -> &EntityId {
        &self.site
    }

    pub fn incident_type(&self) -> &EntityId {
        &self.incident_type
    }

    pub fn requires_criticality(&self) -> bool {
        self.requires_criticality
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn criticality(&self) -> Criticality {
        self.criticality
    }

    pub fn images(&self) -> &PendingImages {
        &self.images
    }

    pub fn is_anonymous(&self) -> bool {
        self.is_anonymous
    }

    pub fn reporter_name(&self) -> &str {
        &self.reporter_name
    }

    pub fn reporter_phone(&self) -> &str {
        &self.reporter_phone
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field)
    }

    pub fn phase(&self) -> &SubmissionPhase {
        &self.phase
    }

    /// Length of the description as it will be sent, surrounding
    /// whitespace excluded.
    pub fn description_chars(&self) -> usize {
        self.description.trim().chars().count()
    }

    fn touched(&mut self, field: &str) {
        self.errors.clear(field);
        self.errors.clear(NON_FIELD);
        if matches!(self.phase, SubmissionPhase::Error(_)) {
            self.phase = SubmissionPhase::Idle;
        }
    }

    pub fn set_description(&mut self, value: impl Into<String>) {
        self.description = value.into();
        self.touched(FIELD_DESCRIPTION);
    }

    pub fn set_criticality(&mut self, value: Criticality) {
        self.criticality = value;
        self.touched(FIELD_CRITICALITY);
    }

    /// Switching to anonymous drops reporter errors along with the need for
    /// the fields.
    pub fn set_anonymous(&mut self, value: bool) {
        self.is_anonymous = value;
        self.touched(FIELD_REPORTER_NAME);
        self.errors.clear(FIELD_REPORTER_PHONE);
    }

    pub fn set_reporter_name(&mut self, value: impl Into<String>) {
        self.reporter_name = value.into();
        self.touched(FIELD_REPORTER_NAME);
    }

    pub fn set_reporter_phone(&mut self, value: impl Into<String>) {
        self.reporter_phone = value.into();
        self.touched(FIELD_REPORTER_PHONE);
    }

    /// Picked or captured photo; the preview is available right away.
    pub fn add_image(&mut self, file: ImageFile) -> usize {
        self.touched(FIELD_IMAGES);
        self.images.add(file)
    }

    pub fn remove_image(&mut self, index: usize) -> Option<ImageFile> {
        self.touched(FIELD_IMAGES);
        self.images.remove(index)
    }

    /// Field-scoped problems of the current values; empty means submittable.
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require(
            &mut errors,
            FIELD_DESCRIPTION,
            &self.description,
            "Description is required",
        );
        if self.description_chars() > DESCRIPTION_MAX_CHARS {
            errors.insert(
                FIELD_DESCRIPTION,
                format!("Description must be at most {DESCRIPTION_MAX_CHARS} characters"),
            );
        }
        if !self.is_anonymous {
            require(
                &mut errors,
                FIELD_REPORTER_NAME,
                &self.reporter_name,
                "Name is required when not anonymous",
            );
            require(
                &mut errors,
                FIELD_REPORTER_PHONE,
                &self.reporter_phone,
                "Phone number is required when not anonymous",
            );
        }
        errors
    }

    /// The multipart body the create call carries.
    pub fn payload(&self) -> MultipartForm {
        let mut form = MultipartForm::new()
            .text("site", self.site.as_str())
            .text("incident_type", self.incident_type.as_str())
            .text(FIELD_DESCRIPTION, self.description.trim());
        if self.requires_criticality {
            form = form.text(FIELD_CRITICALITY, self.criticality.as_str());
        }
        form = form.text("is_anonymous", if self.is_anonymous { "true" } else { "false" });
        if !self.is_anonymous {
            form = form
                .text(FIELD_REPORTER_NAME, self.reporter_name.trim())
                .text(FIELD_REPORTER_PHONE, self.reporter_phone.trim());
        }
        for file in self.images.files() {
            form = form.file(IMAGE_FIELD, file.clone());
        }
        form
    }

    /// Validates and, when clean, moves to `Submitting` and hands back the
    /// payload. `None` means nothing should be sent.
    pub fn begin_submit(&mut self) -> Option<MultipartForm> {
        if self.phase.is_busy() || matches!(self.phase, SubmissionPhase::Submitted(_)) {
            return None;
        }
        self.phase = SubmissionPhase::Validating;
        let errors = self.validate();
        if !errors.is_empty() {
            debug!(fields = errors.len(), "incident form rejected locally");
            self.errors = errors;
            self.phase = SubmissionPhase::Idle;
            return None;
        }
        self.errors.clear_all();
        self.phase = SubmissionPhase::Submitting;
        Some(self.payload())
    }

    pub fn finish_submit(&mut self, result: ApiResult<Incident>) {
        match result {
            Ok(incident) => {
                info!(incident = %incident.id, site = %self.site, "incident submitted");
                self.phase = SubmissionPhase::Submitted(Box::new(incident));
            }
            Err(ApiError::Validation(server)) => {
                self.errors.merge(server);
                self.phase = SubmissionPhase::Error(
                    "Please correct the highlighted fields and try again.".into(),
                );
            }
            Err(err) => {
                self.phase = SubmissionPhase::Error(
                    "Failed to submit your report. Please try again.".into(),
                );
                debug!(error = %err, "incident submission failed");
            }
        }
    }

    /// Runs the whole flow against `client`; true when the report was stored.
    pub async fn submit<T: Transport>(&mut self, client: &PortalClient<T>) -> bool {
        let Some(form) = self.begin_submit() else {
            return false;
        };
        let result = client.create_incident(form).await;
        self.finish_submit(result);
        matches!(self.phase, SubmissionPhase::Submitted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Body, Method};
    use crate::testing::ScriptedTransport;
    use futures::executor::block_on;

    fn incident_type(requires_criticality: bool) -> IncidentType {
        let (name, display_name) = if requires_criticality {
            ("near_miss", "Near Miss")
        } else {
            ("general_feedback", "General Feedback")
        };
        serde_json::from_value(serde_json::json!({
            "id": 3,
            "site": 1,
            "name": name,
            "display_name": display_name,
            "requires_criticality": requires_criticality,
        }))
        .expect("type")
    }

    fn stored_incident() -> serde_json::Value {
        serde_json::json!({"id": 11, "site": 1, "incident_type": 3, "description": "Oil spill"})
    }

    fn filled(requires_criticality: bool) -> IncidentForm {
        let mut form = IncidentForm::new("1".into(), &incident_type(requires_criticality));
        form.set_description("Oil spill near dock 3");
        form.set_reporter_name("Asha");
        form.set_reporter_phone("+919876543210");
        form
    }

    #[test]
    fn type_without_criticality_sends_no_criticality() {
        let mut form = filled(false);
        let payload = form.begin_submit().expect("payload");
        assert!(!payload.has_field(FIELD_CRITICALITY));
        assert_eq!(form.phase(), &SubmissionPhase::Submitting);
    }

    #[test]
    fn criticality_defaults_to_medium_when_required() {
        let mut form = filled(true);
        let payload = form.begin_submit().expect("payload");
        assert_eq!(payload.field(FIELD_CRITICALITY), Some("medium"));
    }

    #[test]
    fn anonymous_reports_skip_reporter_fields() {
        let mut form = IncidentForm::new("1".into(), &incident_type(true));
        form.set_description("Loose railing");
        form.set_anonymous(true);
        let payload = form.begin_submit().expect("payload");
        assert_eq!(payload.field("is_anonymous"), Some("true"));
        assert!(!payload.has_field(FIELD_REPORTER_NAME));
        assert!(!payload.has_field(FIELD_REPORTER_PHONE));
    }

    #[test]
    fn named_reports_need_name_and_phone() {
        let mut form = IncidentForm::new("1".into(), &incident_type(true));
        form.set_description("Loose railing");
        form.set_reporter_name("   ");
        assert!(form.begin_submit().is_none());
        assert_eq!(form.phase(), &SubmissionPhase::Idle);
        assert!(form.error(FIELD_REPORTER_NAME).is_some());
        assert!(form.error(FIELD_REPORTER_PHONE).is_some());

        form.set_reporter_name("Ravi");
        assert!(form.error(FIELD_REPORTER_NAME).is_none());
        assert!(form.error(FIELD_REPORTER_PHONE).is_some());
    }

    #[test]
    fn typing_leaves_the_layout_alone() {
        let mut form = filled(true);
        let layout = form.layout();
        form.set_description("Oil spill near dock 3, spreading");
        form.set_reporter_name("Asha K");
        form.set_reporter_phone("+919876543211");
        form.set_criticality(Criticality::High);
        assert_eq!(form.layout(), layout);

        form.set_anonymous(true);
        assert!(form.layout().is_anonymous);
        form.add_image(ImageFile::new("a.jpg", "image/jpeg", vec![1]));
        assert_eq!(form.layout().image_count, 1);
        form.remove_image(0);
        assert_eq!(form.layout().image_count, 0);
    }

    #[test]
    fn description_length_limit_is_inclusive() {
        let mut form = filled(true);
        form.set_description("a".repeat(DESCRIPTION_MAX_CHARS));
        assert!(form.validate().is_empty());
        form.set_description("a".repeat(DESCRIPTION_MAX_CHARS + 1));
        assert!(form.validate().contains(FIELD_DESCRIPTION));
    }

    #[test]
    fn trailing_whitespace_does_not_count_towards_the_limit() {
        let mut form = filled(true);
        form.set_description(format!("{}\n  ", "a".repeat(DESCRIPTION_MAX_CHARS)));
        assert_eq!(form.description_chars(), DESCRIPTION_MAX_CHARS);
        assert!(form.validate().is_empty());
        let payload = form.begin_submit().expect("payload");
        assert_eq!(
            payload.field(FIELD_DESCRIPTION).map(|d| d.chars().count()),
            Some(DESCRIPTION_MAX_CHARS)
        );
    }

    #[test]
    fn blank_description_is_rejected() {
        let mut form = filled(true);
        form.set_description(" \n ");
        assert!(form.begin_submit().is_none());
        assert_eq!(form.error(FIELD_DESCRIPTION), Some("Description is required"));
    }

    #[test]
    fn images_go_in_repeated_parts_in_order() {
        let mut form = filled(true);
        form.add_image(ImageFile::new("a.jpg", "image/jpeg", vec![1]));
        form.add_image(ImageFile::new("b.jpg", "image/jpeg", vec![2]));
        form.add_image(ImageFile::new("c.jpg", "image/jpeg", vec![3]));
        form.remove_image(0);
        let payload = form.payload();
        let names: Vec<_> = payload
            .files_named(IMAGE_FIELD)
            .map(|f| f.file_name.as_str())
            .collect();
        assert_eq!(names, vec!["b.jpg", "c.jpg"]);
    }

    #[test]
    fn successful_submit_reaches_submitted() {
        let client = PortalClient::new(ScriptedTransport::new());
        client
            .transport()
            .respond_json(Method::Post, "/incidents/", 201, stored_incident());
        let mut form = filled(true);

        assert!(block_on(form.submit(&client)));
        assert!(matches!(form.phase(), SubmissionPhase::Submitted(_)));
        let sent = client.transport().requests();
        assert!(matches!(sent[0].body, Body::Multipart(_)));
        // A submitted form does not send twice.
        assert!(!block_on(form.submit(&client)));
        assert_eq!(client.transport().count(Method::Post, "/incidents/"), 1);
    }

    #[test]
    fn server_field_errors_are_merged_and_cleared_on_edit() {
        let client = PortalClient::new(ScriptedTransport::new());
        client.transport().respond_json(
            Method::Post,
            "/incidents/",
            400,
            serde_json::json!({"reporter_phone": ["Enter a valid phone number."]}),
        );
        let mut form = filled(true);

        assert!(!block_on(form.submit(&client)));
        assert!(matches!(form.phase(), SubmissionPhase::Error(_)));
        assert_eq!(form.error(FIELD_REPORTER_PHONE), Some("Enter a valid phone number."));

        form.set_reporter_phone("+919876500000");
        assert_eq!(form.phase(), &SubmissionPhase::Idle);
        assert!(form.errors().is_empty());
    }

    #[test]
    fn network_failure_keeps_the_form_editable() {
        let client = PortalClient::new(ScriptedTransport::new());
        let mut form = filled(true);
        assert!(!block_on(form.submit(&client)));
        let SubmissionPhase::Error(message) = form.phase() else {
            panic!("expected error phase");
        };
        assert!(message.contains("try again"));
        assert_eq!(form.description(), "Oil spill near dock 3");
        assert!(form.begin_submit().is_some());
    }
}
