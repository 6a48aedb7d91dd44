//! Admin CRUD screens. Every managed entity follows the same contract
//! (list, create, edit, confirmed delete, refetch after mutation); the
//! entity-specific parts live in a [`Resource`] impl.

use crate::api::{PortalClient, Transport};
use crate::error::{ApiError, ApiResult};
use crate::model::{
    ContactDraft, EmergencyContact, EntityId, IncidentType, IncidentTypeDraft, NotificationEmail,
    NotificationEmailDraft, Site, SiteDraft,
};
use crate::validation::{is_valid_email, is_valid_phone, require, FieldErrors, NON_FIELD};
use std::cmp::Ordering;
use std::fmt::Debug;
use tracing::{info, warn};

#[allow(async_fn_in_trait)]
pub trait Resource {
    type Record: Clone + Debug + PartialEq;
    type Draft: Clone + Debug + Default + PartialEq;

    /// Lowercase singular noun for messages ("site").
    const NOUN: &'static str;

    fn id(record: &Self::Record) -> &EntityId;

    /// Stable list ordering.
    fn compare(a: &Self::Record, b: &Self::Record) -> Ordering;

    fn draft_from(record: &Self::Record) -> Self::Draft;

    /// Local checks run before any call.
    fn validate(draft: &Self::Draft) -> FieldErrors;

    /// Site the record belongs to, for screens filtered by site.
    fn site_of(_record: &Self::Record) -> Option<&EntityId> {
        None
    }

    /// Pre-selects the site of a new draft when the screen is filtered.
    fn prefill_site(_draft: &mut Self::Draft, _site: &EntityId) {}

    /// Rewrites server field errors into what the screen shows.
    fn server_errors(errors: FieldErrors) -> FieldErrors {
        errors
    }

    async fn list<T: Transport>(client: &PortalClient<T>) -> ApiResult<Vec<Self::Record>>;

    async fn create<T: Transport>(
        client: &PortalClient<T>,
        draft: &Self::Draft,
    ) -> ApiResult<Self::Record>;

    async fn update<T: Transport>(
        client: &PortalClient<T>,
        id: &EntityId,
        draft: &Self::Draft,
    ) -> ApiResult<Self::Record>;

    async fn delete<T: Transport>(client: &PortalClient<T>, id: &EntityId) -> ApiResult<()>;
}

/// The create/edit modal.
#[derive(Clone, Debug, PartialEq)]
pub struct Editor<R: Resource> {
    id: Option<EntityId>,
    draft: R::Draft,
    errors: FieldErrors,
    saving: bool,
}

impl<R: Resource> Editor<R> {
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    pub fn draft(&self) -> &R::Draft {
        &self.draft
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field)
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Edits one field of the draft and drops that field's error.
    pub fn edit(&mut self, field: &str, apply: impl FnOnce(&mut R::Draft)) {
        apply(&mut self.draft);
        self.errors.clear(field);
        self.errors.clear(NON_FIELD);
    }

    pub fn title(&self) -> String {
        let verb = if self.is_new() { "Add" } else { "Edit" };
        let mut noun = R::NOUN.to_string();
        if let Some(first) = noun.get_mut(..1) {
            first.make_ascii_uppercase();
        }
        format!("{verb} {noun}")
    }
}

/// A save the screen has validated and is about to send.
#[derive(Clone, Debug, PartialEq)]
pub struct SaveRequest<D> {
    pub id: Option<EntityId>,
    pub draft: D,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CrudScreen<R: Resource> {
    records: Vec<R::Record>,
    editor: Option<Editor<R>>,
    pending_delete: Option<EntityId>,
    site_filter: Option<EntityId>,
    error: Option<String>,
    loading: bool,
}

impl<R: Resource> Default for CrudScreen<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            editor: None,
            pending_delete: None,
            site_filter: None,
            error: None,
            loading: false,
        }
    }
}

impl<R: Resource> CrudScreen<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[R::Record] {
        &self.records
    }

    pub fn record(&self, id: &EntityId) -> Option<&R::Record> {
        self.records.iter().find(|r| R::id(r) == id)
    }

    /// Sorted, and narrowed to the selected site when one is set.
    pub fn visible(&self) -> Vec<&R::Record> {
        let mut rows: Vec<&R::Record> = self
            .records
            .iter()
            .filter(|r| match (&self.site_filter, R::site_of(r)) {
                (Some(wanted), Some(site)) => wanted == site,
                _ => true,
            })
            .collect();
        rows.sort_by(|a, b| R::compare(a, b));
        rows
    }

    pub fn site_filter(&self) -> Option<&EntityId> {
        self.site_filter.as_ref()
    }

    pub fn set_site_filter(&mut self, site: Option<EntityId>) {
        self.site_filter = site;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn editor(&self) -> Option<&Editor<R>> {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut Editor<R>> {
        self.editor.as_mut()
    }

    pub fn pending_delete(&self) -> Option<&EntityId> {
        self.pending_delete.as_ref()
    }

    pub fn begin_load(&mut self) {
        self.loading = true;
    }

    /// A failed fetch keeps the previous rows. Only `Unauthorized` is
    /// handed back to the caller.
    pub fn finish_load(&mut self, result: ApiResult<Vec<R::Record>>) -> ApiResult<()> {
        self.loading = false;
        match result {
            Ok(records) => {
                self.records = records;
                self.error = None;
                Ok(())
            }
            Err(err) if err.is_unauthorized() => Err(err),
            Err(err) => {
                warn!(resource = R::NOUN, error = %err, "list failed");
                self.error = Some(format!("Failed to load {}s", R::NOUN));
                Ok(())
            }
        }
    }

    pub async fn load<T: Transport>(&mut self, client: &PortalClient<T>) -> ApiResult<()> {
        self.begin_load();
        let result = R::list(client).await;
        self.finish_load(result)
    }

    pub fn open_create(&mut self) {
        let mut draft = R::Draft::default();
        if let Some(site) = &self.site_filter {
            R::prefill_site(&mut draft, site);
        }
        self.editor = Some(Editor {
            id: None,
            draft,
            errors: FieldErrors::new(),
            saving: false,
        });
    }

    /// Opens the editor pre-filled from an existing row.
    pub fn open_edit(&mut self, id: &EntityId) -> bool {
        let Some(record) = self.record(id) else {
            return false;
        };
        self.editor = Some(Editor {
            id: Some(id.clone()),
            draft: R::draft_from(record),
            errors: FieldErrors::new(),
            saving: false,
        });
        true
    }

    pub fn close_editor(&mut self) {
        self.editor = None;
    }

    /// Validates the open editor. `None` when there is nothing to send.
    pub fn begin_save(&mut self) -> Option<SaveRequest<R::Draft>> {
        let editor = self.editor.as_mut()?;
        if editor.saving {
            return None;
        }
        let errors = R::validate(&editor.draft);
        if !errors.is_empty() {
            editor.errors = errors;
            return None;
        }
        editor.errors.clear_all();
        editor.saving = true;
        Some(SaveRequest {
            id: editor.id.clone(),
            draft: editor.draft.clone(),
        })
    }

    /// `Ok(true)` when stored; the caller then refetches.
    pub fn finish_save(&mut self, result: ApiResult<R::Record>) -> ApiResult<bool> {
        let Some(editor) = self.editor.as_mut() else {
            return result.map(|_| true);
        };
        editor.saving = false;
        match result {
            Ok(record) => {
                info!(resource = R::NOUN, id = %R::id(&record), "saved");
                self.editor = None;
                Ok(true)
            }
            Err(ApiError::Validation(server)) => {
                editor.errors.merge(R::server_errors(server));
                Ok(false)
            }
            Err(err) if err.is_unauthorized() => Err(err),
            Err(err) => {
                warn!(resource = R::NOUN, error = %err, "save failed");
                editor
                    .errors
                    .insert(NON_FIELD, format!("Failed to save {}", R::NOUN));
                Ok(false)
            }
        }
    }

    pub async fn save<T: Transport>(&mut self, client: &PortalClient<T>) -> ApiResult<bool> {
        let Some(request) = self.begin_save() else {
            return Ok(false);
        };
        let result = match &request.id {
            Some(id) => R::update(client, id, &request.draft).await,
            None => R::create(client, &request.draft).await,
        };
        let saved = self.finish_save(result)?;
        if saved {
            self.load(client).await?;
        }
        Ok(saved)
    }

    /// First step of deletion: remember what to delete and ask.
    pub fn request_delete(&mut self, id: &EntityId) -> bool {
        if self.record(id).is_none() {
            return false;
        }
        self.pending_delete = Some(id.clone());
        true
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// The confirmed id, consumed.
    pub fn begin_delete(&mut self) -> Option<EntityId> {
        self.pending_delete.take()
    }

    pub fn finish_delete(&mut self, result: ApiResult<()>) -> ApiResult<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(err) if err.is_unauthorized() => Err(err),
            Err(err) => {
                warn!(resource = R::NOUN, error = %err, "delete failed");
                self.error = Some(format!("Failed to delete {}", R::NOUN));
                Ok(false)
            }
        }
    }

    /// Deletes the confirmed row, then refetches.
    pub async fn confirm_delete<T: Transport>(&mut self, client: &PortalClient<T>) -> ApiResult<bool> {
        let Some(id) = self.begin_delete() else {
            return Ok(false);
        };
        let result = R::delete(client, &id).await;
        let deleted = self.finish_delete(result)?;
        if deleted {
            self.load(client).await?;
        }
        Ok(deleted)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sites;

impl Resource for Sites {
    type Record = Site;
    type Draft = SiteDraft;
    const NOUN: &'static str = "site";

    fn id(record: &Site) -> &EntityId {
        &record.id
    }

    fn compare(a: &Site, b: &Site) -> Ordering {
        a.name.to_lowercase().cmp(&b.name.to_lowercase())
    }

    fn draft_from(record: &Site) -> SiteDraft {
        SiteDraft {
            name: record.name.clone(),
            address: record.address.clone(),
        }
    }

    fn validate(draft: &SiteDraft) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require(&mut errors, "name", &draft.name, "Site name is required");
        require(&mut errors, "address", &draft.address, "Site address is required");
        errors
    }

    async fn list<T: Transport>(client: &PortalClient<T>) -> ApiResult<Vec<Site>> {
        client.sites().await
    }

    async fn create<T: Transport>(client: &PortalClient<T>, draft: &SiteDraft) -> ApiResult<Site> {
        client.create_site(draft).await
    }

    async fn update<T: Transport>(
        client: &PortalClient<T>,
        id: &EntityId,
        draft: &SiteDraft,
    ) -> ApiResult<Site> {
        client.update_site(id, draft).await
    }

    async fn delete<T: Transport>(client: &PortalClient<T>, id: &EntityId) -> ApiResult<()> {
        client.delete_site(id).await
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Contacts;

impl Resource for Contacts {
    type Record = EmergencyContact;
    type Draft = ContactDraft;
    const NOUN: &'static str = "contact";

    fn id(record: &EmergencyContact) -> &EntityId {
        &record.id
    }

    fn compare(a: &EmergencyContact, b: &EmergencyContact) -> Ordering {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    }

    fn draft_from(record: &EmergencyContact) -> ContactDraft {
        ContactDraft {
            site: Some(record.site.clone()),
            name: record.name.clone(),
            designation: record.designation.clone(),
            phone_number: record.phone_number.clone(),
        }
    }

    fn validate(draft: &ContactDraft) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require(&mut errors, "name", &draft.name, "Name is required");
        require(
            &mut errors,
            "designation",
            &draft.designation,
            "Designation is required",
        );
        if draft.phone_number.trim().is_empty() {
            errors.insert("phone_number", "Phone number is required");
        } else if !is_valid_phone(&draft.phone_number) {
            errors.insert(
                "phone_number",
                "Enter a valid phone number (9 to 15 digits, optional leading +)",
            );
        }
        if draft.site.is_none() {
            errors.insert("site", "Site is required");
        }
        errors
    }

    fn site_of(record: &EmergencyContact) -> Option<&EntityId> {
        Some(&record.site)
    }

    fn prefill_site(draft: &mut ContactDraft, site: &EntityId) {
        draft.site = Some(site.clone());
    }

    async fn list<T: Transport>(client: &PortalClient<T>) -> ApiResult<Vec<EmergencyContact>> {
        client.contacts(None).await
    }

    async fn create<T: Transport>(
        client: &PortalClient<T>,
        draft: &ContactDraft,
    ) -> ApiResult<EmergencyContact> {
        client.create_contact(draft).await
    }

    async fn update<T: Transport>(
        client: &PortalClient<T>,
        id: &EntityId,
        draft: &ContactDraft,
    ) -> ApiResult<EmergencyContact> {
        client.update_contact(id, draft).await
    }

    async fn delete<T: Transport>(client: &PortalClient<T>, id: &EntityId) -> ApiResult<()> {
        client.delete_contact(id).await
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IncidentTypes;

impl Resource for IncidentTypes {
    type Record = IncidentType;
    type Draft = IncidentTypeDraft;
    const NOUN: &'static str = "incident type";

    fn id(record: &IncidentType) -> &EntityId {
        &record.id
    }

    fn compare(a: &IncidentType, b: &IncidentType) -> Ordering {
        a.order
            .cmp(&b.order)
            .then_with(|| a.display_name.cmp(&b.display_name))
    }

    fn draft_from(record: &IncidentType) -> IncidentTypeDraft {
        IncidentTypeDraft {
            site: Some(record.site.clone()),
            name: record.name.clone(),
            display_name: record.display_name.clone(),
            description: record.description.clone(),
            requires_criticality: record.requires_criticality,
            is_active: record.is_active,
            order: record.order,
            icon: record.icon.clone(),
            color: record.color.clone(),
        }
    }

    fn validate(draft: &IncidentTypeDraft) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if draft.site.is_none() {
            errors.insert("site", "Please select a site");
        }
        require(&mut errors, "name", &draft.name, "Name is required");
        require(
            &mut errors,
            "display_name",
            &draft.display_name,
            "Display name is required",
        );
        errors
    }

    fn site_of(record: &IncidentType) -> Option<&EntityId> {
        Some(&record.site)
    }

    fn prefill_site(draft: &mut IncidentTypeDraft, site: &EntityId) {
        draft.site = Some(site.clone());
    }

    async fn list<T: Transport>(client: &PortalClient<T>) -> ApiResult<Vec<IncidentType>> {
        client.incident_types(None).await
    }

    async fn create<T: Transport>(
        client: &PortalClient<T>,
        draft: &IncidentTypeDraft,
    ) -> ApiResult<IncidentType> {
        client.create_incident_type(draft).await
    }

    async fn update<T: Transport>(
        client: &PortalClient<T>,
        id: &EntityId,
        draft: &IncidentTypeDraft,
    ) -> ApiResult<IncidentType> {
        client.update_incident_type(id, draft).await
    }

    async fn delete<T: Transport>(client: &PortalClient<T>, id: &EntityId) -> ApiResult<()> {
        client.delete_incident_type(id).await
    }
}

impl CrudScreen<IncidentTypes> {
    /// The full update that flips `is_active`. History stays; the type just
    /// stops being offered publicly.
    pub fn begin_toggle(&self, id: &EntityId) -> Option<SaveRequest<IncidentTypeDraft>> {
        let record = self.record(id)?;
        let mut draft = IncidentTypes::draft_from(record);
        draft.is_active = !draft.is_active;
        Some(SaveRequest {
            id: Some(id.clone()),
            draft,
        })
    }

    /// `Ok(true)` when stored; the caller then refetches. Leaves the editor
    /// and everything else changed meanwhile alone.
    pub fn finish_toggle(&mut self, result: ApiResult<IncidentType>) -> ApiResult<bool> {
        match result {
            Ok(record) => {
                info!(id = %record.id, active = record.is_active, "incident type toggled");
                Ok(true)
            }
            Err(err) if err.is_unauthorized() => Err(err),
            Err(err) => {
                warn!(error = %err, "toggle failed");
                self.error = Some("Failed to update incident type".into());
                Ok(false)
            }
        }
    }

    pub async fn toggle_active<T: Transport>(
        &mut self,
        client: &PortalClient<T>,
        id: &EntityId,
    ) -> ApiResult<bool> {
        let Some(request) = self.begin_toggle(id) else {
            return Ok(false);
        };
        let result = client.update_incident_type(id, &request.draft).await;
        let stored = self.finish_toggle(result)?;
        if stored {
            self.load(client).await?;
        }
        Ok(stored)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NotificationEmails;

pub const ALREADY_REGISTERED: &str = "This email is already registered";

impl Resource for NotificationEmails {
    type Record = NotificationEmail;
    type Draft = NotificationEmailDraft;
    const NOUN: &'static str = "email";

    fn id(record: &NotificationEmail) -> &EntityId {
        &record.id
    }

    fn compare(a: &NotificationEmail, b: &NotificationEmail) -> Ordering {
        a.email.to_lowercase().cmp(&b.email.to_lowercase())
    }

    fn draft_from(record: &NotificationEmail) -> NotificationEmailDraft {
        NotificationEmailDraft {
            email: record.email.clone(),
        }
    }

    fn validate(draft: &NotificationEmailDraft) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if draft.email.trim().is_empty() {
            errors.insert("email", "Please enter an email address");
        } else if !is_valid_email(&draft.email) {
            errors.insert("email", "Please enter a valid email address");
        }
        errors
    }

    /// Any server complaint about the address is a uniqueness clash.
    fn server_errors(mut errors: FieldErrors) -> FieldErrors {
        if errors.contains("email") {
            errors.insert("email", ALREADY_REGISTERED);
        }
        errors
    }

    async fn list<T: Transport>(client: &PortalClient<T>) -> ApiResult<Vec<NotificationEmail>> {
        client.notification_emails().await
    }

    async fn create<T: Transport>(
        client: &PortalClient<T>,
        draft: &NotificationEmailDraft,
    ) -> ApiResult<NotificationEmail> {
        let draft = NotificationEmailDraft {
            email: draft.email.trim().to_string(),
        };
        client.create_notification_email(&draft).await
    }

    async fn update<T: Transport>(
        client: &PortalClient<T>,
        id: &EntityId,
        draft: &NotificationEmailDraft,
    ) -> ApiResult<NotificationEmail> {
        client.update_notification_email(id, draft).await
    }

    async fn delete<T: Transport>(client: &PortalClient<T>, id: &EntityId) -> ApiResult<()> {
        client.delete_notification_email(id).await
    }
}

pub type SiteScreen = CrudScreen<Sites>;
pub type ContactScreen = CrudScreen<Contacts>;
pub type IncidentTypeScreen = CrudScreen<IncidentTypes>;
pub type EmailScreen = CrudScreen<NotificationEmails>;
