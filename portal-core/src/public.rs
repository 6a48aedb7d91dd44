//! Per-site public feedback page: type chooser, report form, contacts lookup.

use crate::api::{PortalClient, Transport};
use crate::error::{ApiError, ApiResult};
use crate::model::{EmergencyContact, EntityId, IncidentType, Site};
use crate::submission::IncidentForm;
use tracing::warn;

/// Active types only, ascending by `order`; equal orders keep server order.
pub fn active_types_in_order(types: Vec<IncidentType>) -> Vec<IncidentType> {
    let mut active: Vec<IncidentType> = types.into_iter().filter(|t| t.is_active).collect();
    active.sort_by_key(|t| t.order);
    active
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeIcon {
    AlertTriangle,
    Shield,
    Eye,
    Send,
}

impl TypeIcon {
    fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "alert-triangle" | "alert" | "warning" => Some(TypeIcon::AlertTriangle),
            "shield" => Some(TypeIcon::Shield),
            "eye" => Some(TypeIcon::Eye),
            "send" => Some(TypeIcon::Send),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileColor {
    Red,
    Orange,
    Yellow,
    Blue,
    Gray,
}

impl TileColor {
    fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "red" => Some(TileColor::Red),
            "orange" => Some(TileColor::Orange),
            "yellow" => Some(TileColor::Yellow),
            "blue" => Some(TileColor::Blue),
            "gray" | "grey" => Some(TileColor::Gray),
            _ => None,
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            TileColor::Red => "bg-red-500",
            TileColor::Orange => "bg-orange-500",
            TileColor::Yellow => "bg-yellow-500",
            TileColor::Blue => "bg-blue-500",
            TileColor::Gray => "bg-gray-500",
        }
    }
}

/// Icon and colour of a chooser tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeVisual {
    pub icon: TypeIcon,
    pub color: TileColor,
}

impl TypeVisual {
    pub const DEFAULT: TypeVisual = TypeVisual {
        icon: TypeIcon::Send,
        color: TileColor::Gray,
    };

    fn for_name(name: &str) -> Option<Self> {
        let (icon, color) = match name {
            "unsafe_conditions" => (TypeIcon::AlertTriangle, TileColor::Red),
            "unsafe_actions" => (TypeIcon::Shield, TileColor::Orange),
            "near_miss" => (TypeIcon::Eye, TileColor::Yellow),
            "general_feedback" => (TypeIcon::Send, TileColor::Blue),
            _ => return None,
        };
        Some(TypeVisual { icon, color })
    }

    /// Server-provided icon/colour win; then the well-known type names;
    /// then the default.
    pub fn resolve(incident_type: &IncidentType) -> Self {
        let by_name = Self::for_name(&incident_type.name);
        let icon = incident_type
            .icon
            .as_deref()
            .and_then(TypeIcon::from_key)
            .or(by_name.map(|v| v.icon))
            .unwrap_or(Self::DEFAULT.icon);
        let color = incident_type
            .color
            .as_deref()
            .and_then(TileColor::from_key)
            .or(by_name.map(|v| v.color))
            .unwrap_or(Self::DEFAULT.color);
        TypeVisual { icon, color }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum ContactsLookup {
    #[default]
    Closed,
    Loading,
    Loaded {
        helplines: Vec<EmergencyContact>,
        site_contacts: Vec<EmergencyContact>,
    },
    Failed(String),
}

impl ContactsLookup {
    /// National helplines are listed apart from the site's own contacts.
    pub fn from_contacts(contacts: Vec<EmergencyContact>) -> Self {
        let (helplines, site_contacts): (Vec<_>, Vec<_>) = contacts
            .into_iter()
            .partition(EmergencyContact::is_national_helpline);
        ContactsLookup::Loaded {
            helplines,
            site_contacts,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, ContactsLookup::Closed)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum PageState {
    #[default]
    Loading,
    NotFound,
    /// Retryable.
    Failed(String),
    Ready,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PublicPage {
    site_id: EntityId,
    state: PageState,
    site: Option<Site>,
    types: Vec<IncidentType>,
    form: Option<IncidentForm>,
    submitted: bool,
    contacts: ContactsLookup,
}

impl PublicPage {
    pub fn new(site_id: EntityId) -> Self {
        Self {
            site_id,
            state: PageState::Loading,
            site: None,
            types: Vec::new(),
            form: None,
            submitted: false,
            contacts: ContactsLookup::Closed,
        }
    }

    pub fn site_id(&self) -> &EntityId {
        &self.site_id
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn site(&self) -> Option<&Site> {
        self.site.as_ref()
    }

    pub fn types(&self) -> &[IncidentType] {
        &self.types
    }

    pub fn tiles(&self) -> impl Iterator<Item = (&IncidentType, TypeVisual)> {
        self.types.iter().map(|t| (t, TypeVisual::resolve(t)))
    }

    pub fn form(&self) -> Option<&IncidentForm> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut IncidentForm> {
        self.form.as_mut()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn contacts(&self) -> &ContactsLookup {
        &self.contacts
    }

    pub fn begin_load(&mut self) {
        self.state = PageState::Loading;
    }

    pub fn finish_load(&mut self, site: ApiResult<Site>, types: ApiResult<Vec<IncidentType>>) {
        match (site, types) {
            (Err(err), _) if err.is_not_found() => {
                self.site = None;
                self.state = PageState::NotFound;
            }
            (Ok(site), Ok(types)) => {
                self.site = Some(site);
                self.types = active_types_in_order(types);
                self.state = PageState::Ready;
            }
            (Err(err), _) | (_, Err(err)) => {
                warn!(site = %self.site_id, error = %err, "public page failed to load");
                self.state = PageState::Failed(
                    "Failed to load site information. Please try again.".into(),
                );
            }
        }
    }

    /// Site and types are fetched concurrently.
    pub async fn load<T: Transport>(&mut self, client: &PortalClient<T>) {
        self.begin_load();
        let (site, types) = futures::join!(
            client.site(&self.site_id),
            client.incident_types(Some(&self.site_id))
        );
        self.finish_load(site, types);
    }

    /// Opens the report form for one of the offered types.
    pub fn choose(&mut self, type_id: &EntityId) -> bool {
        let Some(incident_type) = self.types.iter().find(|t| &t.id == type_id) else {
            return false;
        };
        self.form = Some(IncidentForm::new(self.site_id.clone(), incident_type));
        true
    }

    pub fn close_form(&mut self) {
        self.form = None;
    }

    /// Call after the open form reached `Submitted`.
    pub fn mark_submitted(&mut self) {
        self.form = None;
        self.submitted = true;
    }

    pub async fn submit<T: Transport>(&mut self, client: &PortalClient<T>) -> bool {
        let Some(form) = self.form.as_mut() else {
            return false;
        };
        let stored = form.submit(client).await;
        if stored {
            self.mark_submitted();
        }
        stored
    }

    /// Back to the chooser grid.
    pub fn submit_another(&mut self) {
        self.submitted = false;
        self.form = None;
    }

    pub fn open_contacts(&mut self) {
        self.contacts = ContactsLookup::Loading;
    }

    pub fn finish_contacts(&mut self, result: ApiResult<Vec<EmergencyContact>>) {
        self.contacts = match result {
            Ok(contacts) => ContactsLookup::from_contacts(contacts),
            Err(err) => {
                warn!(site = %self.site_id, error = %err, "contacts lookup failed");
                ContactsLookup::Failed(match err {
                    ApiError::Transport(_) => err.user_message(),
                    _ => "Failed to load emergency contacts.".into(),
                })
            }
        };
    }

    pub async fn load_contacts<T: Transport>(&mut self, client: &PortalClient<T>) {
        self.open_contacts();
        let result = client.site_contacts(&self.site_id).await;
        self.finish_contacts(result);
    }

    pub fn close_contacts(&mut self) {
        self.contacts = ContactsLookup::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Method;
    use crate::testing::ScriptedTransport;
    use futures::executor::block_on;

    fn itype(id: u32, name: &str, order: i32, active: bool) -> IncidentType {
        serde_json::from_value(serde_json::json!({
            "id": id, "site": 1, "name": name, "display_name": name,
            "order": order, "is_active": active
        }))
        .expect("type")
    }

    fn contact(id: &str, phone: &str) -> EmergencyContact {
        serde_json::from_value(serde_json::json!({
            "id": id, "site": 1, "name": id, "designation": "", "phone_number": phone
        }))
        .expect("contact")
    }

    #[test]
    fn lower_order_comes_first_and_inactive_is_hidden() {
        let types = vec![
            itype(1, "x", 2, true),
            itype(2, "y", 1, true),
            itype(3, "z", 0, false),
        ];
        let names: Vec<_> = active_types_in_order(types)
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["y", "x"]);
    }

    #[test]
    fn equal_order_keeps_server_sequence() {
        let types = vec![itype(1, "b", 1, true), itype(2, "a", 1, true)];
        let names: Vec<_> = active_types_in_order(types)
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn visuals_prefer_server_keys_then_names_then_default() {
        let mut t = itype(1, "near_miss", 0, true);
        assert_eq!(
            TypeVisual::resolve(&t),
            TypeVisual { icon: TypeIcon::Eye, color: TileColor::Yellow }
        );
        t.color = Some("blue".into());
        assert_eq!(TypeVisual::resolve(&t).color, TileColor::Blue);
        let unknown = itype(2, "chemical_leak", 0, true);
        assert_eq!(TypeVisual::resolve(&unknown), TypeVisual::DEFAULT);
    }

    #[test]
    fn missing_site_is_not_found_and_other_failures_are_retryable() {
        let mut page = PublicPage::new("9".into());
        page.finish_load(Err(ApiError::NotFound("/sites/9/".into())), Ok(Vec::new()));
        assert_eq!(page.state(), &PageState::NotFound);

        page.finish_load(
            Ok(serde_json::from_value(serde_json::json!({"id": 9, "name": "S"})).expect("site")),
            Err(ApiError::Server { status: 500, message: String::new() }),
        );
        assert!(matches!(page.state(), PageState::Failed(_)));
    }

    #[test]
    fn load_fetches_site_and_scoped_types() {
        let client = PortalClient::new(ScriptedTransport::new());
        client.transport().respond_json(
            Method::Get,
            "/sites/1/",
            200,
            serde_json::json!({"id": 1, "name": "Plant A", "address": "Dock road"}),
        );
        client.transport().respond_json(
            Method::Get,
            "/incident-types/",
            200,
            serde_json::json!({"results": [
                {"id": 5, "site": 1, "name": "near_miss", "display_name": "Near Miss", "order": 3},
                {"id": 6, "site": 1, "name": "unsafe_actions", "display_name": "Unsafe Actions", "order": 1}
            ]}),
        );
        let mut page = PublicPage::new("1".into());
        block_on(page.load(&client));

        assert_eq!(page.state(), &PageState::Ready);
        assert_eq!(page.types()[0].name, "unsafe_actions");
        let sent = client.transport().requests_to(Method::Get, "/incident-types/");
        assert_eq!(sent[0].query, vec![("site".to_string(), "1".to_string())]);
    }

    #[test]
    fn submit_another_returns_to_the_grid() {
        let mut page = PublicPage::new("1".into());
        page.finish_load(
            Ok(serde_json::from_value(serde_json::json!({"id": 1, "name": "S"})).expect("site")),
            Ok(vec![itype(4, "general_feedback", 0, true)]),
        );
        assert!(page.choose(&"4".into()));
        assert!(!page.choose(&"99".into()));
        page.mark_submitted();
        assert!(page.is_submitted());
        assert!(page.form().is_none());
        page.submit_another();
        assert!(!page.is_submitted());
        assert_eq!(page.tiles().count(), 1);
    }

    #[test]
    fn contacts_split_helplines_from_site_contacts() {
        let mut page = PublicPage::new("1".into());
        page.finish_contacts(Ok(vec![
            contact("national-police", "100"),
            contact("7", "+919876543210"),
            contact("national-child", "1098"),
        ]));
        let ContactsLookup::Loaded { helplines, site_contacts } = page.contacts() else {
            panic!("expected loaded contacts");
        };
        assert_eq!(helplines.len(), 2);
        assert_eq!(site_contacts[0].id.as_str(), "7");
    }
}
