use crate::args::CliArgs;
use crate::error::{AdminError, AdminResult};
use crate::state::AppState;
use portal_core::admin::{
    Contacts, CrudScreen, IncidentTypeScreen, IncidentTypes, NotificationEmails, Resource, Sites,
};
use portal_core::api::{ImageUpdateMode, Transport};
use portal_core::ApiError;
use portal_core::dashboard::DashboardStats;
use portal_core::filters::IncidentBoard;
use portal_core::model::{Criticality, EntityId, IncidentStatus};
use portal_core::public::{ContactsLookup, PageState, PublicPage, TypeVisual};
use portal_core::qr::{download_filename, QrBoard, QrEntry};
use portal_core::session::Route;
use portal_core::submission::SubmissionPhase;
use portal_core::upload::ImageFile;
use portal_core::validation::{FieldErrors, NON_FIELD};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::info;

pub const USAGE: &str = "\
usage: portal-admin <command> [args]

  whoami
  dashboard
  sites list | create --name N --address A | update ID [--name N] [--address A] | delete ID --yes
  contacts list [--site ID] | create --site ID --name N --designation D --phone P
           | update ID [...] | delete ID --yes
  types list [--site ID] | create --site ID --name N --display-name D [--description T]
        [--order N] [--icon I] [--color C] [--no-criticality] [--inactive]
        | update ID [...] | toggle ID | delete ID --yes
  incidents list [--site ID] [--type ID] [--status S]
            | status ID S | add-images ID --image PATH... [--replace] | delete ID --yes
  emails list | add EMAIL | update ID EMAIL | delete ID --yes
  qr list | qr ID [--out PATH]
  public SITE | lookup SITE
  report --site ID --type ID --description T [--criticality C]
         (--anonymous | --name N --phone P) [--image PATH...]";

#[derive(Clone, Debug, Serialize)]
pub struct IncidentRow {
    pub id: EntityId,
    pub site: String,
    pub incident_type: String,
    pub criticality: Option<Criticality>,
    pub status: IncidentStatus,
    pub reporter: String,
    pub description: String,
    pub images: usize,
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TypeTile {
    pub id: EntityId,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub requires_criticality: bool,
    pub color: &'static str,
}

#[derive(Clone, Debug, Serialize)]
pub struct QrRow {
    pub site: EntityId,
    pub site_name: String,
    pub public_url: Option<String>,
    pub file: String,
    pub error: Option<String>,
}

fn to_json<S: Serialize>(value: &S) -> AdminResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Runs one command line and returns what it printed as JSON.
pub async fn dispatch<T: Transport>(state: &mut AppState<T>, args: &CliArgs) -> AdminResult<Value> {
    let command = args
        .positional(0)
        .ok_or_else(|| AdminError::Usage(USAGE.into()))?;
    match command {
        "whoami" => Ok(serde_json::json!({
            "authenticated": state.session.is_authenticated(),
            "username": state.session.username(),
        })),
        "dashboard" => dashboard(state).await,
        "sites" => sites(state, args).await,
        "contacts" => contacts(state, args).await,
        "types" => incident_types(state, args).await,
        "incidents" => incidents(state, args).await,
        "emails" => emails(state, args).await,
        "qr" => qr(state, args).await,
        "public" => public_page(state, args).await,
        "lookup" => contacts_lookup(state, args).await,
        "report" => report(state, args).await,
        other => Err(AdminError::Usage(format!("unknown command '{other}'\n{USAGE}"))),
    }
}

/// The screen a command stands in for.
pub fn route_of(args: &CliArgs) -> Option<Route> {
    let route = match args.positional(0)? {
        "dashboard" => Route::Dashboard,
        "sites" => Route::Sites,
        "contacts" => Route::Contacts,
        "types" => Route::IncidentTypes,
        "incidents" => Route::Incidents,
        "emails" => Route::Emails,
        "qr" => Route::QrCodes,
        "public" | "lookup" => Route::Public(EntityId::new(args.positional(1).unwrap_or_default())),
        "report" => Route::Public(EntityId::new(args.flag("site").unwrap_or_default())),
        _ => return None,
    };
    Some(route)
}

/// Whether the session has to be established before dispatch. `whoami`
/// reports it; the public commands run anonymously.
pub fn needs_session(args: &CliArgs) -> bool {
    match args.positional(0) {
        Some("whoami") => true,
        _ => route_of(args).is_some_and(|route| route.requires_auth()),
    }
}

pub async fn dashboard<T: Transport>(state: &mut AppState<T>) -> AdminResult<Value> {
    state.require(Route::Dashboard)?;
    let result = DashboardStats::load(&state.client).await;
    to_json(&state.track(result)?)
}

/// Lists every row of a CRUD screen, optionally narrowed to one site.
async fn list_rows<R: Resource, T: Transport>(
    state: &mut AppState<T>,
    site: Option<&str>,
) -> AdminResult<CrudScreen<R>>
where
    R::Record: Serialize,
{
    let mut screen = CrudScreen::<R>::new();
    let result = screen.load(&state.client).await;
    state.track(result)?;
    if let Some(message) = screen.error() {
        return Err(AdminError::Failed(message.to_string()));
    }
    screen.set_site_filter(site.map(EntityId::from));
    Ok(screen)
}

fn rows_json<R: Resource>(screen: &CrudScreen<R>) -> AdminResult<Value>
where
    R::Record: Serialize,
{
    to_json(&screen.visible())
}

fn editor_errors<R: Resource>(screen: &CrudScreen<R>) -> FieldErrors {
    screen
        .editor()
        .map(|e| e.errors().clone())
        .unwrap_or_default()
}

/// Creates (`id == None`) or updates a record through the same editor the
/// admin screens use: prefill, apply flags, validate, send.
async fn save_record<R: Resource, T: Transport>(
    state: &mut AppState<T>,
    id: Option<&str>,
    apply: impl FnOnce(&mut R::Draft) -> AdminResult<()>,
) -> AdminResult<R::Record> {
    let mut screen = CrudScreen::<R>::new();
    match id {
        Some(id) => {
            let result = screen.load(&state.client).await;
            state.track(result)?;
            if !screen.open_edit(&EntityId::from(id)) {
                return Err(AdminError::NotFound(format!("{} {id}", R::NOUN)));
            }
        }
        None => screen.open_create(),
    }

    let mut outcome = Ok(());
    if let Some(editor) = screen.editor_mut() {
        editor.edit(NON_FIELD, |draft| outcome = apply(draft));
    }
    outcome?;

    let Some(request) = screen.begin_save() else {
        return Err(AdminError::Rejected(editor_errors(&screen)));
    };
    let result = match &request.id {
        Some(id) => R::update(&state.client, id, &request.draft).await,
        None => R::create(&state.client, &request.draft).await,
    };
    let stored = result.clone();
    let saved = screen.finish_save(result);
    state.track(saved)?;
    match stored {
        Ok(record) => {
            info!(resource = R::NOUN, id = %R::id(&record), "stored");
            Ok(record)
        }
        Err(ApiError::Validation(_)) => Err(AdminError::Rejected(editor_errors(&screen))),
        // The screen only knows "Failed to save"; the operator gets the cause.
        Err(err) => Err(AdminError::Api(err)),
    }
}

async fn delete_record<R: Resource, T: Transport>(
    state: &mut AppState<T>,
    args: &CliArgs,
) -> AdminResult<Value>
where
    R::Record: Serialize,
{
    let id = EntityId::from(args.require_positional(2, "id")?);
    let mut screen = CrudScreen::<R>::new();
    let result = screen.load(&state.client).await;
    state.track(result)?;
    if !screen.request_delete(&id) {
        return Err(AdminError::NotFound(format!("{} {id}", R::NOUN)));
    }
    if !args.switch("yes") {
        screen.cancel_delete();
        return Err(AdminError::ConfirmationRequired(format!("{} {id}", R::NOUN)));
    }
    let result = screen.confirm_delete(&state.client).await;
    if !state.track(result)? {
        return Err(AdminError::Failed(
            screen.error().unwrap_or("delete failed").to_string(),
        ));
    }
    Ok(serde_json::json!({ "deleted": id }))
}

fn set_text(target: &mut String, value: Option<&str>) {
    if let Some(value) = value {
        *target = value.to_string();
    }
}

pub async fn sites<T: Transport>(state: &mut AppState<T>, args: &CliArgs) -> AdminResult<Value> {
    state.require(Route::Sites)?;
    match args.positional(1).unwrap_or("list") {
        "list" => rows_json(&list_rows::<Sites, T>(state, None).await?),
        "create" | "update" => {
            let id = match args.positional(1) {
                Some("update") => Some(args.require_positional(2, "site id")?),
                _ => None,
            };
            let site = save_record::<Sites, T>(state, id, |draft| {
                set_text(&mut draft.name, args.flag("name"));
                set_text(&mut draft.address, args.flag("address"));
                Ok(())
            })
            .await?;
            to_json(&site)
        }
        "delete" => delete_record::<Sites, T>(state, args).await,
        other => Err(AdminError::Usage(format!("sites {other}"))),
    }
}

pub async fn contacts<T: Transport>(state: &mut AppState<T>, args: &CliArgs) -> AdminResult<Value> {
    state.require(Route::Contacts)?;
    match args.positional(1).unwrap_or("list") {
        "list" => rows_json(&list_rows::<Contacts, T>(state, args.flag("site")).await?),
        "create" | "update" => {
            let id = match args.positional(1) {
                Some("update") => Some(args.require_positional(2, "contact id")?),
                _ => None,
            };
            let contact = save_record::<Contacts, T>(state, id, |draft| {
                if let Some(site) = args.flag("site") {
                    draft.site = Some(site.into());
                }
                set_text(&mut draft.name, args.flag("name"));
                set_text(&mut draft.designation, args.flag("designation"));
                set_text(&mut draft.phone_number, args.flag("phone"));
                Ok(())
            })
            .await?;
            to_json(&contact)
        }
        "delete" => delete_record::<Contacts, T>(state, args).await,
        other => Err(AdminError::Usage(format!("contacts {other}"))),
    }
}

pub async fn incident_types<T: Transport>(
    state: &mut AppState<T>,
    args: &CliArgs,
) -> AdminResult<Value> {
    state.require(Route::IncidentTypes)?;
    match args.positional(1).unwrap_or("list") {
        "list" => rows_json(&list_rows::<IncidentTypes, T>(state, args.flag("site")).await?),
        "create" | "update" => {
            let id = match args.positional(1) {
                Some("update") => Some(args.require_positional(2, "type id")?),
                _ => None,
            };
            let order = args.parsed_flag::<i32>("order")?;
            let incident_type = save_record::<IncidentTypes, T>(state, id, |draft| {
                if let Some(site) = args.flag("site") {
                    draft.site = Some(site.into());
                }
                set_text(&mut draft.name, args.flag("name"));
                set_text(&mut draft.display_name, args.flag("display-name"));
                set_text(&mut draft.description, args.flag("description"));
                if let Some(order) = order {
                    draft.order = order;
                }
                if let Some(icon) = args.flag("icon") {
                    draft.icon = Some(icon.to_string());
                }
                if let Some(color) = args.flag("color") {
                    draft.color = Some(color.to_string());
                }
                if args.switch("no-criticality") {
                    draft.requires_criticality = false;
                }
                if args.switch("inactive") {
                    draft.is_active = false;
                }
                Ok(())
            })
            .await?;
            to_json(&incident_type)
        }
        "toggle" => {
            let id = EntityId::from(args.require_positional(2, "type id")?);
            let mut screen = IncidentTypeScreen::new();
            let result = screen.load(&state.client).await;
            state.track(result)?;
            let result = screen.toggle_active(&state.client, &id).await;
            if !state.track(result)? {
                return Err(match screen.error() {
                    Some(message) => AdminError::Failed(message.to_string()),
                    None => AdminError::NotFound(format!("incident type {id}")),
                });
            }
            to_json(&screen.record(&id))
        }
        "delete" => delete_record::<IncidentTypes, T>(state, args).await,
        other => Err(AdminError::Usage(format!("types {other}"))),
    }
}

pub async fn emails<T: Transport>(state: &mut AppState<T>, args: &CliArgs) -> AdminResult<Value> {
    state.require(Route::Emails)?;
    match args.positional(1).unwrap_or("list") {
        "list" => rows_json(&list_rows::<NotificationEmails, T>(state, None).await?),
        "add" => {
            let address = args.require_positional(2, "email address")?;
            let email = save_record::<NotificationEmails, T>(state, None, |draft| {
                draft.email = address.to_string();
                Ok(())
            })
            .await?;
            to_json(&email)
        }
        "update" => {
            let id = args.require_positional(2, "email id")?;
            let address = args.require_positional(3, "email address")?;
            let email = save_record::<NotificationEmails, T>(state, Some(id), |draft| {
                draft.email = address.to_string();
                Ok(())
            })
            .await?;
            to_json(&email)
        }
        "delete" => delete_record::<NotificationEmails, T>(state, args).await,
        other => Err(AdminError::Usage(format!("emails {other}"))),
    }
}

pub async fn incidents<T: Transport>(state: &mut AppState<T>, args: &CliArgs) -> AdminResult<Value> {
    state.require(Route::Incidents)?;
    match args.positional(1).unwrap_or("list") {
        "list" => {
            let mut board = load_board(state).await?;
            board.filter.site = args.flag("site").map(EntityId::from);
            board.filter.incident_type = args.flag("type").map(EntityId::from);
            board.filter.status = args.parsed_flag::<IncidentStatus>("status")?;
            let rows: Vec<IncidentRow> = board
                .visible()
                .into_iter()
                .map(|incident| IncidentRow {
                    id: incident.id.clone(),
                    site: incident
                        .site_name
                        .clone()
                        .unwrap_or_else(|| board.site_name(&incident.site).to_string()),
                    incident_type: incident
                        .incident_type_display
                        .clone()
                        .unwrap_or_else(|| incident.incident_type.to_string()),
                    criticality: incident.criticality,
                    status: incident.status,
                    reporter: incident.reporter_label().to_string(),
                    description: incident.description.clone(),
                    images: incident.images.len(),
                    created_at: incident.created_at.map(|t| t.to_rfc3339()),
                })
                .collect();
            to_json(&rows)
        }
        "status" => {
            let id = EntityId::from(args.require_positional(2, "incident id")?);
            let next: IncidentStatus = args
                .require_positional(3, "status")?
                .parse()
                .map_err(AdminError::Usage)?;
            let mut board = load_board(state).await?;
            if !board.incidents().iter().any(|i| i.id == id) {
                return Err(AdminError::NotFound(format!("incident {id}")));
            }
            let result = board.change_status(&state.client, &id, next).await;
            state.track(result)?;
            if let Some(message) = board.error() {
                return Err(AdminError::Failed(message.to_string()));
            }
            Ok(serde_json::json!({ "id": id, "status": next }))
        }
        "add-images" => {
            let id = EntityId::from(args.require_positional(2, "incident id")?);
            let images = read_images(args.flag_values("image"))?;
            if images.is_empty() {
                return Err(AdminError::Usage("add-images needs at least one --image".into()));
            }
            let mode = if args.switch("replace") {
                ImageUpdateMode::Replace
            } else {
                ImageUpdateMode::Append
            };
            let result = state.client.update_incident_images(&id, images, mode).await;
            to_json(&state.track(result)?)
        }
        "delete" => {
            let id = EntityId::from(args.require_positional(2, "incident id")?);
            if !args.switch("yes") {
                return Err(AdminError::ConfirmationRequired(format!("incident {id}")));
            }
            let result = state.client.delete_incident(&id).await;
            state.track(result)?;
            Ok(serde_json::json!({ "deleted": id }))
        }
        other => Err(AdminError::Usage(format!("incidents {other}"))),
    }
}

async fn load_board<T: Transport>(state: &mut AppState<T>) -> AdminResult<IncidentBoard> {
    let mut board = IncidentBoard::new();
    let result = board.load(&state.client).await;
    state.track(result)?;
    if let Some(message) = board.error() {
        return Err(AdminError::Failed(message.to_string()));
    }
    Ok(board)
}

fn read_images(paths: &[String]) -> AdminResult<Vec<ImageFile>> {
    paths
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)?;
            let name = Path::new(path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(path)
                .to_string();
            Ok(ImageFile::from_path_bytes(name, bytes))
        })
        .collect()
}

pub async fn qr<T: Transport>(state: &mut AppState<T>, args: &CliArgs) -> AdminResult<Value> {
    state.require(Route::QrCodes)?;
    match args.positional(1).unwrap_or("list") {
        "list" => {
            let result = QrBoard::load(&state.client).await;
            let board = state.track(result)?;
            let rows: Vec<QrRow> = board
                .cards
                .iter()
                .map(|card| {
                    let (public_url, error) = match &card.entry {
                        QrEntry::Ready(code) => (Some(code.public_url.clone()), None),
                        QrEntry::Failed(message) => (None, Some(message.clone())),
                    };
                    QrRow {
                        site: card.site.id.clone(),
                        site_name: card.site.name.clone(),
                        public_url,
                        file: card.download_filename(),
                        error,
                    }
                })
                .collect();
            to_json(&rows)
        }
        site_id => {
            let id = EntityId::from(site_id);
            let result = state.client.site(&id).await;
            let site = state.track(result)?;
            let result = state.client.site_qr_code(&id).await;
            let code = state.track(result)?;
            let file = args
                .flag("out")
                .map(ToString::to_string)
                .unwrap_or_else(|| download_filename(&site.name));
            let png = code.png_bytes().map_err(AdminError::Failed)?;
            std::fs::write(&file, &png)?;
            info!(site = %id, %file, bytes = png.len(), "qr code saved");
            to_json(&QrRow {
                site: id,
                site_name: site.name,
                public_url: Some(code.public_url),
                file,
                error: None,
            })
        }
    }
}

async fn load_public<T: Transport>(state: &mut AppState<T>, site: &str) -> AdminResult<PublicPage> {
    let mut page = PublicPage::new(site.into());
    page.load(&state.client).await;
    match page.state() {
        PageState::Ready => Ok(page),
        PageState::NotFound => Err(AdminError::NotFound(format!("site {site}"))),
        PageState::Failed(message) => Err(AdminError::Failed(message.clone())),
        PageState::Loading => Err(AdminError::Failed("site did not load".into())),
    }
}

/// What a visitor sees after scanning the site's QR code.
pub async fn public_page<T: Transport>(state: &mut AppState<T>, args: &CliArgs) -> AdminResult<Value> {
    let site = args.require_positional(1, "site id")?;
    let page = load_public(state, site).await?;
    let tiles: Vec<TypeTile> = page
        .types()
        .iter()
        .map(|t| TypeTile {
            id: t.id.clone(),
            name: t.name.clone(),
            display_name: t.display_name.clone(),
            description: t.blurb().to_string(),
            requires_criticality: t.requires_criticality,
            color: TypeVisual::resolve(t).color.css_class(),
        })
        .collect();
    Ok(serde_json::json!({ "site": page.site(), "types": tiles }))
}

pub async fn contacts_lookup<T: Transport>(
    state: &mut AppState<T>,
    args: &CliArgs,
) -> AdminResult<Value> {
    let site = args.require_positional(1, "site id")?;
    let mut page = PublicPage::new(site.into());
    page.load_contacts(&state.client).await;
    match page.contacts() {
        ContactsLookup::Loaded {
            helplines,
            site_contacts,
        } => Ok(serde_json::json!({
            "national_helplines": helplines,
            "site_contacts": site_contacts,
        })),
        ContactsLookup::Failed(message) => Err(AdminError::Failed(message.clone())),
        _ => Err(AdminError::Failed("contacts did not load".into())),
    }
}

/// Files a report through the public form, exactly as a visitor would.
pub async fn report<T: Transport>(state: &mut AppState<T>, args: &CliArgs) -> AdminResult<Value> {
    let site = args
        .flag("site")
        .ok_or_else(|| AdminError::Usage("report needs --site".into()))?;
    let type_id = args
        .flag("type")
        .ok_or_else(|| AdminError::Usage("report needs --type".into()))?;
    let criticality = args.parsed_flag::<Criticality>("criticality")?;
    let images = read_images(args.flag_values("image"))?;

    let mut page = load_public(state, site).await?;
    if !page.choose(&type_id.into()) {
        return Err(AdminError::NotFound(format!(
            "active incident type {type_id} at site {site}"
        )));
    }
    let Some(form) = page.form_mut() else {
        return Err(AdminError::Failed("report form did not open".into()));
    };
    form.set_description(args.flag("description").unwrap_or_default());
    if let Some(criticality) = criticality {
        form.set_criticality(criticality);
    }
    form.set_anonymous(args.switch("anonymous"));
    form.set_reporter_name(args.flag("name").unwrap_or_default());
    form.set_reporter_phone(args.flag("phone").unwrap_or_default());
    for image in images {
        form.add_image(image);
    }

    if page.submit(&state.client).await {
        return Ok(serde_json::json!({ "submitted": true, "site": site }));
    }
    let Some(form) = page.form() else {
        return Err(AdminError::Failed("report form closed".into()));
    };
    if !form.errors().is_empty() {
        return Err(AdminError::Rejected(form.errors().clone()));
    }
    match form.phase() {
        SubmissionPhase::Error(message) => Err(AdminError::Failed(message.clone())),
        _ => Err(AdminError::Failed("report was not submitted".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use portal_core::api::{Body, Method};
    use portal_core::testing::ScriptedTransport;
    use portal_core::PortalClient;

    fn signed_in() -> AppState<ScriptedTransport> {
        let mut state = AppState::new(PortalClient::new(ScriptedTransport::new()));
        state.session = portal_core::session::Session::signed_in("admin");
        state
    }

    fn run(state: &mut AppState<ScriptedTransport>, line: &[&str]) -> AdminResult<Value> {
        let args = CliArgs::parse(line.iter().copied()).expect("args");
        block_on(dispatch(state, &args))
    }

    fn t(state: &AppState<ScriptedTransport>) -> &ScriptedTransport {
        state.client.transport()
    }

    fn args(line: &[&str]) -> CliArgs {
        CliArgs::parse(line.iter().copied()).expect("args")
    }

    #[test]
    fn only_admin_commands_establish_a_session() {
        assert!(needs_session(&args(&["sites", "list"])));
        assert!(needs_session(&args(&["whoami"])));
        assert!(!needs_session(&args(&["public", "3"])));
        assert!(!needs_session(&args(&["lookup", "3"])));
        assert!(!needs_session(&args(&["report", "--site", "3"])));
        assert!(!needs_session(&args(&["frobnicate"])));
        assert_eq!(route_of(&args(&["types", "list"])), Some(Route::IncidentTypes));
    }

    #[test]
    fn save_failures_keep_their_cause() {
        let mut state = signed_in();
        t(&state).respond_json(
            Method::Post,
            "/sites/",
            503,
            serde_json::json!({"detail": "maintenance"}),
        );
        let err = run(&mut state, &["sites", "create", "--name", "Plant", "--address", "Dock road"])
            .expect_err("unavailable");
        let AdminError::Api(cause) = err else {
            panic!("expected the api error, got {err:?}");
        };
        assert!(matches!(cause, ApiError::Server { status: 503, .. }));
    }

    #[test]
    fn admin_commands_need_a_session() {
        let mut state = AppState::new(PortalClient::new(ScriptedTransport::new()));
        assert!(matches!(run(&mut state, &["sites"]), Err(AdminError::NotSignedIn)));
        assert!(t(&state).requests().is_empty());
    }

    #[test]
    fn expired_session_signs_out() {
        let mut state = signed_in();
        t(&state).respond_json(Method::Get, "/sites/", 401, serde_json::json!({}));
        assert!(matches!(run(&mut state, &["sites", "list"]), Err(AdminError::NotSignedIn)));
        assert!(!state.session.is_authenticated());
    }

    #[test]
    fn site_create_validates_before_sending() {
        let mut state = signed_in();
        let err = run(&mut state, &["sites", "create", "--name", "Plant"]).expect_err("invalid");
        let AdminError::Rejected(errors) = err else {
            panic!("expected rejection");
        };
        assert!(errors.contains("address"));
        assert!(t(&state).requests().is_empty());
    }

    #[test]
    fn site_update_prefills_unchanged_fields() {
        let mut state = signed_in();
        t(&state).respond_json(
            Method::Get,
            "/sites/",
            200,
            serde_json::json!([{"id": 4, "name": "Plant", "address": "Old road"}]),
        );
        t(&state).respond_json(
            Method::Put,
            "/sites/4/",
            200,
            serde_json::json!({"id": 4, "name": "Plant North", "address": "Old road"}),
        );
        let out = run(&mut state, &["sites", "update", "4", "--name", "Plant North"]).expect("update");
        assert_eq!(out["name"], "Plant North");
        let sent = t(&state).requests_to(Method::Put, "/sites/4/");
        assert_eq!(
            sent[0].body,
            Body::Json(serde_json::json!({"name": "Plant North", "address": "Old road"}))
        );
    }

    #[test]
    fn delete_without_yes_is_refused() {
        let mut state = signed_in();
        t(&state).respond_json(Method::Get, "/emergency-contacts/", 200, serde_json::json!([
            {"id": 8, "site": 1, "name": "Guard", "phone_number": "+919876543210"}
        ]));
        let err = run(&mut state, &["contacts", "delete", "8"]).expect_err("needs --yes");
        assert!(matches!(err, AdminError::ConfirmationRequired(_)));
        assert_eq!(t(&state).count(Method::Delete, "/emergency-contacts/8/"), 0);

        t(&state).respond_json(Method::Delete, "/emergency-contacts/8/", 204, Value::Null);
        run(&mut state, &["contacts", "delete", "8", "--yes"]).expect("deleted");
        assert_eq!(t(&state).count(Method::Delete, "/emergency-contacts/8/"), 1);
    }

    #[test]
    fn contact_with_bad_phone_is_rejected_locally() {
        let mut state = signed_in();
        let err = run(
            &mut state,
            &["contacts", "create", "--site", "1", "--name", "Guard", "--designation", "Gate", "--phone", "12"],
        )
        .expect_err("bad phone");
        let AdminError::Rejected(errors) = err else {
            panic!("expected rejection");
        };
        assert!(errors.contains("phone_number"));
    }

    #[test]
    fn duplicate_email_reads_already_registered() {
        let mut state = signed_in();
        t(&state).respond_json(
            Method::Post,
            "/notification-emails/",
            400,
            serde_json::json!({"email": ["notification email with this email already exists."]}),
        );
        let err = run(&mut state, &["emails", "add", "ops@example.com"]).expect_err("duplicate");
        let AdminError::Rejected(errors) = err else {
            panic!("expected rejection");
        };
        assert_eq!(errors.get("email"), Some(portal_core::admin::ALREADY_REGISTERED));
    }

    #[test]
    fn incident_list_hides_closed_by_default() {
        let mut state = signed_in();
        t(&state).respond_json(Method::Get, "/incidents/", 200, serde_json::json!([
            {"id": 1, "site": 1, "incident_type": 2, "status": "closed", "description": "old"},
            {"id": 2, "site": 1, "incident_type": 2, "status": "open", "description": "new",
             "is_anonymous": true}
        ]));
        t(&state).respond_json(Method::Get, "/sites/", 200, serde_json::json!([{"id": 1, "name": "Plant"}]));

        let out = run(&mut state, &["incidents", "list"]).expect("list");
        let rows = out.as_array().expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["site"], "Plant");
        assert_eq!(rows[0]["reporter"], "Anonymous");

        let out = run(&mut state, &["incidents", "list", "--status", "closed"]).expect("list");
        assert_eq!(out.as_array().expect("rows")[0]["description"], "old");
    }

    #[test]
    fn failed_status_change_is_reported() {
        let mut state = signed_in();
        t(&state).respond_json(Method::Get, "/incidents/", 200, serde_json::json!([
            {"id": 5, "site": 1, "incident_type": 2, "status": "open"}
        ]));
        t(&state).respond_json(Method::Get, "/sites/", 200, serde_json::json!([]));
        t(&state).respond_json(Method::Patch, "/incidents/5/", 500, serde_json::json!({}));
        let err = run(&mut state, &["incidents", "status", "5", "resolved"]).expect_err("500");
        assert!(matches!(err, AdminError::Failed(_)));
    }

    #[test]
    fn toggling_a_type_reports_the_new_state() {
        let mut state = signed_in();
        let active = serde_json::json!([{"id": 3, "site": 1, "name": "near_miss", "display_name": "Near Miss"}]);
        let inactive = serde_json::json!([{"id": 3, "site": 1, "name": "near_miss", "display_name": "Near Miss", "is_active": false}]);
        t(&state).respond_json(Method::Get, "/incident-types/", 200, active);
        t(&state).respond_json(Method::Get, "/incident-types/", 200, inactive);
        t(&state).respond_json(Method::Put, "/incident-types/3/", 200, serde_json::json!(
            {"id": 3, "site": 1, "name": "near_miss", "display_name": "Near Miss", "is_active": false}
        ));
        let out = run(&mut state, &["types", "toggle", "3"]).expect("toggle");
        assert_eq!(out["is_active"], false);
    }

    #[test]
    fn anonymous_report_needs_no_session() {
        let mut state = AppState::new(PortalClient::new(ScriptedTransport::new()));
        t(&state).respond_json(Method::Get, "/sites/1/", 200, serde_json::json!({"id": 1, "name": "Plant"}));
        t(&state).respond_json(Method::Get, "/incident-types/", 200, serde_json::json!([
            {"id": 2, "site": 1, "name": "general_feedback", "display_name": "General Feedback",
             "requires_criticality": false}
        ]));
        t(&state).respond_json(Method::Post, "/incidents/", 201, serde_json::json!(
            {"id": 10, "site": 1, "incident_type": 2, "description": "More shade", "is_anonymous": true}
        ));
        let out = run(
            &mut state,
            &["report", "--site", "1", "--type", "2", "--description", "More shade", "--anonymous"],
        )
        .expect("report");
        assert_eq!(out["submitted"], true);
        let sent = t(&state).requests_to(Method::Post, "/incidents/");
        let Body::Multipart(form) = &sent[0].body else {
            panic!("expected multipart");
        };
        assert!(!form.has_field("criticality"));
    }

    #[test]
    fn named_report_without_phone_is_rejected() {
        let mut state = AppState::new(PortalClient::new(ScriptedTransport::new()));
        t(&state).respond_json(Method::Get, "/sites/1/", 200, serde_json::json!({"id": 1, "name": "Plant"}));
        t(&state).respond_json(Method::Get, "/incident-types/", 200, serde_json::json!([
            {"id": 2, "site": 1, "name": "near_miss", "display_name": "Near Miss"}
        ]));
        let err = run(
            &mut state,
            &["report", "--site", "1", "--type", "2", "--description", "Slip", "--name", "Ravi"],
        )
        .expect_err("missing phone");
        let AdminError::Rejected(errors) = err else {
            panic!("expected rejection");
        };
        assert!(errors.contains("reporter_phone"));
        assert_eq!(t(&state).count(Method::Post, "/incidents/"), 0);
    }
}
