use futures::executor::block_on;
use portal_core::api::{Body, Method};
use portal_core::model::Criticality;
use portal_core::public::{ContactsLookup, PageState, PublicPage};
use portal_core::submission::SubmissionPhase;
use portal_core::testing::ScriptedTransport;
use portal_core::upload::{ImageFile, IMAGE_FIELD};
use portal_core::PortalClient;

fn scripted_site() -> PortalClient<ScriptedTransport> {
    let client = PortalClient::new(ScriptedTransport::new().with_csrf("csrf-abc"));
    let t = client.transport();
    t.respond_json(
        Method::Get,
        "/sites/7/",
        200,
        serde_json::json!({"id": 7, "name": "Solar Park 7", "address": "Bikaner"}),
    );
    t.respond_json(
        Method::Get,
        "/incident-types/",
        200,
        serde_json::json!([
            {"id": 31, "site": 7, "name": "general_feedback", "display_name": "General Feedback",
             "requires_criticality": false, "order": 4},
            {"id": 30, "site": 7, "name": "unsafe_conditions", "display_name": "Unsafe Conditions",
             "requires_criticality": true, "order": 1},
            {"id": 32, "site": 7, "name": "retired", "display_name": "Retired",
             "is_active": false, "order": 0}
        ]),
    );
    t.respond_json(
        Method::Post,
        "/incidents/",
        201,
        serde_json::json!({
            "id": 900, "site": 7, "incident_type": 30, "criticality": "high",
            "description": "Exposed cable", "is_anonymous": true,
            "images": [{"image_url": "/media/a.jpg"}]
        }),
    );
    t.respond_json(
        Method::Get,
        "/sites/7/contacts/",
        200,
        serde_json::json!([
            {"id": "national-police", "site": 7, "name": "Police", "designation": "National", "phone_number": "100"},
            {"id": 3, "site": 7, "name": "Site Lead", "designation": "HSE", "phone_number": "+919812345678"}
        ]),
    );
    client
}

#[test]
fn anonymous_report_with_photo_goes_through() {
    let client = scripted_site();
    let mut page = PublicPage::new("7".into());
    block_on(page.load(&client));
    assert_eq!(page.state(), &PageState::Ready);
    let offered: Vec<_> = page.types().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(offered, vec!["unsafe_conditions", "general_feedback"]);

    assert!(page.choose(&"30".into()));
    let form = page.form_mut().expect("form open");
    form.set_description("Exposed cable");
    form.set_criticality(Criticality::High);
    form.set_anonymous(true);
    form.add_image(ImageFile::new("photo_1.jpg", "image/jpeg", vec![0xff, 0xd8, 0xff]));
    let dropped = form.add_image(ImageFile::new("wrong.jpg", "image/jpeg", vec![0xff]));
    form.remove_image(dropped);
    assert_eq!(form.images().previews().count(), 1);

    assert!(block_on(page.submit(&client)));
    assert!(page.is_submitted());

    let sent = client.transport().requests_to(Method::Post, "/incidents/");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].header("X-CSRFToken"), Some("csrf-abc"));
    let Body::Multipart(payload) = &sent[0].body else {
        panic!("create must be multipart");
    };
    assert_eq!(payload.field("site"), Some("7"));
    assert_eq!(payload.field("incident_type"), Some("30"));
    assert_eq!(payload.field("criticality"), Some("high"));
    assert_eq!(payload.field("is_anonymous"), Some("true"));
    assert!(!payload.has_field("reporter_name"));
    let images: Vec<_> = payload
        .files_named(IMAGE_FIELD)
        .map(|f| f.file_name.as_str())
        .collect();
    assert_eq!(images, vec!["photo_1.jpg"]);

    page.submit_another();
    assert!(!page.is_submitted());
    assert!(page.form().is_none());
}

#[test]
fn feedback_type_is_sent_without_criticality() {
    let client = scripted_site();
    let mut page = PublicPage::new("7".into());
    block_on(page.load(&client));
    page.choose(&"31".into());
    let form = page.form_mut().expect("form open");
    assert!(!form.requires_criticality());
    form.set_description("Canteen could use more shade");
    form.set_reporter_name("Meera");
    form.set_reporter_phone("+919800000000");

    assert!(block_on(page.submit(&client)));
    let sent = client.transport().requests_to(Method::Post, "/incidents/");
    let Body::Multipart(payload) = &sent[0].body else {
        panic!("create must be multipart");
    };
    assert!(!payload.has_field("criticality"));
    assert_eq!(payload.field("reporter_name"), Some("Meera"));
}

#[test]
fn invalid_report_never_reaches_the_server() {
    let client = scripted_site();
    let mut page = PublicPage::new("7".into());
    block_on(page.load(&client));
    page.choose(&"30".into());

    assert!(!block_on(page.submit(&client)));
    let form = page.form().expect("form stays open");
    assert_eq!(form.phase(), &SubmissionPhase::Idle);
    assert!(form.error("description").is_some());
    assert!(form.error("reporter_name").is_some());
    assert_eq!(client.transport().count(Method::Post, "/incidents/"), 0);
}

#[test]
fn contacts_lookup_separates_helplines() {
    let client = scripted_site();
    let mut page = PublicPage::new("7".into());
    block_on(page.load_contacts(&client));
    match page.contacts() {
        ContactsLookup::Loaded {
            helplines,
            site_contacts,
        } => {
            assert_eq!(helplines[0].tel_link(), "tel:100");
            assert_eq!(site_contacts[0].name, "Site Lead");
        }
        other => panic!("unexpected lookup state {other:?}"),
    }
}

#[test]
fn unknown_site_shows_not_found() {
    let client = PortalClient::new(ScriptedTransport::new());
    client.transport().respond_json(
        Method::Get,
        "/sites/404/",
        404,
        serde_json::json!({"detail": "Not found."}),
    );
    client
        .transport()
        .respond_json(Method::Get, "/incident-types/", 200, serde_json::json!([]));
    let mut page = PublicPage::new("404".into());
    block_on(page.load(&client));
    assert_eq!(page.state(), &PageState::NotFound);
}
