//! REST client for the portal collaborator, independent of how bytes travel.

use crate::error::{ApiError, ApiResult, TransportError};
use crate::model::{
    AuthStatus, ContactDraft, EmergencyContact, EntityId, Incident, IncidentStatus, IncidentType,
    IncidentTypeDraft, NotificationEmail, NotificationEmailDraft, Site, SiteDraft,
};
use crate::qr::QrCode;
use crate::upload::{ImageFile, MultipartForm, IMAGE_FIELD};
use crate::validation::FieldErrors;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Unsafe methods carry the CSRF header.
    pub fn is_safe(&self) -> bool {
        matches!(self, Method::Get)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartForm),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the API root, always with leading and trailing slash.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = Body::Json(value);
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = Body::Multipart(form);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json_value(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Moves one request to the collaborator and back. Implementations own the
/// base URL, cookies and wire encoding.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;

    /// Current CSRF token, mirrored from the session cookie.
    fn csrf_token(&self) -> Option<String> {
        None
    }
}

/// Pulls the CSRF token out of a `Cookie`-style header (`a=b; csrftoken=c`).
pub fn csrf_from_cookie_header(cookies: &str) -> Option<String> {
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == CSRF_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// List payloads arrive either bare or inside a paginated envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Paged { results: Vec<T> },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(items) | Listing::Paged { results: items } => items,
        }
    }
}

/// How a PATCH with images treats the images already stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImageUpdateMode {
    #[default]
    Append,
    Replace,
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Clone, Copy, Debug)]
pub struct PortalClient<T> {
    transport: T,
}

impl<T: Transport> PortalClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends the request and maps non-2xx statuses into [`ApiError`].
    pub async fn execute(&self, mut request: ApiRequest) -> ApiResult<ApiResponse> {
        if !request.method.is_safe() {
            if let Some(token) = self.transport.csrf_token() {
                request.headers.push((CSRF_HEADER.to_string(), token));
            }
        }
        let method = request.method;
        let path = request.path.clone();
        debug!(method = method.as_str(), %path, "api request");

        let response = self.transport.send(request).await.map_err(|err| {
            warn!(method = method.as_str(), %path, error = %err, "api transport failed");
            ApiError::from(err)
        })?;

        if response.is_success() {
            return Ok(response);
        }

        let err = classify_failure(&path, &response);
        warn!(method = method.as_str(), %path, status = response.status, error = %err, "api call rejected");
        Err(err)
    }

    async fn fetch<R: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<R> {
        let response = self.execute(request).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    async fn fetch_list<R: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<Vec<R>> {
        let listing: Listing<R> = self.fetch(request).await?;
        Ok(listing.into_vec())
    }

    async fn send_json<B: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        path: String,
        body: &B,
    ) -> ApiResult<R> {
        let value = serde_json::to_value(body)?;
        self.fetch(ApiRequest::new(method, path).json(value)).await
    }

    async fn delete(&self, path: String) -> ApiResult<()> {
        self.execute(ApiRequest::new(Method::Delete, path)).await?;
        Ok(())
    }

    // Sites

    pub async fn sites(&self) -> ApiResult<Vec<Site>> {
        self.fetch_list(ApiRequest::new(Method::Get, "/sites/")).await
    }

    pub async fn site(&self, id: &EntityId) -> ApiResult<Site> {
        self.fetch(ApiRequest::new(Method::Get, format!("/sites/{id}/"))).await
    }

    pub async fn create_site(&self, draft: &SiteDraft) -> ApiResult<Site> {
        self.send_json(Method::Post, "/sites/".into(), draft).await
    }

    pub async fn update_site(&self, id: &EntityId, draft: &SiteDraft) -> ApiResult<Site> {
        self.send_json(Method::Put, format!("/sites/{id}/"), draft).await
    }

    pub async fn delete_site(&self, id: &EntityId) -> ApiResult<()> {
        self.delete(format!("/sites/{id}/")).await
    }

    /// Public lookup: site contacts plus the national helplines.
    pub async fn site_contacts(&self, id: &EntityId) -> ApiResult<Vec<EmergencyContact>> {
        self.fetch_list(ApiRequest::new(Method::Get, format!("/sites/{id}/contacts/")))
            .await
    }

    pub async fn site_qr_code(&self, id: &EntityId) -> ApiResult<QrCode> {
        let raw: serde_json::Value = self
            .fetch(ApiRequest::new(Method::Get, format!("/sites/{id}/qr_code/")))
            .await?;
        QrCode::from_payload(&raw).map_err(ApiError::Decode)
    }

    // Emergency contacts

    pub async fn contacts(&self, site: Option<&EntityId>) -> ApiResult<Vec<EmergencyContact>> {
        let mut request = ApiRequest::new(Method::Get, "/emergency-contacts/");
        if let Some(site) = site {
            request = request.query("site", site.as_str());
        }
        self.fetch_list(request).await
    }

    pub async fn create_contact(&self, draft: &ContactDraft) -> ApiResult<EmergencyContact> {
        self.send_json(Method::Post, "/emergency-contacts/".into(), draft)
            .await
    }

    pub async fn update_contact(
        &self,
        id: &EntityId,
        draft: &ContactDraft,
    ) -> ApiResult<EmergencyContact> {
        self.send_json(Method::Put, format!("/emergency-contacts/{id}/"), draft)
            .await
    }

    pub async fn delete_contact(&self, id: &EntityId) -> ApiResult<()> {
        self.delete(format!("/emergency-contacts/{id}/")).await
    }

    // Incidents

    pub async fn incidents(&self) -> ApiResult<Vec<Incident>> {
        self.fetch_list(ApiRequest::new(Method::Get, "/incidents/")).await
    }

    /// Public submission. `form` is assembled by the submission flow.
    pub async fn create_incident(&self, form: MultipartForm) -> ApiResult<Incident> {
        self.fetch(ApiRequest::new(Method::Post, "/incidents/").multipart(form))
            .await
    }

    pub async fn update_incident_status(
        &self,
        id: &EntityId,
        status: IncidentStatus,
    ) -> ApiResult<Incident> {
        self.send_json(
            Method::Patch,
            format!("/incidents/{id}/"),
            &serde_json::json!({ "status": status }),
        )
        .await
    }

    /// Attaches images to a stored incident. Append sends only the new
    /// images; replace additionally asks the server to drop the old ones.
    pub async fn update_incident_images(
        &self,
        id: &EntityId,
        images: Vec<ImageFile>,
        mode: ImageUpdateMode,
    ) -> ApiResult<Incident> {
        let mut form = MultipartForm::new();
        if mode == ImageUpdateMode::Replace {
            form = form.text("replace_images", "true");
        }
        for image in images {
            form = form.file(IMAGE_FIELD, image);
        }
        self.fetch(ApiRequest::new(Method::Patch, format!("/incidents/{id}/")).multipart(form))
            .await
    }

    pub async fn delete_incident(&self, id: &EntityId) -> ApiResult<()> {
        self.delete(format!("/incidents/{id}/")).await
    }

    // Incident types

    pub async fn incident_types(&self, site: Option<&EntityId>) -> ApiResult<Vec<IncidentType>> {
        let mut request = ApiRequest::new(Method::Get, "/incident-types/");
        if let Some(site) = site {
            request = request.query("site", site.as_str());
        }
        self.fetch_list(request).await
    }

    pub async fn create_incident_type(&self, draft: &IncidentTypeDraft) -> ApiResult<IncidentType> {
        self.send_json(Method::Post, "/incident-types/".into(), draft)
            .await
    }

    pub async fn update_incident_type(
        &self,
        id: &EntityId,
        draft: &IncidentTypeDraft,
    ) -> ApiResult<IncidentType> {
        self.send_json(Method::Put, format!("/incident-types/{id}/"), draft)
            .await
    }

    pub async fn delete_incident_type(&self, id: &EntityId) -> ApiResult<()> {
        self.delete(format!("/incident-types/{id}/")).await
    }

    // Notification emails

    pub async fn notification_emails(&self) -> ApiResult<Vec<NotificationEmail>> {
        self.fetch_list(ApiRequest::new(Method::Get, "/notification-emails/"))
            .await
    }

    pub async fn create_notification_email(
        &self,
        draft: &NotificationEmailDraft,
    ) -> ApiResult<NotificationEmail> {
        self.send_json(Method::Post, "/notification-emails/".into(), draft)
            .await
    }

    pub async fn update_notification_email(
        &self,
        id: &EntityId,
        draft: &NotificationEmailDraft,
    ) -> ApiResult<NotificationEmail> {
        self.send_json(Method::Put, format!("/notification-emails/{id}/"), draft)
            .await
    }

    pub async fn delete_notification_email(&self, id: &EntityId) -> ApiResult<()> {
        self.delete(format!("/notification-emails/{id}/")).await
    }

    // Auth

    pub async fn login(&self, username: &str, password: &str) -> ApiResult<AuthStatus> {
        let mut status: AuthStatus = self
            .send_json(
                Method::Post,
                "/auth/login/".into(),
                &Credentials { username, password },
            )
            .await?;
        // A 2xx login means the session exists even if the body is terse.
        status.authenticated = true;
        if status.display_name().is_none() {
            status.username = Some(username.to_string());
        }
        Ok(status)
    }

    pub async fn logout(&self) -> ApiResult<()> {
        self.execute(ApiRequest::new(Method::Post, "/auth/logout/"))
            .await?;
        Ok(())
    }

    pub async fn check_auth(&self) -> ApiResult<AuthStatus> {
        match self
            .fetch(ApiRequest::new(Method::Get, "/auth/check_auth/"))
            .await
        {
            Err(ApiError::Unauthorized) => Ok(AuthStatus::default()),
            other => other,
        }
    }
}

fn classify_failure(path: &str, response: &ApiResponse) -> ApiError {
    let body = response.json_value();
    match response.status {
        401 | 403 if is_auth_failure(response.status, body.as_ref()) => ApiError::Unauthorized,
        404 => ApiError::NotFound(path.to_string()),
        400..=499 => match body.as_ref().and_then(FieldErrors::from_server_body) {
            Some(errors) => ApiError::Validation(errors),
            None => ApiError::Server {
                status: response.status,
                message: String::from_utf8_lossy(&response.body).into_owned(),
            },
        },
        status => ApiError::Server {
            status,
            message: body
                .as_ref()
                .and_then(|v| v.get("detail"))
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string)
                .unwrap_or_else(|| String::from_utf8_lossy(&response.body).into_owned()),
        },
    }
}

/// 401 always ends the session; 403 only when the server says credentials
/// are missing, since a CSRF rejection is also a 403.
fn is_auth_failure(status: u16, body: Option<&serde_json::Value>) -> bool {
    if status == 401 {
        return true;
    }
    body.and_then(|v| v.get("detail"))
        .and_then(serde_json::Value::as_str)
        .map(|d| d.contains("credentials were not provided") || d.contains("not authenticated"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use futures::executor::block_on;

    fn client() -> PortalClient<ScriptedTransport> {
        PortalClient::new(ScriptedTransport::new())
    }

    #[test]
    fn list_accepts_bare_and_paginated_payloads() {
        let client = client();
        client.transport().respond_json(
            Method::Get,
            "/sites/",
            200,
            serde_json::json!([{"id": 1, "name": "Plant A", "address": "North"}]),
        );
        client.transport().respond_json(
            Method::Get,
            "/sites/",
            200,
            serde_json::json!({"count": 1, "results": [{"id": 2, "name": "Plant B", "address": "South"}]}),
        );

        let bare = block_on(client.sites()).expect("bare");
        let paged = block_on(client.sites()).expect("paged");
        assert_eq!(bare[0].name, "Plant A");
        assert_eq!(paged[0].id.as_str(), "2");
    }

    #[test]
    fn unsafe_methods_carry_the_csrf_token() {
        let transport = ScriptedTransport::new().with_csrf("tok-1");
        let client = PortalClient::new(transport);
        client
            .transport()
            .respond_json(Method::Get, "/sites/", 200, serde_json::json!([]));
        client
            .transport()
            .respond_json(Method::Delete, "/sites/9/", 204, serde_json::Value::Null);

        block_on(client.sites()).expect("list");
        block_on(client.delete_site(&"9".into())).expect("delete");

        let sent = client.transport().requests();
        assert_eq!(sent[0].header(CSRF_HEADER), None);
        assert_eq!(sent[1].header(CSRF_HEADER), Some("tok-1"));
    }

    #[test]
    fn field_keyed_rejection_becomes_validation_error() {
        let client = client();
        client.transport().respond_json(
            Method::Post,
            "/notification-emails/",
            400,
            serde_json::json!({"email": ["notification email with this email already exists."]}),
        );
        let err = block_on(client.create_notification_email(&NotificationEmailDraft {
            email: "a@b.co".into(),
        }))
        .expect_err("rejected");
        assert!(err.field_errors().expect("fields").contains("email"));
    }

    #[test]
    fn unauthorized_and_not_found_are_distinguished() {
        let client = client();
        client
            .transport()
            .respond_json(Method::Get, "/incidents/", 401, serde_json::json!({"detail": "x"}));
        client
            .transport()
            .respond_json(Method::Get, "/sites/404/", 404, serde_json::json!({"detail": "Not found."}));

        assert!(block_on(client.incidents()).expect_err("401").is_unauthorized());
        assert!(block_on(client.site(&"404".into())).expect_err("404").is_not_found());
    }

    #[test]
    fn csrf_rejection_is_not_a_session_failure() {
        let client = client();
        client.transport().respond_json(
            Method::Post,
            "/sites/",
            403,
            serde_json::json!({"detail": "CSRF Failed: CSRF token missing."}),
        );
        let err = block_on(client.create_site(&SiteDraft::default())).expect_err("403");
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn network_failure_is_reported_as_transport_error() {
        let client = client();
        client
            .transport()
            .fail(Method::Get, "/sites/", TransportError::Network("refused".into()));
        let err = block_on(client.sites()).expect_err("network");
        assert!(matches!(err, ApiError::Transport(_)));
        assert!(err.user_message().contains("Unable to reach"));
    }

    #[test]
    fn append_mode_sends_only_new_images() {
        let client = client();
        client.transport().respond_json(
            Method::Patch,
            "/incidents/5/",
            200,
            serde_json::json!({"id": 5, "site": 1, "incident_type": 2, "description": "d"}),
        );
        block_on(client.update_incident_images(
            &"5".into(),
            vec![ImageFile::new("b.jpg", "image/jpeg", vec![1])],
            ImageUpdateMode::Append,
        ))
        .expect("patch");

        let sent = client.transport().requests();
        let Body::Multipart(form) = &sent[0].body else {
            panic!("expected multipart");
        };
        assert!(!form.has_field("replace_images"));
        assert_eq!(form.files_named(IMAGE_FIELD).count(), 1);
    }

    #[test]
    fn replace_mode_flags_the_patch() {
        let client = client();
        client.transport().respond_json(
            Method::Patch,
            "/incidents/5/",
            200,
            serde_json::json!({"id": 5, "site": 1, "incident_type": 2, "description": "d"}),
        );
        block_on(client.update_incident_images(&"5".into(), Vec::new(), ImageUpdateMode::Replace))
            .expect("patch");

        let sent = client.transport().requests();
        let Body::Multipart(form) = &sent[0].body else {
            panic!("expected multipart");
        };
        assert_eq!(form.field("replace_images"), Some("true"));
        assert_eq!(form.files_named(IMAGE_FIELD).count(), 0);
    }

    #[test]
    fn check_auth_treats_401_as_signed_out() {
        let client = client();
        client
            .transport()
            .respond_json(Method::Get, "/auth/check_auth/", 401, serde_json::json!({}));
        let status = block_on(client.check_auth()).expect("status");
        assert!(!status.authenticated);
    }

    #[test]
    fn csrf_token_is_read_from_cookie_header() {
        assert_eq!(
            csrf_from_cookie_header("sessionid=abc; csrftoken=xyz"),
            Some("xyz".to_string())
        );
        assert_eq!(csrf_from_cookie_header("sessionid=abc"), None);
        assert_eq!(csrf_from_cookie_header("csrftoken="), None);
    }
}
