//! Admin session, route table and the guard between them.

use crate::api::{PortalClient, Transport};
use crate::error::{ApiError, ApiResult};
use crate::model::{AuthStatus, EntityId};
use crate::validation::{require, FieldErrors, NON_FIELD};
use tracing::{info, warn};

/// Who is signed in, as last confirmed by the server.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    authenticated: bool,
    username: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(username: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            username: Some(username.into()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// The server's answer replaces local state.
    pub fn apply(&mut self, status: &AuthStatus) {
        self.authenticated = status.authenticated;
        self.username = if status.authenticated {
            status.display_name().map(ToString::to_string)
        } else {
            None
        };
    }

    pub fn clear(&mut self) {
        *self = Self::anonymous();
    }

    /// Clears the session on `Unauthorized` and passes the result through.
    pub fn intercept<T>(&mut self, result: ApiResult<T>) -> ApiResult<T> {
        if matches!(result, Err(ApiError::Unauthorized)) && self.authenticated {
            warn!("session rejected by server; signing out");
            self.clear();
        }
        result
    }

    pub async fn login<T: Transport>(
        &mut self,
        client: &PortalClient<T>,
        username: &str,
        password: &str,
    ) -> ApiResult<()> {
        let status = client.login(username, password).await?;
        self.apply(&status);
        info!(user = self.username().unwrap_or(username), "signed in");
        Ok(())
    }

    /// Local state is cleared even when the server call fails.
    pub async fn logout<T: Transport>(&mut self, client: &PortalClient<T>) -> ApiResult<()> {
        let result = client.logout().await;
        self.clear();
        result
    }

    pub async fn check_auth<T: Transport>(&mut self, client: &PortalClient<T>) -> ApiResult<()> {
        let status = client.check_auth().await?;
        self.apply(&status);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Home,
    Public(EntityId),
    Login,
    Dashboard,
    Sites,
    Contacts,
    Incidents,
    IncidentTypes,
    Emails,
    QrCodes,
    NotFound(String),
}

impl Route {
    /// `/` and `/admin/dashboard` are the dashboard; `/admin` is the sites
    /// screen. Trailing slashes and query strings are ignored.
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Route::Dashboard,
            ["home"] => Route::Home,
            ["login"] => Route::Login,
            ["public", site] => Route::Public(EntityId::new(*site)),
            ["admin"] | ["admin", "sites"] => Route::Sites,
            ["admin", "dashboard"] => Route::Dashboard,
            ["admin", "contacts"] => Route::Contacts,
            ["admin", "incidents"] => Route::Incidents,
            ["admin", "incident-types"] => Route::IncidentTypes,
            ["admin", "emails"] => Route::Emails,
            ["admin", "qr-codes"] => Route::QrCodes,
            _ => Route::NotFound(path.to_string()),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/home".into(),
            Route::Public(site) => format!("/public/{site}"),
            Route::Login => "/login".into(),
            Route::Dashboard => "/admin/dashboard".into(),
            Route::Sites => "/admin/sites".into(),
            Route::Contacts => "/admin/contacts".into(),
            Route::Incidents => "/admin/incidents".into(),
            Route::IncidentTypes => "/admin/incident-types".into(),
            Route::Emails => "/admin/emails".into(),
            Route::QrCodes => "/admin/qr-codes".into(),
            Route::NotFound(path) => path.clone(),
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Route::Dashboard
                | Route::Sites
                | Route::Contacts
                | Route::Incidents
                | Route::IncidentTypes
                | Route::Emails
                | Route::QrCodes
        )
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Home => "Safety Feedback System",
            Route::Public(_) => "Safety Feedback",
            Route::Login => "Sign in",
            Route::Dashboard => "Admin Dashboard",
            Route::Sites => "Sites",
            Route::Contacts => "Emergency Contacts",
            Route::Incidents => "Incidents",
            Route::IncidentTypes => "Incident Types",
            Route::Emails => "Notification Emails",
            Route::QrCodes => "QR Codes",
            Route::NotFound(_) => "Page Not Found",
        }
    }

    /// Entries of the admin navigation bar, in display order.
    pub const ADMIN_NAV: [Route; 7] = [
        Route::Dashboard,
        Route::Sites,
        Route::Contacts,
        Route::Incidents,
        Route::IncidentTypes,
        Route::Emails,
        Route::QrCodes,
    ];
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    Render(Route),
    /// Send to login, then back to `after`.
    Login { after: Route },
}

/// Admin routes need a session; public routes never do.
pub fn guard(route: Route, session: &Session) -> Navigation {
    if route.requires_auth() && !session.is_authenticated() {
        Navigation::Login { after: route }
    } else {
        Navigation::Render(route)
    }
}

/// Where to go after a successful sign-in.
pub fn after_login(requested: Option<Route>) -> Route {
    match requested {
        Some(route) if route.requires_auth() => route,
        _ => Route::Dashboard,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    errors: FieldErrors,
    submitting: bool,
}

impl LoginForm {
    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn set_username(&mut self, value: impl Into<String>) {
        self.username = value.into();
        self.errors.clear("username");
        self.errors.clear(NON_FIELD);
    }

    pub fn set_password(&mut self, value: impl Into<String>) {
        self.password = value.into();
        self.errors.clear("password");
        self.errors.clear(NON_FIELD);
    }

    pub fn begin_submit(&mut self) -> Option<(String, String)> {
        if self.submitting {
            return None;
        }
        let mut errors = FieldErrors::new();
        require(&mut errors, "username", &self.username, "Username is required");
        require(&mut errors, "password", &self.password, "Password is required");
        if !errors.is_empty() {
            self.errors = errors;
            return None;
        }
        self.submitting = true;
        Some((self.username.trim().to_string(), self.password.clone()))
    }

    pub fn finish_submit(&mut self, result: &ApiResult<()>) {
        self.submitting = false;
        match result {
            Ok(()) => {
                self.password.clear();
                self.errors.clear_all();
            }
            Err(ApiError::Unauthorized) => {
                self.errors
                    .insert(NON_FIELD, "Invalid username or password");
            }
            Err(ApiError::Validation(server)) => self.errors.merge(server.clone()),
            Err(err) => self.errors.insert(NON_FIELD, err.user_message()),
        }
    }

    /// Runs the whole sign-in against `client`, updating `session`.
    pub async fn submit<T: Transport>(
        &mut self,
        client: &PortalClient<T>,
        session: &mut Session,
    ) -> bool {
        let Some((username, password)) = self.begin_submit() else {
            return false;
        };
        let result = session.login(client, &username, &password).await;
        self.finish_submit(&result);
        result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Method;
    use crate::testing::ScriptedTransport;
    use futures::executor::block_on;

    #[test]
    fn routes_round_trip_through_paths() {
        for route in Route::ADMIN_NAV {
            assert_eq!(Route::parse(&route.path()), route);
        }
        assert_eq!(Route::parse("/public/42/"), Route::Public("42".into()));
        assert_eq!(Route::parse("/"), Route::Dashboard);
        assert_eq!(Route::parse("/admin"), Route::Sites);
        assert_eq!(Route::parse("/home?x=1"), Route::Home);
        assert!(matches!(Route::parse("/nope"), Route::NotFound(_)));
    }

    #[test]
    fn admin_routes_redirect_without_session() {
        let session = Session::anonymous();
        assert_eq!(
            guard(Route::Incidents, &session),
            Navigation::Login { after: Route::Incidents }
        );
        assert_eq!(
            guard(Route::Public("1".into()), &session),
            Navigation::Render(Route::Public("1".into()))
        );
        let session = Session::signed_in("admin");
        assert_eq!(guard(Route::Incidents, &session), Navigation::Render(Route::Incidents));
    }

    #[test]
    fn unauthorized_clears_the_session() {
        let mut session = Session::signed_in("admin");
        let result: ApiResult<()> = session.intercept(Err(ApiError::Unauthorized));
        assert!(result.is_err());
        assert!(!session.is_authenticated());
        assert_eq!(guard(Route::Sites, &session), Navigation::Login { after: Route::Sites });
    }

    #[test]
    fn other_failures_keep_the_session() {
        let mut session = Session::signed_in("admin");
        let _ = session.intercept::<()>(Err(ApiError::NotFound("/x/".into())));
        assert!(session.is_authenticated());
    }

    #[test]
    fn check_auth_answer_replaces_local_state() {
        let client = PortalClient::new(ScriptedTransport::new());
        client.transport().respond_json(
            Method::Get,
            "/auth/check_auth/",
            200,
            serde_json::json!({"authenticated": false}),
        );
        let mut session = Session::signed_in("admin");
        block_on(session.check_auth(&client)).expect("check");
        assert!(!session.is_authenticated());
        assert_eq!(session.username(), None);
    }

    #[test]
    fn login_form_reports_bad_credentials() {
        let client = PortalClient::new(ScriptedTransport::new());
        client.transport().respond_json(
            Method::Post,
            "/auth/login/",
            401,
            serde_json::json!({"detail": "Invalid credentials"}),
        );
        let mut session = Session::anonymous();
        let mut form = LoginForm::default();
        assert!(!block_on(form.submit(&client, &mut session)));
        assert!(form.errors().contains("username"));

        form.set_username("admin");
        form.set_password("wrong");
        assert!(!block_on(form.submit(&client, &mut session)));
        assert_eq!(form.errors().get(NON_FIELD), Some("Invalid username or password"));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn login_form_signs_in() {
        let client = PortalClient::new(ScriptedTransport::new());
        client.transport().respond_json(
            Method::Post,
            "/auth/login/",
            200,
            serde_json::json!({"user": {"username": "safety-admin"}}),
        );
        let mut session = Session::anonymous();
        let mut form = LoginForm::default();
        form.set_username("safety-admin");
        form.set_password("secret");
        assert!(block_on(form.submit(&client, &mut session)));
        assert_eq!(session.username(), Some("safety-admin"));
        assert!(form.password.is_empty());
        assert_eq!(after_login(Some(Route::Emails)), Route::Emails);
        assert_eq!(after_login(Some(Route::Login)), Route::Dashboard);
    }
}
