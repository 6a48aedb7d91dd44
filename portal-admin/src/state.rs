use crate::error::{AdminError, AdminResult};
use portal_core::api::{PortalClient, Transport};
use portal_core::config::PortalConfig;
use portal_core::session::{guard, Navigation, Route, Session};
use portal_core::ApiResult;
use portal_http::HttpTransport;
use tracing::info;

/// Everything a command needs: the client and the session it runs under.
pub struct AppState<T> {
    pub client: PortalClient<T>,
    pub session: Session,
}

impl AppState<HttpTransport> {
    pub async fn connect(config: &PortalConfig, authenticate: bool) -> AdminResult<Self> {
        let transport = HttpTransport::new(config)?;
        info!(api = %config.api_base, "connecting");
        Self::open(PortalClient::new(transport), config, authenticate).await
    }
}

impl<T: Transport> AppState<T> {
    /// Signs in when credentials are configured; otherwise asks the server
    /// whether a session already exists. Public commands skip both.
    pub async fn open(
        client: PortalClient<T>,
        config: &PortalConfig,
        authenticate: bool,
    ) -> AdminResult<Self> {
        let mut state = Self::new(client);
        if !authenticate {
            return Ok(state);
        }
        match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                state.session.login(&state.client, username, password).await?;
            }
            _ => state.session.check_auth(&state.client).await?,
        }
        Ok(state)
    }

    pub fn new(client: PortalClient<T>) -> Self {
        Self {
            client,
            session: Session::anonymous(),
        }
    }

    /// Routes the result through the session so a 401 signs us out.
    pub fn track<R>(&mut self, result: ApiResult<R>) -> AdminResult<R> {
        self.session.intercept(result).map_err(|err| match err {
            portal_core::ApiError::Unauthorized => AdminError::NotSignedIn,
            other => AdminError::Api(other),
        })
    }

    /// Admin commands run under the same guard as the admin screens.
    pub fn require(&self, route: Route) -> AdminResult<()> {
        match guard(route, &self.session) {
            Navigation::Render(_) => Ok(()),
            Navigation::Login { .. } => Err(AdminError::NotSignedIn),
        }
    }
}
