pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
pub const BROWSER_API_BASE: &str = "/api";

/// Settings read once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortalConfig {
    pub api_base: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_agent: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            username: None,
            password: None,
            user_agent: default_user_agent(),
        }
    }
}

fn default_user_agent() -> String {
    format!("safety-portal/{}", env!("CARGO_PKG_VERSION"))
}

impl PortalConfig {
    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            api_base: get("PORTAL_API_BASE")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.into()),
            username: get("PORTAL_USERNAME"),
            password: get("PORTAL_PASSWORD"),
            user_agent: get("PORTAL_USER_AGENT").unwrap_or_else(default_user_agent),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}
