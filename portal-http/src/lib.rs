//! Native [`Transport`] over `reqwest`, with a cookie jar holding the
//! portal session and CSRF cookies.

use portal_core::api::{csrf_from_cookie_header, ApiRequest, ApiResponse, Body, Method, Transport};
use portal_core::config::PortalConfig;
use portal_core::upload::MultipartForm;
use portal_core::TransportError;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("invalid API base url '{0}'")]
    InvalidBase(String),
    #[error(transparent)]
    Client(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
    jar: Arc<Jar>,
}

impl HttpTransport {
    pub fn new(config: &PortalConfig) -> Result<Self, HttpError> {
        let base = Url::parse(config.api_base.trim_end_matches('/'))
            .map_err(|_| HttpError::InvalidBase(config.api_base.clone()))?;
        if base.cannot_be_a_base() {
            return Err(HttpError::InvalidBase(config.api_base.clone()));
        }
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, base, jar })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, TransportError> {
        let joined = format!("{}{}", self.base.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| TransportError::Request(format!("{joined}: {e}")))
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn to_reqwest_form(form: MultipartForm) -> Result<Form, TransportError> {
    let mut out = Form::new();
    for (name, value) in form.fields {
        out = out.text(name, value);
    }
    for part in form.files {
        let file = part.file;
        let body = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.mime_type)
            .map_err(|e| TransportError::Request(e.to_string()))?;
        out = out.part(part.name, body);
    }
    Ok(out)
}

impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url(&request.path)?;
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if !request.method.is_safe() {
            // Django checks the referer on secure origins.
            builder = builder.header(reqwest::header::REFERER, self.base.as_str());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::Multipart(form) => builder.multipart(to_reqwest_form(form)?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?
            .to_vec();
        debug!(status, bytes = body.len(), "http response");
        Ok(ApiResponse { status, body })
    }

    fn csrf_token(&self) -> Option<String> {
        let header = self.jar.cookies(&self.base)?;
        csrf_from_cookie_header(header.to_str().ok()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &str) -> PortalConfig {
        PortalConfig {
            api_base: base.into(),
            ..PortalConfig::default()
        }
    }

    #[test]
    fn paths_are_joined_below_the_base() {
        let transport = HttpTransport::new(&config("https://portal.example.com/hex/api/")).expect("transport");
        let url = transport.url("/sites/3/qr_code/").expect("url");
        assert_eq!(url.as_str(), "https://portal.example.com/hex/api/sites/3/qr_code/");
    }

    #[test]
    fn unusable_base_is_rejected() {
        assert!(matches!(
            HttpTransport::new(&config("not a url")),
            Err(HttpError::InvalidBase(_))
        ));
    }

    #[test]
    fn csrf_token_comes_from_the_jar() {
        let transport = HttpTransport::new(&config("http://localhost:8000/api")).expect("transport");
        assert_eq!(transport.csrf_token(), None);
        let origin = Url::parse("http://localhost:8000/").expect("origin");
        transport.jar.add_cookie_str("csrftoken=abc123; Path=/", &origin);
        assert_eq!(transport.csrf_token(), Some("abc123".to_string()));
    }
}
