//! Browser [`Transport`]: `fetch` with the session cookie, CSRF token read
//! from `document.cookie`.

use js_sys::{Array, Uint8Array};
use portal_core::api::{csrf_from_cookie_header, ApiRequest, ApiResponse, Body, Transport};
use portal_core::upload::MultipartForm;
use portal_core::TransportError;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Blob, BlobPropertyBag, FormData, Headers, RequestCredentials, RequestInit, Response};

fn request_err(err: JsValue) -> TransportError {
    TransportError::Request(format!("{err:?}"))
}

fn network_err(err: JsValue) -> TransportError {
    TransportError::Network(format!("{err:?}"))
}

#[derive(Clone, Copy, Debug)]
pub struct FetchTransport {
    base: &'static str,
}

impl FetchTransport {
    /// `base` is same-origin (`/api`) so the session cookie travels.
    pub fn new(base: &'static str) -> Self {
        Self { base }
    }

    fn url(&self, request: &ApiRequest) -> String {
        let mut url = format!("{}{}", self.base.trim_end_matches('/'), request.path);
        for (i, (key, value)) in request.query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(&String::from(js_sys::encode_uri_component(key)));
            url.push('=');
            url.push_str(&String::from(js_sys::encode_uri_component(value)));
        }
        url
    }
}

/// Bytes go in as a typed `Blob` so the server sees the original name and
/// content type.
fn to_form_data(form: MultipartForm) -> Result<FormData, TransportError> {
    let data = FormData::new().map_err(request_err)?;
    for (name, value) in &form.fields {
        data.append_with_str(name, value).map_err(request_err)?;
    }
    for part in form.files {
        let bytes = Uint8Array::from(part.file.bytes.as_slice());
        let options = BlobPropertyBag::new();
        options.set_type(&part.file.mime_type);
        let blob = Blob::new_with_u8_array_sequence_and_options(&Array::of1(&bytes), &options)
            .map_err(request_err)?;
        data.append_with_blob_and_filename(&part.name, &blob, &part.file.file_name)
            .map_err(request_err)?;
    }
    Ok(data)
}

impl Transport for FetchTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url(&request);
        let init = RequestInit::new();
        init.set_method(request.method.as_str());
        init.set_credentials(RequestCredentials::Include);
        let headers = Headers::new().map_err(request_err)?;
        for (name, value) in &request.headers {
            headers.set(name, value).map_err(request_err)?;
        }
        match request.body {
            Body::Empty => {}
            Body::Json(value) => {
                headers
                    .set("Content-Type", "application/json")
                    .map_err(request_err)?;
                init.set_body(&JsValue::from_str(&value.to_string()));
            }
            // The browser writes the multipart boundary header itself.
            Body::Multipart(form) => init.set_body(&to_form_data(form)?.into()),
        }
        init.set_headers(&headers);

        let window =
            web_sys::window().ok_or_else(|| TransportError::Network("window not available".into()))?;
        let response: Response = JsFuture::from(window.fetch_with_str_and_init(&url, &init))
            .await
            .map_err(network_err)?
            .dyn_into()
            .map_err(network_err)?;
        let status = response.status();
        let buffer = JsFuture::from(response.array_buffer().map_err(network_err)?)
            .await
            .map_err(network_err)?;
        Ok(ApiResponse {
            status,
            body: Uint8Array::new(&buffer).to_vec(),
        })
    }

    fn csrf_token(&self) -> Option<String> {
        let document = web_sys::window()?.document()?;
        let cookies = document.dyn_into::<web_sys::HtmlDocument>().ok()?.cookie().ok()?;
        csrf_from_cookie_header(&cookies)
    }
}
