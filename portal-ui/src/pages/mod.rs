pub mod contacts;
pub mod crud;
pub mod dashboard;
pub mod emails;
pub mod home;
pub mod incident_types;
pub mod incidents;
pub mod login;
pub mod public;
pub mod qr_codes;
pub mod sites;

use leptos::*;

/// Inline message under a form field.
pub fn field_error(message: impl Fn() -> Option<String> + 'static) -> impl IntoView {
    let message = create_memo(move |_| message());
    move || message.get().map(|m| view! { <p class="field-error">{m}</p> })
}

/// Reads picked files into memory, in selection order.
pub async fn read_files(input: web_sys::HtmlInputElement) -> Vec<portal_core::upload::ImageFile> {
    let mut out = Vec::new();
    let Some(files) = input.files() else {
        return out;
    };
    for index in 0..files.length() {
        let Some(file) = files.get(index) else {
            continue;
        };
        let Ok(buffer) = wasm_bindgen_futures::JsFuture::from(file.array_buffer()).await else {
            continue;
        };
        let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
        let mime = file.type_();
        out.push(if mime.is_empty() {
            portal_core::upload::ImageFile::from_path_bytes(file.name(), bytes)
        } else {
            portal_core::upload::ImageFile::new(file.name(), mime, bytes)
        });
    }
    input.set_value("");
    out
}
