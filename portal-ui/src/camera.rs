//! Camera over `navigator.mediaDevices`, rendering into a `<video>` element
//! and encoding frames through a scratch canvas.

use js_sys::{Object, Reflect};
use portal_core::camera::{CameraConstraints, CameraError, MediaDevices, MediaStream};
use portal_core::upload::decode_data_url;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlVideoElement, MediaStreamConstraints};

fn js_text(value: &JsValue, key: &str) -> String {
    Reflect::get(value, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_string())
        .unwrap_or_default()
}

fn classify(err: JsValue) -> CameraError {
    CameraError::classify(&js_text(&err, "name"), &js_text(&err, "message"))
}

fn ideal(value: u32) -> Result<Object, CameraError> {
    let object = Object::new();
    Reflect::set(&object, &"ideal".into(), &JsValue::from(value)).map_err(classify)?;
    Ok(object)
}

fn video_constraints(constraints: &CameraConstraints) -> Result<Object, CameraError> {
    let video = Object::new();
    Reflect::set(&video, &"width".into(), &ideal(constraints.ideal_width)?.into()).map_err(classify)?;
    Reflect::set(&video, &"height".into(), &ideal(constraints.ideal_height)?.into()).map_err(classify)?;
    if let Some(facing) = constraints.facing_mode {
        Reflect::set(&video, &"facingMode".into(), &facing.as_str().into()).map_err(classify)?;
    }
    Ok(video)
}

pub fn user_agent() -> String {
    web_sys::window()
        .and_then(|w| w.navigator().user_agent().ok())
        .unwrap_or_default()
}

/// Devices bound to the `<video>` element the stream will play in.
pub struct BrowserDevices {
    video: HtmlVideoElement,
}

impl BrowserDevices {
    pub fn new(video: HtmlVideoElement) -> Self {
        Self { video }
    }
}

impl MediaDevices for BrowserDevices {
    type Stream = BrowserStream;

    fn is_supported(&self) -> bool {
        web_sys::window()
            .map(|w| w.navigator().media_devices().is_ok())
            .unwrap_or(false)
    }

    async fn open_stream(&self, constraints: &CameraConstraints) -> Result<BrowserStream, CameraError> {
        let window = web_sys::window().ok_or(CameraError::Unsupported)?;
        let devices = window
            .navigator()
            .media_devices()
            .map_err(|_| CameraError::Unsupported)?;
        let request = MediaStreamConstraints::new();
        request.set_video(&video_constraints(constraints)?.into());
        request.set_audio(&JsValue::FALSE);
        let promise = devices
            .get_user_media_with_constraints(&request)
            .map_err(classify)?;
        let stream: web_sys::MediaStream = JsFuture::from(promise).await.map_err(classify)?.unchecked_into();
        self.video.set_src_object(Some(&stream));
        Ok(BrowserStream {
            stream,
            video: self.video.clone(),
        })
    }
}

pub struct BrowserStream {
    stream: web_sys::MediaStream,
    video: HtmlVideoElement,
}

impl MediaStream for BrowserStream {
    fn stop(&mut self) {
        for track in self.stream.get_tracks().iter() {
            track.unchecked_into::<web_sys::MediaStreamTrack>().stop();
        }
        self.video.set_src_object(None);
    }

    fn capture_jpeg(&self, quality: f64) -> Result<Vec<u8>, CameraError> {
        let (width, height) = (self.video.video_width(), self.video.video_height());
        if width == 0 || height == 0 {
            return Err(CameraError::NotReady);
        }
        let failed = |err: JsValue| CameraError::CaptureFailed(format!("{err:?}"));
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or(CameraError::Unsupported)?;
        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(failed)?
            .unchecked_into();
        canvas.set_width(width);
        canvas.set_height(height);
        let context: CanvasRenderingContext2d = canvas
            .get_context("2d")
            .map_err(failed)?
            .ok_or_else(|| CameraError::CaptureFailed("no 2d context".into()))?
            .unchecked_into();
        context
            .draw_image_with_html_video_element(&self.video, 0.0, 0.0)
            .map_err(failed)?;
        let data_url = canvas
            .to_data_url_with_type_and_encoder_options("image/jpeg", &JsValue::from_f64(quality))
            .map_err(failed)?;
        let (_, bytes) = decode_data_url(&data_url).map_err(CameraError::CaptureFailed)?;
        Ok(bytes)
    }
}
