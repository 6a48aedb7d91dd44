//! Camera capture lifecycle, independent of the media runtime.
//!
//! A [`CameraSession`] holds at most one stream. Every exit path (capture,
//! cancel, failure, drop) stops it.

use crate::upload::ImageFile;
use tracing::{debug, warn};

pub const JPEG_QUALITY: f64 = 0.8;
pub const IDEAL_WIDTH: u32 = 1280;
pub const IDEAL_HEIGHT: u32 = 720;

const MOBILE_MARKERS: [&str; 8] = [
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    MOBILE_MARKERS.iter().any(|m| ua.contains(m))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FacingMode {
    /// Rear sensor.
    Environment,
    User,
}

impl FacingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::Environment => "environment",
            FacingMode::User => "user",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing_mode: Option<FacingMode>,
}

impl CameraConstraints {
    /// Handheld devices ask for the rear sensor.
    pub fn for_user_agent(user_agent: &str) -> Self {
        Self {
            ideal_width: IDEAL_WIDTH,
            ideal_height: IDEAL_HEIGHT,
            facing_mode: is_mobile_user_agent(user_agent).then_some(FacingMode::Environment),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    #[error("Camera access was denied. Please allow camera permissions and try again.")]
    PermissionDenied,
    #[error("No camera found on this device.")]
    NotFound,
    #[error("Camera is not supported on this device.")]
    Unsupported,
    #[error("Unable to access camera.")]
    Other { detail: String },
    #[error("Camera is not ready yet.")]
    NotReady,
    #[error("Could not capture a photo: {0}")]
    CaptureFailed(String),
}

impl CameraError {
    /// Maps a media runtime error name (`NotAllowedError`, ...) to a kind.
    pub fn classify(name: &str, detail: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
                CameraError::PermissionDenied
            }
            "NotFoundError" | "DevicesNotFoundError" | "OverconstrainedError" => {
                CameraError::NotFound
            }
            "NotSupportedError" | "TypeError" => CameraError::Unsupported,
            _ => CameraError::Other {
                detail: format!("{name}: {detail}"),
            },
        }
    }

    /// Every acquisition failure can be retried from the same screen.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CameraError::NotReady)
    }
}

/// A live video stream.
pub trait MediaStream {
    /// Stops every track. Must be idempotent.
    fn stop(&mut self);

    /// Encodes the current frame as JPEG at `quality` in `0.0..=1.0`.
    fn capture_jpeg(&self, quality: f64) -> Result<Vec<u8>, CameraError>;
}

/// Capability probe and stream acquisition of the runtime.
#[allow(async_fn_in_trait)]
pub trait MediaDevices {
    type Stream: MediaStream;

    fn is_supported(&self) -> bool;

    async fn open_stream(&self, constraints: &CameraConstraints)
        -> Result<Self::Stream, CameraError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraState {
    Idle,
    /// Stream requested or attached; the video surface has no metadata yet.
    Initializing,
    Live,
    Failed(CameraError),
    Closed,
}

/// Token tying an acquisition to the open call that started it, so a late
/// stream from a superseded attempt is stopped rather than kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenTicket(u64);

pub struct CameraSession<S: MediaStream> {
    state: CameraState,
    stream: Option<S>,
    generation: u64,
    constraints: CameraConstraints,
}

impl<S: MediaStream> CameraSession<S> {
    pub fn new(constraints: CameraConstraints) -> Self {
        Self {
            state: CameraState::Idle,
            stream: None,
            generation: 0,
            constraints,
        }
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn constraints(&self) -> &CameraConstraints {
        &self.constraints
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    pub fn error(&self) -> Option<&CameraError> {
        match &self.state {
            CameraState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Shows the loading placeholder until the surface reports metadata.
    pub fn shows_placeholder(&self) -> bool {
        matches!(self.state, CameraState::Initializing)
    }

    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            debug!("camera stream stopped");
        }
    }

    /// Starts (or retries) acquisition. Any held stream is released first.
    /// `Err` means the runtime cannot do camera capture at all.
    pub fn begin_open(&mut self, supported: bool) -> Result<OpenTicket, CameraError> {
        self.release();
        self.generation += 1;
        if !supported {
            self.state = CameraState::Failed(CameraError::Unsupported);
            return Err(CameraError::Unsupported);
        }
        self.state = CameraState::Initializing;
        Ok(OpenTicket(self.generation))
    }

    /// Completes an acquisition started by `begin_open`.
    pub fn attach(&mut self, ticket: OpenTicket, result: Result<S, CameraError>) {
        let current = ticket.0 == self.generation && self.state == CameraState::Initializing;
        match result {
            Ok(mut stream) if !current => {
                debug!("discarding stream from a superseded camera request");
                stream.stop();
            }
            Ok(stream) => self.stream = Some(stream),
            Err(_) if !current => {}
            Err(err) => {
                warn!(error = %err, "camera acquisition failed");
                self.state = CameraState::Failed(err);
            }
        }
    }

    /// The video surface has loaded metadata.
    pub fn mark_live(&mut self) {
        if self.state == CameraState::Initializing && self.stream.is_some() {
            self.state = CameraState::Live;
        }
    }

    /// Grabs the current frame as `photo_<now_millis>.jpg` and closes.
    pub fn capture(&mut self, now_millis: i64) -> Result<ImageFile, CameraError> {
        let stream = match (&self.state, &self.stream) {
            (CameraState::Live, Some(stream)) => stream,
            _ => return Err(CameraError::NotReady),
        };
        let bytes = match stream.capture_jpeg(JPEG_QUALITY) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Err(CameraError::CaptureFailed("empty frame".into())),
            Err(err) => return Err(err),
        };
        self.close();
        Ok(ImageFile::new(
            format!("photo_{now_millis}.jpg"),
            "image/jpeg",
            bytes,
        ))
    }

    pub fn close(&mut self) {
        self.release();
        self.state = CameraState::Closed;
    }

    /// Convenience over `begin_open`/`attach` for callers that can await
    /// while holding the session.
    pub async fn open<D>(&mut self, devices: &D) -> Result<(), CameraError>
    where
        D: MediaDevices<Stream = S>,
    {
        let ticket = self.begin_open(devices.is_supported())?;
        let result = devices.open_stream(&self.constraints).await;
        self.attach(ticket, result);
        match self.error() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl<S: MediaStream> Drop for CameraSession<S> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Tracks {
        stops: Rc<Cell<usize>>,
        opened: Rc<Cell<usize>>,
    }

    struct FakeStream {
        tracks: Tracks,
        frame: Vec<u8>,
        stopped: bool,
    }

    impl MediaStream for FakeStream {
        fn stop(&mut self) {
            if !self.stopped {
                self.stopped = true;
                self.tracks.stops.set(self.tracks.stops.get() + 1);
            }
        }

        fn capture_jpeg(&self, quality: f64) -> Result<Vec<u8>, CameraError> {
            assert_eq!(quality, JPEG_QUALITY);
            Ok(self.frame.clone())
        }
    }

    struct FakeDevices {
        supported: bool,
        failure: Option<CameraError>,
        tracks: Tracks,
    }

    impl MediaDevices for FakeDevices {
        type Stream = FakeStream;

        fn is_supported(&self) -> bool {
            self.supported
        }

        async fn open_stream(&self, _: &CameraConstraints) -> Result<FakeStream, CameraError> {
            if let Some(err) = &self.failure {
                return Err(err.clone());
            }
            self.tracks.opened.set(self.tracks.opened.get() + 1);
            Ok(FakeStream {
                tracks: self.tracks.clone(),
                frame: vec![0xff, 0xd8],
                stopped: false,
            })
        }
    }

    fn devices() -> FakeDevices {
        FakeDevices {
            supported: true,
            failure: None,
            tracks: Tracks::default(),
        }
    }

    fn session() -> CameraSession<FakeStream> {
        CameraSession::new(CameraConstraints::for_user_agent("Mozilla/5.0 (X11; Linux)"))
    }

    #[test]
    fn mobile_agents_request_rear_camera() {
        let iphone = CameraConstraints::for_user_agent(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)",
        );
        assert_eq!(iphone.facing_mode, Some(FacingMode::Environment));
        assert_eq!((iphone.ideal_width, iphone.ideal_height), (1280, 720));
        let desktop = CameraConstraints::for_user_agent("Mozilla/5.0 (Windows NT 10.0)");
        assert_eq!(desktop.facing_mode, None);
    }

    #[test]
    fn close_without_capture_stops_all_tracks() {
        let devices = devices();
        let mut cam = session();
        block_on(cam.open(&devices)).expect("open");
        assert!(cam.shows_placeholder());
        cam.mark_live();
        cam.close();
        assert_eq!(devices.tracks.stops.get(), 1);
        assert_eq!(cam.state(), &CameraState::Closed);
    }

    #[test]
    fn dropping_the_session_stops_the_stream() {
        let devices = devices();
        {
            let mut cam = session();
            block_on(cam.open(&devices)).expect("open");
        }
        assert_eq!(devices.tracks.stops.get(), 1);
    }

    #[test]
    fn capture_names_the_photo_and_releases_the_stream() {
        let devices = devices();
        let mut cam = session();
        block_on(cam.open(&devices)).expect("open");
        assert_eq!(cam.capture(1), Err(CameraError::NotReady));
        cam.mark_live();

        let photo = cam.capture(1_700_000_000_123).expect("photo");
        assert_eq!(photo.file_name, "photo_1700000000123.jpg");
        assert_eq!(photo.mime_type, "image/jpeg");
        assert_eq!(devices.tracks.stops.get(), 1);
        assert!(!cam.has_stream());
    }

    #[test]
    fn unsupported_runtime_fails_without_acquiring() {
        let mut devices = devices();
        devices.supported = false;
        let mut cam = session();
        assert_eq!(block_on(cam.open(&devices)), Err(CameraError::Unsupported));
        assert_eq!(devices.tracks.opened.get(), 0);
        assert_eq!(cam.error(), Some(&CameraError::Unsupported));
    }

    #[test]
    fn retry_releases_the_previous_stream_first() {
        let devices = devices();
        let mut cam = session();
        block_on(cam.open(&devices)).expect("first");
        block_on(cam.open(&devices)).expect("retry");
        assert_eq!(devices.tracks.opened.get(), 2);
        assert_eq!(devices.tracks.stops.get(), 1);
    }

    #[test]
    fn late_stream_after_close_is_stopped() {
        let devices = devices();
        let mut cam = session();
        let ticket = cam.begin_open(true).expect("ticket");
        cam.close();
        let late = block_on(devices.open_stream(cam.constraints())).expect("stream");
        cam.attach(ticket, Ok(late));
        assert!(!cam.has_stream());
        assert_eq!(devices.tracks.stops.get(), 1);
    }

    #[test]
    fn acquisition_errors_are_classified() {
        assert_eq!(CameraError::classify("NotAllowedError", ""), CameraError::PermissionDenied);
        assert_eq!(CameraError::classify("NotFoundError", ""), CameraError::NotFound);
        assert_eq!(CameraError::classify("NotSupportedError", ""), CameraError::Unsupported);
        assert!(matches!(
            CameraError::classify("AbortError", "busy"),
            CameraError::Other { .. }
        ));
        assert_eq!(
            CameraError::Other { detail: "x".into() }.to_string(),
            "Unable to access camera."
        );
    }

    #[test]
    fn denied_permission_leaves_a_retryable_failure() {
        let mut devices = devices();
        devices.failure = Some(CameraError::PermissionDenied);
        let mut cam = session();
        let err = block_on(cam.open(&devices)).expect_err("denied");
        assert!(err.is_retryable());
        assert!(!cam.has_stream());
        devices.failure = None;
        block_on(cam.open(&devices)).expect("retry");
        assert!(cam.has_stream());
    }
}
