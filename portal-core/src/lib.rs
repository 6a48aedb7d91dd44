//! Client side of the safety-incident portal: typed REST client, screen
//! state machines and the rules they enforce. Nothing here touches a
//! concrete network stack or browser API; those sit behind [`api::Transport`]
//! and [`camera::MediaDevices`].

pub mod admin;
pub mod api;
pub mod camera;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod filters;
pub mod model;
pub mod public;
pub mod qr;
pub mod session;
pub mod submission;
pub mod testing;
pub mod upload;
pub mod validation;

pub use api::{PortalClient, Transport};
pub use error::{ApiError, ApiResult, TransportError};
