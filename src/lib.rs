//! Click-to-annotate tool: mark labeled points on an image and export them
//! as `id,x_px,y_px` rows.

pub mod app;
pub mod config;
pub mod error;
pub mod export;
pub mod overlay;
pub mod session;

pub use error::{ConfigError, SessionError};
pub use session::{Phase, Point, Session};
