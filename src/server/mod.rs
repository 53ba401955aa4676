//! # Server Module
//!
//! The edge of the dispatcher: turning HTTP parts into a raw parameter source
//! on the way in, and handler results or failures into wire responses on the
//! way out. Transport (sockets, TLS, connection handling) lives elsewhere.
//!
//! ## Response shaping
//!
//! | handler result | `Auto` route | `Manual` route |
//! |---|---|---|
//! | JSON value | serialized, declared status + content type | 500 |
//! | string | verbatim, declared content type | 500 |
//! | null | declared status, empty body | 500 |
//! | wire response | passed through | passed through |
//!
//! Failures always use the envelope `{"type": ..., "message": ...}`.
//! Unclassified failures are logged in full and reported with a generic
//! message.

pub mod request;
pub mod response;

pub use request::{parse_method, parse_params};
pub use response::{
    status_kind, status_reason, HandlerOutput, HeaderVec, ResponseTranslator, WireResponse,
    GENERIC_ERROR_MESSAGE,
};
