//! Consent waiver document core
//!
//! This crate turns a filled-in gym consent form and a freehand signature
//! into a paginated PDF waiver:
//!
//! - [`form`]: the form draft, its presence checks and the validated
//!   [`WaiverSubmission`]
//! - [`signature`]: PNG signature capture payloads
//! - [`layout`]: fixed-geometry, cursor-driven pagination with word wrap
//! - [`waiver`]: the waiver's content and order
//! - [`render`]: PDF encoding via lopdf
//!
//! Nothing here performs I/O; storage and submission live in `waiver-submit`.

pub mod error;
pub mod form;
pub mod layout;
pub mod render;
pub mod signature;
pub mod waiver;

pub use error::WaiverError;
pub use form::{ConsentForm, WaiverSubmission};
pub use layout::{Layout, Page, PageGeometry, PageWriter, Placement};
pub use signature::{RasterImage, SignatureImage};
pub use waiver::{compose, render_waiver, RenderedDocument};
