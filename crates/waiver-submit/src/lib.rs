//! Consent waiver submission
//!
//! Stores the rendered waiver, mints a bearer token for the signed-in member
//! and posts the consent record, in that order:
//!
//! - [`identity`]: current principal and bearer tokens
//! - [`access`]: route guard shared by every page
//! - [`store`]: blob storage for rendered waivers
//! - [`endpoint`]: the remote consent endpoint
//! - [`session`]: the submission state machine
//! - [`config`]: TOML configuration and collaborator wiring

pub mod access;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod identity;
pub mod session;
pub mod store;

pub use access::{AuthState, Denied, Requirement};
pub use config::SubmitConfig;
pub use endpoint::{ConsentEndpoint, ConsentPayload, EndpointError, HttpConsentEndpoint};
pub use error::SubmitError;
pub use identity::{IdentityError, IdentityProvider, Principal, RefreshTokenIdentity, StaticIdentity};
pub use session::{ConsentSession, ConsentSubmitter, Redirect, SubmissionState};
pub use store::{BlobPath, BlobStore, FsBlobStore, HttpBlobStore, StoreError, StoredDocument};
