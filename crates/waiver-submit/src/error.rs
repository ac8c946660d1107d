//! Submission errors and the messages shown to the member

use thiserror::Error;
use waiver_core::WaiverError;

use crate::endpoint::EndpointError;
use crate::identity::IdentityError;
use crate::store::StoreError;

pub const NOT_SIGNED_IN_MESSAGE: &str = "You must be logged in to submit the consent form.";
pub const GENERIC_MESSAGE: &str = "Unexpected error submitting consent.";

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("A submission is already in progress")]
    InFlight,

    #[error("Consent has already been submitted")]
    AlreadySubmitted,

    #[error(transparent)]
    Invalid(#[from] WaiverError),

    #[error("No user is signed in")]
    NotSignedIn,

    #[error("Storing the waiver failed: {0}")]
    Storage(#[from] StoreError),

    #[error("Identity token unavailable: {0}")]
    Identity(IdentityError),

    /// The endpoint answered with a non-2xx status
    #[error("Consent endpoint rejected submission ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Consent endpoint unreachable: {0}")]
    Endpoint(reqwest::Error),
}

impl From<IdentityError> for SubmitError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::NotSignedIn => SubmitError::NotSignedIn,
            other => SubmitError::Identity(other),
        }
    }
}

impl From<EndpointError> for SubmitError {
    fn from(err: EndpointError) -> Self {
        match err {
            EndpointError::Rejected { status, body } => SubmitError::Rejected { status, body },
            EndpointError::Http(e) => SubmitError::Endpoint(e),
        }
    }
}

impl SubmitError {
    /// Text for the form's error banner.
    ///
    /// An endpoint rejection surfaces its response body unchanged so the
    /// server can explain itself; transport and storage details stay in logs.
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Invalid(e) if e.is_input_error() => e.to_string(),
            SubmitError::NotSignedIn => NOT_SIGNED_IN_MESSAGE.to_string(),
            SubmitError::Rejected { body, .. } => body.clone(),
            SubmitError::Invalid(_)
            | SubmitError::InFlight
            | SubmitError::AlreadySubmitted
            | SubmitError::Storage(_)
            | SubmitError::Identity(_)
            | SubmitError::Endpoint(_) => GENERIC_MESSAGE.to_string(),
        }
    }
}
