use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaiverError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("You must accept the {0} to continue")]
    AgreementNotAccepted(&'static str),

    #[error("Invalid signature image: {0}")]
    InvalidSignature(String),

    #[error("Failed to render waiver document: {0}")]
    RenderError(String),
}

impl WaiverError {
    /// True for errors the person filling in the form can fix themselves.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            WaiverError::MissingField(_) | WaiverError::AgreementNotAccepted(_)
        )
    }
}
