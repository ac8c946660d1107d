//! Consent submission endpoint client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};
use waiver_core::WaiverSubmission;

use crate::store::StoredDocument;

#[derive(Debug, Error)]
pub enum EndpointError {
    /// Non-2xx response; `body` is the response text as received
    #[error("Consent endpoint rejected submission ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Consent endpoint request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// JSON body posted to the consent endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentPayload {
    pub name: String,
    pub email: String,
    pub date_of_birth: String,
    pub phone: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub has_medical_issues: bool,
    /// Empty unless `has_medical_issues` is set
    pub medical_issues_description: String,
    pub liability_agreed: bool,
    pub rules_agreed: bool,
    /// PNG data URL, or empty when no signature was drawn
    pub signature: String,
    #[serde(rename = "pdfURL")]
    pub pdf_url: String,
}

impl ConsentPayload {
    pub fn new(submission: &WaiverSubmission, stored: &StoredDocument) -> Self {
        let form = submission.form();
        Self {
            name: form.name.clone(),
            email: form.email.clone(),
            date_of_birth: form.date_of_birth.clone(),
            phone: form.phone.clone(),
            emergency_contact_name: form.emergency_contact_name.clone(),
            emergency_contact_phone: form.emergency_contact_phone.clone(),
            has_medical_issues: form.has_medical_issues,
            medical_issues_description: form.medical_disclosure().unwrap_or_default().to_string(),
            liability_agreed: form.liability_agreed,
            rules_agreed: form.rules_agreed,
            signature: submission
                .signature()
                .map(|s| s.to_data_url())
                .unwrap_or_default(),
            pdf_url: stored.download_url().to_string(),
        }
    }
}

#[async_trait]
pub trait ConsentEndpoint: Send + Sync {
    async fn submit(&self, bearer: &str, payload: &ConsentPayload) -> Result<(), EndpointError>;
}

pub struct HttpConsentEndpoint {
    client: reqwest::Client,
    url: String,
}

impl HttpConsentEndpoint {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ConsentEndpoint for HttpConsentEndpoint {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn submit(&self, bearer: &str, payload: &ConsentPayload) -> Result<(), EndpointError> {
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(bearer)
            .json(payload)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EndpointError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(status = status.as_u16(), "consent accepted");
        Ok(())
    }
}
