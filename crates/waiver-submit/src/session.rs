//! Consent submission pipeline
//!
//! `Idle → Validating → Persisting → Submitting → Succeeded`, with `Failed`
//! reachable from every in-flight step. The waiver PDF is always stored and
//! its reference resolved before the endpoint is contacted, so a recorded
//! consent never points at a missing document. Nothing is retried; a failed
//! session starts again from the top on the next submit.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use waiver_core::{render_waiver, ConsentForm, SignatureImage, WaiverSubmission};

use crate::access::{AuthState, Denied, Requirement};
use crate::endpoint::{ConsentEndpoint, ConsentPayload};
use crate::error::{SubmitError, GENERIC_MESSAGE};
use crate::identity::IdentityProvider;
use crate::store::{self, BlobPath, BlobStore};

pub const SUCCESS_ROUTE: &str = "/memberships";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Validating,
    Persisting,
    Submitting,
    Succeeded,
    Failed,
}

impl SubmissionState {
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            SubmissionState::Validating | SubmissionState::Persisting | SubmissionState::Submitting
        )
    }
}

/// Where to send the member once consent is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: String,
}

/// The collaborators a submission talks to.
#[derive(Clone)]
pub struct ConsentSubmitter {
    pub(crate) identity: Arc<dyn IdentityProvider>,
    pub(crate) store: Arc<dyn BlobStore>,
    pub(crate) endpoint: Arc<dyn ConsentEndpoint>,
    pub(crate) success_route: String,
}

impl ConsentSubmitter {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn BlobStore>,
        endpoint: Arc<dyn ConsentEndpoint>,
    ) -> Self {
        Self {
            identity,
            store,
            endpoint,
            success_route: SUCCESS_ROUTE.to_string(),
        }
    }

    pub fn with_success_route(mut self, route: impl Into<String>) -> Self {
        self.success_route = route.into();
        self
    }

    pub fn identity(&self) -> &dyn IdentityProvider {
        self.identity.as_ref()
    }
}

/// One open consent form.
#[derive(Debug, Default)]
pub struct ConsentSession {
    pub form: ConsentForm,
    signature: Option<SignatureImage>,
    state: SubmissionState,
    error: Option<String>,
}

impl ConsentSession {
    /// Opens the form for a signed-in member.
    pub fn open(auth: &AuthState) -> Result<Self, Denied> {
        Requirement::Authenticated.check(auth)?;
        Ok(Self::default())
    }

    pub fn set_signature(&mut self, signature: SignatureImage) {
        self.signature = Some(signature);
    }

    pub fn clear_signature(&mut self) {
        self.signature = None;
        self.error = None;
    }

    pub fn signature(&self) -> Option<&SignatureImage> {
        self.signature.as_ref()
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Message for the error banner, if the last attempt failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.state.is_in_flight()
    }

    pub fn can_submit(&self) -> bool {
        !self.state.is_in_flight() && self.state != SubmissionState::Succeeded
    }

    /// Run the whole pipeline once.
    ///
    /// On failure the session moves to [`SubmissionState::Failed`] and keeps
    /// the user-visible message in [`error`](Self::error). Dropping the
    /// returned future part way through leaves the session `Failed` as well,
    /// so it can be submitted again.
    pub async fn submit(&mut self, submitter: &ConsentSubmitter) -> Result<Redirect, SubmitError> {
        if self.state == SubmissionState::Succeeded {
            return Err(SubmitError::AlreadySubmitted);
        }
        if self.state.is_in_flight() {
            return Err(SubmitError::InFlight);
        }

        self.error = None;
        let mut attempt = Attempt {
            session: self,
            settled: false,
        };
        let result = attempt.run(submitter).await;
        attempt.settle(result)
    }
}

/// One pass through the pipeline. Owns the session borrow for as long as the
/// pass runs; if it is dropped before settling, the session is marked failed.
struct Attempt<'a> {
    session: &'a mut ConsentSession,
    settled: bool,
}

impl Attempt<'_> {
    #[instrument(skip_all)]
    async fn run(&mut self, submitter: &ConsentSubmitter) -> Result<Redirect, SubmitError> {
        self.session.state = SubmissionState::Validating;
        let principal = submitter
            .identity
            .current_principal()
            .ok_or(SubmitError::NotSignedIn)?;
        let submission = WaiverSubmission::new(
            self.session.form.clone(),
            self.session.signature.clone(),
        )?;

        let signed_at = Utc::now();
        let document = render_waiver(&submission, signed_at)?;

        self.session.state = SubmissionState::Persisting;
        let path = BlobPath::consent(&principal.uid, signed_at, document.extension())?;
        let stored = store::persist(submitter.store.as_ref(), path, &document).await?;

        let token = submitter.identity.id_token(&principal).await?;

        self.session.state = SubmissionState::Submitting;
        let payload = ConsentPayload::new(&submission, &stored);
        submitter.endpoint.submit(&token, &payload).await?;

        Ok(Redirect {
            to: submitter.success_route.clone(),
        })
    }

    fn settle(mut self, result: Result<Redirect, SubmitError>) -> Result<Redirect, SubmitError> {
        self.settled = true;
        let session = &mut *self.session;
        match result {
            Ok(redirect) => {
                session.state = SubmissionState::Succeeded;
                info!(to = %redirect.to, "consent submitted");
                Ok(redirect)
            }
            Err(err) => {
                warn!(error = %err, state = ?session.state, "consent submission failed");
                session.state = SubmissionState::Failed;
                session.error = Some(err.user_message());
                Err(err)
            }
        }
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!(state = ?self.session.state, "consent submission abandoned");
        self.session.state = SubmissionState::Failed;
        self.session.error = Some(GENERIC_MESSAGE.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointError;
    use crate::error::NOT_SIGNED_IN_MESSAGE;
    use crate::identity::{Principal, StaticIdentity};
    use crate::store::StoreError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::time::Duration;

    type CallLog = Arc<Mutex<Vec<String>>>;

    struct RecordingStore {
        log: CallLog,
        fail_put: bool,
    }

    #[async_trait]
    impl BlobStore for RecordingStore {
        async fn put(&self, path: &BlobPath, bytes: Vec<u8>, content_type: &str)
            -> Result<(), StoreError> {
            assert!(bytes.starts_with(b"%PDF"));
            assert_eq!(content_type, "application/pdf");
            self.log.lock().unwrap().push(format!("put {}", path));
            if self.fail_put {
                return Err(StoreError::Rejected {
                    status: 503,
                    body: "bucket offline".to_string(),
                });
            }
            Ok(())
        }

        async fn download_url(&self, path: &BlobPath) -> Result<String, StoreError> {
            self.log.lock().unwrap().push("download_url".to_string());
            Ok(format!("https://files.test/{}", path))
        }
    }

    struct RecordingEndpoint {
        log: CallLog,
        payloads: Mutex<Vec<ConsentPayload>>,
        reject_with: Mutex<Option<(u16, String)>>,
    }

    #[async_trait]
    impl ConsentEndpoint for RecordingEndpoint {
        async fn submit(&self, bearer: &str, payload: &ConsentPayload) -> Result<(), EndpointError> {
            self.log.lock().unwrap().push(format!("submit {}", bearer));
            self.payloads.lock().unwrap().push(payload.clone());
            match self.reject_with.lock().unwrap().take() {
                Some((status, body)) => Err(EndpointError::Rejected { status, body }),
                None => Ok(()),
            }
        }
    }

    struct Harness {
        log: CallLog,
        endpoint: Arc<RecordingEndpoint>,
        submitter: ConsentSubmitter,
    }

    fn harness(identity: StaticIdentity, fail_put: bool) -> Harness {
        let log: CallLog = Arc::default();
        let endpoint = Arc::new(RecordingEndpoint {
            log: log.clone(),
            payloads: Mutex::default(),
            reject_with: Mutex::default(),
        });
        let store = Arc::new(RecordingStore {
            log: log.clone(),
            fail_put,
        });
        let submitter = ConsentSubmitter::new(Arc::new(identity), store, endpoint.clone());
        Harness {
            log,
            endpoint,
            submitter,
        }
    }

    fn member() -> StaticIdentity {
        StaticIdentity::new(Principal::new("member-7"), "id-token-7")
    }

    fn filled_session() -> ConsentSession {
        let mut session = ConsentSession::open(&AuthState::SignedIn(Principal::new("member-7"))).unwrap();
        session.form = ConsentForm {
            name: "Jordan Reyes".to_string(),
            email: "jordan@example.com".to_string(),
            date_of_birth: "1994-03-12".to_string(),
            phone: "555-0142".to_string(),
            emergency_contact_name: "Sam Reyes".to_string(),
            emergency_contact_phone: "555-0199".to_string(),
            has_medical_issues: false,
            medical_issues_description: String::new(),
            liability_agreed: true,
            rules_agreed: true,
        };
        session
    }

    fn signature() -> SignatureImage {
        let mut png = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png, 4, 2);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[0u8; 4 * 2 * 4]).unwrap();
        }
        SignatureImage::from_png(png).unwrap()
    }

    #[test]
    fn test_open_requires_sign_in() {
        assert!(ConsentSession::open(&AuthState::SignedOut).is_err());
        assert_eq!(ConsentSession::open(&AuthState::Loading).unwrap_err(), Denied::Wait);
    }

    #[tokio::test]
    async fn test_successful_submission_stores_before_submitting() {
        let h = harness(member(), false);
        let mut session = filled_session();
        session.set_signature(signature());

        let redirect = session.submit(&h.submitter).await.unwrap();
        assert_eq!(redirect.to, SUCCESS_ROUTE);
        assert_eq!(session.state(), SubmissionState::Succeeded);
        assert!(!session.can_submit());

        let log = h.log.lock().unwrap().clone();
        assert_eq!(log.len(), 3);
        assert!(log[0].starts_with("put consents/member-7/consent_"));
        assert!(log[0].ends_with(".pdf"));
        assert_eq!(log[1], "download_url");
        assert_eq!(log[2], "submit id-token-7");

        let payloads = h.endpoint.payloads.lock().unwrap();
        assert_eq!(payloads.len(), 1);
        assert!(payloads[0].signature.starts_with("data:image/png;base64,"));
        assert!(payloads[0].pdf_url.starts_with("https://files.test/consents/member-7/"));
    }

    #[tokio::test]
    async fn test_store_failure_never_reaches_endpoint() {
        let h = harness(member(), true);
        let mut session = filled_session();

        let err = session.submit(&h.submitter).await.unwrap_err();
        assert!(matches!(err, SubmitError::Storage(_)));
        assert_eq!(session.state(), SubmissionState::Failed);
        assert_eq!(session.error(), Some(GENERIC_MESSAGE));

        let log = h.log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(h.endpoint.payloads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_body_shown_and_retry_allowed() {
        let h = harness(member(), false);
        *h.endpoint.reject_with.lock().unwrap() = Some((500, "db unavailable".to_string()));
        let mut session = filled_session();

        let err = session.submit(&h.submitter).await.unwrap_err();
        assert!(matches!(err, SubmitError::Rejected { status: 500, .. }));
        assert_eq!(session.error(), Some("db unavailable"));
        assert_eq!(session.state(), SubmissionState::Failed);
        assert!(session.can_submit());

        // second attempt runs the whole pipeline again
        session.submit(&h.submitter).await.unwrap();
        assert_eq!(session.state(), SubmissionState::Succeeded);
        assert_eq!(session.error(), None);
        assert_eq!(h.endpoint.payloads.lock().unwrap().len(), 2);
        let puts = h.log.lock().unwrap().iter().filter(|l| l.starts_with("put ")).count();
        assert_eq!(puts, 2);
    }

    #[tokio::test]
    async fn test_signed_out_fails_before_any_io() {
        let h = harness(StaticIdentity::signed_out(), false);
        let mut session = filled_session();

        let err = session.submit(&h.submitter).await.unwrap_err();
        assert!(matches!(err, SubmitError::NotSignedIn));
        assert_eq!(session.error(), Some(NOT_SIGNED_IN_MESSAGE));
        assert!(h.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_signed_out_checked_before_form() {
        let h = harness(StaticIdentity::signed_out(), false);
        let mut session = ConsentSession::default();

        let err = session.submit(&h.submitter).await.unwrap_err();
        assert!(matches!(err, SubmitError::NotSignedIn));
        assert_eq!(session.error(), Some(NOT_SIGNED_IN_MESSAGE));
        assert_eq!(session.state(), SubmissionState::Failed);
    }

    struct StalledEndpoint;

    #[async_trait]
    impl ConsentEndpoint for StalledEndpoint {
        async fn submit(&self, _bearer: &str, _payload: &ConsentPayload) -> Result<(), EndpointError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_dropped_submission_can_be_retried() {
        let h = harness(member(), false);
        let stalled = ConsentSubmitter::new(
            Arc::new(member()),
            Arc::new(RecordingStore {
                log: h.log.clone(),
                fail_put: false,
            }),
            Arc::new(StalledEndpoint),
        );
        let mut session = filled_session();

        let outcome =
            tokio::time::timeout(Duration::from_millis(50), session.submit(&stalled)).await;
        assert!(outcome.is_err());
        assert_eq!(session.state(), SubmissionState::Failed);
        assert_eq!(session.error(), Some(GENERIC_MESSAGE));
        assert!(session.can_submit());

        session.submit(&h.submitter).await.unwrap();
        assert_eq!(session.state(), SubmissionState::Succeeded);
        assert_eq!(session.error(), None);
        assert_eq!(h.endpoint.payloads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_form_fails_validation() {
        let h = harness(member(), false);
        let mut session = filled_session();
        session.form.rules_agreed = false;

        let err = session.submit(&h.submitter).await.unwrap_err();
        assert!(matches!(err, SubmitError::Invalid(_)));
        assert_eq!(session.state(), SubmissionState::Failed);
        assert_eq!(
            session.error(),
            Some("You must accept the gym rules and safety guidelines to continue")
        );
        assert!(h.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_succeeded_session_is_write_once() {
        let h = harness(member(), false);
        let mut session = filled_session();
        session.submit(&h.submitter).await.unwrap();

        let err = session.submit(&h.submitter).await.unwrap_err();
        assert!(matches!(err, SubmitError::AlreadySubmitted));
        assert_eq!(session.state(), SubmissionState::Succeeded);
        assert_eq!(h.endpoint.payloads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_signature_clears_error() {
        let h = harness(member(), true);
        let mut session = filled_session();
        session.set_signature(signature());
        let _ = session.submit(&h.submitter).await;
        assert!(session.error().is_some());

        session.clear_signature();
        assert!(session.signature().is_none());
        assert_eq!(session.error(), None);
    }

    #[test]
    fn test_custom_success_route() {
        let h = harness(member(), false);
        let submitter = h.submitter.with_success_route("/welcome");
        assert_eq!(submitter.success_route, "/welcome");
    }
}
