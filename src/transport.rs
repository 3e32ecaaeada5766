//! # Transport Module
//!
//! The wire contract with the collection server, split by concern:
//! - `CaptureTransport`: start a transfer, then append batches in capture order
//! - `TrialService`: fetch the next trial and report completion
//! - `DemonstrationSource`: look up and download demonstrations
//!
//! `HttpBackend` implements all three over `reqwest`. The core never retries
//! a failed call; failures surface to whichever step made the call.
//!
//! Everything runs on one thread, so the futures here are not `Send`.

use crate::error::{LaunchError, TransportError};
use crate::record::PoseSequence;
use crate::trial::{GestureClassLocator, GestureLocator, Trial, TrialCompletion};
use reqwest::multipart::{Form, Part};
use reqwest::{StatusCode, Url};
use serde::Serialize;

/// Where a stream of batches is appended on the server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransferTarget {
    /// A participant's gesture recording
    Gesture(GestureLocator),
    /// A demonstration being recorded under a short code
    Demonstration { short_code: String },
}

impl TransferTarget {
    /// Short human-readable description for logs and archive names
    pub fn describe(&self) -> String {
        match self {
            TransferTarget::Gesture(locator) => format!(
                "{}_{}_{}_{}",
                locator.project_name,
                locator.participant_id,
                locator.trial_id,
                locator.gesture_index
            ),
            TransferTarget::Demonstration { short_code } => format!("demonstration_{}", short_code),
        }
    }
}

/// Session-oriented batch upload.
///
/// `start_transfer` must complete for a target before any `append_batch` for
/// it, and batches must be appended in capture order: the server appends them
/// positionally.
#[allow(async_fn_in_trait)]
pub trait CaptureTransport {
    async fn start_transfer(&self, target: &TransferTarget) -> Result<(), TransportError>;

    async fn append_batch(
        &self,
        target: &TransferTarget,
        data: Vec<u8>,
    ) -> Result<(), TransportError>;
}

#[allow(async_fn_in_trait)]
pub trait TrialService {
    async fn next_trial(&self, project_name: &str, participant_id: &str)
        -> Result<Trial, TransportError>;

    async fn complete_trial(&self, completion: &TrialCompletion) -> Result<(), TransportError>;

    /// Tell the server the participant is starting the trial over
    async fn restart_trial(
        &self,
        project_name: &str,
        participant_id: &str,
        trial_id: &str,
    ) -> Result<(), TransportError>;
}

#[allow(async_fn_in_trait)]
pub trait DemonstrationSource {
    /// Recorded demonstration for a gesture class; `None` if there is none.
    async fn fetch_demonstration(
        &self,
        class: &GestureClassLocator,
    ) -> Result<Option<PoseSequence>, TransportError>;

    /// Gesture class a demonstration short code records into, if valid.
    async fn lookup_short_code(
        &self,
        short_code: &str,
    ) -> Result<Option<GestureClassLocator>, TransportError>;
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    redo_counts: &'a [u32],
}

/// Collection server client
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base: Url) -> Result<Self, LaunchError> {
        if base.cannot_be_a_base() {
            return Err(LaunchError::InvalidBackendUrl(base.to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Base URL with `segments` appended, each percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn locator_form(locator: &GestureLocator) -> Form {
        Form::new()
            .text("project_name", locator.project_name.clone())
            .text("participant_id", locator.participant_id.clone())
            .text("trial_id", locator.trial_id.clone())
            .text("gesture_index", locator.gesture_index.clone())
    }

    fn data_part(data: Vec<u8>) -> Result<Part, TransportError> {
        Ok(Part::bytes(data)
            .file_name("blob")
            .mime_str("application/octet-stream")?)
    }
}

/// Fail unless the response carries `expected`
async fn expect_status(
    response: reqwest::Response,
    endpoint: &str,
    expected: StatusCode,
) -> Result<reqwest::Response, TransportError> {
    if response.status() == expected {
        return Ok(response);
    }
    Err(status_error(response, endpoint).await)
}

/// Fail unless the response carries any 2xx status
async fn expect_success(
    response: reqwest::Response,
    endpoint: &str,
) -> Result<reqwest::Response, TransportError> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(status_error(response, endpoint).await)
}

async fn status_error(response: reqwest::Response, endpoint: &str) -> TransportError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    TransportError::UnexpectedStatus {
        endpoint: endpoint.to_string(),
        status,
        body,
    }
}

impl CaptureTransport for HttpBackend {
    async fn start_transfer(&self, target: &TransferTarget) -> Result<(), TransportError> {
        let request = match target {
            TransferTarget::Gesture(locator) => self
                .client
                .post(self.endpoint(&["gesture-data", "start-transfer"]))
                .multipart(Self::locator_form(locator)),
            TransferTarget::Demonstration { short_code } => self
                .client
                .post(self.endpoint(&["demonstration", "start-transfer", short_code.as_str()])),
        };

        let response = request.send().await?;
        expect_status(response, "start-transfer", StatusCode::CREATED).await?;
        log::info!("Started transfer for {}", target.describe());
        Ok(())
    }

    async fn append_batch(
        &self,
        target: &TransferTarget,
        data: Vec<u8>,
    ) -> Result<(), TransportError> {
        let len = data.len();
        let request = match target {
            TransferTarget::Gesture(locator) => self
                .client
                .post(self.endpoint(&["gesture-data", "append-data"]))
                .multipart(Self::locator_form(locator).part("data", Self::data_part(data)?)),
            TransferTarget::Demonstration { short_code } => self
                .client
                .post(self.endpoint(&["demonstration", "append-data", short_code.as_str()]))
                .multipart(Form::new().part("data", Self::data_part(data)?)),
        };

        let response = request.send().await?;
        expect_status(response, "append-data", StatusCode::CREATED).await?;
        log::debug!("Sent {} bytes of gesture data successfully", len);
        Ok(())
    }
}

impl TrialService for HttpBackend {
    async fn next_trial(
        &self,
        project_name: &str,
        participant_id: &str,
    ) -> Result<Trial, TransportError> {
        let url = self.endpoint(&["trial", "next-trial", project_name, participant_id]);
        let response = self.client.get(url).send().await?;
        let response = expect_status(response, "next-trial", StatusCode::OK).await?;
        Ok(response.json::<Trial>().await?)
    }

    async fn complete_trial(&self, completion: &TrialCompletion) -> Result<(), TransportError> {
        let url = self.endpoint(&[
            "trial",
            "complete-trial",
            completion.project_name.as_str(),
            completion.participant_id.as_str(),
            completion.trial_id.as_str(),
        ]);
        let body = CompletionBody {
            redo_counts: &completion.redo_counts,
        };
        let response = self.client.post(url).json(&body).send().await?;
        expect_success(response, "complete-trial").await?;
        log::info!("Trial {} reported complete", completion.trial_id);
        Ok(())
    }

    async fn restart_trial(
        &self,
        project_name: &str,
        participant_id: &str,
        trial_id: &str,
    ) -> Result<(), TransportError> {
        let url = self.endpoint(&[
            "trial",
            "restart-trial",
            project_name,
            participant_id,
            trial_id,
        ]);
        let response = self.client.post(url).send().await?;
        expect_success(response, "restart-trial").await?;
        Ok(())
    }
}

impl DemonstrationSource for HttpBackend {
    async fn fetch_demonstration(
        &self,
        class: &GestureClassLocator,
    ) -> Result<Option<PoseSequence>, TransportError> {
        let url = self.endpoint(&[
            "demonstration",
            "get-demonstration",
            class.project_name.as_str(),
            class.gesture_id.as_str(),
        ]);
        let response = self.client.get(url).send().await?;
        if response.status() != StatusCode::OK {
            log::info!(
                "No demonstration for {}/{} (status {})",
                class.project_name,
                class.gesture_id,
                response.status()
            );
            return Ok(None);
        }

        let is_text = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("text/"))
            .unwrap_or(false);

        let sequence = if is_text {
            PoseSequence::from_text(&response.text().await?)?
        } else {
            PoseSequence::from_bytes(&response.bytes().await?)?
        };
        Ok(Some(sequence))
    }

    async fn lookup_short_code(
        &self,
        short_code: &str,
    ) -> Result<Option<GestureClassLocator>, TransportError> {
        let url = self.endpoint(&["demonstration", "shortcode-exists", short_code]);
        let response = self.client.get(url).send().await?;
        if response.status() != StatusCode::OK {
            return Ok(None);
        }
        Ok(Some(response.json::<GestureClassLocator>().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpBackend {
        HttpBackend::new(Url::parse(base).unwrap()).unwrap()
    }

    #[test]
    fn test_endpoint_joins_and_encodes_segments() {
        let backend = backend("https://gesturelogger.com:8000");
        let url = backend.endpoint(&["trial", "next-trial", "my project", "p/1"]);
        assert_eq!(
            url.as_str(),
            "https://gesturelogger.com:8000/trial/next-trial/my%20project/p%2F1"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let backend = backend("http://localhost:8000/api/");
        let url = backend.endpoint(&["gesture-data", "append-data"]);
        assert_eq!(url.as_str(), "http://localhost:8000/api/gesture-data/append-data");
    }

    #[test]
    fn test_rejects_non_hierarchical_base() {
        let url = Url::parse("mailto:someone@example.com").unwrap();
        assert!(HttpBackend::new(url).is_err());
    }

    #[test]
    fn test_target_description() {
        let target = TransferTarget::Gesture(GestureLocator {
            project_name: "proj".to_string(),
            participant_id: "p1".to_string(),
            trial_id: "t1".to_string(),
            gesture_index: "2".to_string(),
        });
        assert_eq!(target.describe(), "proj_p1_t1_2");

        let demo = TransferTarget::Demonstration {
            short_code: "abc".to_string(),
        };
        assert_eq!(demo.describe(), "demonstration_abc");
    }
}
