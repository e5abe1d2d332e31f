use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use super::{
    CheckerError, IdentityRegistrar, PriorSubmissionChecker, QuestionSource, QuestionSourceError,
    RegistrarError, SinkError, SubmissionSink,
};
use crate::core::config::Settings;
use crate::schemas::identity::{RegistrationRequest, StudentIdentity};
use crate::schemas::quiz::{Question, QuizMeta};
use crate::schemas::submission::{AttemptSubmission, PriorSubmissionStatus, SubmissionReceipt};

/// HTTP implementation of all four collaborator contracts against the SOMA
/// REST API. Fire-and-await: no retries, no backoff; retrying is the user's
/// decision.
#[derive(Debug, Clone)]
pub(crate) struct SomaApiClient {
    client: Client,
    base_url: String,
}

impl SomaApiClient {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.api().connect_timeout_seconds))
            .timeout(Duration::from_secs(settings.api().request_timeout_seconds))
            .build()
            .context("Failed to build SOMA API HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.api().base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl QuestionSource for SomaApiClient {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<QuizMeta, QuestionSourceError> {
        let response = self
            .client
            .get(self.url(&format!("/api/v1/quizzes/{quiz_id}")))
            .send()
            .await
            .map_err(|err| QuestionSourceError::Unavailable(err.to_string()))?;

        let body = read_body(response, |status, detail| match status {
            StatusCode::NOT_FOUND => QuestionSourceError::NotFound,
            _ => QuestionSourceError::Unavailable(detail),
        })
        .await?;

        let meta: QuizMeta = serde_json::from_str(&body)
            .map_err(|err| QuestionSourceError::Malformed(err.to_string()))?;
        meta.validate().map_err(QuestionSourceError::Malformed)?;
        Ok(meta)
    }

    async fn fetch_questions(
        &self,
        quiz_id: &str,
        pin: Option<&str>,
    ) -> Result<Vec<Question>, QuestionSourceError> {
        let mut request =
            self.client.get(self.url(&format!("/api/v1/quizzes/{quiz_id}/questions")));
        if let Some(pin) = pin {
            request = request.query(&[("pin", pin)]);
        }

        let response = request
            .send()
            .await
            .map_err(|err| QuestionSourceError::Unavailable(err.to_string()))?;

        let body = read_body(response, |status, detail| match status {
            StatusCode::NOT_FOUND => QuestionSourceError::NotFound,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => QuestionSourceError::Unauthorized,
            _ => QuestionSourceError::Unavailable(detail),
        })
        .await?;

        let questions: Vec<Question> = serde_json::from_str(&body)
            .map_err(|err| QuestionSourceError::Malformed(err.to_string()))?;
        for question in &questions {
            question.validate().map_err(QuestionSourceError::Malformed)?;
        }
        Ok(questions)
    }
}

#[async_trait]
impl IdentityRegistrar for SomaApiClient {
    async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<StudentIdentity, RegistrarError> {
        let response = self
            .client
            .post(self.url("/api/v1/students"))
            .json(request)
            .send()
            .await
            .map_err(|err| RegistrarError::Unavailable(err.to_string()))?;

        let body = read_body(response, |status, detail| match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                RegistrarError::Rejected(detail)
            }
            _ => RegistrarError::Unavailable(detail),
        })
        .await?;

        serde_json::from_str(&body).map_err(|err| RegistrarError::Unavailable(err.to_string()))
    }
}

#[async_trait]
impl PriorSubmissionChecker for SomaApiClient {
    async fn has_submitted(&self, quiz_id: &str, student: &str) -> Result<bool, CheckerError> {
        let response = self
            .client
            .get(self.url(&format!("/api/v1/quizzes/{quiz_id}/submissions/status")))
            .query(&[("student", student)])
            .send()
            .await
            .map_err(|err| CheckerError::Unavailable(err.to_string()))?;

        let body =
            read_body(response, |_, detail| CheckerError::Unavailable(detail)).await?;

        let status: PriorSubmissionStatus = serde_json::from_str(&body)
            .map_err(|err| CheckerError::Unavailable(err.to_string()))?;
        Ok(status.already_submitted)
    }
}

#[async_trait]
impl SubmissionSink for SomaApiClient {
    async fn submit(
        &self,
        attempt: &AttemptSubmission,
    ) -> Result<SubmissionReceipt, SinkError> {
        let response = self
            .client
            .post(self.url("/api/v1/submissions"))
            .json(attempt)
            .send()
            .await
            .map_err(|err| SinkError::Unavailable(err.to_string()))?;

        let body = read_body(response, |status, detail| match status {
            StatusCode::CONFLICT => SinkError::Duplicate,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                SinkError::Rejected(detail)
            }
            _ => SinkError::Unavailable(detail),
        })
        .await?;

        serde_json::from_str(&body).map_err(|err| SinkError::Unavailable(err.to_string()))
    }
}

/// Reads the body, mapping non-success statuses through `on_error` with the
/// decoded `detail` message (the API wraps errors as `{status, detail}`).
async fn read_body<E>(
    response: Response,
    on_error: impl FnOnce(StatusCode, String) -> E,
) -> Result<String, E> {
    let status = response.status();
    match response.text().await {
        Ok(body) if status.is_success() => Ok(body),
        Ok(body) => Err(on_error(status, error_detail(&body, status))),
        Err(err) => Err(on_error(status, err.to_string())),
    }
}

fn error_detail(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("status {status}"))
}
