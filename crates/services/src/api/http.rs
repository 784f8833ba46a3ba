use std::collections::HashMap;
use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use quiz_core::model::{Answer, AttemptId, QuestionId, Quiz, QuizId};

use super::{ApiError, AttemptApi, AttemptDto, ResponseDto};

/// Connection settings for the HTTP attempt API.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
}

impl ApiConfig {
    /// Read the base url and bearer token from the environment.
    ///
    /// Returns `None` without `QUIZ_API_BASE_URL`; the token
    /// (`QUIZ_API_TOKEN`) is optional.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("QUIZ_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let token = env::var("QUIZ_API_TOKEN").ok().filter(|t| !t.is_empty());
        Some(Self { base_url, token })
    }
}

/// `AttemptApi` over HTTP, the production implementation.
#[derive(Clone)]
pub struct HttpAttemptApi {
    client: Client,
    config: ApiConfig,
}

#[derive(Debug, Deserialize)]
struct AttemptRef {
    id: AttemptId,
}

#[derive(Debug, Serialize)]
struct AtomicSubmission<'a> {
    started_at: DateTime<Utc>,
    answers: Vec<WireAnswer<'a>>,
}

#[derive(Debug, Serialize)]
struct WireAnswer<'a> {
    question_id: QuestionId,
    answer: &'a Answer,
}

impl HttpAttemptApi {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))
    }
}

/// Map the backend's distinguishable failure statuses onto the error
/// taxonomy: 409 is the completion race, 404/501 are backend gaps.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status.as_u16() {
        409 => Err(ApiError::AlreadyCompleted),
        404 => Err(ApiError::NotFound),
        501 => Err(ApiError::NotImplemented),
        code => {
            let message = response.text().await.unwrap_or_default();
            Err(ApiError::Status {
                status: code,
                message,
            })
        }
    }
}

#[async_trait]
impl AttemptApi for HttpAttemptApi {
    async fn create_attempt(&self, quiz: QuizId) -> Result<AttemptId, ApiError> {
        let request = self
            .client
            .post(self.url(&format!("quizzes/{quiz}/attempts")));
        let response = check_status(self.authorize(request).send().await?).await?;
        let created: AttemptRef = Self::decode(response).await?;
        Ok(created.id)
    }

    async fn get_quiz_for_attempt(&self, quiz: QuizId) -> Result<Quiz, ApiError> {
        let request = self
            .client
            .get(self.url(&format!("quizzes/{quiz}/attempt-quiz")));
        let response = check_status(self.authorize(request).send().await?).await?;
        Self::decode(response).await
    }

    async fn get_attempt(&self, attempt: AttemptId) -> Result<AttemptDto, ApiError> {
        let request = self.client.get(self.url(&format!("attempts/{attempt}")));
        let response = check_status(self.authorize(request).send().await?).await?;
        Self::decode(response).await
    }

    async fn submit_response(
        &self,
        attempt: AttemptId,
        question: QuestionId,
        answer: &Answer,
    ) -> Result<(), ApiError> {
        let body = ResponseDto {
            question_id: question,
            answer: answer.clone(),
        };
        let request = self
            .client
            .post(self.url(&format!("attempts/{attempt}/responses")))
            .json(&body);
        check_status(self.authorize(request).send().await?).await?;
        Ok(())
    }

    async fn complete_attempt(&self, attempt: AttemptId) -> Result<(), ApiError> {
        let request = self
            .client
            .post(self.url(&format!("attempts/{attempt}/complete")));
        check_status(self.authorize(request).send().await?).await?;
        Ok(())
    }

    async fn submit_complete_quiz(
        &self,
        quiz: QuizId,
        started_at: DateTime<Utc>,
        answers: &HashMap<QuestionId, Answer>,
    ) -> Result<AttemptId, ApiError> {
        let body = AtomicSubmission {
            started_at,
            answers: answers
                .iter()
                .map(|(question_id, answer)| WireAnswer {
                    question_id: *question_id,
                    answer,
                })
                .collect(),
        };
        let request = self
            .client
            .post(self.url(&format!("quizzes/{quiz}/submissions")))
            .json(&body);
        let response = check_status(self.authorize(request).send().await?).await?;
        let created: AttemptRef = Self::decode(response).await?;
        Ok(created.id)
    }
}
