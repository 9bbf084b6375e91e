//! HTTP clients for a remote mission-server

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use shared_types::{
    AbortRequest, AckResponse, ApiError, BeginDistractionRequest, BeginHeistRequest,
    BeginResponse, CrewStatusResponse, DecisionRequest, DecisionResponse, Offer, OfferResponse,
    ReportAck, RiskFeedRequest, SettleRequest, SettleResponse, SettlementRecord,
};

use crate::orchestrator::clients::{BrokerClient, CrewClient, OrchestratorError};

pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, OrchestratorError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| OrchestratorError::Transport(e.to_string()))
}

async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, OrchestratorError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(error_from_body(status, &body));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| OrchestratorError::Transport(format!("invalid response body: {e}")))
}

fn error_from_body(status: StatusCode, body: &str) -> OrchestratorError {
    if let Ok(api_error) = serde_json::from_str::<ApiError>(body) {
        return OrchestratorError::Rejected {
            code: api_error.code,
            message: api_error.message,
        };
    }
    if let Ok(begin) = serde_json::from_str::<BeginResponse>(body) {
        return OrchestratorError::Rejected {
            code: status.as_u16().to_string(),
            message: begin.message,
        };
    }
    OrchestratorError::Transport(format!("status {status}: {body}"))
}

fn send_error(err: reqwest::Error) -> OrchestratorError {
    OrchestratorError::Transport(err.to_string())
}

/// Crew member served by mission-server under `/crew/{character}`
#[derive(Debug, Clone)]
pub struct HttpCrewClient {
    http: reqwest::Client,
    base_url: String,
    character: String,
}

impl HttpCrewClient {
    pub fn new(http: reqwest::Client, server_url: &str, character: impl Into<String>) -> Self {
        let character = character.into();
        Self {
            http,
            base_url: format!("{}/crew/{}", server_url.trim_end_matches('/'), character),
            character,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn accepted_run(&self, response: BeginResponse) -> Result<String, OrchestratorError> {
        match (response.accepted, response.run_id) {
            (true, Some(run_id)) => Ok(run_id),
            _ => Err(OrchestratorError::Rejected {
                code: "REJECTED".to_string(),
                message: format!("{}: {}", self.character, response.message),
            }),
        }
    }
}

#[async_trait]
impl CrewClient for HttpCrewClient {
    fn character(&self) -> &str {
        &self.character
    }

    async fn begin_distraction(
        &self,
        run_id: &str,
        required_turns: u32,
    ) -> Result<String, OrchestratorError> {
        let body = BeginDistractionRequest {
            run_id: Some(run_id.to_string()),
            required_turns,
        };
        let response = self
            .http
            .post(self.url("distraction"))
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;
        self.accepted_run(read_json(response).await?)
    }

    async fn begin_heist(
        &self,
        run_id: &str,
        required_turns: u32,
        risk_factor: u8,
        base_loot: i64,
    ) -> Result<String, OrchestratorError> {
        let body = BeginHeistRequest {
            run_id: Some(run_id.to_string()),
            required_turns,
            risk_factor,
            base_loot,
        };
        let response = self
            .http
            .post(self.url("heist"))
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;
        self.accepted_run(read_json(response).await?)
    }

    async fn status(&self) -> Result<CrewStatusResponse, OrchestratorError> {
        let response = self
            .http
            .get(self.url("status"))
            .send()
            .await
            .map_err(send_error)?;
        read_json(response).await
    }

    async fn abort(&self, run_id: &str, reason: &str) -> Result<bool, OrchestratorError> {
        let body = AbortRequest {
            run_id: run_id.to_string(),
            reason: reason.to_string(),
        };
        let response = self
            .http
            .post(self.url("abort"))
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;
        let ack: AckResponse = read_json(response).await?;
        Ok(ack.accepted)
    }

    async fn settle(&self, amount: i64) -> Result<SettleResponse, OrchestratorError> {
        let response = self
            .http
            .post(self.url("settle"))
            .json(&SettleRequest { amount })
            .send()
            .await
            .map_err(send_error)?;
        read_json(response).await
    }
}

/// Broker served by mission-server under `/broker`
#[derive(Debug, Clone)]
pub struct HttpBrokerClient {
    http: reqwest::Client,
    base_url: String,
    offer_timeout: Option<Duration>,
}

impl HttpBrokerClient {
    pub fn new(http: reqwest::Client, server_url: &str) -> Self {
        Self {
            http,
            base_url: format!("{}/broker", server_url.trim_end_matches('/')),
            offer_timeout: None,
        }
    }

    /// Timeout for offer requests only. The broker holds the reply for its
    /// whole cooldown, so this must exceed the cooldown.
    pub fn with_offer_timeout(mut self, timeout: Duration) -> Self {
        self.offer_timeout = Some(timeout);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl BrokerClient for HttpBrokerClient {
    async fn next_offer(&self, requester: &str) -> Result<Option<Offer>, OrchestratorError> {
        let mut request = self
            .http
            .get(self.url("offers/next"))
            .query(&[("requester", requester)]);
        if let Some(timeout) = self.offer_timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await.map_err(send_error)?;
        let offer: OfferResponse = read_json(response).await?;
        Ok(offer.into_offer())
    }

    async fn decide(&self, requester: &str, accepted: bool) -> Result<String, OrchestratorError> {
        let body = DecisionRequest {
            requester: requester.to_string(),
            accepted,
        };
        let response = self
            .http
            .post(self.url("decisions"))
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;
        let decision: DecisionResponse = read_json(response).await?;
        Ok(decision.message)
    }

    async fn start_risk_feed(
        &self,
        character: &str,
        risk_factor: u8,
    ) -> Result<(), OrchestratorError> {
        let body = RiskFeedRequest {
            character: character.to_string(),
            risk_factor,
        };
        let response = self
            .http
            .post(self.url("risk-feeds"))
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;
        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            return Err(OrchestratorError::ChannelUnavailable(character.to_string()));
        }
        let _: AckResponse = read_json(response).await?;
        Ok(())
    }

    async fn stop_risk_feed(&self, character: &str) -> Result<bool, OrchestratorError> {
        let response = self
            .http
            .delete(self.url(&format!("risk-feeds/{character}")))
            .send()
            .await
            .map_err(send_error)?;
        let ack: AckResponse = read_json(response).await?;
        Ok(ack.accepted)
    }

    async fn settle(&self, amount: i64) -> Result<SettleResponse, OrchestratorError> {
        let response = self
            .http
            .post(self.url("settle"))
            .json(&SettleRequest { amount })
            .send()
            .await
            .map_err(send_error)?;
        read_json(response).await
    }

    async fn record_final_report(
        &self,
        record: &SettlementRecord,
    ) -> Result<String, OrchestratorError> {
        let response = self
            .http
            .post(self.url("reports"))
            .json(record)
            .send()
            .await
            .map_err(send_error)?;
        let ack: ReportAck = read_json(response).await?;
        Ok(ack.message)
    }
}
