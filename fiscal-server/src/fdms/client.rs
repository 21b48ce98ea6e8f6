//! HTTP client for the remote fiscal service
//!
//! Mutual TLS with the device certificate and key. Status-code mapping
//! decides the retry class: 5xx counts as transient, 4xx is a rejection
//! and never retried.

use super::{
    CloseDayRequest, CloseDayResponse, ConfigResponse, FdmsApi, FdmsError, FdmsResult,
    OpenDayRequest, OpenDayResponse, StatusResponse, SubmitReceiptRequest, SubmitReceiptResponse,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

#[derive(Debug, Clone)]
pub struct FdmsClient {
    client: Client,
    base_url: String,
}

impl FdmsClient {
    /// Build a client authenticated with the device credential pair.
    pub fn new(
        base_url: &str,
        certificate_pem: &str,
        private_key_pem: &str,
        timeout_secs: u64,
    ) -> FdmsResult<Self> {
        let bundle = format!("{}\n{}", certificate_pem.trim(), private_key_pem.trim());
        let identity = reqwest::Identity::from_pem(bundle.as_bytes())
            .map_err(|e| FdmsError::Protocol(format!("Client identity: {}", e)))?;

        let client = Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FdmsError::Protocol(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> FdmsResult<T> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;
        Self::handle_response(response).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> FdmsResult<T> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> FdmsResult<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(FdmsError::Network(format!("{}: {}", status, text)));
            }
            let message = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    format!("Authentication rejected: {}", text)
                }
                _ => format!("Payload rejected: {}", text),
            };
            return Err(FdmsError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response.json().await.map_err(Into::into)
    }
}

#[async_trait]
impl FdmsApi for FdmsClient {
    async fn get_status(&self, device_id: i64) -> FdmsResult<StatusResponse> {
        self.get(&format!("Device/v1/{}/GetStatus", device_id)).await
    }

    async fn get_config(&self, device_id: i64) -> FdmsResult<ConfigResponse> {
        self.get(&format!("Device/v1/{}/GetConfig", device_id)).await
    }

    async fn submit_receipt(
        &self,
        device_id: i64,
        request: &SubmitReceiptRequest,
    ) -> FdmsResult<SubmitReceiptResponse> {
        self.post(&format!("Device/v1/{}/SubmitReceipt", device_id), request)
            .await
    }

    async fn open_day(
        &self,
        device_id: i64,
        request: &OpenDayRequest,
    ) -> FdmsResult<OpenDayResponse> {
        self.post(&format!("Device/v1/{}/OpenDay", device_id), request)
            .await
    }

    async fn close_day(
        &self,
        device_id: i64,
        request: &CloseDayRequest,
    ) -> FdmsResult<CloseDayResponse> {
        self.post(&format!("Device/v1/{}/CloseDay", device_id), request)
            .await
    }
}
