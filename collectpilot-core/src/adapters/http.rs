use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{AppError, Result};

/// Thin JSON client shared by the HTTP adapters and the hosted scorer.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
    service_name: String,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        service_name: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AppError::configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            service_name: service_name.to_string(),
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn get<T, Q>(&self, endpoint: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let request = self.with_auth(self.client.get(self.url(endpoint)).query(query));
        let response = request.send().await.map_err(|e| self.map_reqwest_error(e))?;
        self.handle_response(response).await
    }

    pub async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.with_auth(self.client.post(self.url(endpoint)).json(body));
        let response = request.send().await.map_err(|e| self.map_reqwest_error(e))?;
        self.handle_response(response).await
    }

    /// POST where only the status matters.
    pub async fn post_unit<B>(&self, endpoint: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let request = self.with_auth(self.client.post(self.url(endpoint)).json(body));
        let response = request.send().await.map_err(|e| self.map_reqwest_error(e))?;
        self.check_status(response).await.map(|_| ())
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let response = self.check_status(response).await?;
        response.json::<T>().await.map_err(|e| {
            AppError::external_service(&self.service_name, format!("Invalid response body: {}", e))
        })
    }

    async fn check_status(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::external_service(
            &self.service_name,
            format!("HTTP {}: {}", status.as_u16(), body.chars().take(200).collect::<String>()),
        ))
    }

    fn map_reqwest_error(&self, error: reqwest::Error) -> AppError {
        if error.is_timeout() {
            AppError::timeout(format!("{} request", self.service_name))
        } else {
            AppError::external_service(&self.service_name, error.to_string())
        }
    }
}
