//! HTTP client for the Homebridge HAP endpoints (insecure mode)

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{HubError, Result};
use crate::types::{Accessory, AccessoryList, CharacteristicList, CharacteristicValue};

/// Request timeout for hub calls
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for a Homebridge instance
#[derive(Debug, Clone)]
pub struct HubClient {
    client: Client,
    base_url: Url,
    auth_code: String,
}

impl HubClient {
    /// Create a new hub client
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    ///
    /// # Example
    /// ```no_run
    /// use brewbridge_hub::HubClient;
    ///
    /// let client = HubClient::new("http://localhost:51826", "031-45-154")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(base_url: impl AsRef<str>, auth_code: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Self::with_client(base_url, auth_code, client)
    }

    /// Create a client for `http://{host}:{port}`
    ///
    /// # Errors
    /// Returns an error if host and port do not form a valid URL.
    pub fn from_host(host: &str, port: u16, auth_code: impl Into<String>) -> Result<Self> {
        Self::new(format!("http://{host}:{port}"), auth_code)
    }

    /// Create a new hub client with custom `reqwest::Client`
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn with_client(
        base_url: impl AsRef<str>,
        auth_code: impl Into<String>,
        client: Client,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        Ok(Self {
            client,
            base_url,
            auth_code: auth_code.into(),
        })
    }

    /// Base URL of the hub
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a full URL from a path
    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(HubError::Url)
    }

    fn characteristic_url(&self, aid: u64, iid: u64) -> Result<Url> {
        let mut url = self.url("/characteristics")?;
        url.query_pairs_mut()
            .append_pair("id", &format!("{aid}.{iid}"));
        Ok(url)
    }

    async fn check(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(HubError::Api { status, message })
    }

    /// Perform a GET request and deserialize the response
    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, &self.auth_code)
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// List all accessories with their services and characteristics
    ///
    /// # Errors
    /// Returns an error if the request fails or the hub returns an error.
    #[instrument(skip(self), fields(hub = %self.base_url))]
    pub async fn accessories(&self) -> Result<Vec<Accessory>> {
        let list: AccessoryList = self.get(self.url("/accessories")?).await?;
        debug!(count = list.accessories.len(), "listed accessories");
        Ok(list.accessories)
    }

    /// Read the current value of one characteristic
    ///
    /// # Errors
    /// Returns an error if the request fails, the hub reports a HAP status, or
    /// the characteristic is missing from the response.
    #[instrument(skip(self), fields(hub = %self.base_url))]
    pub async fn read_characteristic(&self, aid: u64, iid: u64) -> Result<Value> {
        let list: CharacteristicList = self.get(self.characteristic_url(aid, iid)?).await?;

        let entry = list
            .characteristics
            .into_iter()
            .find(|c| c.aid == aid && c.iid == iid)
            .ok_or_else(|| {
                HubError::InvalidResponse(format!("characteristic {aid}.{iid} missing"))
            })?;

        if let Some(status) = entry.status.filter(|s| *s != 0) {
            return Err(HubError::Hap { aid, iid, status });
        }

        entry.value.ok_or_else(|| {
            HubError::InvalidResponse(format!("characteristic {aid}.{iid} has no value"))
        })
    }

    /// Write one characteristic
    ///
    /// # Errors
    /// Returns an error if the request fails or the hub reports a HAP status.
    #[instrument(skip(self), fields(hub = %self.base_url))]
    pub async fn write_characteristic(&self, aid: u64, iid: u64, value: Value) -> Result<()> {
        let body = CharacteristicList {
            characteristics: vec![CharacteristicValue {
                aid,
                iid,
                value: Some(value),
                status: None,
            }],
        };

        let response = self
            .client
            .put(self.url("/characteristics")?)
            .header(AUTHORIZATION, &self.auth_code)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(()),
            StatusCode::MULTI_STATUS => {
                let list: CharacteristicList = response.json().await?;
                first_failure(&list).map_or(Ok(()), Err)
            }
            _ => Self::check(response).await.map(|_| ()),
        }
    }
}

/// First non-zero HAP status of a multi-status body
fn first_failure(list: &CharacteristicList) -> Option<HubError> {
    list.characteristics.iter().find_map(|c| match c.status {
        Some(status) if status != 0 => Some(HubError::Hap {
            aid: c.aid,
            iid: c.iid,
            status,
        }),
        _ => None,
    })
}
