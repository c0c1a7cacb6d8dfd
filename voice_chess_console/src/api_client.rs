// Executes `ApiRequest`s against the game server's REST API.

use anyhow::{Context, bail};
use log::debug;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use url::Url;
use voice_chess::api::{ApiRequest, HttpMethod};


#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: Url,
    http: Client,
}

impl ApiClient {
    pub fn new(server_address: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(&format!("http://{server_address}"))
            .with_context(|| format!("Bad server address '{server_address}'."))?;
        Ok(ApiClient { base_url, http: Client::new() })
    }

    pub fn fetch<T: DeserializeOwned>(&self, request: &ApiRequest) -> anyhow::Result<T> {
        self.execute(request)?.json().with_context(|| format!("Bad response to {request}."))
    }

    pub fn fetch_json(&self, request: &ApiRequest) -> anyhow::Result<serde_json::Value> {
        self.fetch(request)
    }

    pub fn fetch_bytes(&self, request: &ApiRequest) -> anyhow::Result<Vec<u8>> {
        let bytes = self
            .execute(request)?
            .bytes()
            .with_context(|| format!("Bad response to {request}."))?;
        Ok(bytes.to_vec())
    }

    fn execute(&self, request: &ApiRequest) -> anyhow::Result<Response> {
        let url = self.base_url.join(&request.path)?;
        debug!("{request}");
        let builder = match request.method {
            HttpMethod::Get => self.http.get(url),
            HttpMethod::Post => self.http.post(url),
            HttpMethod::Delete => self.http.delete(url),
        };
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };
        let response = builder.send().with_context(|| format!("{request} failed."))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            bail!("{request} returned {status}: {detail}");
        }
        Ok(response)
    }
}
