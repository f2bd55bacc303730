use anyhow::{anyhow, Context, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Thin PostgREST client. All requests run with the service key; row-level
/// authorization happens in the services, not in the store.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_base_url(&config.supabase_url, &config.supabase_service_key)
    }

    pub fn with_base_url(base_url: &str, service_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    fn get_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.service_key).context("service key is not a valid header value")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.service_key))
                .context("service key is not a valid header value")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers()?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                409 => anyhow!("Conflict: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        // PostgREST answers 204 with an empty body when no representation is requested.
        let bytes = response.bytes().await?;
        let data = if bytes.is_empty() {
            serde_json::from_value(Value::Array(vec![]))?
        } else {
            serde_json::from_slice::<T>(&bytes)?
        };
        Ok(data)
    }

    /// `GET /rest/v1/{query}` decoded into rows.
    pub async fn select<T>(&self, query: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, &format!("/rest/v1/{}", query), None).await
    }

    /// Insert and return the stored rows.
    pub async fn insert<T>(&self, table: &str, body: Value) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(
            Method::POST,
            &format!("/rest/v1/{}", table),
            Some(body),
            Some(return_representation()),
        )
        .await
    }

    /// Patch every row matched by `query` and return the rows that were actually
    /// modified. An empty result means the filter matched nothing, which is how
    /// conditional ("compare-and-swap") updates report that they lost.
    pub async fn update<T>(&self, query: &str, body: Value) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(
            Method::PATCH,
            &format!("/rest/v1/{}", query),
            Some(body),
            Some(return_representation()),
        )
        .await
    }

    /// Delete every row matched by `query`, returning the deleted rows.
    pub async fn delete<T>(&self, query: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(
            Method::DELETE,
            &format!("/rest/v1/{}", query),
            None,
            Some(return_representation()),
        )
        .await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}
