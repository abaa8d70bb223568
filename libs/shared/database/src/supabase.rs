use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    api_key: String,
    service_token: Option<String>,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            api_key: config.supabase_anon_key.clone(),
            service_token: None,
        }
    }

    /// Client that authenticates every call with the service-role key. Used by
    /// background jobs that run without a user session.
    pub fn with_service_role(config: &AppConfig) -> Self {
        let key = if config.supabase_service_role_key.is_empty() {
            config.supabase_anon_key.clone()
        } else {
            config.supabase_service_role_key.clone()
        };

        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            api_key: key.clone(),
            service_token: Some(key),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.api_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        if let Some(token) = auth_token.or(self.service_token.as_deref()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let headers = self.get_headers(auth_token)?;

        let mut req = self.client.request(method, &url)
            .headers(headers);

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
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Calls a Postgres function through PostgREST. Each call runs in its own
    /// transaction on the database side.
    pub async fn rpc<T>(&self, function: &str, args: Value, auth_token: Option<&str>) -> Result<T>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/rpc/{}", function);
        self.request(Method::POST, &path, auth_token, Some(args)).await
    }

    /// First row of a PostgREST select, or `None` when nothing matched.
    pub async fn select_one<T>(&self, path: &str, auth_token: Option<&str>) -> Result<Option<T>>
    where T: DeserializeOwned {
        let rows: Vec<T> = self.request(Method::GET, path, auth_token, None).await?;
        Ok(rows.into_iter().next())
    }
}
