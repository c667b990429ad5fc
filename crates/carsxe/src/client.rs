use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

/// Client for the CarsXE plate decoder and vehicle image APIs.
#[derive(Clone)]
pub struct CarsxeClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl CarsxeClient {
    pub fn new(api_key: impl Into<String>, base_url: Url, http: Client) -> Self {
        Self {
            http,
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Decodes a licence plate registered in `country`.
    pub async fn decode_plate(
        &self,
        plate: &str,
        country: &str,
    ) -> Result<DecodedVehicle, CarsxeError> {
        let mut url = self.base_url.join("v2/platedecoder")?;
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("plate", plate)
            .append_pair("country", country);

        let response = self.http.get(url).send().await?;
        parse_json(response).await
    }

    /// Fetches stock image links for a make and model, as returned upstream.
    pub async fn fetch_images(&self, make: &str, model: &str) -> Result<Vec<String>, CarsxeError> {
        let mut url = self.base_url.join("images")?;
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("make", make)
            .append_pair("model", model);

        let response = self.http.get(url).send().await?;
        let body: ImagesResponse = parse_json(response).await?;
        Ok(body.images.into_iter().map(|image| image.link).collect())
    }
}

/// Appends `.jpg` to image links that lack it; the check ignores case.
pub fn normalize_image_link(link: String) -> String {
    if link.to_ascii_lowercase().ends_with(".jpg") {
        link
    } else {
        format!("{link}.jpg")
    }
}

/// Plate decoder result. Fields beyond make and model are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedVehicle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DecodedVehicle {
    /// Make and model when the decoder returned both as non-empty strings.
    pub fn make_and_model(&self) -> Option<(&str, &str)> {
        let make = self.make.as_deref().filter(|s| !s.trim().is_empty())?;
        let model = self.model.as_deref().filter(|s| !s.trim().is_empty())?;
        Some((make, model))
    }
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    images: Vec<ImageEntry>,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    link: String,
}

const GENERIC_FAILURE: &str = "Vehicle lookup failed";

/// Errors produced by the CarsXE client.
#[derive(Debug, Error)]
pub enum CarsxeError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

// Request urls carry the API key in the query string.
impl From<reqwest::Error> for CarsxeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.without_url())
    }
}

impl CarsxeError {
    /// Upstream error status, when the API answered with one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Client-facing message: the `message` field of a JSON error body, or a
    /// generic one. Transport details and raw bodies stay out of it.
    pub fn upstream_message(&self) -> String {
        if let Self::Status { body, .. } = self {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
                if let Some(Value::String(message)) = map.get("message") {
                    return message.clone();
                }
            }
        }
        GENERIC_FAILURE.to_string()
    }
}

async fn parse_json<T>(response: Response) -> Result<T, CarsxeError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(CarsxeError::Status { status, body });
    }

    Ok(response.json().await?)
}
