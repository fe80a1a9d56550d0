//! Weather reports from a wttr.in-style service.

use crate::collab::WeatherService;
use crate::error::{CoreError, CoreResult};
use crate::extract::{position, tokenize};
use crate::outcome::Reply;
use reqwest::Url;
use std::time::Duration;

/// Words after "en", joined without spaces. `None` when there is no "en".
pub fn place_in(transcript: &str) -> Option<String> {
    let tokens = tokenize(transcript);
    let idx = position(&tokens, "en")?;
    let place: String = tokens[idx + 1..].concat();
    (!place.is_empty()).then_some(place)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherReport {
    pub description: String,
    pub temperature: String,
}

/// Splits "Soleado+21°C" / "Nieve-3°C" at the sign.
pub fn parse_report(raw: &str) -> WeatherReport {
    let raw = raw.trim();
    let (description, temperature) = if let Some((d, t)) = raw.split_once('+') {
        (d, t.to_string())
    } else if let Some((d, t)) = raw.split_once('-') {
        (d, format!("-{}", t))
    } else {
        let d = raw.trim_end_matches("°C").trim_end_matches(|c: char| c.is_ascii_digit());
        (d, "0".to_string())
    };
    WeatherReport {
        description: description.trim().to_lowercase(),
        temperature: temperature.replace("°C", "").trim().to_string(),
    }
}

pub fn report_reply(place: &str, report: &WeatherReport) -> Reply {
    Reply::new(
        format!(
            "En {}, está {} y hace {} grados.",
            place, report.description, report.temperature
        ),
        format!("{}\n{} {}°C", place, report.description, report.temperature),
    )
}

/// HTTP client for `{base}/{place}?format=%C%t&lang=es`.
pub struct WttrWeather {
    client: reqwest::Client,
    base_url: String,
}

impl WttrWeather {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, place: &str) -> CoreResult<Url> {
        Url::parse_with_params(
            &format!("{}/{}", self.base_url, place),
            &[("format", "%C%t"), ("lang", "es")],
        )
        .map_err(|e| CoreError::handler("weather", e))
    }
}

#[async_trait::async_trait]
impl WeatherService for WttrWeather {
    async fn current(&self, place: &str) -> CoreResult<String> {
        let url = self.url(place)?;
        tracing::debug!(target: "teodoro::weather", url = %url, "Fetching weather");
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}
