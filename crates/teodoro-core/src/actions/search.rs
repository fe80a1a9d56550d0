//! Web searches and the HTTP search collaborator.

use crate::collab::SearchService;
use crate::error::{CoreError, CoreResult};
use crate::extract::tokenize;
use crate::lexicon::Intent;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use std::time::Duration;

static VIDEO_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"watch\?v=(\S{11})").expect("static video id pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchEngine {
    Google,
    Wikipedia,
    Youtube,
}

impl SearchEngine {
    pub fn for_intent(intent: Intent) -> Option<Self> {
        match intent {
            Intent::Google => Some(SearchEngine::Google),
            Intent::Wikipedia => Some(SearchEngine::Wikipedia),
            Intent::Youtube => Some(SearchEngine::Youtube),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SearchEngine::Google => "google",
            SearchEngine::Wikipedia => "wikipedia",
            SearchEngine::Youtube => "youtube",
        }
    }

    pub fn results_url(self, query: &str) -> CoreResult<String> {
        let (base, param) = match self {
            SearchEngine::Google => ("https://www.google.es/search", "q"),
            SearchEngine::Wikipedia => ("https://es.wikipedia.org/w/index.php", "search"),
            SearchEngine::Youtube => ("https://www.youtube.com/results", "search_query"),
        };
        Url::parse_with_params(base, &[(param, query)])
            .map(String::from)
            .map_err(|e| CoreError::handler("search", e))
    }
}

/// The spoken query minus the command words "busca", "en" and the engine name.
pub fn clean_query(transcript: &str, engine: SearchEngine) -> String {
    tokenize(transcript)
        .into_iter()
        .filter(|t| t != "busca" && t != "en" && t != engine.name())
        .collect::<Vec<_>>()
        .join(" ")
}

/// "búsqueda" (or "vídeo" on Youtube) asks for the query to be typed.
pub fn needs_prompt(transcript: &str, engine: SearchEngine) -> bool {
    let lowered = transcript.to_lowercase();
    lowered.contains("búsqueda") || (engine == SearchEngine::Youtube && lowered.contains("vídeo"))
}

/// Youtube requests that do not ask to search open the first video directly.
pub fn opens_first_video(transcript: &str, engine: SearchEngine) -> bool {
    let lowered = transcript.to_lowercase();
    engine == SearchEngine::Youtube && !lowered.contains("búsqueda") && !lowered.contains("busca")
}

pub fn first_video_id(html: &str) -> Option<String> {
    VIDEO_ID_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn video_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

/// Fetches result pages over HTTP.
pub struct HttpSearch {
    client: reqwest::Client,
}

impl HttpSearch {
    pub fn new(timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl SearchService for HttpSearch {
    async fn fetch(&self, url: &str) -> CoreResult<String> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_drops_command_words_only() {
        assert_eq!(
            clean_query("busca en google recetas de lentejas", SearchEngine::Google),
            "recetas de lentejas"
        );
        // "entrenamiento" keeps its "en".
        assert_eq!(
            clean_query("busca entrenamiento en youtube", SearchEngine::Youtube),
            "entrenamiento"
        );
    }

    #[test]
    fn prompt_and_video_rules() {
        assert!(needs_prompt("haz una búsqueda en google", SearchEngine::Google));
        assert!(needs_prompt("pon un vídeo de youtube", SearchEngine::Youtube));
        assert!(!needs_prompt("pon un vídeo en google", SearchEngine::Google));
        assert!(opens_first_video("pon gatos en youtube", SearchEngine::Youtube));
        assert!(!opens_first_video("busca gatos en youtube", SearchEngine::Youtube));
    }

    #[test]
    fn extracts_first_video() {
        let html = r#"<a href="/watch?v=dQw4w9WgXcQ">x</a><a href="/watch?v=aaaaaaaaaaa">"#;
        assert_eq!(first_video_id(html).as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(first_video_id("nada"), None);
    }

    #[test]
    fn urls_are_encoded() {
        let url = SearchEngine::Google.results_url("qué tal").unwrap();
        assert!(url.starts_with("https://www.google.es/search?q="));
        assert!(!url.contains(' '));
    }
}
