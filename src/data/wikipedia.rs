//! Wikipedia lookups through the MediaWiki action API.

use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::debug;
use urlencoding::encode;

use crate::{
    config::WikiSettings,
    labels::resolver::{KnowledgeSource, Lookup},
};

/// Thin client returning summaries, disambiguation candidates or misses.
#[derive(Debug, Clone)]
pub struct WikipediaClient {
    client: Client,
    api_url: String,
    request_delay: Duration,
}

impl WikipediaClient {
    pub fn new(settings: &WikiSettings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings)?,
            api_url: settings.api_url.clone(),
            request_delay: settings.request_delay,
        })
    }

    async fn query(&self, params: &str) -> Result<QueryResponse> {
        if !self.request_delay.is_zero() {
            sleep(self.request_delay).await; // be nice to the API
        }
        let url = format!(
            "{base}?action=query&format=json&formatversion=2&redirects=1&{params}",
            base = self.api_url
        );
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Article links of a disambiguation page, in page order.
    async fn candidates(&self, title: &str) -> Result<Vec<String>> {
        let params = format!(
            "prop=links&plnamespace=0&pllimit=max&titles={}",
            encode(title)
        );
        let resp = self.query(&params).await?;
        Ok(resp
            .query
            .pages
            .into_iter()
            .flat_map(|page| page.links)
            .map(|link| link.title)
            .collect())
    }
}

impl KnowledgeSource for WikipediaClient {
    async fn lookup(&self, title: &str) -> Result<Lookup> {
        if title.trim().is_empty() {
            return Ok(Lookup::NotFound);
        }
        let params = format!(
            "prop=extracts%7Cpageprops&exintro=1&explaintext=1&ppprop=disambiguation&titles={}",
            encode(title)
        );
        let resp = self.query(&params).await?;
        match classify(resp) {
            Page::Missing => Ok(Lookup::NotFound),
            Page::Disambiguation { title } => {
                let candidates = self.candidates(&title).await?;
                debug!(%title, candidates = candidates.len(), "disambiguation page");
                Ok(Lookup::Disambiguation { candidates })
            }
            Page::Article { title, extract } => Ok(Lookup::Found {
                title,
                summary: extract,
            }),
        }
    }
}

fn http_client(settings: &WikiSettings) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(format!("vaers-corpus/0.1 (+{})", settings.contact_email))
        .timeout(settings.timeout)
        .gzip(true)
        .brotli(true)
        .build()?)
}

#[derive(Debug, PartialEq, Eq)]
enum Page {
    Missing,
    Disambiguation { title: String },
    Article { title: String, extract: String },
}

fn classify(resp: QueryResponse) -> Page {
    let Some(page) = resp.query.pages.into_iter().next() else {
        return Page::Missing;
    };
    if page.missing || page.invalid {
        return Page::Missing;
    }
    if page
        .pageprops
        .as_ref()
        .is_some_and(|props| props.disambiguation.is_some())
    {
        return Page::Disambiguation { title: page.title };
    }
    Page::Article {
        title: page.title,
        extract: page.extract.unwrap_or_default(),
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: QueryBody,
}

#[derive(Debug, Default, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: Vec<PageEntry>,
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    #[serde(default)]
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    extract: Option<String>,
    pageprops: Option<PageProps>,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct PageProps {
    disambiguation: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Link {
    title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Page {
        classify(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn missing_pages_are_not_found() {
        let json = r#"{"batchcomplete":true,"query":{"pages":[{"ns":0,"title":"Blood amylase increased","missing":true}]}}"#;
        assert_eq!(parse(json), Page::Missing);
    }

    #[test]
    fn disambiguation_property_is_detected() {
        let json = r#"{"query":{"pages":[{"pageid":1,"ns":0,"title":"Syncope","extract":"Syncope may refer to:","pageprops":{"disambiguation":""}}]}}"#;
        assert_eq!(
            parse(json),
            Page::Disambiguation {
                title: "Syncope".into()
            }
        );
    }

    #[test]
    fn article_returns_extract() {
        let json = r#"{"query":{"redirects":[{"from":"Fainting","to":"Syncope (medicine)"}],"pages":[{"pageid":2,"ns":0,"title":"Syncope (medicine)","extract":"Syncope is a loss of consciousness. It is brief."}]}}"#;
        assert_eq!(
            parse(json),
            Page::Article {
                title: "Syncope (medicine)".into(),
                extract: "Syncope is a loss of consciousness. It is brief.".into()
            }
        );
    }

    #[test]
    fn empty_query_is_missing() {
        assert_eq!(parse("{}"), Page::Missing);
    }
}
