use crate::chunking::normalize_whitespace;
use crate::error::SourceQueryError;
use crate::literature::pacer::FixedDelayPacer;
use crate::models::PaperRecord;
use crate::retry::RetryPolicy;
use crate::traits::LiteratureSource;
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, instrument};

const SCHOLAR_URL: &str = "https://scholar.google.com/scholar";
const SOURCE_NAME: &str = "Google Scholar";
const BROWSER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

pub struct GoogleScholarSource {
    client: Client,
    pacer: FixedDelayPacer,
    retry: RetryPolicy,
}

impl GoogleScholarSource {
    pub fn new(delay: Duration, retry: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            pacer: FixedDelayPacer::new(delay),
            retry,
        }
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<Vec<PaperRecord>, SourceQueryError> {
        self.pacer.wait_turn().await;

        let num = max_results.min(20).to_string();
        let response = self
            .client
            .get(SCHOLAR_URL)
            .header(USER_AGENT, BROWSER_AGENT)
            .query(&[("q", query), ("hl", "en"), ("start", "0"), ("num", num.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(SourceQueryError::RateLimited {
                    source_name: SOURCE_NAME,
                })
            }
            status if !status.is_success() => {
                return Err(SourceQueryError::Status {
                    source_name: SOURCE_NAME,
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        let html = response.text().await?;
        let papers = parse_results_page(&html, max_results)?;
        debug!(count = papers.len(), "Google Scholar returned results");
        Ok(papers)
    }
}

#[async_trait]
impl LiteratureSource for GoogleScholarSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<PaperRecord>, SourceQueryError> {
        self.retry
            .run("google scholar search", || self.fetch(query, max_results))
            .await
    }
}

fn selector(css: &'static str) -> Result<Selector, SourceQueryError> {
    Selector::parse(css).map_err(|error| SourceQueryError::Parse {
        source_name: SOURCE_NAME,
        details: error.to_string(),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>().replace('\u{a0}', " "))
}

fn strip_title_markers(title: &str) -> &str {
    let mut rest = title.trim_start();
    while rest.starts_with('[') {
        match rest.find(']') {
            Some(end) => rest = rest[end + 1..].trim_start(),
            None => break,
        }
    }
    rest.trim()
}

/// Byte offset and text of the last four-digit run that reads as a year.
fn last_year(text: &str) -> Option<(usize, &str)> {
    let mut found = None;
    let mut run_start = None;
    for (offset, c) in text.char_indices().chain([(text.len(), ' ')]) {
        match (c.is_ascii_digit(), run_start) {
            (true, None) => run_start = Some(offset),
            (false, Some(start)) => {
                let token = &text[start..offset];
                if token.len() == 4 && matches!(token.parse::<u32>(), Ok(1900..=2100)) {
                    found = Some((start, token));
                }
                run_start = None;
            }
            _ => {}
        }
    }
    found
}

/// Splits `Authors - Venue, Year - host` into its parts.
fn parse_byline(byline: &str) -> (Vec<String>, String, String) {
    let mut parts = byline.split(" - ");
    let authors = parts
        .next()
        .map(|authors| {
            authors
                .split(',')
                .map(|author| author.trim().trim_end_matches('…').trim())
                .filter(|author| !author.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let details = parts.next().unwrap_or_default();
    let year = last_year(details);
    let mut venue = details.to_string();
    if let Some((offset, token)) = year {
        venue.replace_range(offset..offset + token.len(), "");
    }
    let venue = venue.trim().trim_end_matches(',').trim().trim_start_matches('…').trim();

    (
        authors,
        if venue.is_empty() {
            "Unknown Venue".to_string()
        } else {
            venue.to_string()
        },
        year.map_or_else(|| "Unknown".to_string(), |(_, token)| token.to_string()),
    )
}

fn looks_like_captcha(html: &str) -> bool {
    html.contains("gs_captcha") || html.contains("id=\"captcha") || html.contains("not a robot")
}

pub(crate) fn parse_results_page(html: &str, max_results: usize) -> Result<Vec<PaperRecord>, SourceQueryError> {
    if looks_like_captcha(html) {
        return Err(SourceQueryError::RateLimited {
            source_name: SOURCE_NAME,
        });
    }

    let result_selector = selector("div.gs_ri")?;
    let title_selector = selector("h3.gs_rt")?;
    let link_selector = selector("h3.gs_rt a")?;
    let byline_selector = selector("div.gs_a")?;
    let snippet_selector = selector("div.gs_rs")?;
    let footer_selector = selector("div.gs_fl a")?;

    let document = Html::parse_document(html);
    let mut papers = Vec::new();
    for result in document.select(&result_selector).take(max_results) {
        let title = result
            .select(&title_selector)
            .next()
            .map(element_text)
            .map(|title| strip_title_markers(&title).to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| "Unknown Title".to_string());
        let url = result
            .select(&link_selector)
            .next()
            .and_then(|link| link.value().attr("href"))
            .unwrap_or_default()
            .to_string();
        let (authors, venue, published) = result
            .select(&byline_selector)
            .next()
            .map(|byline| parse_byline(&element_text(byline)))
            .unwrap_or_else(|| (Vec::new(), "Unknown Venue".to_string(), "Unknown".to_string()));
        let abstract_text = result
            .select(&snippet_selector)
            .next()
            .map(element_text)
            .filter(|snippet| !snippet.is_empty())
            .unwrap_or_else(|| "No abstract available".to_string());
        let citations = result
            .select(&footer_selector)
            .map(element_text)
            .find_map(|link| {
                link.strip_prefix("Cited by ")
                    .and_then(|count| count.trim().parse::<u64>().ok())
            })
            .unwrap_or(0);

        papers.push(PaperRecord {
            title,
            authors,
            abstract_text,
            url,
            published,
            source: SOURCE_NAME.to_string(),
            citations: Some(citations),
            venue: Some(venue),
            categories: Vec::new(),
        });
    }

    Ok(papers)
}
