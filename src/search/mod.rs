use crate::config::ApiKeys;
use crate::error::SearchError;
use crate::providers::ChatProvider;
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SEARCH_BASE_URL: &str = "https://www.googleapis.com";
const DEFAULT_NEWS_FEED_URL: &str = "https://news.google.com/rss";
const DEFAULT_WEATHER_BASE_URL: &str = "http://api.weatherapi.com";
const RESULT_COUNT: usize = 5;

/// Web lookups the assistant can run on request: Google Custom Search
/// (synthesized through the model), Google News headlines, and current
/// weather conditions.
pub struct SearchService {
    client: Client,
    provider: Arc<dyn ChatProvider>,
    keys: ApiKeys,
    search_base_url: String,
    news_feed_url: String,
    weather_base_url: String,
}

#[derive(Debug, Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<CseItem>,
}

#[derive(Debug, Deserialize)]
struct CseItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    current: CurrentWeather,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temp_c: f64,
    condition: WeatherCondition,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    text: String,
}

impl SearchService {
    #[must_use]
    pub fn new(provider: Arc<dyn ChatProvider>, keys: ApiKeys) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            provider,
            keys,
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            news_feed_url: DEFAULT_NEWS_FEED_URL.to_string(),
            weather_base_url: DEFAULT_WEATHER_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_search_base_url(mut self, url: impl Into<String>) -> Self {
        self.search_base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_news_feed_url(mut self, url: impl Into<String>) -> Self {
        self.news_feed_url = url.into();
        self
    }

    #[must_use]
    pub fn with_weather_base_url(mut self, url: impl Into<String>) -> Self {
        self.weather_base_url = url.into();
        self
    }

    /// Top results for `query`, synthesized into one answer by the model.
    pub async fn search(&self, query: &str) -> Result<String, SearchError> {
        let api_key = self
            .keys
            .google_search
            .as_deref()
            .ok_or_else(|| SearchError::Request("GOOGLE_API_KEY not configured".into()))?;
        let cse_id = self
            .keys
            .google_cse_id
            .as_deref()
            .ok_or_else(|| SearchError::Request("GOOGLE_CSE_ID not configured".into()))?;

        let response = self
            .client
            .get(format!("{}/customsearch/v1", self.search_base_url))
            .query(&[
                ("key", api_key),
                ("cx", cse_id),
                ("q", query),
                ("num", &RESULT_COUNT.to_string()),
            ])
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
            });
        }

        let parsed: CseResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Request(format!("invalid response body: {e}")))?;
        if parsed.items.is_empty() {
            return Err(SearchError::NoResults);
        }

        let results: Vec<String> = parsed
            .items
            .iter()
            .take(RESULT_COUNT)
            .map(|item| format!("{}\n{}", item.title, item.snippet))
            .collect();

        let synthesis_prompt = format!(
            "Eres un asistente experto en sintetizar información. \
             Analiza estos resultados de búsqueda y proporciona una respuesta \
             completa y bien estructurada sobre: \"{query}\". \
             Incluye los datos más relevantes y asegúrate de que la respuesta sea coherente."
        );

        let answer = self
            .provider
            .chat(&synthesis_prompt, &[], &results.join("\n\n"))
            .await?;
        Ok(answer)
    }

    /// Latest headlines from the news feed.
    pub async fn news(&self) -> Result<String, SearchError> {
        let response = self
            .client
            .get(&self.news_feed_url)
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;
        let titles = parse_feed_titles(&body, RESULT_COUNT)?;
        if titles.is_empty() {
            return Err(SearchError::NoResults);
        }

        let listing: String = titles
            .iter()
            .map(|title| format!("📰 {title}\n"))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(format!("Últimas noticias:\n\n{listing}"))
    }

    /// Current conditions for a city.
    pub async fn weather(&self, city: &str) -> Result<String, SearchError> {
        let api_key = self
            .keys
            .weather
            .as_deref()
            .ok_or_else(|| SearchError::Request("WEATHER_API_KEY not configured".into()))?;

        let response = self
            .client
            .get(format!("{}/v1/current.json", self.weather_base_url))
            .query(&[("key", api_key), ("q", city)])
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
            });
        }

        let parsed: WeatherResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Request(format!("invalid response body: {e}")))?;
        Ok(format!(
            "Clima en {city}:\nTemperatura: {}°C\nCondición: {}",
            parsed.current.temp_c, parsed.current.condition.text
        ))
    }
}

/// Pull `<item><title>` texts out of an RSS feed, in document order.
fn parse_feed_titles(xml: &str, limit: usize) -> Result<Vec<String>, SearchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut titles = Vec::new();
    let mut in_item = false;
    let mut in_title = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"item" => in_item = true,
                b"title" if in_item => in_title = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"item" => in_item = false,
                b"title" => in_title = false,
                _ => {}
            },
            Ok(Event::Text(text)) if in_item && in_title => {
                let title = text
                    .unescape()
                    .map_err(|e| SearchError::FeedParse(e.to_string()))?
                    .into_owned();
                titles.push(title);
                if titles.len() == limit {
                    break;
                }
            }
            Ok(Event::CData(cdata)) if in_item && in_title => {
                titles.push(String::from_utf8_lossy(&cdata.into_inner()).into_owned());
                if titles.len() == limit {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SearchError::FeedParse(e.to_string())),
            Ok(_) => {}
        }
    }

    Ok(titles)
}
