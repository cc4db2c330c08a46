//! Identity Resolver, Stage B (C3): TMDB lookup.
//!
//! Talks to the TMDB v3 REST API with a plain `reqwest::Client`, mirroring
//! `ferrex`'s own internal `get_tmdb_json` helper rather than going through
//! an external TMDB SDK crate — full control over response shapes, no
//! dependency on an unvetted crate's field names.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::cache::Cache;
use super::retry::{retry_async, RetryPolicy};
use super::types::{FilenameGuess, MediaType, ResolvedRecord};
use crate::error::{LibraryError, Result};

const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_LANGUAGE: &str = "en-US";
const SEARCH_CACHE_CAPACITY: usize = 128;
const DETAIL_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub api_key: String,
    pub base_url: String,
    pub concurrency: usize,
    /// `TMDB_HYBRID_FALLBACK` (SPEC_FULL.md §9): when the type-directed
    /// search misses, retry once against the other media type before
    /// giving up.
    pub hybrid_fallback: bool,
    /// `TMDB_LANGUAGE` (SPEC_FULL.md §9): forwarded as the `language` query
    /// parameter on every search/detail request.
    pub language: String,
    pub timeout: Duration,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            hybrid_fallback: false,
            language: DEFAULT_LANGUAGE.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct SearchKey {
    media_type: MediaType,
    title: String,
    year: Option<i32>,
}

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct DetailKey {
    media_type: MediaType,
    id: i64,
}

pub struct TmdbResolver {
    http: reqwest::Client,
    config: TmdbConfig,
    semaphore: Arc<Semaphore>,
    search_cache: Cache<SearchKey, Vec<SearchHit>>,
    detail_cache: Cache<DetailKey, Value>,
}

#[derive(Debug, Clone)]
struct SearchHit {
    id: i64,
    year: Option<i32>,
}

#[derive(Debug)]
enum StageBError {
    Transient(String),
    Permanent(String),
}

impl TmdbResolver {
    pub fn new(config: TmdbConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LibraryError::Internal(format!("building http client: {e}")))?;

        let concurrency = config.concurrency.max(1);
        Ok(Self {
            http,
            config,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            search_cache: Cache::new(SEARCH_CACHE_CAPACITY),
            detail_cache: Cache::new(DETAIL_CACHE_CAPACITY),
        })
    }

    /// Resolve a Stage A guess to a canonical TMDB record, or `None` when
    /// no match is found for either the guessed type or, with
    /// `hybrid_fallback` enabled, the other type.
    pub async fn resolve(&self, guess: &FilenameGuess) -> Result<Option<ResolvedRecord>> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| LibraryError::Internal(format!("tmdb semaphore closed: {e}")))?;

        if let Some(record) = self.resolve_type(guess, guess.media_type).await? {
            return Ok(Some(record));
        }

        if self.config.hybrid_fallback {
            if let Some(record) = self.resolve_type(guess, guess.media_type.other()).await? {
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    async fn resolve_type(
        &self,
        guess: &FilenameGuess,
        media_type: MediaType,
    ) -> Result<Option<ResolvedRecord>> {
        let hits = self.search(media_type, &guess.title, guess.year).await?;
        let Some(best) = pick_best(&hits, guess.year) else {
            return Ok(None);
        };

        let detail = self.details(media_type, best.id).await?;
        Ok(Some(build_record(media_type, best.id, detail)))
    }

    async fn search(
        &self,
        media_type: MediaType,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<SearchHit>> {
        let key = SearchKey {
            media_type,
            title: title.to_string(),
            year,
        };
        if let Some(cached) = self.search_cache.get(&key).await {
            return Ok(cached);
        }

        let endpoint = match media_type {
            MediaType::Movie => "search/movie",
            MediaType::Tv => "search/tv",
        };
        let mut query = vec![
            ("query".to_string(), title.to_string()),
            ("language".to_string(), self.config.language.clone()),
        ];
        if let Some(year) = year {
            let year_param = match media_type {
                MediaType::Movie => "year",
                MediaType::Tv => "first_air_date_year",
            };
            query.push((year_param.to_string(), year.to_string()));
        }

        let body = self
            .get_json(endpoint, &query)
            .await
            .map_err(to_library_error)?;

        let hits: Vec<SearchHit> = body
            .get("results")
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .filter_map(|item| parse_search_hit(item, media_type))
                    .collect()
            })
            .unwrap_or_default();

        self.search_cache.put(key, hits.to_vec()).await;
        Ok(hits)
    }

    async fn details(&self, media_type: MediaType, id: i64) -> Result<Value> {
        let key = DetailKey { media_type, id };
        if let Some(cached) = self.detail_cache.get(&key).await {
            return Ok(cached);
        }

        let endpoint = match media_type {
            MediaType::Movie => format!("movie/{id}"),
            MediaType::Tv => format!("tv/{id}"),
        };
        let query = [("language".to_string(), self.config.language.clone())];
        let detail = self.get_json(&endpoint, &query).await.map_err(to_library_error)?;
        self.detail_cache.put(key, detail.clone()).await;
        Ok(detail)
    }

    async fn get_json(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> std::result::Result<Value, StageBError> {
        retry_async(
            RetryPolicy::default(),
            |err| matches!(err, StageBError::Transient(_)),
            |_attempt| self.get_json_once(endpoint, query),
        )
        .await
    }

    async fn get_json_once(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> std::result::Result<Value, StageBError> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| StageBError::Transient(format!("tmdb request failed: {e}")))?;

        let status = response.status();
        match status.as_u16() {
            401 => {
                return Err(StageBError::Permanent("tmdb rejected api key".to_string()))
            }
            404 => return Ok(Value::Object(Default::default())),
            429 => {
                return Err(StageBError::Transient("tmdb rate limited".to_string()))
            }
            _ => {}
        }
        if status.is_server_error() {
            return Err(StageBError::Transient(format!("tmdb returned {status}")));
        }
        if !status.is_success() {
            return Err(StageBError::Permanent(format!("tmdb returned {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| StageBError::Transient(format!("reading tmdb response: {e}")))
    }
}

fn to_library_error(err: StageBError) -> LibraryError {
    match err {
        StageBError::Transient(msg) => LibraryError::Provider(msg),
        StageBError::Permanent(msg) => LibraryError::Provider(msg),
    }
}

fn parse_search_hit(item: &Value, media_type: MediaType) -> Option<SearchHit> {
    let id = item.get("id").and_then(Value::as_i64)?;
    let date_field = match media_type {
        MediaType::Movie => "release_date",
        MediaType::Tv => "first_air_date",
    };
    let year = item
        .get(date_field)
        .and_then(Value::as_str)
        .and_then(|d| d.get(0..4))
        .and_then(|y| y.parse::<i32>().ok());

    Some(SearchHit { id, year })
}

/// First result matching the guessed year if one is given and present in
/// the set, otherwise TMDB's own top-ranked result (SPEC_FULL.md §4.3).
fn pick_best(hits: &[SearchHit], year: Option<i32>) -> Option<SearchHit> {
    if let Some(year) = year {
        if let Some(hit) = hits.iter().find(|h| h.year == Some(year)) {
            return Some(hit.clone());
        }
    }
    hits.first().cloned()
}

fn build_record(media_type: MediaType, id: i64, detail: Value) -> ResolvedRecord {
    let title_field = match media_type {
        MediaType::Movie => "title",
        MediaType::Tv => "name",
    };
    let date_field = match media_type {
        MediaType::Movie => "release_date",
        MediaType::Tv => "first_air_date",
    };

    let title = detail
        .get(title_field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let year = detail
        .get(date_field)
        .and_then(Value::as_str)
        .and_then(|d| d.get(0..4))
        .and_then(|y| y.parse::<i32>().ok());

    ResolvedRecord {
        tmdb_id: id,
        media_type,
        title,
        year,
        raw: detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_hit_matching_guessed_year_over_first_result() {
        let hits = vec![
            SearchHit { id: 1, year: Some(2001) },
            SearchHit { id: 2, year: Some(2024) },
        ];
        let best = pick_best(&hits, Some(2024)).unwrap();
        assert_eq!(best.id, 2);
    }

    #[test]
    fn falls_back_to_first_result_when_no_year_given() {
        let hits = vec![
            SearchHit { id: 7, year: Some(2001) },
            SearchHit { id: 9, year: Some(2024) },
        ];
        let best = pick_best(&hits, None).unwrap();
        assert_eq!(best.id, 7);
    }

    #[test]
    fn falls_back_to_first_result_when_year_not_present_in_hits() {
        let hits = vec![SearchHit { id: 3, year: Some(1999) }];
        let best = pick_best(&hits, Some(2024)).unwrap();
        assert_eq!(best.id, 3);
    }

    #[test]
    fn empty_hits_yield_no_match() {
        assert!(pick_best(&[], Some(2024)).is_none());
    }

    #[test]
    fn parses_movie_search_hit_year_from_release_date() {
        let item = json!({"id": 603, "release_date": "1999-03-31"});
        let hit = parse_search_hit(&item, MediaType::Movie).unwrap();
        assert_eq!(hit.id, 603);
        assert_eq!(hit.year, Some(1999));
    }

    #[test]
    fn parses_tv_search_hit_year_from_first_air_date() {
        let item = json!({"id": 1396, "first_air_date": "2008-01-20"});
        let hit = parse_search_hit(&item, MediaType::Tv).unwrap();
        assert_eq!(hit.id, 1396);
        assert_eq!(hit.year, Some(2008));
    }

    #[test]
    fn search_hit_without_id_is_skipped() {
        let item = json!({"release_date": "1999-03-31"});
        assert!(parse_search_hit(&item, MediaType::Movie).is_none());
    }

    #[test]
    fn builds_record_from_movie_detail_payload() {
        let detail = json!({"title": "The Matrix", "release_date": "1999-03-31"});
        let record = build_record(MediaType::Movie, 603, detail.clone());
        assert_eq!(record.tmdb_id, 603);
        assert_eq!(record.title, "The Matrix");
        assert_eq!(record.year, Some(1999));
        assert_eq!(record.raw, detail);
    }

    #[test]
    fn builds_record_from_tv_detail_payload_using_name_field() {
        let detail = json!({"name": "Breaking Bad", "first_air_date": "2008-01-20"});
        let record = build_record(MediaType::Tv, 1396, detail);
        assert_eq!(record.title, "Breaking Bad");
        assert_eq!(record.year, Some(2008));
    }
}
