//! Catalog query adapter.
//!
//! Wraps the external catalog provider's search, paginated top-items and
//! by-id lookups. De-duplication of search results and aggregation of the
//! top-album pool happen here; provider errors propagate to the caller,
//! which owns the single refresh-and-retry for rejected tokens.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{AlbumCandidate, AlbumDetails};

/// Maximum number of de-duplicated search results returned to the client.
pub const SEARCH_RESULT_CAP: usize = 5;

/// Albums requested from the provider per search, before de-duplication.
const SEARCH_PAGE_SIZE: u32 = 10;

/// Top-track items requested per page.
const TOP_ITEMS_PAGE_SIZE: u32 = 50;

/// Defensive cap on the pagination chain.
const MAX_TOP_ITEM_PAGES: usize = 20;

/// One page of the provider's top-items listing.
#[derive(Debug, Clone)]
pub struct TopItemsPage {
    pub albums: Vec<AlbumCandidate>,
    /// Provider-supplied link to the next page, if any
    pub next: Option<String>,
}

/// External catalog provider: search, paginated top items, by-id lookup.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Raw album search in provider relevance order, without de-duplication.
    async fn search_albums_raw(
        &self,
        query: &str,
        access_token: &str,
    ) -> Result<Vec<AlbumCandidate>, AppError>;

    /// Fetch one page of the user's top items. `page_url` of `None` means
    /// the first page; otherwise it is the provider's own next-page link.
    async fn top_items_page(
        &self,
        page_url: Option<&str>,
        access_token: &str,
    ) -> Result<TopItemsPage, AppError>;

    async fn album_by_id(&self, id: &str, access_token: &str)
        -> Result<AlbumDetails, AppError>;
}

/// De-duplicate candidates by case-preserving exact `(name, primary_artist)`,
/// first-seen-wins, keeping provider order, capped at `cap` entries.
pub fn dedup_candidates(candidates: Vec<AlbumCandidate>, cap: usize) -> Vec<AlbumCandidate> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for candidate in candidates {
        let key = (candidate.name.clone(), candidate.primary_artist.clone());
        if seen.insert(key) {
            result.push(candidate);
            if result.len() >= cap {
                break;
            }
        }
    }
    result
}

/// Search albums, de-duplicated and capped for the guess candidate list.
pub async fn search_albums(
    provider: &dyn CatalogProvider,
    query: &str,
    access_token: &str,
) -> Result<Vec<AlbumCandidate>, AppError> {
    let raw = provider.search_albums_raw(query, access_token).await?;
    Ok(dedup_candidates(raw, SEARCH_RESULT_CAP))
}

/// Follow the top-items pagination chain until exhausted and aggregate the
/// referenced albums into one candidate pool.
///
/// Albums are de-duplicated by id so an album with many top tracks is not
/// over-weighted in random target selection.
pub async fn fetch_top_album_pool(
    provider: &dyn CatalogProvider,
    access_token: &str,
) -> Result<Vec<AlbumCandidate>, AppError> {
    let mut pool = Vec::new();
    let mut seen_ids = HashSet::new();
    let mut page_url: Option<String> = None;

    for _ in 0..MAX_TOP_ITEM_PAGES {
        let page = provider
            .top_items_page(page_url.as_deref(), access_token)
            .await?;

        for album in page.albums {
            if seen_ids.insert(album.id.clone()) {
                pool.push(album);
            }
        }

        match page.next {
            Some(next) => page_url = Some(next),
            None => return Ok(pool),
        }
    }

    tracing::warn!(
        "Top-items pagination exceeded {} pages; using partial pool of {} albums",
        MAX_TOP_ITEM_PAGES,
        pool.len()
    );
    Ok(pool)
}

/// HTTP implementation of [`CatalogProvider`].
pub struct HttpCatalogProvider {
    http: reqwest::Client,
    config: Arc<Config>,
}

impl HttpCatalogProvider {
    pub fn new(http: reqwest::Client, config: Arc<Config>) -> Self {
        Self { http, config }
    }

    /// Map a non-success provider status to the error taxonomy.
    fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
        match response.status() {
            status if status.is_success() => Ok(response),
            reqwest::StatusCode::UNAUTHORIZED => Err(AppError::AuthRejected),
            reqwest::StatusCode::TOO_MANY_REQUESTS => Err(AppError::RateLimited),
            status => {
                tracing::error!("Catalog provider returned {}", status);
                Err(AppError::Provider(format!(
                    "Catalog provider returned {}",
                    status
                )))
            }
        }
    }
}

// Wire shapes of the provider's JSON responses.

#[derive(Debug, Deserialize)]
struct WireArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct WireAlbum {
    id: String,
    name: String,
    artists: Vec<WireArtist>,
    images: Vec<WireImage>,
}

impl WireAlbum {
    /// Albums without an artist or cover art cannot be played as targets
    /// or guessed against, so they are skipped.
    fn into_candidate(self) -> Option<AlbumCandidate> {
        let primary_artist = self.artists.into_iter().next()?.name;
        let image_url = self.images.into_iter().next()?.url;
        Some(AlbumCandidate {
            id: self.id,
            name: self.name,
            primary_artist,
            image_url,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireTrack {
    album: WireAlbum,
}

#[derive(Debug, Deserialize)]
struct WireTopTracksPage {
    items: Vec<WireTrack>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireAlbumPage {
    items: Vec<WireAlbum>,
}

#[derive(Debug, Deserialize)]
struct WireSearchResponse {
    albums: WireAlbumPage,
}

#[async_trait]
impl CatalogProvider for HttpCatalogProvider {
    async fn search_albums_raw(
        &self,
        query: &str,
        access_token: &str,
    ) -> Result<Vec<AlbumCandidate>, AppError> {
        let limit = SEARCH_PAGE_SIZE.to_string();
        let response = self
            .http
            .get(format!("{}/search", self.config.api_base_url))
            .bearer_auth(access_token)
            .query(&[("q", query), ("type", "album"), ("limit", limit.as_str())])
            .send()
            .await?;

        let body: WireSearchResponse = Self::check_status(response)?.json().await?;
        Ok(body
            .albums
            .items
            .into_iter()
            .filter_map(WireAlbum::into_candidate)
            .collect())
    }

    async fn top_items_page(
        &self,
        page_url: Option<&str>,
        access_token: &str,
    ) -> Result<TopItemsPage, AppError> {
        let url = match page_url {
            Some(next) => next.to_string(),
            None => format!(
                "{}/me/top/tracks?limit={}",
                self.config.api_base_url, TOP_ITEMS_PAGE_SIZE
            ),
        };

        let response = self.http.get(url).bearer_auth(access_token).send().await?;
        let body: WireTopTracksPage = Self::check_status(response)?.json().await?;

        Ok(TopItemsPage {
            albums: body
                .items
                .into_iter()
                .filter_map(|track| track.album.into_candidate())
                .collect(),
            next: body.next,
        })
    }

    async fn album_by_id(
        &self,
        id: &str,
        access_token: &str,
    ) -> Result<AlbumDetails, AppError> {
        let response = self
            .http
            .get(format!("{}/albums/{}", self.config.api_base_url, id))
            .bearer_auth(access_token)
            .send()
            .await?;

        let body: WireAlbum = Self::check_status(response)?.json().await?;
        body.into_candidate()
            .map(|c| AlbumDetails {
                name: c.name,
                primary_artist: c.primary_artist,
            })
            .ok_or_else(|| {
                AppError::Provider(format!("Album {} has no artist or cover art", id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, artist: &str) -> AlbumCandidate {
        AlbumCandidate {
            id: format!("{}-{}", name, artist),
            name: name.to_string(),
            primary_artist: artist.to_string(),
            image_url: "http://covers.test/x.png".to_string(),
        }
    }

    #[test]
    fn test_dedup_first_seen_wins() {
        let results = vec![
            candidate("Thriller", "Jackson"),
            candidate("Thriller", "Jackson"),
            candidate("Bad", "Jackson"),
        ];
        let deduped = dedup_candidates(results, SEARCH_RESULT_CAP);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].name, "Thriller");
        assert_eq!(deduped[1].name, "Bad");
    }

    #[test]
    fn test_dedup_is_case_preserving_exact() {
        // "thriller" and "Thriller" are distinct keys
        let results = vec![
            candidate("Thriller", "Jackson"),
            candidate("thriller", "Jackson"),
        ];
        let deduped = dedup_candidates(results, SEARCH_RESULT_CAP);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn test_dedup_caps_results() {
        let results = (0..10)
            .map(|i| candidate(&format!("Album {}", i), "Artist"))
            .collect();
        let deduped = dedup_candidates(results, SEARCH_RESULT_CAP);
        assert_eq!(deduped.len(), SEARCH_RESULT_CAP);
        assert_eq!(deduped[0].name, "Album 0");
    }

    /// Paging double serving a fixed chain of pages.
    struct PagedProvider {
        pages: Vec<TopItemsPage>,
    }

    #[async_trait]
    impl CatalogProvider for PagedProvider {
        async fn search_albums_raw(
            &self,
            _query: &str,
            _access_token: &str,
        ) -> Result<Vec<AlbumCandidate>, AppError> {
            unimplemented!("not used by pagination tests")
        }

        async fn top_items_page(
            &self,
            page_url: Option<&str>,
            _access_token: &str,
        ) -> Result<TopItemsPage, AppError> {
            let index = match page_url {
                None => 0,
                Some(url) => url
                    .rsplit('/')
                    .next()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap(),
            };
            Ok(self.pages[index].clone())
        }

        async fn album_by_id(
            &self,
            _id: &str,
            _access_token: &str,
        ) -> Result<AlbumDetails, AppError> {
            unimplemented!("not used by pagination tests")
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> TopItemsPage {
        TopItemsPage {
            albums: ids
                .iter()
                .map(|id| AlbumCandidate {
                    id: id.to_string(),
                    name: format!("Album {}", id),
                    primary_artist: "Artist".to_string(),
                    image_url: format!("http://covers.test/{}.png", id),
                })
                .collect(),
            next: next.map(|s| s.to_string()),
        }
    }

    #[tokio::test]
    async fn test_pool_follows_pagination_until_exhausted() {
        let provider = PagedProvider {
            pages: vec![
                page(&["a", "b"], Some("http://api.test/page/1")),
                page(&["c"], Some("http://api.test/page/2")),
                page(&["d"], None),
            ],
        };

        let pool = fetch_top_album_pool(&provider, "token").await.unwrap();
        let ids: Vec<_> = pool.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_pool_dedups_album_ids_across_pages() {
        let provider = PagedProvider {
            pages: vec![
                page(&["a", "a", "b"], Some("http://api.test/page/1")),
                page(&["b", "c"], None),
            ],
        };

        let pool = fetch_top_album_pool(&provider, "token").await.unwrap();
        let ids: Vec<_> = pool.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_pool_stops_at_page_cap() {
        // Every page points at itself; the loop must still terminate
        let provider = PagedProvider {
            pages: vec![page(&["a"], Some("http://api.test/page/0"))],
        };

        let pool = fetch_top_album_pool(&provider, "token").await.unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn test_search_albums_dedups_and_caps() {
        struct SearchProvider;

        #[async_trait]
        impl CatalogProvider for SearchProvider {
            async fn search_albums_raw(
                &self,
                _query: &str,
                _access_token: &str,
            ) -> Result<Vec<AlbumCandidate>, AppError> {
                Ok(vec![
                    candidate("Thriller", "Jackson"),
                    candidate("Thriller", "Jackson"),
                    candidate("Bad", "Jackson"),
                ])
            }

            async fn top_items_page(
                &self,
                _page_url: Option<&str>,
                _access_token: &str,
            ) -> Result<TopItemsPage, AppError> {
                unimplemented!()
            }

            async fn album_by_id(
                &self,
                _id: &str,
                _access_token: &str,
            ) -> Result<AlbumDetails, AppError> {
                unimplemented!()
            }
        }

        let results = search_albums(&SearchProvider, "thriller", "token")
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }
}
