//! Board API client.
//!
//! Every expected failure (non-2xx, transport error, unreadable body,
//! unpublished image) comes back in the `Err` channel as a [`SyncError`].

use futures_util::future::try_join_all;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use crate::app::ports::HttpClientPort;
use crate::config::TrelloConfig;
use crate::error::{Result, SyncError};
use crate::metrics::record_fetch;
use crate::result::merge_results;
use crate::schema::data::{Image, RecipeCard, RecipeDetails, ScaledImage, Tag};
use crate::schema::trello::{Attachment, Card, CardDetails, Label, SearchResults};
use crate::translations::{build_image, build_recipe_card, build_recipe_details, build_tag, check_published};

pub const CARD_FIELDS: &str = "id,name,shortLink,idList,labels,idAttachmentCover";
pub const ATTACHMENT_FIELDS: &str = "id,name,url,previews,edgeColor";
const SEARCH_LIMIT: &str = "100";

/// Lower bounds for a scaled image. At least one side must be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinDimensions {
    pub height: Option<u32>,
    pub width: Option<u32>,
}

impl MinDimensions {
    pub fn new(height: u32, width: u32) -> Self {
        Self {
            height: Some(height),
            width: Some(width),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.height.is_none() && self.width.is_none() {
            return Err(SyncError::Validation(
                "minimum dimensions need a height or a width".to_string(),
            ));
        }
        Ok(())
    }

    fn admits(&self, image: &ScaledImage) -> bool {
        image.height >= self.height.unwrap_or(0) && image.width >= self.width.unwrap_or(0)
    }
}

fn area(image: &ScaledImage) -> u64 {
    u64::from(image.height) * u64::from(image.width)
}

/// Smallest preview meeting `min`, or the largest one when none does.
pub fn select_preview<'a>(previews: &'a [ScaledImage], min: &MinDimensions) -> Option<&'a ScaledImage> {
    previews
        .iter()
        .filter(|p| min.admits(p))
        .min_by_key(|p| area(p))
        .or_else(|| previews.iter().max_by_key(|p| area(p)))
}

pub struct Trello {
    config: TrelloConfig,
    http: Arc<dyn HttpClientPort>,
}

impl Trello {
    pub fn new(config: TrelloConfig, http: Arc<dyn HttpClientPort>) -> Self {
        Self { config, http }
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.config.api_root, path)).map_err(|e| SyncError::Fetch {
            status: None,
            message: format!("Invalid request URL for {path}: {e}"),
        })?;
        {
            let mut query = url.query_pairs_mut();
            for (k, v) in params {
                query.append_pair(k, v);
            }
            if let Some(key) = &self.config.key {
                query.append_pair("key", key);
            }
            if let Some(token) = &self.config.token {
                query.append_pair("token", token);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }

    /// GETs `path` and decodes the JSON body.
    async fn request<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        let url = self.url(path, params)?;
        let started = Instant::now();

        let response = match self.http.get(url.as_str()).await {
            Ok(response) => response,
            Err(e) => {
                record_fetch("error", started.elapsed().as_secs_f64());
                return Err(SyncError::Fetch {
                    status: None,
                    message: format!("Request to {path} failed: {e}"),
                });
            }
        };

        if !response.is_success() {
            record_fetch("error", started.elapsed().as_secs_f64());
            let reason = StatusCode::from_u16(response.status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("");
            return Err(SyncError::Fetch {
                status: Some(response.status),
                message: format!("{} {} from {}", response.status, reason, path),
            });
        }

        record_fetch("success", started.elapsed().as_secs_f64());
        debug!("Fetched {} ({} bytes)", path, response.bytes.len());

        serde_json::from_slice(&response.bytes).map_err(|e| SyncError::Fetch {
            status: Some(response.status),
            message: format!("An unknown error occurred while reading {path}: {e}"),
        })
    }

    /// All labels of the board.
    #[instrument(skip(self))]
    pub async fn tags(&self) -> Result<Vec<Tag>> {
        let labels: Vec<Label> = self
            .request(&format!("/board/{}/labels", self.config.board_id), &[])
            .await?;
        Ok(labels.iter().map(build_tag).collect())
    }

    /// One published attachment of a card as an [`Image`].
    ///
    /// With `min`, the image `url` points at the best-fitting preview.
    #[instrument(skip(self))]
    pub async fn image(&self, card_id: &str, image_id: &str, min: Option<MinDimensions>) -> Result<Image> {
        if let Some(min) = &min {
            min.validate()?;
        }

        let attachment: Attachment = self
            .request(
                &format!("/card/{card_id}/attachments/{image_id}"),
                &[("fields", ATTACHMENT_FIELDS)],
            )
            .await?;
        let mut image = build_image(&check_published(&attachment)?);

        if let Some(min) = min {
            if let Some(preview) = select_preview(&image.scaled, &min) {
                image.url = preview.url.clone();
            }
        }
        Ok(image)
    }

    async fn cover(&self, card: &Card) -> Result<Option<Image>> {
        let Some(cover_id) = card.id_attachment_cover.as_deref().filter(|id| !id.is_empty()) else {
            return Ok(None);
        };
        match self.image(&card.id, cover_id, None).await {
            Ok(image) => Ok(Some(image)),
            Err(SyncError::NotPublished { name }) => {
                warn!("Cover {} of card {} is unpublished ({})", cover_id, card.id, name);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolves covers concurrently; the first failure other than an
    /// unpublished cover fails the whole batch. Output keeps input order.
    async fn with_covers(&self, cards: Vec<Card>) -> Result<Vec<RecipeCard>> {
        let covers = try_join_all(cards.iter().map(|card| self.cover(card))).await?;
        Ok(cards
            .iter()
            .zip(covers)
            .map(|(card, cover)| build_recipe_card(card, cover))
            .collect())
    }

    /// Every card of the board with its cover resolved.
    #[instrument(skip(self))]
    pub async fn recipes(&self) -> Result<Vec<RecipeCard>> {
        let cards: Vec<Card> = self
            .request(
                &format!("/board/{}/cards", self.config.board_id),
                &[("fields", CARD_FIELDS)],
            )
            .await?;
        debug!("Board returned {} cards", cards.len());
        self.with_covers(cards).await
    }

    /// Description and published attachments of one card.
    #[instrument(skip(self))]
    pub async fn details(&self, card_id: &str) -> Result<RecipeDetails> {
        let card: Result<CardDetails> = self
            .request(&format!("/card/{card_id}"), &[("fields", "id,desc")])
            .await;
        let images: Result<Vec<Attachment>> = self
            .request::<Vec<Attachment>>(
                &format!("/card/{card_id}/attachments"),
                &[("fields", ATTACHMENT_FIELDS)],
            )
            .await
            .map(|attachments| attachments.iter().filter_map(|a| check_published(a).ok()).collect());

        merge_results(card, images, |card, images| build_recipe_details(&card, &images))
    }

    /// Full-text search over the board, limited to published recipes.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<RecipeCard>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SyncError::Validation("search query must not be empty".to_string()));
        }

        let results: SearchResults = self
            .request(
                "/search",
                &[
                    ("query", query),
                    ("idBoards", self.config.board_id.as_str()),
                    ("modelTypes", "cards"),
                    ("card_fields", CARD_FIELDS),
                    ("cards_limit", SEARCH_LIMIT),
                    ("partial", "true"),
                ],
            )
            .await?;

        let published: Vec<Card> = results
            .cards
            .into_iter()
            .filter(|card| card.labels.iter().any(|l| l.id == self.config.published_label_id))
            .collect();
        self.with_covers(published).await
    }
}
