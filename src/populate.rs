//! Fills the three collections from the board.
//!
//! Expects the target collections to be empty; the refresh job archives the
//! previous ones before calling in here.

use std::time::Duration;
use tracing::{debug, info};

use crate::error::Result;
use crate::fetch::Trello;
use crate::schema::data::{RecipeCard, RecipeDetails, Tag};
use crate::storage::{Collection, DocumentStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulateSummary {
    pub tags: usize,
    pub recipes: usize,
    pub details: usize,
}

pub async fn populate_tags(store: &dyn DocumentStore, trello: &Trello) -> Result<usize> {
    let tags = trello.tags().await?;
    Collection::<Tag>::new(store).create_many(&tags).await?;
    info!("Stored {} tags", tags.len());
    Ok(tags.len())
}

pub async fn populate_recipes(store: &dyn DocumentStore, trello: &Trello) -> Result<usize> {
    let recipes = trello.recipes().await?;
    Collection::<RecipeCard>::new(store).create_many(&recipes).await?;
    info!("Stored {} recipes", recipes.len());
    Ok(recipes.len())
}

/// Fetches details for every stored recipe, one request at a time, waiting
/// `delay` between requests to stay under the board's rate limit.
pub async fn populate_details(store: &dyn DocumentStore, trello: &Trello, delay: Duration) -> Result<usize> {
    let ids: Vec<String> = Collection::<RecipeCard>::new(store)
        .read_all()
        .await?
        .into_iter()
        .map(|recipe| recipe.id)
        .collect();
    let total = ids.len();

    let mut details = Vec::with_capacity(total);
    for (index, id) in ids.iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        debug!("Fetching details {}/{} ({})", index + 1, total, id);
        details.push(trello.details(id).await?);
    }

    info!("Writing {} details to the database", details.len());
    Collection::<RecipeDetails>::new(store).create_many(&details).await?;
    Ok(details.len())
}

/// Tags, then recipes, then details; stops at the first failure.
pub async fn populate_all(store: &dyn DocumentStore, trello: &Trello, delay: Duration) -> Result<PopulateSummary> {
    info!("Populating tags");
    let tags = populate_tags(store, trello).await?;
    info!("Populating recipes");
    let recipes = populate_recipes(store, trello).await?;
    info!("Populating details");
    let details = populate_details(store, trello, delay).await?;

    Ok(PopulateSummary { tags, recipes, details })
}
