use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::actions::{Action, CardUpdate};
use crate::error::{Result, SyncError};
use crate::metrics::record_action;
use crate::schema::data::{RecipeCard, RecipeDetails, Tag};
use crate::storage::{Collection, DocumentStore};
use crate::translations::{
    action_add_attachment_to_card, action_add_label_to_card, action_create_card, action_create_label,
    action_delete_attachment_from_card, action_remove_label_from_card, action_update_card_desc,
    action_update_card_list, action_update_card_name, action_update_label, strip_published_marker,
};

/// Applies webhook actions to the stored documents.
///
/// Every update is read, transformed by a pure reducer, then written back as
/// a single whole-document replace.
#[derive(Clone)]
pub struct ActionDispatcher {
    store: Arc<dyn DocumentStore>,
}

impl ActionDispatcher {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn recipes(&self) -> Collection<'_, RecipeCard> {
        Collection::new(self.store.as_ref())
    }

    fn details(&self) -> Collection<'_, RecipeDetails> {
        Collection::new(self.store.as_ref())
    }

    fn tags(&self) -> Collection<'_, Tag> {
        Collection::new(self.store.as_ref())
    }

    /// Parses and applies the `action` object of a webhook body.
    pub async fn handle_value(&self, value: serde_json::Value) -> Result<()> {
        let action = Action::from_value(value).map_err(|e| {
            if let SyncError::UnhandledAction(_) = e {
                record_action("unhandled", "error");
            }
            e
        })?;
        self.handle(&action).await
    }

    #[instrument(skip(self, action), fields(kind = action.kind()))]
    pub async fn handle(&self, action: &Action) -> Result<()> {
        let result = self.apply(action).await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        record_action(action.kind(), outcome);
        result
    }

    async fn apply(&self, action: &Action) -> Result<()> {
        match action {
            Action::UpdateCard(CardUpdate::Name(rename)) => {
                let current = self.recipes().require_one(&rename.card_id).await?;
                self.recipes()
                    .replace_one(&action_update_card_name(&current, rename))
                    .await
            }
            Action::UpdateCard(CardUpdate::Desc(change)) => {
                let current = self.details().require_one(&change.card_id).await?;
                self.details()
                    .replace_one(&action_update_card_desc(&current, change))
                    .await
            }
            Action::UpdateCard(CardUpdate::List(mv)) => {
                let current = self.recipes().require_one(&mv.card_id).await?;
                self.recipes().replace_one(&action_update_card_list(&current, mv)).await
            }
            Action::AddLabelToCard(add) => {
                let current = self.recipes().require_one(&add.card_id).await?;
                self.recipes().replace_one(&action_add_label_to_card(&current, add)).await
            }
            Action::RemoveLabelFromCard(remove) => {
                let current = self.recipes().require_one(&remove.card_id).await?;
                self.recipes()
                    .replace_one(&action_remove_label_from_card(&current, remove))
                    .await
            }
            Action::CreateCard(new_card) => {
                let (card, details) = action_create_card(new_card);
                if self.recipes().read_one(&card.id).await?.is_some()
                    || self.details().read_one(&details.id).await?.is_some()
                {
                    return Err(SyncError::storage(format!("recipe {} already exists", card.id)));
                }

                self.recipes().create_one(&card).await?;
                if let Err(e) = self.details().create_one(&details).await {
                    warn!("Details for {} not stored, removing the recipe again: {}", card.id, e);
                    if let Err(undo) = self.recipes().delete_one(&card.id).await {
                        error!("Could not remove recipe {} without details: {}", card.id, undo);
                    }
                    return Err(e);
                }
                info!("Created recipe {}", card.id);
                Ok(())
            }
            Action::DeleteCard(card) => {
                let removed_card = self.recipes().delete_one(&card.card_id).await?;
                let removed_details = self.details().delete_one(&card.card_id).await?;
                if !removed_card && !removed_details {
                    debug!("Deleted card {} was not stored", card.card_id);
                }
                Ok(())
            }
            Action::AddAttachmentToCard(attachment) => {
                let name = match strip_published_marker(&attachment.name) {
                    Ok(name) => name,
                    Err(SyncError::NotPublished { name }) => {
                        info!("Ignoring unpublished attachment {} ({})", attachment.id, name);
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                };
                let current = self.details().require_one(&attachment.card_id).await?;
                let published = crate::actions::NewAttachment {
                    name,
                    ..attachment.clone()
                };
                self.details()
                    .replace_one(&action_add_attachment_to_card(&current, &published))
                    .await
            }
            Action::DeleteAttachmentFromCard(remove) => {
                let current = self.details().require_one(&remove.card_id).await?;
                self.details()
                    .replace_one(&action_delete_attachment_from_card(&current, remove))
                    .await
            }
            Action::CreateLabel(label) => self.tags().create_one(&action_create_label(label)).await,
            Action::DeleteLabel(label) => {
                if !self.tags().delete_one(&label.label_id).await? {
                    warn!("Deleted label {} was not stored", label.label_id);
                }
                Ok(())
            }
            Action::UpdateLabel(change) => {
                let current = self.tags().require_one(&change.id).await?;
                self.tags().replace_one(&action_update_label(&current, change)).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{CardRef, LabelRef, NewAttachment, Rename};
    use crate::storage::InMemoryStore;

    fn dispatcher() -> (ActionDispatcher, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (ActionDispatcher::new(store.clone()), store)
    }

    #[tokio::test]
    async fn rename_of_missing_card_is_not_found() {
        let (dispatcher, _) = dispatcher();
        let err = dispatcher
            .handle(&Action::UpdateCard(CardUpdate::Name(Rename {
                card_id: "ghost".into(),
                name: "x".into(),
            })))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::DocumentNotFound { ref id, .. } if id == "ghost"));
    }

    #[tokio::test]
    async fn unpublished_attachment_is_not_stored() {
        let (dispatcher, store) = dispatcher();
        let details = Collection::<RecipeDetails>::new(&*store);
        details
            .create_one(&RecipeDetails {
                id: "c1".into(),
                desc: String::new(),
                images: vec![],
            })
            .await
            .unwrap();

        dispatcher
            .handle(&Action::AddAttachmentToCard(NewAttachment {
                card_id: "c1".into(),
                id: "a1".into(),
                name: "draft photo".into(),
                url: "https://example.com/a1.png".into(),
                edge_color: None,
            }))
            .await
            .unwrap();

        assert!(details.require_one("c1").await.unwrap().images.is_empty());
    }

    #[tokio::test]
    async fn deleting_absent_documents_succeeds() {
        let (dispatcher, _) = dispatcher();
        dispatcher
            .handle(&Action::DeleteCard(CardRef { card_id: "none".into() }))
            .await
            .unwrap();
        dispatcher
            .handle(&Action::DeleteLabel(LabelRef { label_id: "none".into() }))
            .await
            .unwrap();
    }
}
