//! Pure mappings from board documents to stored documents, and the reducers
//! that apply one webhook action to a stored document.
//!
//! Nothing here performs I/O. Reducers take the current document by reference
//! and return a new one, touching only the fields their action concerns.

use crate::actions::{
    AddLabel, ChangeDescription, LabelChange, MoveToList, NewAttachment, NewCard, RemoveAttachment, RemoveLabel,
    Rename,
};
use crate::error::{Result, SyncError};
use crate::schema::data::{Image, RecipeCard, RecipeDetails, ScaledImage, Tag};
use crate::schema::trello::{Attachment, AttachmentPreview, Card, CardDetails, Label};

/// First `]`-separated segment of a published attachment name.
pub const PUBLISHED_SEGMENT: &str = "[published";

pub fn build_tag(label: &Label) -> Tag {
    Tag {
        id: label.id.clone(),
        id_board: label.id_board.clone(),
        name: label.name.clone(),
        color: label.color.clone(),
    }
}

fn build_scaled(preview: &AttachmentPreview) -> ScaledImage {
    ScaledImage {
        url: preview.url.clone(),
        height: preview.height,
        width: preview.width,
    }
}

/// Copies an attachment into an [`Image`]. Publication is not checked here.
pub fn build_image(attachment: &Attachment) -> Image {
    Image {
        id: attachment.id.clone(),
        edge_color: attachment.edge_color.clone(),
        url: attachment.url.clone(),
        name: attachment.name.clone(),
        scaled: attachment.previews.iter().map(build_scaled).collect(),
    }
}

impl From<Attachment> for Image {
    fn from(attachment: Attachment) -> Self {
        build_image(&attachment)
    }
}

/// Builds the summary document for a card. `cover` may already be an
/// [`Image`] (kept as-is) or an [`Attachment`] (translated).
pub fn build_recipe_card<I: Into<Image>>(card: &Card, cover: Option<I>) -> RecipeCard {
    RecipeCard {
        id: card.id.clone(),
        name: card.name.clone(),
        short_link: card.short_link.clone(),
        id_list: card.id_list.clone(),
        tags: card.labels.iter().map(build_tag).collect(),
        cover: cover.map(Into::into),
    }
}

pub fn build_recipe_details(details: &CardDetails, attachments: &[Attachment]) -> RecipeDetails {
    RecipeDetails {
        id: details.id.clone(),
        desc: details.desc.clone(),
        images: attachments.iter().map(build_image).collect(),
    }
}

/// Returns the display name of a published attachment name, or
/// [`SyncError::NotPublished`].
pub fn strip_published_marker(name: &str) -> Result<String> {
    let mut segments = name.split(']');
    match segments.next() {
        Some(PUBLISHED_SEGMENT) => Ok(segments.collect::<Vec<_>>().join("]")),
        _ => Err(SyncError::NotPublished { name: name.to_string() }),
    }
}

/// Guards an attachment on its publication marker, returning a copy whose
/// name has the marker removed.
pub fn check_published(attachment: &Attachment) -> Result<Attachment> {
    let name = strip_published_marker(&attachment.name)?;
    Ok(Attachment {
        name,
        ..attachment.clone()
    })
}

pub fn action_update_card_name(current: &RecipeCard, action: &Rename) -> RecipeCard {
    RecipeCard {
        name: action.name.clone(),
        ..current.clone()
    }
}

pub fn action_update_card_desc(current: &RecipeDetails, action: &ChangeDescription) -> RecipeDetails {
    RecipeDetails {
        desc: action.desc.clone(),
        ..current.clone()
    }
}

pub fn action_update_card_list(current: &RecipeCard, action: &MoveToList) -> RecipeCard {
    RecipeCard {
        id_list: action.id_list.clone(),
        ..current.clone()
    }
}

/// Appends the label as a tag. No dedupe: the board does not send an add for
/// a label already on the card.
pub fn action_add_label_to_card(current: &RecipeCard, action: &AddLabel) -> RecipeCard {
    let mut tags = current.tags.clone();
    tags.push(build_tag(&action.label));
    RecipeCard {
        tags,
        ..current.clone()
    }
}

pub fn action_remove_label_from_card(current: &RecipeCard, action: &RemoveLabel) -> RecipeCard {
    RecipeCard {
        tags: current
            .tags
            .iter()
            .filter(|t| t.id != action.label_id)
            .cloned()
            .collect(),
        ..current.clone()
    }
}

/// A fresh card and its paired, empty details.
pub fn action_create_card(action: &NewCard) -> (RecipeCard, RecipeDetails) {
    let card = RecipeCard {
        id: action.id.clone(),
        name: action.name.clone(),
        short_link: action.short_link.clone(),
        id_list: action.id_list.clone().unwrap_or_default(),
        tags: Vec::new(),
        cover: None,
    };
    let details = RecipeDetails {
        id: action.id.clone(),
        desc: String::new(),
        images: Vec::new(),
    };
    (card, details)
}

/// Appends the attachment as an image. `action.name` must already be the
/// display name (see [`strip_published_marker`]).
pub fn action_add_attachment_to_card(current: &RecipeDetails, action: &NewAttachment) -> RecipeDetails {
    let mut images = current.images.clone();
    images.push(Image {
        id: action.id.clone(),
        edge_color: action.edge_color.clone(),
        url: action.url.clone(),
        name: action.name.clone(),
        scaled: Vec::new(),
    });
    RecipeDetails {
        images,
        ..current.clone()
    }
}

pub fn action_delete_attachment_from_card(current: &RecipeDetails, action: &RemoveAttachment) -> RecipeDetails {
    RecipeDetails {
        images: current
            .images
            .iter()
            .filter(|img| img.id != action.attachment_id)
            .cloned()
            .collect(),
        ..current.clone()
    }
}

pub fn action_create_label(action: &LabelChange) -> Tag {
    Tag {
        id: action.id.clone(),
        id_board: action.id_board.clone(),
        name: action.name.clone().unwrap_or_default(),
        color: action.color.clone(),
    }
}

pub fn action_update_label(current: &Tag, action: &LabelChange) -> Tag {
    Tag {
        name: action.name.clone().unwrap_or_else(|| current.name.clone()),
        color: action.color.clone().or_else(|| current.color.clone()),
        ..current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(id: &str, name: &str) -> Label {
        Label {
            id: id.into(),
            id_board: "board".into(),
            name: name.into(),
            color: Some("green".into()),
        }
    }

    fn attachment(id: &str, name: &str) -> Attachment {
        Attachment {
            id: id.into(),
            edge_color: Some("#fff".into()),
            url: format!("https://example.com/{id}.png"),
            name: name.into(),
            previews: vec![AttachmentPreview {
                url: format!("https://example.com/{id}-small.png"),
                height: 10,
                width: 10,
            }],
        }
    }

    fn card() -> Card {
        Card {
            id: "card".into(),
            name: "Pancakes".into(),
            short_link: "pk".into(),
            id_list: "list".into(),
            labels: vec![label("l1", "breakfast"), label("l2", "published")],
            id_attachment_cover: Some("a1".into()),
        }
    }

    fn recipe() -> RecipeCard {
        build_recipe_card(&card(), None::<Image>)
    }

    fn details() -> RecipeDetails {
        RecipeDetails {
            id: "card".into(),
            desc: "old".into(),
            images: vec![build_image(&attachment("img1", "one")), build_image(&attachment("img2", "two"))],
        }
    }

    #[test]
    fn build_tag_copies_every_field() {
        let tag = build_tag(&label("a label", "a name"));
        assert_eq!(tag.id, "a label");
        assert_eq!(tag.name, "a name");
        assert_eq!(tag.id_board, "board");
        assert_eq!(tag.color.as_deref(), Some("green"));
    }

    #[test]
    fn build_image_renames_previews_to_scaled() {
        let source = attachment("a1", "[published]x");
        let image = build_image(&source);
        assert_eq!(image.scaled.len(), 1);
        assert_eq!(image.scaled[0].url, source.previews[0].url);
        assert_eq!(image.id, source.id);
        assert_eq!(image.url, source.url);
        assert_eq!(image.edge_color, source.edge_color);
        // no filtering here
        assert_eq!(image.name, "[published]x");
    }

    #[test]
    fn build_recipe_card_accepts_attachment_or_image_cover() {
        let from_attachment = build_recipe_card(&card(), Some(attachment("a1", "cover")));
        assert_eq!(from_attachment.cover.as_ref().map(|c| c.id.as_str()), Some("a1"));

        let image = Image {
            scaled: vec![],
            ..build_image(&attachment("a2", "cover"))
        };
        let from_image = build_recipe_card(&card(), Some(image.clone()));
        assert_eq!(from_image.cover, Some(image));

        let without = build_recipe_card(&card(), None::<Attachment>);
        assert_eq!(without.cover, None);
        assert_eq!(without.id, "card");
        let tag_ids: Vec<_> = without.tags.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(tag_ids, ["l1", "l2"]);
    }

    #[test]
    fn build_recipe_details_keeps_attachment_order() {
        let out = build_recipe_details(
            &CardDetails {
                id: "card".into(),
                desc: "mix and fry".into(),
            },
            &[attachment("img1", "a"), attachment("img2", "b")],
        );
        assert_eq!(out.desc, "mix and fry");
        assert_eq!(out.images[0].id, "img1");
        assert_eq!(out.images[1].id, "img2");
    }

    #[test]
    fn published_marker_is_stripped() {
        assert_eq!(strip_published_marker("[published]a name").unwrap(), "a name");
        assert_eq!(strip_published_marker("[published]a]b").unwrap(), "a]b");
        assert_eq!(strip_published_marker("[published]").unwrap(), "");
    }

    #[test]
    fn unpublished_names_are_rejected() {
        for name in ["not published", "published]x", "[Published]x", "[published x", ""] {
            let err = strip_published_marker(name).unwrap_err();
            assert!(matches!(err, SyncError::NotPublished { .. }), "{name}");
        }
    }

    #[test]
    fn check_published_keeps_other_fields() {
        let source = attachment("a1", "[published]cover");
        let checked = check_published(&source).unwrap();
        assert_eq!(checked.name, "cover");
        assert_eq!(checked.previews, source.previews);
        assert_eq!(source.name, "[published]cover");
    }

    #[test]
    fn rename_touches_only_name() {
        let old = recipe();
        let new = action_update_card_name(
            &old,
            &Rename {
                card_id: "card".into(),
                name: "new name".into(),
            },
        );
        assert_eq!(new.name, "new name");
        assert_eq!(RecipeCard { name: old.name.clone(), ..new }, old);
    }

    #[test]
    fn desc_and_list_updates() {
        let d = action_update_card_desc(
            &details(),
            &ChangeDescription {
                card_id: "card".into(),
                desc: "new".into(),
            },
        );
        assert_eq!(d.desc, "new");
        assert_eq!(d.images, details().images);

        let c = action_update_card_list(
            &recipe(),
            &MoveToList {
                card_id: "card".into(),
                id_list: "new".into(),
            },
        );
        assert_eq!(c.id_list, "new");
        assert_eq!(c.tags, recipe().tags);
    }

    #[test]
    fn add_label_appends() {
        let old = recipe();
        let new = action_add_label_to_card(
            &old,
            &AddLabel {
                card_id: "card".into(),
                label: label("l3", "quick"),
            },
        );
        let mut expected = old.tags.clone();
        expected.push(build_tag(&label("l3", "quick")));
        assert_eq!(new.tags, expected);
        assert_eq!(RecipeCard { tags: old.tags.clone(), ..new }, old);
    }

    #[test]
    fn remove_label_filters_by_id() {
        let new = action_remove_label_from_card(
            &recipe(),
            &RemoveLabel {
                card_id: "card".into(),
                label_id: "l1".into(),
            },
        );
        assert!(new.tags.iter().all(|t| t.id != "l1"));
        assert_eq!(new.tags.len(), 1);
    }

    #[test]
    fn removing_absent_label_is_identity() {
        let old = recipe();
        let new = action_remove_label_from_card(
            &old,
            &RemoveLabel {
                card_id: "card".into(),
                label_id: "missing".into(),
            },
        );
        assert_eq!(new, old);
    }

    #[test]
    fn create_card_pairs_empty_details() {
        let (card, details) = action_create_card(&NewCard {
            id: "new card".into(),
            name: "name".into(),
            short_link: "link".into(),
            id_list: None,
        });
        assert_eq!(
            card,
            RecipeCard {
                id: "new card".into(),
                name: "name".into(),
                short_link: "link".into(),
                id_list: String::new(),
                tags: vec![],
                cover: None,
            }
        );
        assert_eq!(
            details,
            RecipeDetails {
                id: "new card".into(),
                desc: String::new(),
                images: vec![],
            }
        );
    }

    #[test]
    fn attachments_add_and_delete() {
        let added = action_add_attachment_to_card(
            &details(),
            &NewAttachment {
                card_id: "card".into(),
                id: "new".into(),
                name: "fresh".into(),
                url: "https://example.com/new.png".into(),
                edge_color: None,
            },
        );
        assert_eq!(added.images.last().map(|i| i.id.as_str()), Some("new"));
        assert_eq!(added.images.len(), 3);

        let removed = action_delete_attachment_from_card(
            &details(),
            &RemoveAttachment {
                card_id: "card".into(),
                attachment_id: "img1".into(),
            },
        );
        assert!(removed.images.iter().all(|i| i.id != "img1"));

        let untouched = action_delete_attachment_from_card(
            &details(),
            &RemoveAttachment {
                card_id: "card".into(),
                attachment_id: "img9".into(),
            },
        );
        assert_eq!(untouched, details());
    }

    #[test]
    fn labels_create_and_update() {
        let created = action_create_label(&LabelChange {
            id: "new label".into(),
            id_board: "board".into(),
            name: Some("name".into()),
            color: None,
        });
        assert_eq!(
            created,
            Tag {
                id: "new label".into(),
                id_board: "board".into(),
                name: "name".into(),
                color: None,
            }
        );

        let renamed = action_update_label(
            &build_tag(&label("id", "old name")),
            &LabelChange {
                id: "id".into(),
                id_board: "board".into(),
                name: Some("new name".into()),
                color: None,
            },
        );
        assert_eq!(renamed.name, "new name");
        assert_eq!(renamed.color.as_deref(), Some("green"));

        let recolored = action_update_label(
            &build_tag(&label("id", "old name")),
            &LabelChange {
                id: "id".into(),
                id_board: "board".into(),
                name: None,
                color: Some("red".into()),
            },
        );
        assert_eq!(recolored.name, "old name");
        assert_eq!(recolored.color.as_deref(), Some("red"));
    }
}
