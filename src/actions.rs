//! Webhook actions sent by the board.
//!
//! The board posts `{ "action": { "type": ..., "data": ..., "display": ... } }`.
//! `type` picks the variant; for `updateCard` the `display.translationKey`
//! says which field changed. Anything outside the known set is rejected with
//! [`SyncError::UnhandledAction`].

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, SyncError};
use crate::schema::trello::Label;

pub const UPDATE_CARD: &str = "updateCard";
pub const REMOVE_LABEL_FROM_CARD: &str = "removeLabelFromCard";
pub const ADD_LABEL_TO_CARD: &str = "addLabelToCard";
pub const CREATE_CARD: &str = "createCard";
pub const DELETE_CARD: &str = "deleteCard";
pub const ADD_ATTACHMENT_TO_CARD: &str = "addAttachmentToCard";
pub const DELETE_ATTACHMENT_FROM_CARD: &str = "deleteAttachmentFromCard";
pub const CREATE_LABEL: &str = "createLabel";
pub const DELETE_LABEL: &str = "deleteLabel";
pub const UPDATE_LABEL: &str = "updateLabel";

pub const RENAMED_CARD: &str = "action_renamed_card";
pub const CHANGED_DESCRIPTION: &str = "action_changed_description_of_card";
pub const MOVED_CARD: &str = "action_move_card_from_list_to_list";

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    UpdateCard(CardUpdate),
    AddLabelToCard(AddLabel),
    RemoveLabelFromCard(RemoveLabel),
    CreateCard(NewCard),
    DeleteCard(CardRef),
    AddAttachmentToCard(NewAttachment),
    DeleteAttachmentFromCard(RemoveAttachment),
    CreateLabel(LabelChange),
    DeleteLabel(LabelRef),
    UpdateLabel(LabelChange),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CardUpdate {
    Name(Rename),
    Desc(ChangeDescription),
    List(MoveToList),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rename {
    pub card_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeDescription {
    pub card_id: String,
    pub desc: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveToList {
    pub card_id: String,
    pub id_list: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddLabel {
    pub card_id: String,
    pub label: Label,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoveLabel {
    pub card_id: String,
    pub label_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCard {
    pub id: String,
    pub name: String,
    pub short_link: String,
    pub id_list: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardRef {
    pub card_id: String,
}

/// An attachment as reported by the webhook. `name` is the raw name, marker
/// included.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttachment {
    pub card_id: String,
    pub id: String,
    pub name: String,
    pub url: String,
    pub edge_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoveAttachment {
    pub card_id: String,
    pub attachment_id: String,
}

/// Label fields carried by create/update label actions. Absent fields are
/// left untouched on update.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelChange {
    pub id: String,
    pub id_board: String,
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelRef {
    pub label_id: String,
}

impl Action {
    /// The board's name for this action kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::UpdateCard(_) => UPDATE_CARD,
            Action::AddLabelToCard(_) => ADD_LABEL_TO_CARD,
            Action::RemoveLabelFromCard(_) => REMOVE_LABEL_FROM_CARD,
            Action::CreateCard(_) => CREATE_CARD,
            Action::DeleteCard(_) => DELETE_CARD,
            Action::AddAttachmentToCard(_) => ADD_ATTACHMENT_TO_CARD,
            Action::DeleteAttachmentFromCard(_) => DELETE_ATTACHMENT_FROM_CARD,
            Action::CreateLabel(_) => CREATE_LABEL,
            Action::DeleteLabel(_) => DELETE_LABEL,
            Action::UpdateLabel(_) => UPDATE_LABEL,
        }
    }

    /// Parses the `action` object of a webhook body.
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawAction = serde_json::from_value(value).map_err(|e| SyncError::MalformedAction {
            kind: "unknown".into(),
            message: e.to_string(),
        })?;
        raw.try_into()
    }
}

#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    display: Option<Display>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Display {
    #[serde(default)]
    translation_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCard {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    id_list: Option<String>,
    #[serde(default)]
    short_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireLabel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAttachment {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    edge_color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardData {
    card: WireCard,
    #[serde(default)]
    list: Option<IdRef>,
    #[serde(default)]
    list_after: Option<IdRef>,
    #[serde(default)]
    board: Option<IdRef>,
    #[serde(default)]
    label: Option<WireLabel>,
    #[serde(default)]
    attachment: Option<WireAttachment>,
}

#[derive(Debug, Deserialize)]
struct LabelData {
    label: WireLabel,
    #[serde(default)]
    board: Option<IdRef>,
}

fn parse_data<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| SyncError::MalformedAction {
        kind: kind.to_string(),
        message: e.to_string(),
    })
}

fn require<T>(kind: &str, value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| SyncError::MalformedAction {
        kind: kind.to_string(),
        message: format!("missing field `{field}`"),
    })
}

fn board_id(board: Option<IdRef>) -> String {
    board.map(|b| b.id).unwrap_or_default()
}

impl TryFrom<RawAction> for Action {
    type Error = SyncError;

    fn try_from(raw: RawAction) -> Result<Self> {
        let kind = raw.kind.as_str();

        let action = match kind {
            UPDATE_CARD => {
                let key = raw.display.and_then(|d| d.translation_key).unwrap_or_default();
                let data: CardData = parse_data(kind, raw.data)?;
                let card_id = data.card.id;

                let update = match key.as_str() {
                    RENAMED_CARD => CardUpdate::Name(Rename {
                        card_id,
                        name: require(kind, data.card.name, "data.card.name")?,
                    }),
                    CHANGED_DESCRIPTION => CardUpdate::Desc(ChangeDescription {
                        card_id,
                        desc: data.card.desc.unwrap_or_default(),
                    }),
                    MOVED_CARD => CardUpdate::List(MoveToList {
                        card_id,
                        id_list: require(
                            kind,
                            data.card.id_list.or(data.list_after.map(|l| l.id)),
                            "data.card.idList",
                        )?,
                    }),
                    other => return Err(SyncError::UnhandledAction(format!("{UPDATE_CARD} ({other})"))),
                };
                Action::UpdateCard(update)
            }
            ADD_LABEL_TO_CARD => {
                let data: CardData = parse_data(kind, raw.data)?;
                let label = require(kind, data.label, "data.label")?;
                Action::AddLabelToCard(AddLabel {
                    card_id: data.card.id,
                    label: Label {
                        id: label.id,
                        id_board: board_id(data.board),
                        name: label.name.unwrap_or_default(),
                        color: label.color,
                    },
                })
            }
            REMOVE_LABEL_FROM_CARD => {
                let data: CardData = parse_data(kind, raw.data)?;
                Action::RemoveLabelFromCard(RemoveLabel {
                    card_id: data.card.id,
                    label_id: require(kind, data.label, "data.label")?.id,
                })
            }
            CREATE_CARD => {
                let data: CardData = parse_data(kind, raw.data)?;
                let id_list = data.card.id_list.or(data.list.map(|l| l.id));
                Action::CreateCard(NewCard {
                    id: data.card.id,
                    name: data.card.name.unwrap_or_default(),
                    short_link: data.card.short_link.unwrap_or_default(),
                    id_list,
                })
            }
            DELETE_CARD => {
                let data: CardData = parse_data(kind, raw.data)?;
                Action::DeleteCard(CardRef { card_id: data.card.id })
            }
            ADD_ATTACHMENT_TO_CARD => {
                let data: CardData = parse_data(kind, raw.data)?;
                let attachment = require(kind, data.attachment, "data.attachment")?;
                Action::AddAttachmentToCard(NewAttachment {
                    card_id: data.card.id,
                    id: attachment.id,
                    name: require(kind, attachment.name, "data.attachment.name")?,
                    url: attachment.url.unwrap_or_default(),
                    edge_color: attachment.edge_color,
                })
            }
            DELETE_ATTACHMENT_FROM_CARD => {
                let data: CardData = parse_data(kind, raw.data)?;
                Action::DeleteAttachmentFromCard(RemoveAttachment {
                    card_id: data.card.id,
                    attachment_id: require(kind, data.attachment, "data.attachment")?.id,
                })
            }
            CREATE_LABEL | UPDATE_LABEL => {
                let data: LabelData = parse_data(kind, raw.data)?;
                let change = LabelChange {
                    id: data.label.id,
                    id_board: board_id(data.board),
                    name: data.label.name,
                    color: data.label.color,
                };
                if kind == CREATE_LABEL {
                    Action::CreateLabel(change)
                } else {
                    Action::UpdateLabel(change)
                }
            }
            DELETE_LABEL => {
                let data: LabelData = parse_data(kind, raw.data)?;
                Action::DeleteLabel(LabelRef { label_id: data.label.id })
            }
            other => return Err(SyncError::UnhandledAction(other.to_string())),
        };

        Ok(action)
    }
}
