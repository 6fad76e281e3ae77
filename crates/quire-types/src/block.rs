use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;

/// Open-ended block payload. Key order is irrelevant.
pub type Fields = BTreeMap<String, Value>;

/// Maximum title length, in characters.
pub const MAX_TITLE_LEN: usize = 65_535;

/// The kind of content a block carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Board,
    View,
    Card,
    Text,
    Image,
    Divider,
    Checkbox,
    Comment,
    Attachment,
    #[serde(other)]
    Unknown,
}

impl BlockType {
    /// Content blocks live inside a card (text, images, checkboxes, ...).
    pub fn is_content(&self) -> bool {
        matches!(
            self,
            Self::Text | Self::Image | Self::Divider | Self::Checkbox | Self::Attachment
        )
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Board => "board",
            Self::View => "view",
            Self::Card => "card",
            Self::Text => "text",
            Self::Image => "image",
            Self::Divider => "divider",
            Self::Checkbox => "checkbox",
            Self::Comment => "comment",
            Self::Attachment => "attachment",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A node in a tree of documents.
///
/// `root_id` is the transitive root of the tree (equal to `id` for a root)
/// and `board_id` is the denormalized board the block belongs to. Lifecycle
/// stamps are milliseconds since the UNIX epoch; `delete_at == 0` means the
/// block is live.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    #[serde(default)]
    pub parent_id: String,
    pub root_id: String,
    #[serde(default)]
    pub board_id: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub modified_by: String,
    #[serde(default)]
    pub schema: i64,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default)]
    pub create_at: i64,
    #[serde(default)]
    pub update_at: i64,
    #[serde(default)]
    pub delete_at: i64,
}

impl Block {
    /// Create a live block with empty payload and zero stamps.
    pub fn new(
        id: impl Into<String>,
        block_type: BlockType,
        parent_id: impl Into<String>,
        root_id: impl Into<String>,
        board_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            root_id: root_id.into(),
            board_id: board_id.into(),
            created_by: String::new(),
            modified_by: String::new(),
            schema: 1,
            block_type,
            title: String::new(),
            fields: Fields::new(),
            create_at: 0,
            update_at: 0,
            delete_at: 0,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.delete_at != 0
    }

    pub fn is_root(&self) -> bool {
        self.root_id == self.id
    }

    /// Structural validation performed before any write.
    pub fn validate(&self, max_title_len: usize) -> Result<(), TypeError> {
        if self.id.is_empty() {
            return Err(TypeError::MissingField("id"));
        }
        if self.root_id.is_empty() {
            return Err(TypeError::MissingField("root_id"));
        }
        if self.board_id.is_empty() {
            return Err(TypeError::MissingField("board_id"));
        }
        let len = self.title.chars().count();
        if len > max_title_len {
            return Err(TypeError::TitleTooLong {
                len,
                max: max_title_len,
            });
        }
        serde_json::to_vec(&self.fields).map_err(|e| TypeError::InvalidFields(e.to_string()))?;
        Ok(())
    }
}

/// Partial update descriptor for a block.
///
/// Scalar attributes are replaced when set. `fields` is merged: keys in
/// `updated_fields` overwrite, keys in `deleted_fields` are removed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<i64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub block_type: Option<BlockType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub updated_fields: Fields,
    #[serde(default)]
    pub deleted_fields: Vec<String>,
}

impl BlockPatch {
    /// A patch that only replaces the title.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Reject malformed patches: empty keys, or a key both set and removed.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.updated_fields.keys().any(String::is_empty)
            || self.deleted_fields.iter().any(String::is_empty)
        {
            return Err(TypeError::InvalidPatch("field keys must not be empty".into()));
        }
        if let Some(key) = self
            .deleted_fields
            .iter()
            .find(|k| self.updated_fields.contains_key(k.as_str()))
        {
            return Err(TypeError::InvalidPatch(format!(
                "field '{key}' is both updated and deleted"
            )));
        }
        if let Some(parent_id) = &self.parent_id {
            if parent_id.is_empty() {
                return Err(TypeError::InvalidPatch("parent_id must not be empty".into()));
            }
        }
        Ok(())
    }

    /// Apply the patch to `block` in place. Stamps are left to the caller.
    pub fn apply(&self, block: &mut Block) {
        if let Some(parent_id) = &self.parent_id {
            block.parent_id = parent_id.clone();
        }
        if let Some(schema) = self.schema {
            block.schema = schema;
        }
        if let Some(block_type) = self.block_type {
            block.block_type = block_type;
        }
        if let Some(title) = &self.title {
            block.title = title.clone();
        }
        for (key, value) in &self.updated_fields {
            block.fields.insert(key.clone(), value.clone());
        }
        for key in &self.deleted_fields {
            block.fields.remove(key);
        }
    }
}

/// Patches applied to several blocks as one atomic unit.
///
/// `block_ids[i]` is patched with `block_patches[i]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPatchBatch {
    pub block_ids: Vec<String>,
    pub block_patches: Vec<BlockPatch>,
}

impl BlockPatchBatch {
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.block_ids.len() != self.block_patches.len() {
            return Err(TypeError::InvalidPatch(format!(
                "{} ids but {} patches",
                self.block_ids.len(),
                self.block_patches.len()
            )));
        }
        self.block_patches.iter().try_for_each(BlockPatch::validate)
    }
}

/// Options for history queries. `limit == 0` means unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBlockHistoryOptions {
    pub limit: u64,
    pub descending: bool,
}

impl QueryBlockHistoryOptions {
    /// Only the most recent entry.
    pub fn latest() -> Self {
        Self {
            limit: 1,
            descending: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn card() -> Block {
        Block::new("card1", BlockType::Card, "board1", "board1", "board1")
            .with_title("Card")
            .with_field("icon", "🎯")
            .with_field("properties", json!({ "status": "open" }))
    }

    #[test]
    fn valid_block_passes() {
        card().validate(MAX_TITLE_LEN).unwrap();
    }

    #[test]
    fn empty_root_id_is_rejected() {
        let mut block = card();
        block.root_id.clear();
        assert_eq!(
            block.validate(MAX_TITLE_LEN).unwrap_err(),
            TypeError::MissingField("root_id")
        );
    }

    #[test]
    fn empty_board_id_is_rejected() {
        let mut block = card();
        block.board_id.clear();
        assert_eq!(
            block.validate(MAX_TITLE_LEN).unwrap_err(),
            TypeError::MissingField("board_id")
        );
    }

    #[test]
    fn long_title_is_rejected() {
        let block = card().with_title("x".repeat(11));
        assert!(matches!(
            block.validate(10).unwrap_err(),
            TypeError::TitleTooLong { len: 11, max: 10 }
        ));
    }

    #[test]
    fn patch_merges_fields() {
        let mut block = card();
        let mut patch = BlockPatch::title("Renamed");
        patch.updated_fields.insert("icon".into(), json!("📌"));
        patch.updated_fields.insert("isDone".into(), json!(true));
        patch.deleted_fields.push("properties".into());

        patch.apply(&mut block);

        assert_eq!(block.title, "Renamed");
        assert_eq!(block.fields.get("icon"), Some(&json!("📌")));
        assert_eq!(block.fields.get("isDone"), Some(&json!(true)));
        assert!(!block.fields.contains_key("properties"));
        assert_eq!(block.block_type, BlockType::Card);
    }

    #[test]
    fn patch_replaces_type_and_parent() {
        let mut block = card();
        let patch = BlockPatch {
            parent_id: Some("other".into()),
            block_type: Some(BlockType::Text),
            ..Default::default()
        };
        patch.apply(&mut block);
        assert_eq!(block.parent_id, "other");
        assert_eq!(block.block_type, BlockType::Text);
    }

    #[test]
    fn patch_with_conflicting_keys_is_invalid() {
        let mut patch = BlockPatch::default();
        patch.updated_fields.insert("a".into(), json!(1));
        patch.deleted_fields.push("a".into());
        assert!(matches!(patch.validate(), Err(TypeError::InvalidPatch(_))));
    }

    #[test]
    fn patch_with_empty_key_is_invalid() {
        let patch = BlockPatch {
            deleted_fields: vec![String::new()],
            ..Default::default()
        };
        assert!(matches!(patch.validate(), Err(TypeError::InvalidPatch(_))));
    }

    #[test]
    fn batch_length_mismatch_is_invalid() {
        let batch = BlockPatchBatch {
            block_ids: vec!["a".into(), "b".into()],
            block_patches: vec![BlockPatch::title("x")],
        };
        assert!(batch.validate().is_err());
    }

    #[test]
    fn block_json_uses_wire_names() {
        let value = serde_json::to_value(card()).unwrap();
        assert_eq!(value["type"], "card");
        assert_eq!(value["rootId"], "board1");
        assert_eq!(value["boardId"], "board1");
        assert_eq!(value["deleteAt"], 0);
    }

    #[test]
    fn unknown_block_type_deserializes() {
        let block: Block = serde_json::from_value(json!({
            "id": "x",
            "rootId": "x",
            "type": "hologram"
        }))
        .unwrap();
        assert_eq!(block.block_type, BlockType::Unknown);
        assert!(block.fields.is_empty());
    }

    #[test]
    fn content_types() {
        assert!(BlockType::Text.is_content());
        assert!(!BlockType::Card.is_content());
        assert!(!BlockType::View.is_content());
    }

    proptest! {
        #[test]
        fn patch_never_touches_untouched_keys(
            keep in "[a-m]{1,6}",
            update in "[n-z]{1,6}",
            value in any::<i64>(),
        ) {
            let mut block = card().with_field(keep.clone(), "kept");
            let mut patch = BlockPatch::default();
            patch.updated_fields.insert(update.clone(), json!(value));
            patch.apply(&mut block);
            prop_assert_eq!(block.fields.get(&keep), Some(&json!("kept")));
            prop_assert_eq!(block.fields.get(&update), Some(&json!(value)));
        }
    }
}
