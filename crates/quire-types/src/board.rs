use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::block::{Block, BlockType, Fields};
use crate::error::TypeError;

/// Field key holding the owning team of a board block.
pub const FIELD_TEAM_ID: &str = "teamId";
/// Field key holding a board's description.
pub const FIELD_DESCRIPTION: &str = "description";
/// Field key marking a board as a template.
pub const FIELD_IS_TEMPLATE: &str = "isTemplate";
/// Field key naming the driver that owns a virtual board's content.
pub const FIELD_VIRTUAL_DRIVER: &str = "virtualDriver";

/// Minimum role assigned to members supplied by an external driver.
pub const ROLE_VIEWER: &str = "viewer";

/// A board: the typed view of a board-typed root block.
///
/// Boards are stored as blocks whose `id`, `root_id` and `board_id` are all
/// equal. Board attributes travel in the block's `fields` under the
/// `FIELD_*` keys; everything else in `fields` is exposed as `properties`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_template: bool,
    /// Empty for locally stored boards; otherwise the registered driver name.
    #[serde(default)]
    pub virtual_driver: String,
    #[serde(default)]
    pub properties: Fields,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub modified_by: String,
    #[serde(default)]
    pub create_at: i64,
    #[serde(default)]
    pub update_at: i64,
    #[serde(default)]
    pub delete_at: i64,
}

impl Board {
    pub fn new(
        id: impl Into<String>,
        team_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            team_id: team_id.into(),
            title: title.into(),
            description: String::new(),
            is_template: false,
            virtual_driver: String::new(),
            properties: Fields::new(),
            created_by: String::new(),
            modified_by: String::new(),
            create_at: 0,
            update_at: 0,
            delete_at: 0,
        }
    }

    pub fn with_virtual_driver(mut self, driver: impl Into<String>) -> Self {
        self.virtual_driver = driver.into();
        self
    }

    pub fn as_template(mut self) -> Self {
        self.is_template = true;
        self
    }

    pub fn is_virtual(&self) -> bool {
        !self.virtual_driver.is_empty()
    }

    pub fn is_deleted(&self) -> bool {
        self.delete_at != 0
    }

    /// Encode as the root block that stores this board.
    pub fn into_block(self) -> Block {
        let mut fields = self.properties;
        fields.insert(FIELD_TEAM_ID.into(), Value::from(self.team_id));
        if !self.description.is_empty() {
            fields.insert(FIELD_DESCRIPTION.into(), Value::from(self.description));
        }
        if self.is_template {
            fields.insert(FIELD_IS_TEMPLATE.into(), Value::Bool(true));
        }
        if !self.virtual_driver.is_empty() {
            fields.insert(FIELD_VIRTUAL_DRIVER.into(), Value::from(self.virtual_driver));
        }

        Block {
            parent_id: String::new(),
            root_id: self.id.clone(),
            board_id: self.id.clone(),
            id: self.id,
            created_by: self.created_by,
            modified_by: self.modified_by,
            schema: 1,
            block_type: BlockType::Board,
            title: self.title,
            fields,
            create_at: self.create_at,
            update_at: self.update_at,
            delete_at: self.delete_at,
        }
    }
}

/// `true` if a board block's fields mark it as a template.
pub(crate) fn fields_mark_template(fields: &Fields) -> bool {
    matches!(fields.get(FIELD_IS_TEMPLATE), Some(Value::Bool(true)))
}

impl Block {
    /// `true` for a board block flagged as a template.
    pub fn is_template_board(&self) -> bool {
        self.block_type == BlockType::Board && fields_mark_template(&self.fields)
    }
}

impl TryFrom<Block> for Board {
    type Error = TypeError;

    fn try_from(block: Block) -> Result<Self, Self::Error> {
        if block.block_type != BlockType::Board {
            return Err(TypeError::WrongBlockType {
                expected: BlockType::Board.to_string(),
                actual: block.block_type.to_string(),
            });
        }

        let mut properties = block.fields;
        let text = |v: Option<Value>| match v {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };
        let team_id = text(properties.remove(FIELD_TEAM_ID));
        let description = text(properties.remove(FIELD_DESCRIPTION));
        let virtual_driver = text(properties.remove(FIELD_VIRTUAL_DRIVER));
        let is_template = matches!(properties.remove(FIELD_IS_TEMPLATE), Some(Value::Bool(true)));

        Ok(Self {
            id: block.id,
            team_id,
            title: block.title,
            description,
            is_template,
            virtual_driver,
            properties,
            created_by: block.created_by,
            modified_by: block.modified_by,
            create_at: block.create_at,
            update_at: block.update_at,
            delete_at: block.delete_at,
        })
    }
}

/// A user's membership in a board.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardMember {
    pub board_id: String,
    pub user_id: String,
    #[serde(default)]
    pub roles: String,
    #[serde(default)]
    pub minimum_role: String,
    #[serde(default)]
    pub scheme_admin: bool,
    #[serde(default)]
    pub scheme_editor: bool,
    #[serde(default)]
    pub scheme_commenter: bool,
    #[serde(default)]
    pub scheme_viewer: bool,
    /// Set for rows that are computed rather than stored.
    #[serde(default)]
    pub synthetic: bool,
}

impl BoardMember {
    /// Full-rights membership granted to the creator of a board.
    pub fn admin(board_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            board_id: board_id.into(),
            user_id: user_id.into(),
            scheme_admin: true,
            scheme_editor: true,
            scheme_commenter: true,
            scheme_viewer: true,
            ..Default::default()
        }
    }

    pub fn viewer(board_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            board_id: board_id.into(),
            user_id: user_id.into(),
            minimum_role: ROLE_VIEWER.into(),
            scheme_viewer: true,
            ..Default::default()
        }
    }

    /// Reset role attributes to the read-only defaults applied to members
    /// reported by an external driver, whatever the driver claimed.
    pub fn normalized_for_driver(self) -> Self {
        Self {
            board_id: self.board_id,
            user_id: self.user_id,
            roles: String::new(),
            minimum_role: ROLE_VIEWER.into(),
            scheme_admin: false,
            scheme_editor: false,
            scheme_commenter: false,
            scheme_viewer: true,
            synthetic: self.synthetic,
        }
    }
}

/// Payload for bulk creation of boards and their blocks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardsAndBlocks {
    #[serde(default)]
    pub boards: Vec<Board>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

/// Payload for bulk soft-deletion of boards and blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBoardsAndBlocks {
    #[serde(default)]
    pub boards: Vec<String>,
    #[serde(default)]
    pub blocks: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn board_block_roundtrip_keeps_attributes() {
        let mut board = Board::new("b1", "team1", "Roadmap")
            .with_virtual_driver("playbooks")
            .as_template();
        board.description = "Quarterly plan".into();
        board.properties.insert("color".into(), json!("blue"));

        let block = board.clone().into_block();
        assert_eq!(block.block_type, BlockType::Board);
        assert_eq!(block.root_id, "b1");
        assert_eq!(block.board_id, "b1");
        assert_eq!(block.fields.get(FIELD_VIRTUAL_DRIVER), Some(&json!("playbooks")));
        assert!(block.is_template_board());

        let back = Board::try_from(block).unwrap();
        assert_eq!(back, board);
    }

    #[test]
    fn local_board_has_no_driver_field() {
        let block = Board::new("b1", "team1", "Local").into_block();
        assert!(!block.fields.contains_key(FIELD_VIRTUAL_DRIVER));
        assert!(!block.is_template_board());
        let board = Board::try_from(block).unwrap();
        assert!(!board.is_virtual());
    }

    #[test]
    fn non_board_block_is_rejected() {
        let block = Block::new("c1", BlockType::Card, "b1", "b1", "b1");
        let err = Board::try_from(block).unwrap_err();
        assert!(matches!(err, TypeError::WrongBlockType { .. }));
    }

    #[test]
    fn driver_members_are_normalized() {
        let reported = BoardMember {
            roles: "system_admin".into(),
            minimum_role: "admin".into(),
            scheme_admin: true,
            scheme_editor: true,
            ..BoardMember::admin("b1", "u1")
        };
        let normalized = reported.normalized_for_driver();
        assert_eq!(normalized.board_id, "b1");
        assert_eq!(normalized.user_id, "u1");
        assert_eq!(normalized.roles, "");
        assert_eq!(normalized.minimum_role, ROLE_VIEWER);
        assert!(normalized.scheme_viewer);
        assert!(!normalized.scheme_admin);
        assert!(!normalized.scheme_editor);
    }

    #[test]
    fn member_json_uses_wire_names() {
        let member: BoardMember = serde_json::from_value(json!({
            "boardId": "b1",
            "userId": "u1",
            "schemeAdmin": true
        }))
        .unwrap();
        assert!(member.scheme_admin);
        assert_eq!(member.minimum_role, "");
    }
}
