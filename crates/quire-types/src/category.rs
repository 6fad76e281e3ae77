use serde::{Deserialize, Serialize};

use crate::id::{new_id, IdType};

/// Whether a category was created by the user or by the system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    #[default]
    Custom,
    System,
}

/// A named, orderable, collapsible grouping of boards for one user in one team.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub team_id: String,
    #[serde(default)]
    pub create_at: i64,
    #[serde(default)]
    pub update_at: i64,
    #[serde(default)]
    pub delete_at: i64,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default, rename = "type")]
    pub kind: CategoryKind,
}

impl Category {
    /// A new custom category with a generated id.
    pub fn new(
        name: impl Into<String>,
        user_id: impl Into<String>,
        team_id: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(IdType::Category),
            name: name.into(),
            user_id: user_id.into(),
            team_id: team_id.into(),
            create_at: 0,
            update_at: 0,
            delete_at: 0,
            collapsed: false,
            sort_order: 0,
            kind: CategoryKind::Custom,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.delete_at != 0
    }
}

/// A category together with the boards currently assigned to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBoards {
    #[serde(flatten)]
    pub category: Category,
    pub board_ids: Vec<String>,
}
