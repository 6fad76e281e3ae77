use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use quire_types::{new_id, Category, CategoryBoards, IdType, TypeError};

use super::{CategoryAssignment, StoreState};
use crate::error::{StoreError, StoreResult};

fn validate_category(category: &Category) -> StoreResult<()> {
    if category.name.is_empty() {
        return Err(TypeError::MissingField("name").into());
    }
    if category.user_id.is_empty() {
        return Err(TypeError::MissingField("user_id").into());
    }
    if category.team_id.is_empty() {
        return Err(TypeError::MissingField("team_id").into());
    }
    Ok(())
}

/// `true` when `ordered` names every element of `expected` exactly once.
fn is_permutation(ordered: &[String], expected: &BTreeSet<&str>) -> bool {
    let given: BTreeSet<&str> = ordered.iter().map(String::as_str).collect();
    given.len() == ordered.len() && given == *expected
}

impl StoreState {
    /// A live category owned by `user_id`.
    fn owned_category(&self, category_id: &str, user_id: &str) -> StoreResult<&Category> {
        let category = self
            .categories
            .get(category_id)
            .filter(|c| !c.is_deleted())
            .ok_or_else(|| StoreError::not_found("category", category_id))?;
        if category.user_id != user_id {
            return Err(StoreError::InvalidArgument(format!(
                "category {category_id} belongs to another user"
            )));
        }
        Ok(category)
    }

    pub(super) fn create_category(&mut self, mut category: Category) -> StoreResult<Category> {
        validate_category(&category)?;
        if category.id.is_empty() {
            category.id = new_id(IdType::Category);
        }
        if self.categories.contains_key(&category.id) {
            return Err(StoreError::InvalidArgument(format!(
                "category {} already exists",
                category.id
            )));
        }

        let now = self.clock.tick();
        category.create_at = now;
        category.update_at = now;
        category.delete_at = 0;

        debug!(category_id = %category.id, user_id = %category.user_id, "category created");
        self.categories.insert(category.id.clone(), category.clone());
        Ok(category)
    }

    pub(super) fn update_category(&mut self, category: Category) -> StoreResult<Category> {
        validate_category(&category)?;
        let existing = self.owned_category(&category.id, &category.user_id)?;
        if existing.team_id != category.team_id {
            return Err(StoreError::InvalidArgument(format!(
                "category {} belongs to another team",
                category.id
            )));
        }

        let updated = Category {
            create_at: existing.create_at,
            update_at: self.clock.tick(),
            delete_at: 0,
            ..category
        };
        debug!(category_id = %updated.id, "category updated");
        self.categories.insert(updated.id.clone(), updated.clone());
        Ok(updated)
    }

    /// Soft-delete a category. Boards assigned to it become uncategorized.
    pub(super) fn delete_category(
        &mut self,
        category_id: &str,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<()> {
        let category = self
            .categories
            .get(category_id)
            .ok_or_else(|| StoreError::not_found("category", category_id))?;
        if category.user_id != user_id || category.team_id != team_id {
            return Err(StoreError::InvalidArgument(format!(
                "category {category_id} belongs to another user or team"
            )));
        }
        if category.is_deleted() {
            return Ok(());
        }

        let now = self.clock.tick();
        if let Some(category) = self.categories.get_mut(category_id) {
            category.delete_at = now;
            category.update_at = now;
        }
        self.category_boards
            .retain(|_, assignment| assignment.category_id != category_id);
        debug!(category_id, "category deleted");
        Ok(())
    }

    /// Live categories of a user in a team, by sort order then age.
    pub(super) fn user_categories(&self, user_id: &str, team_id: &str) -> Vec<Category> {
        let mut categories: Vec<Category> = self
            .categories
            .values()
            .filter(|c| c.user_id == user_id && c.team_id == team_id && !c.is_deleted())
            .cloned()
            .collect();
        categories.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then(a.create_at.cmp(&b.create_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        categories
    }

    /// `(sort_order, board_id)` of every board a user placed in a category.
    fn assigned_boards(&self, user_id: &str, category_id: &str) -> Vec<(i64, String)> {
        let mut boards: Vec<(i64, String)> = self
            .category_boards
            .range((user_id.to_string(), String::new())..)
            .take_while(|((user, _), _)| user == user_id)
            .filter(|(_, a)| a.category_id == category_id)
            .map(|((_, board_id), a)| (a.sort_order, board_id.clone()))
            .collect();
        boards.sort();
        boards
    }

    pub(super) fn user_category_boards(&self, user_id: &str, team_id: &str) -> Vec<CategoryBoards> {
        self.user_categories(user_id, team_id)
            .into_iter()
            .map(|category| {
                let board_ids = self
                    .assigned_boards(user_id, &category.id)
                    .into_iter()
                    .map(|(_, board_id)| board_id)
                    .collect();
                CategoryBoards {
                    category,
                    board_ids,
                }
            })
            .collect()
    }

    /// Place boards into categories. A board already in another category of
    /// the same user moves; it never appears in two.
    pub(super) fn assign_category_boards(
        &mut self,
        user_id: &str,
        assignments: &BTreeMap<String, String>,
    ) -> StoreResult<()> {
        for category_id in assignments.values() {
            self.owned_category(category_id, user_id)?;
        }

        for (board_id, category_id) in assignments {
            let key = (user_id.to_string(), board_id.clone());
            if self
                .category_boards
                .get(&key)
                .is_some_and(|a| &a.category_id == category_id)
            {
                continue;
            }
            let sort_order = self
                .assigned_boards(user_id, category_id)
                .last()
                .map_or(0, |(order, _)| order + 1);
            self.category_boards.insert(
                key,
                CategoryAssignment {
                    category_id: category_id.clone(),
                    sort_order,
                },
            );
            debug!(user_id, board_id = %board_id, category_id = %category_id, "board categorized");
        }
        Ok(())
    }

    pub(super) fn reorder_categories(
        &mut self,
        user_id: &str,
        team_id: &str,
        category_ids: &[String],
    ) -> StoreResult<Vec<String>> {
        let current = self.user_categories(user_id, team_id);
        let expected: BTreeSet<&str> = current.iter().map(|c| c.id.as_str()).collect();
        if !is_permutation(category_ids, &expected) {
            return Err(StoreError::InvalidArgument(
                "category order must list every category of the user exactly once".into(),
            ));
        }

        let now = self.clock.tick();
        for (position, id) in category_ids.iter().enumerate() {
            if let Some(category) = self.categories.get_mut(id) {
                category.sort_order = position as i64;
                category.update_at = now;
            }
        }
        debug!(user_id, team_id, count = category_ids.len(), "categories reordered");
        Ok(category_ids.to_vec())
    }

    pub(super) fn reorder_category_boards(
        &mut self,
        user_id: &str,
        category_id: &str,
        board_ids: &[String],
    ) -> StoreResult<Vec<String>> {
        self.owned_category(category_id, user_id)?;
        let assigned = self.assigned_boards(user_id, category_id);
        let expected: BTreeSet<&str> = assigned.iter().map(|(_, b)| b.as_str()).collect();
        if !is_permutation(board_ids, &expected) {
            return Err(StoreError::InvalidArgument(format!(
                "board order must list every board of category {category_id} exactly once"
            )));
        }

        for (position, board_id) in board_ids.iter().enumerate() {
            let key = (user_id.to_string(), board_id.clone());
            if let Some(assignment) = self.category_boards.get_mut(&key) {
                assignment.sort_order = position as i64;
            }
        }
        debug!(user_id, category_id, count = board_ids.len(), "category boards reordered");
        Ok(board_ids.to_vec())
    }
}
