use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use quire_types::{
    Block, Board, BoardMember, BoardsAndBlocks, DeleteBoardsAndBlocks, TypeError, FIELD_TEAM_ID,
};

use super::StoreState;
use crate::error::{StoreError, StoreResult};

/// Encode and validate a board as its root block.
pub(super) fn board_block(board: Board, max_title_len: usize) -> StoreResult<Block> {
    if board.team_id.is_empty() {
        return Err(TypeError::MissingField("team_id").into());
    }
    let block = board.into_block();
    block.validate(max_title_len)?;
    Ok(block)
}

/// A bulk-creation payload that passed validation.
pub(super) struct StagedPayload {
    boards: Vec<Block>,
    blocks: Vec<Block>,
    admins: Vec<BoardMember>,
}

/// Validate every board and block of a payload before anything is written.
/// With `admin` set, the membership rows granting it each board are
/// validated here too.
pub(super) fn stage_payload(
    payload: BoardsAndBlocks,
    admin: Option<&str>,
    max_title_len: usize,
) -> StoreResult<StagedPayload> {
    let boards = payload
        .boards
        .into_iter()
        .map(|b| board_block(b, max_title_len))
        .collect::<StoreResult<Vec<_>>>()?;
    for block in &payload.blocks {
        block.validate(max_title_len)?;
    }
    let admins = match admin {
        Some(user_id) => boards
            .iter()
            .map(|b| {
                let member = BoardMember::admin(&b.id, user_id);
                validate_member(&member)?;
                Ok(member)
            })
            .collect::<StoreResult<Vec<_>>>()?,
        None => Vec::new(),
    };
    Ok(StagedPayload {
        boards,
        blocks: payload.blocks,
        admins,
    })
}

fn validate_member(member: &BoardMember) -> StoreResult<()> {
    if member.board_id.is_empty() {
        return Err(TypeError::MissingField("board_id").into());
    }
    if member.user_id.is_empty() {
        return Err(TypeError::MissingField("user_id").into());
    }
    Ok(())
}

impl StoreState {
    pub(super) fn board(&self, board_id: &str) -> StoreResult<Board> {
        let block = self
            .live_board_block(board_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("board", board_id))?;
        Ok(Board::try_from(block)?)
    }

    pub(super) fn boards_for_team(&self, team_id: &str) -> StoreResult<Vec<Board>> {
        let mut boards = self
            .history
            .current_rows()
            .filter(|b| b.board_id == b.id && self.live_board_block(&b.id).is_some())
            .filter(|b| {
                matches!(b.fields.get(FIELD_TEAM_ID), Some(Value::String(t)) if t == team_id)
            })
            .map(|b| Board::try_from(b.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        boards.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        Ok(boards)
    }

    /// Soft-delete a board and all of its live blocks. Missing or already
    /// deleted boards are left alone.
    pub(super) fn delete_board(&mut self, board_id: &str, modified_by: &str) -> StoreResult<()> {
        if self.live_board_block(board_id).is_none() {
            return Ok(());
        }
        let mut deleted = 0usize;
        for id in self.board_block_ids(board_id) {
            if id != board_id && self.history.live(&id).is_some() {
                self.delete_block(&id, modified_by)?;
                deleted += 1;
            }
        }
        self.delete_block(board_id, modified_by)?;
        debug!(board_id, blocks = deleted, "board deleted");
        Ok(())
    }

    pub(super) fn save_member(&mut self, member: BoardMember) -> StoreResult<BoardMember> {
        validate_member(&member)?;
        Ok(self.insert_member(member))
    }

    fn insert_member(&mut self, member: BoardMember) -> BoardMember {
        debug!(board_id = %member.board_id, user_id = %member.user_id, "member saved");
        self.members.insert(
            (member.board_id.clone(), member.user_id.clone()),
            member.clone(),
        );
        member
    }

    pub(super) fn members_for_board(&self, board_id: &str) -> Vec<BoardMember> {
        self.members
            .range((board_id.to_string(), String::new())..)
            .take_while(|((b, _), _)| b == board_id)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Write a staged payload. Admin rows are saved after the blocks and
    /// cannot fail, having been validated while staging.
    pub(super) fn create_boards_and_blocks(
        &mut self,
        staged: StagedPayload,
        user_id: &str,
    ) -> StoreResult<(BoardsAndBlocks, Vec<BoardMember>)> {
        let board_count = staged.boards.len();
        let mut rows = staged.boards;
        rows.extend(staged.blocks);

        let mut stored = self.insert_blocks(rows, user_id)?;
        let blocks = stored.split_off(board_count);
        let boards = stored
            .into_iter()
            .map(Board::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let members: Vec<BoardMember> = staged
            .admins
            .into_iter()
            .map(|m| self.insert_member(m))
            .collect();

        debug!(
            boards = boards.len(),
            blocks = blocks.len(),
            members = members.len(),
            "boards and blocks created"
        );
        Ok((BoardsAndBlocks { boards, blocks }, members))
    }

    pub(super) fn delete_boards_and_blocks(
        &mut self,
        payload: &DeleteBoardsAndBlocks,
        modified_by: &str,
    ) -> StoreResult<()> {
        if payload.boards.is_empty() {
            return Err(StoreError::InvalidArgument(
                "at least one board id is required".into(),
            ));
        }
        let boards: BTreeSet<&str> = payload.boards.iter().map(String::as_str).collect();
        for board_id in &boards {
            if self.live_board_block(board_id).is_none() {
                return Err(StoreError::not_found("board", *board_id));
            }
        }
        for block_id in &payload.blocks {
            let block = self
                .history
                .live(block_id)
                .ok_or_else(|| StoreError::not_found("block", block_id.as_str()))?;
            if !boards.contains(block.board_id.as_str()) {
                return Err(StoreError::InvalidArgument(format!(
                    "block {block_id} belongs to board {} which is not being deleted",
                    block.board_id
                )));
            }
        }

        for block_id in &payload.blocks {
            self.delete_block(block_id, modified_by)?;
        }
        for board_id in boards {
            self.delete_board(board_id, modified_by)?;
        }
        Ok(())
    }
}
