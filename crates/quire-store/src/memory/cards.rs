use quire_types::BlockType;

use super::StoreState;

impl StoreState {
    /// `update_at` of every counted card, most recent first.
    ///
    /// A card counts when it is live and its board is a live, non-template
    /// board.
    pub(super) fn counted_card_stamps(&self) -> Vec<i64> {
        let mut stamps: Vec<i64> = self
            .history
            .current_rows()
            .filter(|b| b.block_type == BlockType::Card && !b.is_deleted())
            .filter(|b| {
                self.live_board_block(&b.board_id)
                    .is_some_and(|board| !board.is_template_board())
            })
            .map(|b| b.update_at)
            .collect();
        stamps.sort_unstable_by(|a, b| b.cmp(a));
        stamps
    }

    pub(super) fn card_limit_timestamp(&self, card_limit: u64) -> i64 {
        let Some(rank) = card_limit.checked_sub(1) else {
            return 0;
        };
        let stamps = self.counted_card_stamps();
        usize::try_from(rank)
            .ok()
            .and_then(|i| stamps.get(i).copied())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use quire_types::{BlockType, Board};

    use super::super::fixtures::{block, board, card, USER};
    use super::super::InMemoryStore;
    use crate::traits::Store;

    #[tokio::test]
    async fn counts_only_live_cards_on_regular_boards() {
        let store = InMemoryStore::new();
        board(&store, "board1", "team1").await;
        board(&store, "board2", "team1").await;
        store
            .insert_board(Board::new("template", "team1", "Template").as_template(), USER)
            .await
            .unwrap();

        for id in ["c1", "c2", "c3"] {
            card(&store, id, "board1").await;
        }
        for id in ["c4", "c5"] {
            card(&store, id, "board2").await;
        }
        card(&store, "t1", "template").await;
        card(&store, "t2", "template").await;
        store
            .insert_block(block("text1", BlockType::Text, "c1", "board1"), USER)
            .await
            .unwrap();
        store
            .insert_block(block("view1", BlockType::View, "board1", "board1"), USER)
            .await
            .unwrap();
        card(&store, "gone", "board2").await;
        store.delete_block("gone", USER).await.unwrap();

        assert_eq!(store.get_used_cards_count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn cards_on_deleted_or_missing_boards_are_not_counted() {
        let store = InMemoryStore::new();
        board(&store, "board1", "team1").await;
        card(&store, "c1", "board1").await;
        card(&store, "stray", "no-such-board").await;
        assert_eq!(store.get_used_cards_count().await.unwrap(), 1);

        store.delete_board("board1", USER).await.unwrap();
        assert_eq!(store.get_used_cards_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn card_limit_timestamp_ranks_by_recency() {
        let store = InMemoryStore::new();
        board(&store, "board1", "team1").await;
        board(&store, "board2", "team1").await;

        let mut cards = Vec::new();
        for i in 0..10 {
            let board_id = if i % 2 == 0 { "board1" } else { "board2" };
            cards.push(card(&store, &format!("card{i}"), board_id).await);
        }
        let oldest = &cards[0];

        assert_eq!(
            store.get_card_limit_timestamp(10).await.unwrap(),
            oldest.update_at
        );
        assert_eq!(
            store.get_card_limit_timestamp(1).await.unwrap(),
            cards[9].update_at
        );
        assert_eq!(store.get_card_limit_timestamp(15).await.unwrap(), 0);
        assert_eq!(store.get_card_limit_timestamp(0).await.unwrap(), 0);

        store.delete_block(&oldest.id, USER).await.unwrap();
        assert_eq!(store.get_card_limit_timestamp(10).await.unwrap(), 0);
    }
}
