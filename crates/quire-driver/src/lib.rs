//! Unix-socket RPC drivers for Quire virtual boards.
//!
//! A virtual driver is an external process that owns the content of some
//! boards. It listens on a local Unix socket and answers two endpoints:
//!
//! - `GET /blocks?boardID=<id>` with a JSON array of blocks
//! - `GET /members?boardID=<id>` with a JSON array of board members
//!
//! [`RpcDriver`] speaks that protocol and implements
//! [`quire_overlay::Driver`]. [`DriversConfig`] loads a set of drivers from
//! TOML and builds the [`quire_overlay::DriverRegistry`] an overlay store
//! consults.

pub mod client;
pub mod config;
pub mod error;

pub use client::RpcDriver;
pub use config::{DriverConfig, DriversConfig};
pub use error::{ConfigError, ConfigResult};

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper_util::rt::TokioIo;
    use tokio::net::UnixListener;
    use tower::ServiceExt;

    use quire_overlay::OverlayStore;
    use quire_store::{InMemoryStore, Store, StoreError};
    use quire_types::{new_id, Block, BlockType, Board, BoardMember, IdType, ROLE_VIEWER};

    use super::*;

    const USER: &str = "user1";

    async fn remote_blocks(Query(params): Query<HashMap<String, String>>) -> Json<Vec<Block>> {
        let board_id = params.get("boardID").cloned().unwrap_or_default();
        Json(vec![Block::new(
            "remote-card",
            BlockType::Card,
            board_id.clone(),
            board_id.clone(),
            board_id,
        )
        .with_title("From the driver")])
    }

    async fn remote_members(
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Vec<BoardMember>> {
        let board_id = params.get("boardID").cloned().unwrap_or_default();
        Json(vec![BoardMember::admin(board_id, "remote-user")])
    }

    fn spawn_driver(listener: UnixListener) {
        let app = Router::new()
            .route("/blocks", get(remote_blocks))
            .route("/members", get(remote_members));
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let app = app.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |request| app.clone().oneshot(request));
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });
    }

    #[tokio::test]
    async fn overlay_store_reads_through_configured_driver() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("playbooks.sock");
        spawn_driver(UnixListener::bind(&socket).unwrap());

        let config = DriversConfig::from_toml_str(&format!(
            "[[driver]]\nname = \"playbooks\"\nsocket_path = \"{}\"\ntimeout_ms = 1000\n",
            socket.display()
        ))
        .unwrap();
        let overlay = OverlayStore::with_virtual_drivers(
            InMemoryStore::new(),
            config.into_registry().unwrap(),
        );

        let board_id = new_id(IdType::Board);
        overlay
            .insert_board(
                Board::new(&board_id, "team1", "Runbook").with_virtual_driver("playbooks"),
                USER,
            )
            .await
            .unwrap();
        overlay
            .insert_block(
                Block::new("local-card", BlockType::Card, &board_id, &board_id, &board_id),
                USER,
            )
            .await
            .unwrap();
        overlay
            .save_member(BoardMember::admin(&board_id, USER))
            .await
            .unwrap();

        let blocks = overlay.get_blocks_for_board(&board_id).await.unwrap();
        let ids: Vec<&str> = blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["local-card", "remote-card"]);

        let members = overlay.get_members_for_board(&board_id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, "remote-user");
        assert_eq!(members[0].minimum_role, ROLE_VIEWER);
        assert!(!members[0].scheme_admin);
    }

    #[tokio::test]
    async fn unreachable_driver_surfaces_as_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut driver = DriverConfig::new("calendar", dir.path().join("missing.sock"));
        driver.max_retries = 0;
        let registry = DriversConfig {
            drivers: vec![driver],
        }
        .into_registry()
        .unwrap();
        let overlay = OverlayStore::with_virtual_drivers(InMemoryStore::new(), registry);

        let board_id = new_id(IdType::Board);
        overlay
            .insert_board(
                Board::new(&board_id, "team1", "Calendar").with_virtual_driver("calendar"),
                USER,
            )
            .await
            .unwrap();

        let err = overlay.get_blocks_for_board(&board_id).await.unwrap_err();
        assert!(matches!(err, StoreError::Driver { ref driver, .. } if driver == "calendar"));
    }
}
