//! Linked account association repository.
//!
//! Binds a web identity to zero-or-one game identity and zero-or-one chat
//! identity, keyed by web identity. Removing one side never deletes the
//! other; the row is dropped only when all sides are empty.

use super::DbError;
use serde::Serialize;
use sqlx::SqlitePool;

/// Which side of an association an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSide {
    Game,
    Chat,
}

impl LinkSide {
    /// Parse a client-supplied side name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "game" => Some(Self::Game),
            "chat" => Some(Self::Chat),
            _ => None,
        }
    }
}

/// A linked account association row.
#[derive(Debug, Clone, Serialize)]
pub struct Association {
    pub web_user_id: String,
    pub game_id: Option<String>,
    pub game_name: Option<String>,
    pub chat_id: Option<String>,
    pub chat_name: Option<String>,
}

/// Repository for account associations.
pub struct AccountLinkRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AccountLinkRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch the association for a web identity.
    pub async fn get(&self, web_user_id: &str) -> Result<Option<Association>, DbError> {
        let row = sqlx::query_as::<
            _,
            (
                String,
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
            ),
        >(
            r#"
            SELECT web_user_id, game_id, game_name, chat_id, chat_name
            FROM linked_accounts
            WHERE web_user_id = ?
            "#,
        )
        .bind(web_user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(
            |(web_user_id, game_id, game_name, chat_id, chat_name)| Association {
                web_user_id,
                game_id,
                game_name,
                chat_id,
                chat_name,
            },
        ))
    }

    /// Link one side of the association for a web identity (upsert).
    ///
    /// An external id already linked to a different web account is stolen:
    /// the old link is cleared first so the unique index cannot trip.
    /// Re-redeeming the same link re-affirms it instead of erroring, which
    /// keeps redemption safely re-appliable after a partial failure.
    pub async fn link(
        &self,
        web_user_id: &str,
        side: LinkSide,
        external_id: &str,
        display_name: Option<&str>,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        match side {
            LinkSide::Game => {
                sqlx::query(
                    "UPDATE linked_accounts SET game_id = NULL, game_name = NULL WHERE game_id = ?",
                )
                .bind(external_id)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    r#"
                    INSERT INTO linked_accounts (web_user_id, game_id, game_name)
                    VALUES (?, ?, ?)
                    ON CONFLICT (web_user_id) DO UPDATE SET
                        game_id = excluded.game_id,
                        game_name = excluded.game_name
                    "#,
                )
                .bind(web_user_id)
                .bind(external_id)
                .bind(display_name)
                .execute(&mut *tx)
                .await?;
            }
            LinkSide::Chat => {
                sqlx::query(
                    "UPDATE linked_accounts SET chat_id = NULL, chat_name = NULL WHERE chat_id = ?",
                )
                .bind(external_id)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    r#"
                    INSERT INTO linked_accounts (web_user_id, chat_id, chat_name)
                    VALUES (?, ?, ?)
                    ON CONFLICT (web_user_id) DO UPDATE SET
                        chat_id = excluded.chat_id,
                        chat_name = excluded.chat_name
                    "#,
                )
                .bind(web_user_id)
                .bind(external_id)
                .bind(display_name)
                .execute(&mut *tx)
                .await?;
            }
        }

        // Stealing a link can leave the previous owner's row fully empty.
        sqlx::query(
            "DELETE FROM linked_accounts WHERE game_id IS NULL AND chat_id IS NULL",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Remove one side of the association. Returns the display name that
    /// was linked on that side, if any (callers enqueue a follow-up sync
    /// command for unlinked game accounts).
    ///
    /// Tolerates the side already being empty; the row is deleted only when
    /// both sides end up empty.
    pub async fn unlink(
        &self,
        web_user_id: &str,
        side: LinkSide,
    ) -> Result<Option<String>, DbError> {
        let mut tx = self.pool.begin().await?;

        let name_col = match side {
            LinkSide::Game => "game_name",
            LinkSide::Chat => "chat_name",
        };
        let previous: Option<String> = sqlx::query_scalar(&format!(
            "SELECT {} FROM linked_accounts WHERE web_user_id = ?",
            name_col
        ))
        .bind(web_user_id)
        .fetch_optional(&mut *tx)
        .await?
        .flatten();

        let clear = match side {
            LinkSide::Game => {
                "UPDATE linked_accounts SET game_id = NULL, game_name = NULL WHERE web_user_id = ?"
            }
            LinkSide::Chat => {
                "UPDATE linked_accounts SET chat_id = NULL, chat_name = NULL WHERE web_user_id = ?"
            }
        };
        sqlx::query(clear).bind(web_user_id).execute(&mut *tx).await?;

        sqlx::query(
            r#"
            DELETE FROM linked_accounts
            WHERE web_user_id = ? AND game_id IS NULL AND chat_id IS NULL
            "#,
        )
        .bind(web_user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_link_and_get() {
        let db = Database::new(":memory:").await.unwrap();
        db.account_links()
            .link("web-abc", LinkSide::Game, "uuid-123", Some("Steve"))
            .await
            .unwrap();

        let assoc = db.account_links().get("web-abc").await.unwrap().unwrap();
        assert_eq!(assoc.game_id.as_deref(), Some("uuid-123"));
        assert_eq!(assoc.game_name.as_deref(), Some("Steve"));
        assert!(assoc.chat_id.is_none());
    }

    #[tokio::test]
    async fn test_relink_steals_from_previous_owner() {
        let db = Database::new(":memory:").await.unwrap();
        db.account_links()
            .link("web-old", LinkSide::Game, "uuid-123", Some("Steve"))
            .await
            .unwrap();
        db.account_links()
            .link("web-new", LinkSide::Game, "uuid-123", Some("Steve"))
            .await
            .unwrap();

        // Old owner's row had nothing else, so it is gone entirely.
        assert!(db.account_links().get("web-old").await.unwrap().is_none());
        let assoc = db.account_links().get("web-new").await.unwrap().unwrap();
        assert_eq!(assoc.game_id.as_deref(), Some("uuid-123"));
    }

    #[tokio::test]
    async fn test_partial_unlink_preserves_other_side() {
        let db = Database::new(":memory:").await.unwrap();
        db.account_links()
            .link("web-abc", LinkSide::Game, "uuid-123", Some("Steve"))
            .await
            .unwrap();
        db.account_links()
            .link("web-abc", LinkSide::Chat, "chat-777", Some("steve#1234"))
            .await
            .unwrap();

        let removed = db
            .account_links()
            .unlink("web-abc", LinkSide::Game)
            .await
            .unwrap();
        assert_eq!(removed.as_deref(), Some("Steve"));

        // Chat side intact, row still present.
        let assoc = db.account_links().get("web-abc").await.unwrap().unwrap();
        assert!(assoc.game_id.is_none());
        assert_eq!(assoc.chat_id.as_deref(), Some("chat-777"));
    }

    #[tokio::test]
    async fn test_unlink_last_side_deletes_row() {
        let db = Database::new(":memory:").await.unwrap();
        db.account_links()
            .link("web-abc", LinkSide::Game, "uuid-123", None)
            .await
            .unwrap();

        db.account_links()
            .unlink("web-abc", LinkSide::Game)
            .await
            .unwrap();
        assert!(db.account_links().get("web-abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unlink_tolerates_empty_side() {
        let db = Database::new(":memory:").await.unwrap();
        db.account_links()
            .link("web-abc", LinkSide::Chat, "chat-777", None)
            .await
            .unwrap();

        // Game side was never linked; unlink succeeds and returns nothing.
        let removed = db
            .account_links()
            .unlink("web-abc", LinkSide::Game)
            .await
            .unwrap();
        assert!(removed.is_none());
        assert!(db.account_links().get("web-abc").await.unwrap().is_some());
    }
}
