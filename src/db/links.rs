//! Link code repository.
//!
//! Short-lived, single-use pairing codes binding an external identity (game
//! account, chat account, or a web-initiated request) to a web account.
//! At most one live code exists per `(source, source_id)`: reissuing is a
//! single SQL upsert that rotates the code and refreshes the expiry, so two
//! concurrent "regenerate my code" calls cannot leave two live codes.

use super::DbError;
use rand::Rng;
use sqlx::SqlitePool;

/// Code alphabet excluding ambiguous characters (no I, O, 0, 1).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a pairing code.
const CODE_LEN: usize = 6;

/// A stored pairing code.
#[derive(Debug, Clone)]
pub struct LinkCode {
    pub code: String,
    pub source: String,
    pub source_id: String,
    pub display_name: Option<String>,
    /// Absolute expiry, unix milliseconds.
    pub expires_at: i64,
}

/// Generate a random code from the restricted alphabet, uppercase.
fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Repository for pairing codes.
pub struct LinkCodeRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LinkCodeRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Issue a fresh code for `(source, source_id)` with the given TTL.
    ///
    /// Upsert semantics: a newer request for the same party overwrites the
    /// existing row rather than erroring, invalidating the earlier code.
    pub async fn issue(
        &self,
        source: &str,
        source_id: &str,
        display_name: Option<&str>,
        ttl_secs: u64,
    ) -> Result<LinkCode, DbError> {
        let expires_at = chrono::Utc::now().timestamp_millis() + (ttl_secs as i64) * 1000;

        // The code column is UNIQUE; a random collision with another party's
        // live code is astronomically unlikely (32^6) but retried anyway.
        for _ in 0..4 {
            let code = generate_code();

            let result = sqlx::query(
                r#"
                INSERT INTO link_codes (source, source_id, code, display_name, expires_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (source, source_id) DO UPDATE SET
                    code = excluded.code,
                    display_name = excluded.display_name,
                    expires_at = excluded.expires_at
                "#,
            )
            .bind(source)
            .bind(source_id)
            .bind(&code)
            .bind(display_name)
            .bind(expires_at)
            .execute(self.pool)
            .await;

            match result {
                Ok(_) => {
                    return Ok(LinkCode {
                        code,
                        source: source.to_string(),
                        source_id: source_id.to_string(),
                        display_name: display_name.map(String::from),
                        expires_at,
                    });
                }
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(DbError::Internal(
            "failed to generate a unique link code".to_string(),
        ))
    }

    /// Look up a code, case-insensitively (codes are normalized uppercase).
    pub async fn find(&self, code: &str) -> Result<Option<LinkCode>, DbError> {
        let normalized = code.trim().to_uppercase();

        let row = sqlx::query_as::<_, (String, String, String, Option<String>, i64)>(
            r#"
            SELECT source, source_id, code, display_name, expires_at
            FROM link_codes
            WHERE code = ?
            "#,
        )
        .bind(&normalized)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(
            |(source, source_id, code, display_name, expires_at)| LinkCode {
                code,
                source,
                source_id,
                display_name,
                expires_at,
            },
        ))
    }

    /// Delete a code row. Called after a confirmed association write (so a
    /// code can never be redeemed twice) and for lazy expiry cleanup.
    pub async fn delete(&self, code: &str) -> Result<(), DbError> {
        sqlx::query("DELETE FROM link_codes WHERE code = ?")
            .bind(code.trim().to_uppercase())
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Remove every expired code. Run periodically; redemption also deletes
    /// expired rows lazily, this catches codes nobody ever tried.
    pub async fn purge_expired(&self) -> Result<u64, DbError> {
        let now = chrono::Utc::now().timestamp_millis();
        let result = sqlx::query("DELETE FROM link_codes WHERE expires_at < ?")
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_generated_codes_use_restricted_alphabet() {
        for _ in 0..64 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LEN);
            for c in code.bytes() {
                assert!(CODE_ALPHABET.contains(&c), "unexpected char {}", c as char);
                // Ambiguous characters are excluded outright.
                assert!(!b"IO01".contains(&c));
            }
        }
    }

    #[tokio::test]
    async fn test_issue_then_find_is_case_insensitive() {
        let db = Database::new(":memory:").await.unwrap();
        let issued = db
            .link_codes()
            .issue("game", "uuid-123", Some("Steve"), 900)
            .await
            .unwrap();

        let found = db
            .link_codes()
            .find(&issued.code.to_lowercase())
            .await
            .unwrap()
            .expect("code should be found");
        assert_eq!(found.source, "game");
        assert_eq!(found.source_id, "uuid-123");
        assert_eq!(found.display_name.as_deref(), Some("Steve"));
    }

    #[tokio::test]
    async fn test_reissue_rotates_single_live_code() {
        let db = Database::new(":memory:").await.unwrap();
        let first = db
            .link_codes()
            .issue("game", "uuid-123", None, 900)
            .await
            .unwrap();
        let second = db
            .link_codes()
            .issue("game", "uuid-123", None, 900)
            .await
            .unwrap();

        // The new code is live, the earlier one is unredeemable.
        assert!(db.link_codes().find(&second.code).await.unwrap().is_some());
        if first.code != second.code {
            assert!(db.link_codes().find(&first.code).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_purge_expired_removes_only_dead_codes() {
        let db = Database::new(":memory:").await.unwrap();
        let dead = db
            .link_codes()
            .issue("game", "uuid-dead", None, 0)
            .await
            .unwrap();
        let live = db
            .link_codes()
            .issue("game", "uuid-live", None, 900)
            .await
            .unwrap();

        // TTL 0 expires immediately (expires_at == now at insert time).
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let removed = db.link_codes().purge_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert!(db.link_codes().find(&dead.code).await.unwrap().is_none());
        assert!(db.link_codes().find(&live.code).await.unwrap().is_some());
    }
}
