//! Live trending reads
//!
//! Trending is a short-window measure of reaction velocity: the number of
//! reactions a post collected in the last 6 hours. Counts are read live per
//! ranking pass, batched over the candidate set.

use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;

/// Reaction counts inside the 6-hour trending window, grouped by post.
///
/// Posts with no recent reactions are absent from the map; callers treat a
/// missing entry as zero. A failure here aborts the ranking pass and lands in
/// the chronological fallback.
pub async fn recent_reaction_counts(
    pool: &PgPool,
    post_ids: &[Uuid],
) -> Result<HashMap<Uuid, i64>> {
    if post_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, i64)> = sqlx::query_as(
        r#"
        SELECT post_id, COUNT(*) AS recent_reactions
        FROM post_reactions
        WHERE post_id = ANY($1)
        AND created_at > NOW() - INTERVAL '6 hours'
        GROUP BY post_id
        "#,
    )
    .bind(post_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}
