use chrono::{Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ranking::engine::RankingEngine;

/// How many feeds to precompute per warming run
const WARM_FEED_SIZE: usize = 50;

/// Warm ranked feeds for all recently-active users.
///
/// Users who interacted in the last 7 days get their personalized feed
/// recomputed and cached; the anonymous trending feed is refreshed alongside.
/// Per-user failures are logged and never abort the run.
pub async fn warm_active_feeds(pool: &PgPool, engine: &RankingEngine) -> anyhow::Result<()> {
    let active_since = Utc::now() - ChronoDuration::days(7);

    // Users with any recorded activity in the window
    let active_users: Vec<Uuid> = crate::database::with_retry(
        || async move {
            let users = sqlx::query_scalar::<_, Uuid>(
                r#"
                SELECT DISTINCT user_id FROM post_reactions WHERE created_at > $1
                UNION
                SELECT DISTINCT user_id FROM post_comments WHERE created_at > $1
                UNION
                SELECT DISTINCT user_id FROM user_interactions WHERE created_at > $1
                "#,
            )
            .bind(active_since)
            .fetch_all(pool)
            .await?;
            Ok(users)
        },
        3,
        std::time::Duration::from_millis(500),
    )
    .await
    .unwrap_or_else(|e| {
        warn!("Failed to fetch active users, skipping warm run: {}", e);
        vec![]
    });

    if active_users.is_empty() {
        info!("No active users to warm feeds for.");
        return Ok(());
    }

    info!("Warming ranked feeds for {} users...", active_users.len());

    // Limit concurrency to prevent DB saturation
    const CONCURRENCY_LIMIT: usize = 10;

    let mut set = tokio::task::JoinSet::new();
    let semaphore = std::sync::Arc::new(tokio::sync::Semaphore::new(CONCURRENCY_LIMIT));

    let total_users = active_users.len();
    for user_id in active_users {
        // Engine is cheap to clone, it just holds a pool and config
        let engine = engine.clone();
        let permit = semaphore.clone().acquire_owned().await?;

        set.spawn(async move {
            let _permit = permit; // Hold permit until task completion
            let result = engine.ranked_feed(user_id, WARM_FEED_SIZE, 0).await;
            (user_id, result)
        });
    }

    let mut success_count = 0;

    // Process results as they finish
    while let Some(res) = set.join_next().await {
        match res {
            Ok((_, Ok(_))) => success_count += 1,
            Ok((user_id, Err(e))) => {
                warn!("Failed to warm feed for user {}: {}", user_id, e);
            }
            Err(e) => error!("Warm task join error: {}", e),
        }
    }

    // Refresh the anonymous trending feed as well
    if let Err(e) = engine.trending_feed(WARM_FEED_SIZE, 0).await {
        warn!("Failed to refresh trending feed: {}", e);
    }

    info!("Feeds warmed for {}/{} users", success_count, total_users);
    Ok(())
}
