//! Interaction History and Tracking
//!
//! Fetches a bounded window of a user's recent interactions (reactions,
//! comments, profile views) and shapes them into the per-author and
//! per-post-type aggregates the scoring pass reads. Also owns the
//! fire-and-forget interaction tracking write.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::kafka::{InteractionEventMessage, KafkaProducer};

/// Interaction kinds we track
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    View,
    Like,
    Comment,
    Share,
    Save,
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionKind::View => write!(f, "view"),
            InteractionKind::Like => write!(f, "like"),
            InteractionKind::Comment => write!(f, "comment"),
            InteractionKind::Share => write!(f, "share"),
            InteractionKind::Save => write!(f, "save"),
        }
    }
}

impl FromStr for InteractionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "view" => Ok(InteractionKind::View),
            "like" => Ok(InteractionKind::Like),
            "comment" => Ok(InteractionKind::Comment),
            "share" => Ok(InteractionKind::Share),
            "save" => Ok(InteractionKind::Save),
            other => Err(Error::UnknownInteractionKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// One historical action a user took, joined to the target post's metadata.
///
/// Profile views act as a view-interaction proxy: `author_id` is the viewed
/// profile's owner and `post_id`/`post_type` are absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub post_id: Option<Uuid>,
    pub author_id: Uuid,
    pub post_type: Option<String>,
    pub kind: InteractionKind,
    pub duration_secs: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

/// Bounds for the history fetch
#[derive(Debug, Clone, Copy)]
pub struct HistoryWindow {
    pub reactions: i64,
    pub comments: i64,
    pub views: i64,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self {
            reactions: 100,
            comments: 50,
            views: 100,
        }
    }
}

/// Shaped snapshot of a user's recent interactions, built once per ranking pass
#[derive(Debug, Clone, Default)]
pub struct InteractionHistory {
    author_counts: HashMap<Uuid, usize>,
    recent_author_counts: HashMap<Uuid, usize>,
    type_counts: HashMap<String, usize>,
    avg_view_duration_secs: f32,
    total: usize,
}

impl InteractionHistory {
    /// Aggregate raw records into the counts the scoring functions read.
    /// `now` anchors the 7-day recency window.
    pub fn from_records(records: &[InteractionRecord], now: DateTime<Utc>) -> Self {
        let recent_cutoff = now - ChronoDuration::days(7);

        let mut author_counts: HashMap<Uuid, usize> = HashMap::new();
        let mut recent_author_counts: HashMap<Uuid, usize> = HashMap::new();
        let mut type_counts: HashMap<String, usize> = HashMap::new();
        let mut duration_sum: i64 = 0;
        let mut duration_samples: usize = 0;

        for record in records {
            *author_counts.entry(record.author_id).or_insert(0) += 1;
            if record.occurred_at > recent_cutoff {
                *recent_author_counts.entry(record.author_id).or_insert(0) += 1;
            }
            if let Some(post_type) = &record.post_type {
                *type_counts.entry(post_type.clone()).or_insert(0) += 1;
            }
            if let Some(duration) = record.duration_secs {
                duration_sum += duration;
                duration_samples += 1;
            }
        }

        let avg_view_duration_secs = if duration_samples > 0 {
            duration_sum as f32 / duration_samples as f32
        } else {
            0.0
        };

        Self {
            author_counts,
            recent_author_counts,
            type_counts,
            avg_view_duration_secs,
            total: records.len(),
        }
    }

    /// All-window interactions with the given author
    pub fn author_interactions(&self, author_id: &Uuid) -> usize {
        self.author_counts.get(author_id).copied().unwrap_or(0)
    }

    /// Interactions with the given author inside the last 7 days
    pub fn recent_author_interactions(&self, author_id: &Uuid) -> usize {
        self.recent_author_counts
            .get(author_id)
            .copied()
            .unwrap_or(0)
    }

    /// Interactions with posts of the given type
    pub fn type_interactions(&self, post_type: &str) -> usize {
        self.type_counts.get(post_type).copied().unwrap_or(0)
    }

    /// Average view duration across records that carry one, in seconds
    pub fn avg_view_duration_secs(&self) -> f32 {
        self.avg_view_duration_secs
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

// ============================================================================
// History fetch (fan-out/fan-in, partial-failure tolerant)
// ============================================================================

/// Database row for reaction/comment history joined to the target post
#[derive(Debug, sqlx::FromRow)]
struct PostInteractionRow {
    post_id: Uuid,
    author_id: Uuid,
    post_type: Option<String>,
    occurred_at: DateTime<Utc>,
}

/// Database row for profile-view history
#[derive(Debug, sqlx::FromRow)]
struct ProfileViewRow {
    author_id: Uuid,
    duration_secs: Option<i64>,
    occurred_at: DateTime<Utc>,
}

/// Fetch and shape the user's recent interaction history.
///
/// The three sources are read concurrently; a failed source is logged and
/// substituted with an empty list rather than aborting the batch.
pub async fn fetch_recent_history(
    pool: &PgPool,
    user_id: Uuid,
    window: HistoryWindow,
) -> InteractionHistory {
    let (reactions, comments, views) = tokio::join!(
        fetch_reaction_history(pool, user_id, window.reactions),
        fetch_comment_history(pool, user_id, window.comments),
        fetch_view_history(pool, user_id, window.views),
    );

    let mut records = Vec::new();
    for (source, result) in [
        ("reactions", reactions),
        ("comments", comments),
        ("profile_views", views),
    ] {
        match result {
            Ok(mut batch) => records.append(&mut batch),
            Err(e) => warn!(
                "History source '{}' failed for user {}, substituting empty: {}",
                source, user_id, e
            ),
        }
    }

    debug!(
        "Fetched {} history records for user {}",
        records.len(),
        user_id
    );

    InteractionHistory::from_records(&records, Utc::now())
}

async fn fetch_reaction_history(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<InteractionRecord>> {
    let rows = sqlx::query_as::<_, PostInteractionRow>(
        r#"
        SELECT r.post_id, p.user_id AS author_id, p.post_type, r.created_at AS occurred_at
        FROM post_reactions r
        JOIN posts p ON p.id = r.post_id
        WHERE r.user_id = $1
        ORDER BY r.created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| InteractionRecord {
            post_id: Some(row.post_id),
            author_id: row.author_id,
            post_type: row.post_type,
            kind: InteractionKind::Like,
            duration_secs: None,
            occurred_at: row.occurred_at,
        })
        .collect())
}

async fn fetch_comment_history(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<InteractionRecord>> {
    let rows = sqlx::query_as::<_, PostInteractionRow>(
        r#"
        SELECT c.post_id, p.user_id AS author_id, p.post_type, c.created_at AS occurred_at
        FROM post_comments c
        JOIN posts p ON p.id = c.post_id
        WHERE c.user_id = $1
        ORDER BY c.created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| InteractionRecord {
            post_id: Some(row.post_id),
            author_id: row.author_id,
            post_type: row.post_type,
            kind: InteractionKind::Comment,
            duration_secs: None,
            occurred_at: row.occurred_at,
        })
        .collect())
}

async fn fetch_view_history(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<InteractionRecord>> {
    let rows = sqlx::query_as::<_, ProfileViewRow>(
        r#"
        SELECT v.profile_id AS author_id, v.view_duration_secs AS duration_secs,
               v.viewed_at AS occurred_at
        FROM profile_views v
        WHERE v.viewer_id = $1
        ORDER BY v.viewed_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| InteractionRecord {
            post_id: None,
            author_id: row.author_id,
            post_type: None,
            kind: InteractionKind::View,
            duration_secs: row.duration_secs,
            occurred_at: row.occurred_at,
        })
        .collect())
}

// ============================================================================
// Interaction tracking (write side channel)
// ============================================================================

/// A new interaction to record for the current user
#[derive(Debug, Clone)]
pub struct NewInteraction {
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub kind: InteractionKind,
    pub duration_secs: Option<i64>,
}

/// Append one interaction record
pub async fn record_interaction(pool: &PgPool, event: &NewInteraction) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_interactions
            (id, user_id, post_id, interaction_kind, duration_secs, created_at)
        VALUES
            (gen_random_uuid(), $1, $2, $3, $4, NOW())
        "#,
    )
    .bind(event.user_id)
    .bind(event.post_id)
    .bind(event.kind.to_string())
    .bind(event.duration_secs)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record an interaction and publish it to the interactions topic.
///
/// Fire-and-forget: failures are logged at warn level and never surface to
/// the caller or block the flow that triggered them.
pub async fn track_interaction(
    pool: &PgPool,
    producer: &KafkaProducer,
    topic: &str,
    event: NewInteraction,
) {
    if let Err(e) = record_interaction(pool, &event).await {
        warn!(
            "Failed to record {} interaction for user {} on post {}: {}",
            event.kind, event.user_id, event.post_id, e
        );
    }

    let mut message = InteractionEventMessage::new(
        event.user_id.to_string(),
        event.post_id.to_string(),
        event.kind.to_string(),
    );
    if let Some(duration) = event.duration_secs {
        message = message.with_duration(duration);
    }

    if let Err(e) = producer
        .send_event(topic, &event.post_id.to_string(), &message)
        .await
    {
        warn!("Failed to publish interaction event: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        author_id: Uuid,
        post_type: Option<&str>,
        kind: InteractionKind,
        duration_secs: Option<i64>,
        days_ago: i64,
    ) -> InteractionRecord {
        InteractionRecord {
            post_id: Some(Uuid::new_v4()),
            author_id,
            post_type: post_type.map(|s| s.to_string()),
            kind,
            duration_secs,
            occurred_at: Utc::now() - ChronoDuration::days(days_ago),
        }
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            InteractionKind::View,
            InteractionKind::Like,
            InteractionKind::Comment,
            InteractionKind::Share,
            InteractionKind::Save,
        ] {
            assert_eq!(kind.to_string().parse::<InteractionKind>().unwrap(), kind);
        }
        assert!("poke".parse::<InteractionKind>().is_err());
    }

    #[test]
    fn test_aggregation_counts() {
        let author_a = Uuid::new_v4();
        let author_b = Uuid::new_v4();

        let records = vec![
            record(author_a, Some("photo"), InteractionKind::Like, None, 1),
            record(author_a, Some("photo"), InteractionKind::Comment, None, 2),
            record(author_a, Some("reel"), InteractionKind::Like, None, 20),
            record(author_b, None, InteractionKind::View, Some(15), 3),
        ];

        let history = InteractionHistory::from_records(&records, Utc::now());

        assert_eq!(history.len(), 4);
        assert_eq!(history.author_interactions(&author_a), 3);
        // The 20-day-old record falls outside the 7-day window
        assert_eq!(history.recent_author_interactions(&author_a), 2);
        assert_eq!(history.author_interactions(&author_b), 1);
        assert_eq!(history.type_interactions("photo"), 2);
        assert_eq!(history.type_interactions("reel"), 1);
        assert_eq!(history.type_interactions("text"), 0);
    }

    #[test]
    fn test_avg_view_duration_only_counts_samples() {
        let author = Uuid::new_v4();
        let records = vec![
            record(author, None, InteractionKind::View, Some(20), 1),
            record(author, None, InteractionKind::View, Some(10), 1),
            record(author, Some("photo"), InteractionKind::Like, None, 1),
        ];

        let history = InteractionHistory::from_records(&records, Utc::now());
        assert!((history.avg_view_duration_secs() - 15.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_empty_history() {
        let history = InteractionHistory::from_records(&[], Utc::now());
        assert!(history.is_empty());
        assert_eq!(history.avg_view_duration_secs(), 0.0);
        assert_eq!(history.author_interactions(&Uuid::new_v4()), 0);
    }
}
