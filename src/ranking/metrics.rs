//! Ranking Metrics and Performance Monitoring
//!
//! Timing and quality-analysis utilities for the ranking pipeline. These are
//! used selectively during profiling and debugging of feed quality.

#![allow(dead_code)] // Quality analysis is used selectively during profiling

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Metrics for a single ranking request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingMetrics {
    pub user_id: String,
    pub request_id: String,
    pub timestamp: i64,

    // Performance metrics
    pub total_duration_ms: u64,
    pub history_fetch_ms: u64,
    pub scoring_duration_ms: u64,

    // Quality metrics
    pub candidates_considered: usize,
    pub items_returned: usize,
    pub avg_score: f32,
    pub category_distribution: HashMap<String, usize>,

    // Diversity metrics
    pub unique_authors: usize,
    pub unique_post_types: usize,

    // Personalization metrics
    pub personalized_count: usize,
    pub fallback_used: bool,
}

impl Default for RankingMetrics {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            total_duration_ms: 0,
            history_fetch_ms: 0,
            scoring_duration_ms: 0,
            candidates_considered: 0,
            items_returned: 0,
            avg_score: 0.0,
            category_distribution: HashMap::new(),
            unique_authors: 0,
            unique_post_types: 0,
            personalized_count: 0,
            fallback_used: false,
        }
    }
}

/// Performance timer for tracking operation duration
pub struct PerformanceTimer {
    start: Instant,
    label: String,
}

impl PerformanceTimer {
    pub fn new(label: &str) -> Self {
        Self {
            start: Instant::now(),
            label: label.to_string(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn log_if_slow(&self, threshold_ms: u64) {
        let elapsed = self.elapsed_ms();
        if elapsed > threshold_ms {
            tracing::warn!(
                "Slow operation: {} took {}ms (threshold: {}ms)",
                self.label,
                elapsed,
                threshold_ms
            );
        }
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        let elapsed = self.elapsed_ms();
        tracing::debug!("{} completed in {}ms", self.label, elapsed);
    }
}

/// Ranked-feed quality analyzer
pub struct QualityAnalyzer;

impl QualityAnalyzer {
    /// Calculate diversity score (0-1, higher is better)
    pub fn diversity_score(
        unique_authors: usize,
        unique_post_types: usize,
        items_returned: usize,
    ) -> f32 {
        if items_returned == 0 {
            return 0.0;
        }

        let author_diversity = unique_authors as f32 / items_returned as f32;
        let type_diversity_raw = (unique_post_types as f32 / 4.0).min(1.0);
        // Scale type diversity by author diversity so types contribute only
        // when author diversity is meaningful
        let type_diversity = type_diversity_raw * author_diversity;

        // Weighted average: authors matter more than post types
        author_diversity * 0.7 + type_diversity * 0.3
    }

    /// Calculate personalization score (0-1, higher is better):
    /// ratio of returned items carrying a personalization signal
    pub fn personalization_score(personalized_count: usize, items_returned: usize) -> f32 {
        if items_returned == 0 {
            return 0.0;
        }

        (personalized_count as f32 / items_returned as f32).min(1.0)
    }

    /// Detect potential issues with feed quality
    pub fn detect_issues(metrics: &RankingMetrics) -> Vec<String> {
        let mut issues = Vec::new();

        // Low diversity
        let diversity = Self::diversity_score(
            metrics.unique_authors,
            metrics.unique_post_types,
            metrics.items_returned,
        );
        if diversity < 0.3 {
            issues.push(format!("Low diversity: {:.2}", diversity));
        }

        // Too slow
        if metrics.total_duration_ms > 200 {
            issues.push(format!("Slow response: {}ms", metrics.total_duration_ms));
        }

        // Ranking degraded to the chronological fallback
        if metrics.fallback_used {
            issues.push("Chronological fallback served".to_string());
        }

        // Low average score
        if metrics.avg_score < 30.0 {
            issues.push(format!("Low avg score: {:.1}", metrics.avg_score));
        }

        // Very few candidates
        if metrics.candidates_considered < metrics.items_returned * 2 {
            issues.push("Too few candidates for quality filtering".to_string());
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diversity_score() {
        // Perfect diversity: all unique authors
        assert!(QualityAnalyzer::diversity_score(10, 4, 10) > 0.9);

        // Low diversity: few unique authors
        assert!(QualityAnalyzer::diversity_score(2, 4, 10) < 0.3);

        // Medium diversity
        let score = QualityAnalyzer::diversity_score(5, 2, 10);
        assert!(score > 0.3 && score < 0.7);
    }

    #[test]
    fn test_personalization_score() {
        assert!(QualityAnalyzer::personalization_score(9, 10) >= 0.9);
        assert!(QualityAnalyzer::personalization_score(1, 10) < 0.3);
        assert_eq!(QualityAnalyzer::personalization_score(0, 0), 0.0);
    }

    #[test]
    fn test_detect_issues() {
        let metrics = RankingMetrics {
            items_returned: 10,
            unique_authors: 2,
            unique_post_types: 1,
            total_duration_ms: 250,
            avg_score: 20.0,
            fallback_used: true,
            ..Default::default()
        };

        let issues = QualityAnalyzer::detect_issues(&metrics);
        assert!(!issues.is_empty());
        assert!(issues.iter().any(|i| i.contains("Low diversity")));
        assert!(issues.iter().any(|i| i.contains("Slow response")));
        assert!(issues.iter().any(|i| i.contains("fallback")));
        assert!(issues.iter().any(|i| i.contains("Low avg score")));
    }
}
