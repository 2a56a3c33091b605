//! Link visibility ranking
//!
//! Generated trace links that share a target are ranked against each other.
//! A link's percentile is the share of eligible scores in its group that are
//! less than or equal to its own, so tied scores all take the highest rank of
//! the tie and the top-ranked links always land on `1.0`.
//!
//! Manual links do not take part; their percentile and visibility are left
//! untouched.

use reqtrace_model::{ArtifactKey, TraceLink};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Visibility thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingPolicy {
    /// Scores below this are excluded from ranking and hidden
    pub min_score: f64,
    /// Minimum percentile for a link to be visible
    pub visible_percentile: f64,
    /// Raw score at or above which a link is visible regardless of rank
    pub absolute_cutoff: Option<f64>,
}

impl RankingPolicy {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_visible_percentile(mut self, percentile: f64) -> Self {
        self.visible_percentile = percentile;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_absolute_cutoff(mut self, cutoff: f64) -> Self {
        self.absolute_cutoff = Some(cutoff);
        self
    }

    /// Check whether a generated score is below the ranking floor
    #[inline]
    #[must_use]
    pub fn is_below_floor(&self, score: f64) -> bool {
        score < self.min_score
    }
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            visible_percentile: 0.9,
            absolute_cutoff: None,
        }
    }
}

/// Set `percentile` and `visible` on every generated link
///
/// Links whose target is not a valid artifact key are skipped.
pub fn rank_and_mark_visibility(links: &mut [TraceLink], policy: &RankingPolicy) {
    let mut groups: BTreeMap<ArtifactKey, Vec<usize>> = BTreeMap::new();
    for (index, link) in links.iter().enumerate() {
        if !link.is_generated() {
            continue;
        }
        if let Ok(target) = link.target_key() {
            groups.entry(target).or_default().push(index);
        }
    }

    for (target, members) in groups {
        let mut eligible: Vec<f64> = members
            .iter()
            .map(|&i| links[i].score)
            .filter(|&score| !policy.is_below_floor(score))
            .collect();
        eligible.sort_by(f64::total_cmp);

        for &i in &members {
            let link = &mut links[i];
            if policy.is_below_floor(link.score) {
                link.percentile = None;
                link.visible = false;
                continue;
            }

            let at_or_below = eligible.partition_point(|&score| score <= link.score);
            #[allow(clippy::cast_precision_loss)]
            let percentile = at_or_below as f64 / eligible.len() as f64;

            link.percentile = Some(percentile);
            link.visible = percentile >= policy.visible_percentile
                || policy
                    .absolute_cutoff
                    .is_some_and(|cutoff| link.score >= cutoff);
        }

        tracing::debug!(
            "Ranked {} generated links to {} ({} eligible)",
            members.len(),
            target,
            eligible.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn links(target: &str, scores: &[f64]) -> Vec<TraceLink> {
        scores
            .iter()
            .enumerate()
            .map(|(i, &score)| TraceLink::generated(format!("S{i}"), target, score))
            .collect()
    }

    #[test]
    fn ties_share_the_top_rank() {
        let mut group = links("T", &[0.66, 1.0, 1.0, 1.0]);
        rank_and_mark_visibility(&mut group, &RankingPolicy::default());

        assert_eq!(group[0].percentile, Some(0.25));
        assert!(!group[0].visible);
        for link in &group[1..] {
            assert_eq!(link.percentile, Some(1.0));
            assert!(link.visible);
        }
    }

    #[test]
    fn groups_are_ranked_independently() {
        let mut all = links("T1", &[0.1, 0.2]);
        all.extend(links("T2", &[0.9]));
        rank_and_mark_visibility(&mut all, &RankingPolicy::default());

        assert_eq!(all[0].percentile, Some(0.5));
        assert_eq!(all[1].percentile, Some(1.0));
        assert_eq!(all[2].percentile, Some(1.0));
    }

    #[test]
    fn scores_below_floor_are_excluded() {
        let mut group = links("T", &[0.05, 0.5, 0.8]);
        let policy = RankingPolicy::new().with_min_score(0.1);
        rank_and_mark_visibility(&mut group, &policy);

        assert_eq!(group[0].percentile, None);
        assert!(!group[0].visible);
        assert_eq!(group[1].percentile, Some(0.5));
        assert_eq!(group[2].percentile, Some(1.0));
    }

    #[test]
    fn absolute_cutoff_overrides_rank() {
        let mut group = links("T", &[0.7, 0.8, 0.95]);
        let policy = RankingPolicy::new().with_absolute_cutoff(0.75);
        rank_and_mark_visibility(&mut group, &policy);

        assert!(!group[0].visible);
        assert!(group[1].visible);
        assert!(group[2].visible);
    }

    #[test]
    fn manual_links_are_untouched() {
        let mut group = vec![TraceLink::manual("A", "T"), TraceLink::generated("B", "T", 0.3)];
        group[0].visible = false;
        rank_and_mark_visibility(&mut group, &RankingPolicy::default());

        assert_eq!(group[0].percentile, None);
        assert!(!group[0].visible);
        assert_eq!(group[1].percentile, Some(1.0));
    }

    #[test]
    fn policy_fills_missing_fields_with_defaults() {
        let policy: RankingPolicy = serde_json::from_str(r#"{"min_score": 0.2}"#).unwrap();
        assert_eq!(policy.min_score, 0.2);
        assert_eq!(policy.visible_percentile, 0.9);
        assert_eq!(policy.absolute_cutoff, None);
    }

    proptest! {
        #[test]
        fn percentile_is_monotonic_in_score(
            scores in proptest::collection::vec(0.0f64..=1.0, 1..30)
        ) {
            let mut group = links("T", &scores);
            rank_and_mark_visibility(&mut group, &RankingPolicy::default());

            for a in &group {
                for b in &group {
                    if a.score <= b.score {
                        prop_assert!(a.percentile.unwrap() <= b.percentile.unwrap());
                    }
                }
                let p = a.percentile.unwrap();
                prop_assert!(p > 0.0 && p <= 1.0);
            }

            let top = group.iter().map(|l| l.score).fold(f64::MIN, f64::max);
            for link in group.iter().filter(|l| l.score == top) {
                prop_assert_eq!(link.percentile, Some(1.0));
                prop_assert!(link.visible);
            }
        }
    }
}
