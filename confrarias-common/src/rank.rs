//! Reputation rank computation
//!
//! Pure and deterministic: the rank is derived on read from two counters and
//! an optional administrative override, never persisted.

use serde::Serialize;

/// One reputation tier with its AND-gated thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankTier {
    pub name: &'static str,
    pub icon: &'static str,
    pub min_seals: u32,
    pub min_submissions: u32,
}

/// Tiers ordered from lowest to highest
pub const RANK_TIERS: &[RankTier] = &[
    RankTier { name: "Noviço", icon: "sprout", min_seals: 0, min_submissions: 0 },
    RankTier { name: "Confrade", icon: "users", min_seals: 1, min_submissions: 1 },
    RankTier { name: "Mestre de Prova", icon: "wine", min_seals: 10, min_submissions: 2 },
    RankTier { name: "Guardião da Tradição", icon: "shield", min_seals: 25, min_submissions: 5 },
    RankTier { name: "Grão-Mestre", icon: "crown", min_seals: 50, min_submissions: 10 },
];

/// Icon reported for an override that does not name a known tier
const OVERRIDE_ICON: &str = "award";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankStatus {
    pub rank_name: String,
    pub icon: String,
    pub next_rank_name: Option<String>,
    pub progress_percent: f64,
}

impl RankTier {
    fn satisfied_by(&self, sealed: u32, approved: u32) -> bool {
        sealed >= self.min_seals && approved >= self.min_submissions
    }
}

/// Compute a user's rank
///
/// A non-empty `rank_override` wins outright and reports 100% with no next
/// rank. Otherwise the current tier is the highest one whose seal AND
/// submission thresholds are both met, and progress is the average of the
/// two ratios toward the next tier, capped at 100.
///
/// # Examples
///
/// ```
/// use confrarias_common::rank::compute_rank;
///
/// // 10 seals is enough for "Mestre de Prova", one submission is not
/// let status = compute_rank(10, 1, None);
/// assert_eq!(status.rank_name, "Confrade");
/// assert_eq!(status.next_rank_name.as_deref(), Some("Mestre de Prova"));
/// ```
pub fn compute_rank(sealed_count: u32, approved_submission_count: u32, rank_override: Option<&str>) -> RankStatus {
    if let Some(name) = rank_override.map(str::trim).filter(|n| !n.is_empty()) {
        let icon = RANK_TIERS
            .iter()
            .find(|tier| tier.name == name)
            .map(|tier| tier.icon)
            .unwrap_or(OVERRIDE_ICON);
        return RankStatus {
            rank_name: name.to_string(),
            icon: icon.to_string(),
            next_rank_name: None,
            progress_percent: 100.0,
        };
    }

    let current_index = RANK_TIERS
        .iter()
        .rposition(|tier| tier.satisfied_by(sealed_count, approved_submission_count))
        .unwrap_or(0);
    let current = &RANK_TIERS[current_index];

    match RANK_TIERS.get(current_index + 1) {
        Some(next) => {
            let seal_ratio = ratio(sealed_count, next.min_seals);
            let submission_ratio = ratio(approved_submission_count, next.min_submissions);
            let progress = ((seal_ratio + submission_ratio) / 2.0 * 100.0).min(100.0);

            RankStatus {
                rank_name: current.name.to_string(),
                icon: current.icon.to_string(),
                next_rank_name: Some(next.name.to_string()),
                progress_percent: progress,
            }
        }
        None => RankStatus {
            rank_name: current.name.to_string(),
            icon: current.icon.to_string(),
            next_rank_name: None,
            progress_percent: 100.0,
        },
    }
}

/// A zero threshold counts as fully met
fn ratio(count: u32, threshold: u32) -> f64 {
    if threshold == 0 {
        1.0
    } else {
        f64::from(count) / f64::from(threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_thresholds_required() {
        assert_eq!(compute_rank(10, 1, None).rank_name, "Confrade");
        assert_eq!(compute_rank(0, 10, None).rank_name, "Noviço");
        assert_eq!(compute_rank(10, 2, None).rank_name, "Mestre de Prova");
    }

    #[test]
    fn test_novice_progress_starts_at_zero() {
        let status = compute_rank(0, 0, None);
        assert_eq!(status.rank_name, "Noviço");
        assert_eq!(status.next_rank_name.as_deref(), Some("Confrade"));
        assert_eq!(status.progress_percent, 0.0);
    }

    #[test]
    fn test_top_tier_is_complete() {
        let status = compute_rank(50, 10, None);
        assert_eq!(status.rank_name, "Grão-Mestre");
        assert_eq!(status.next_rank_name, None);
        assert_eq!(status.progress_percent, 100.0);

        assert_eq!(compute_rank(500, 90, None).rank_name, "Grão-Mestre");
    }

    #[test]
    fn test_progress_averages_both_dimensions() {
        // toward Mestre de Prova (10, 2): (10/10 + 1/2) / 2
        assert_eq!(compute_rank(10, 1, None).progress_percent, 75.0);
        // toward Confrade (1, 1): (0/1 + 1/1) / 2
        assert_eq!(compute_rank(0, 1, None).progress_percent, 50.0);
    }

    #[test]
    fn test_progress_is_capped() {
        // toward Mestre de Prova: (40/10 + 1/2) / 2 = 225%
        assert_eq!(compute_rank(40, 1, None).progress_percent, 100.0);
    }

    #[test]
    fn test_override_wins_regardless_of_counters() {
        for (seals, subs) in [(0, 0), (10, 1), (50, 10)] {
            let status = compute_rank(seals, subs, Some("Mestre de Prova"));
            assert_eq!(status.rank_name, "Mestre de Prova");
            assert_eq!(status.icon, "wine");
            assert_eq!(status.next_rank_name, None);
            assert_eq!(status.progress_percent, 100.0);
        }
    }

    #[test]
    fn test_custom_override_and_blank_override() {
        assert_eq!(compute_rank(0, 0, Some("Embaixador")).icon, "award");
        assert_eq!(compute_rank(0, 0, Some("   ")).rank_name, "Noviço");
    }

    #[test]
    fn test_result_tier_is_highest_satisfied() {
        for seals in 0..60u32 {
            for subs in 0..12u32 {
                let name = compute_rank(seals, subs, None).rank_name;
                let expected = RANK_TIERS
                    .iter()
                    .filter(|t| seals >= t.min_seals && subs >= t.min_submissions)
                    .last()
                    .unwrap();
                assert_eq!(name, expected.name);
            }
        }
    }
}
