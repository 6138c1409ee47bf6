//! Adaptive difficulty filter
//!
//! Keeps lessons whose difficulty sits in a band around the learner's rating.
//! An empty first band is retried once with the wider band; after that the
//! result is returned as-is, even when empty.

use tracing::debug;

use crate::profile::LessonProfile;

/// Which band produced the filtered set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandUsed {
    Primary,
    Widened,
    /// Both bands were empty
    None,
}

/// Inclusive difficulty band `[center - half_width, center + half_width]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyBand {
    pub low: i32,
    pub high: i32,
}

impl DifficultyBand {
    pub fn around(center: i32, half_width: i32) -> Self {
        Self {
            low: center.saturating_sub(half_width),
            high: center.saturating_add(half_width),
        }
    }

    pub fn contains(&self, rating: i32) -> bool {
        (self.low..=self.high).contains(&rating)
    }
}

pub struct AdaptiveFilter {
    primary_band: i32,
    widened_band: i32,
}

impl AdaptiveFilter {
    pub fn new(primary_band: i32, widened_band: i32) -> Self {
        Self { primary_band, widened_band }
    }

    /// Filter `candidates`, preserving their order
    ///
    /// Callers must already have removed lessons the learner completed.
    pub fn filter<'a>(
        &self,
        rating: i32,
        candidates: &'a [LessonProfile],
    ) -> (Vec<&'a LessonProfile>, BandUsed) {
        let primary = DifficultyBand::around(rating, self.primary_band);
        let filtered = within(primary, candidates);
        if !filtered.is_empty() {
            debug!(
                "Primary band [{}, {}] kept {} of {} lessons",
                primary.low,
                primary.high,
                filtered.len(),
                candidates.len()
            );
            return (filtered, BandUsed::Primary);
        }

        let widened = DifficultyBand::around(rating, self.widened_band);
        let filtered = within(widened, candidates);
        if filtered.is_empty() {
            debug!(
                "No lessons within [{}, {}] for rating {}",
                widened.low, widened.high, rating
            );
            (filtered, BandUsed::None)
        } else {
            debug!(
                "Widened band [{}, {}] kept {} of {} lessons",
                widened.low,
                widened.high,
                filtered.len(),
                candidates.len()
            );
            (filtered, BandUsed::Widened)
        }
    }
}

fn within(band: DifficultyBand, candidates: &[LessonProfile]) -> Vec<&LessonProfile> {
    candidates
        .iter()
        .filter(|lesson| band.contains(lesson.difficulty_rating))
        .collect()
}
