use chrono::{DateTime, Utc};

use crate::{ExerciseID, ExerciseSet, ReadError, fmt_weight};

#[allow(async_fn_in_trait)]
pub trait PerformanceRepository {
    async fn read_last_performance(
        &self,
        exercise_id: ExerciseID,
    ) -> Result<Option<ExercisePerformance>, ReadError>;
}

// The sets of the most recent prior workout containing an exercise.
// Fetched once per exercise on a best-effort basis and never mutated by
// the session.
#[derive(Debug, Clone, PartialEq)]
pub struct ExercisePerformance {
    pub exercise_id: ExerciseID,
    pub sets: Vec<ExerciseSet>,
    pub last_workout_date: Option<DateTime<Utc>>,
}

impl ExercisePerformance {
    // Highest volume wins, first occurrence on ties.
    #[must_use]
    pub fn best_set(&self) -> Option<&ExerciseSet> {
        self.sets
            .iter()
            .reduce(|best, set| if set.volume() > best.volume() { set } else { best })
    }

    #[must_use]
    pub fn summary(&self) -> String {
        let Some(first) = self.sets.first() else {
            return "No previous data".to_string();
        };

        if self.sets.len() == 1 {
            return first.display_text();
        }

        let uniform = self
            .sets
            .iter()
            .all(|set| set.weight == first.weight && set.reps == first.reps);

        if uniform {
            format!(
                "{} × {} × {}",
                fmt_weight(first.weight),
                first.reps,
                self.sets.len()
            )
        } else {
            let best = self.best_set().unwrap_or(first);
            format!("{} (best)", best.display_text())
        }
    }
}
