use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use log::debug;
use setlog_domain::{
    Clock, CreateError, ExerciseID, ExercisePerformance, ExerciseSet, ExerciseSetRepository,
    PerformanceRepository, ReadError, SystemClock, UpdateError, Workout, WorkoutCategory,
    WorkoutID, WorkoutRepository,
};
use uuid::Uuid;

// Process-local store implementing the full repository surface. Serves
// as the reference backend and as a drop-in while the remote transport
// lives elsewhere. Saved sets are deduplicated by their set id, so
// retries after an ambiguous failure cannot create duplicates.
pub struct InMemoryStorage<C = SystemClock> {
    clock: C,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    workouts: Vec<Workout>,
    sets: Vec<ExerciseSet>,
}

impl InMemoryStorage<SystemClock> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for InMemoryStorage<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> InMemoryStorage<C> {
    #[must_use]
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Clock> WorkoutRepository for InMemoryStorage<C> {
    async fn create_workout(&self, category: &WorkoutCategory) -> Result<Workout, CreateError> {
        let workout = Workout {
            id: Uuid::new_v4().into(),
            category: category.clone(),
            started_at: self.clock.now(),
            ended_at: None,
            paused_duration: Duration::zero(),
        };
        self.state().workouts.push(workout.clone());
        debug!("created workout {}", *workout.id);
        Ok(workout)
    }

    async fn modify_workout(
        &self,
        id: WorkoutID,
        ended_at: DateTime<Utc>,
        paused_duration: Duration,
    ) -> Result<(), UpdateError> {
        let mut state = self.state();
        let Some(workout) = state.workouts.iter_mut().find(|workout| workout.id == id) else {
            return Err(UpdateError::NotFound);
        };
        workout.ended_at = Some(ended_at);
        workout.paused_duration = paused_duration;
        debug!("modified workout {}", *id);
        Ok(())
    }
}

impl<C: Clock> ExerciseSetRepository for InMemoryStorage<C> {
    async fn create_exercise_set(&self, set: &ExerciseSet) -> Result<(), CreateError> {
        let mut state = self.state();
        if !state
            .workouts
            .iter()
            .any(|workout| workout.id == set.workout_id)
        {
            return Err(CreateError::Other("unknown workout".into()));
        }
        if state.sets.iter().any(|existing| existing.id == set.id) {
            debug!("ignored duplicate set {}", *set.id);
            return Ok(());
        }
        state.sets.push(set.clone());
        Ok(())
    }
}

impl<C: Clock> PerformanceRepository for InMemoryStorage<C> {
    // Sets of the most recently started, already ended workout that
    // contains the exercise; the active workout does not count as
    // previous performance.
    async fn read_last_performance(
        &self,
        exercise_id: ExerciseID,
    ) -> Result<Option<ExercisePerformance>, ReadError> {
        let state = self.state();
        let last_workout = state
            .workouts
            .iter()
            .filter(|workout| {
                !workout.is_active()
                    && state
                        .sets
                        .iter()
                        .any(|set| set.workout_id == workout.id && set.exercise_id == exercise_id)
            })
            .max_by_key(|workout| workout.started_at);
        let Some(workout) = last_workout else {
            return Ok(None);
        };

        let mut sets = state
            .sets
            .iter()
            .filter(|set| set.workout_id == workout.id && set.exercise_id == exercise_id)
            .cloned()
            .collect::<Vec<_>>();
        sets.sort_by_key(|set| set.created_at);

        Ok(Some(ExercisePerformance {
            exercise_id,
            sets,
            last_workout_date: Some(workout.started_at),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;
    use setlog_domain::{Reps, Weight};

    use super::*;

    fn timestamp(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[derive(Clone)]
    struct ManualClock(Rc<Cell<DateTime<Utc>>>);

    impl ManualClock {
        fn at(start: DateTime<Utc>) -> Self {
            Self(Rc::new(Cell::new(start)))
        }

        fn advance(&self, duration: Duration) {
            self.0.set(self.0.get() + duration);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.0.get()
        }
    }

    fn exercise_set(id: u128, workout_id: WorkoutID, weight: f32, reps: u32, secs: i64) -> ExerciseSet {
        ExerciseSet {
            id: id.into(),
            workout_id,
            exercise_id: 1.into(),
            weight: Weight::new(weight).unwrap(),
            reps: Reps::new(reps).unwrap(),
            created_at: timestamp(secs),
        }
    }

    #[tokio::test]
    async fn test_create_workout_uses_clock() {
        let storage = InMemoryStorage::with_clock(ManualClock::at(timestamp(100)));
        let workout = storage
            .create_workout(&WorkoutCategory::Legs)
            .await
            .unwrap();
        assert_eq!(workout.started_at, timestamp(100));
        assert_eq!(workout.category, WorkoutCategory::Legs);
        assert!(workout.is_active());
        assert!(!workout.id.is_nil());
    }

    #[tokio::test]
    async fn test_modify_workout() {
        let storage = InMemoryStorage::with_clock(ManualClock::at(timestamp(0)));
        let workout = storage
            .create_workout(&WorkoutCategory::Push)
            .await
            .unwrap();
        storage
            .modify_workout(workout.id, timestamp(90), Duration::seconds(10))
            .await
            .unwrap();

        let state = storage.state();
        let stored = &state.workouts[0];
        assert_eq!(stored.ended_at, Some(timestamp(90)));
        assert_eq!(stored.paused_duration, Duration::seconds(10));
    }

    #[tokio::test]
    async fn test_modify_unknown_workout() {
        let storage = InMemoryStorage::with_clock(ManualClock::at(timestamp(0)));
        assert!(matches!(
            storage
                .modify_workout(1.into(), timestamp(90), Duration::zero())
                .await,
            Err(UpdateError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_create_exercise_set_deduplicates_by_id() {
        let storage = InMemoryStorage::with_clock(ManualClock::at(timestamp(0)));
        let workout = storage
            .create_workout(&WorkoutCategory::Push)
            .await
            .unwrap();
        let set = exercise_set(1, workout.id, 100.0, 5, 10);
        storage.create_exercise_set(&set).await.unwrap();
        storage.create_exercise_set(&set).await.unwrap();
        assert_eq!(storage.state().sets.len(), 1);
    }

    #[tokio::test]
    async fn test_create_exercise_set_requires_workout() {
        let storage = InMemoryStorage::with_clock(ManualClock::at(timestamp(0)));
        let set = exercise_set(1, 9.into(), 100.0, 5, 10);
        assert!(storage.create_exercise_set(&set).await.is_err());
    }

    #[tokio::test]
    async fn test_read_last_performance_picks_latest_ended_workout() {
        let clock = ManualClock::at(timestamp(0));
        let storage = InMemoryStorage::with_clock(clock.clone());

        let first = storage
            .create_workout(&WorkoutCategory::Push)
            .await
            .unwrap();
        storage
            .create_exercise_set(&exercise_set(1, first.id, 95.0, 10, 10))
            .await
            .unwrap();
        storage
            .modify_workout(first.id, timestamp(100), Duration::zero())
            .await
            .unwrap();

        clock.advance(Duration::seconds(1000));
        let second = storage
            .create_workout(&WorkoutCategory::Push)
            .await
            .unwrap();
        storage
            .create_exercise_set(&exercise_set(2, second.id, 100.0, 8, 1010))
            .await
            .unwrap();
        storage
            .create_exercise_set(&exercise_set(3, second.id, 100.0, 6, 1020))
            .await
            .unwrap();
        storage
            .modify_workout(second.id, timestamp(1100), Duration::zero())
            .await
            .unwrap();

        // Sets of a still active workout are not previous performance.
        clock.advance(Duration::seconds(1000));
        let active = storage
            .create_workout(&WorkoutCategory::Push)
            .await
            .unwrap();
        storage
            .create_exercise_set(&exercise_set(4, active.id, 110.0, 5, 2010))
            .await
            .unwrap();

        let performance = storage
            .read_last_performance(1.into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(performance.last_workout_date, Some(timestamp(1000)));
        assert_eq!(
            performance
                .sets
                .iter()
                .map(ExerciseSet::display_text)
                .collect::<Vec<_>>(),
            vec!["100 × 8", "100 × 6"]
        );
        assert_eq!(performance.summary(), "100 × 8 (best)");
    }

    #[tokio::test]
    async fn test_read_last_performance_unknown_exercise() {
        let storage = InMemoryStorage::with_clock(ManualClock::at(timestamp(0)));
        assert_eq!(storage.read_last_performance(9.into()).await.unwrap(), None);
    }
}
