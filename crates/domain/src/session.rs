use std::collections::BTreeMap;

use chrono::Duration;
use log::{debug, error};

use crate::{
    Clock, CreateError, Exercise, ExerciseID, ExercisePerformance, ExerciseSet,
    ExerciseSetRepository, Reps, SessionTimer, SetDraft, UpdateError, Weight, Workout,
    WorkoutCategory, WorkoutRepository, format_duration,
};

macro_rules! log_on_error {
    ($func: expr, $error: ident, $action: literal, $entity: literal) => {{
        let result = $func.await;
        match result {
            Ok(_) => {}
            Err(ref err) => match err {
                $error::Storage(crate::StorageError::NoConnection) => {
                    debug!("failed to {} {}: {err}", $action, $entity);
                }
                _ => {
                    error!("failed to {} {}: {err}", $action, $entity);
                }
            },
        }
        result
    }};
}

// An exercise added to the running session: the library exercise, its
// ordered draft sets (index = set number) and the cached sets of the
// previous workout containing it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseEntry {
    pub exercise: Exercise,
    pub sets: Vec<SetDraft>,
    pub last_performance: Option<ExercisePerformance>,
}

impl ExerciseEntry {
    #[must_use]
    pub fn completed_sets(&self) -> usize {
        self.sets.iter().filter(|set| set.completed).count()
    }

    fn has_completed_sets(&self) -> bool {
        self.sets.iter().any(|set| set.completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    Paused,
    Ended,
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("session has ended")]
    Ended,
    #[error("exercise is not part of the session")]
    UnknownExercise,
    #[error("set index {index} out of range ({len} sets)")]
    SetIndexOutOfRange { index: usize, len: usize },
    #[error("set has no valid weight and reps")]
    InvalidSet,
    #[error("set has already been saved")]
    SetAlreadySaved,
    #[error("saved sets are read-only")]
    SetCompleted,
    #[error(transparent)]
    Create(#[from] CreateError),
    #[error(transparent)]
    Update(#[from] UpdateError),
}

// Immutable view of the session state, handed to observers after every
// successful mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub workout: Workout,
    pub phase: SessionPhase,
    pub elapsed: Duration,
    pub formatted_duration: String,
    pub exercise_count: usize,
    pub total_sets: usize,
    pub completed_sets: usize,
    pub entries: Vec<ExerciseEntry>,
}

// State machine of one active workout. Exists only between a successful
// `start` and the end of the session; callers hold the absent case as
// `Option<WorkoutSession<_, _>>`. All mutation goes through `&mut self`,
// which serializes operations on one session by construction.
pub struct WorkoutSession<R, C> {
    repository: R,
    clock: C,
    workout: Workout,
    timer: SessionTimer,
    entries: Vec<ExerciseEntry>,
    performances: BTreeMap<ExerciseID, ExercisePerformance>,
    observers: Vec<Box<dyn Fn(&SessionSnapshot)>>,
}

impl<R, C> WorkoutSession<R, C>
where
    R: WorkoutRepository + ExerciseSetRepository,
    C: Clock,
{
    // Atomic create-or-fail: on repository failure no session value
    // exists and no local state has been touched.
    pub async fn start(
        repository: R,
        clock: C,
        category: WorkoutCategory,
    ) -> Result<Self, CreateError> {
        let workout = log_on_error!(
            repository.create_workout(&category),
            CreateError,
            "create",
            "workout"
        )?;
        let timer = SessionTimer::new(workout.started_at);
        Ok(Self {
            repository,
            clock,
            workout,
            timer,
            entries: Vec::new(),
            performances: BTreeMap::new(),
            observers: Vec::new(),
        })
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.workout.ended_at.is_some() {
            SessionPhase::Ended
        } else if self.timer.is_paused() {
            SessionPhase::Paused
        } else {
            SessionPhase::Active
        }
    }

    #[must_use]
    pub fn workout(&self) -> &Workout {
        &self.workout
    }

    #[must_use]
    pub fn entries(&self) -> &[ExerciseEntry] {
        &self.entries
    }

    #[must_use]
    pub fn exercise_count(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn total_sets(&self) -> usize {
        self.entries.iter().map(|entry| entry.sets.len()).sum()
    }

    #[must_use]
    pub fn completed_sets(&self) -> usize {
        self.entries.iter().map(ExerciseEntry::completed_sets).sum()
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed(self.clock.now())
    }

    #[must_use]
    pub fn formatted_duration(&self) -> String {
        format_duration(self.elapsed())
    }

    pub fn subscribe(&mut self, observer: impl Fn(&SessionSnapshot) + 'static) {
        self.observers.push(Box::new(observer));
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            workout: self.workout.clone(),
            phase: self.phase(),
            elapsed: self.elapsed(),
            formatted_duration: self.formatted_duration(),
            exercise_count: self.exercise_count(),
            total_sets: self.total_sets(),
            completed_sets: self.completed_sets(),
            entries: self.entries.clone(),
        }
    }

    pub fn toggle_pause(&mut self) {
        match self.phase() {
            SessionPhase::Active => self.timer.pause(self.clock.now()),
            SessionPhase::Paused => self.timer.resume(self.clock.now()),
            SessionPhase::Ended => return,
        }
        self.notify();
    }

    // No-op if the exercise is already part of the session or the
    // session has ended. New exercises go to the top of the list.
    pub fn add_exercise(&mut self, exercise: &Exercise) {
        if self.phase() == SessionPhase::Ended || self.entry(exercise.id).is_some() {
            return;
        }
        self.entries.insert(
            0,
            ExerciseEntry {
                exercise: exercise.clone(),
                sets: vec![SetDraft::new()],
                last_performance: self.performances.get(&exercise.id).cloned(),
            },
        );
        self.notify();
    }

    // No-op if the exercise is absent; an exercise with completed
    // (persisted) sets cannot be removed.
    pub fn remove_exercise(&mut self, exercise_id: ExerciseID) -> Result<(), SessionError> {
        self.ensure_open()?;
        let Some(position) = self
            .entries
            .iter()
            .position(|entry| entry.exercise.id == exercise_id)
        else {
            return Ok(());
        };
        if self.entries[position].has_completed_sets() {
            return Err(SessionError::SetCompleted);
        }
        self.entries.remove(position);
        self.notify();
        Ok(())
    }

    // No-op if the exercise is absent or the session has ended.
    pub fn add_set(&mut self, exercise_id: ExerciseID) {
        if self.phase() == SessionPhase::Ended {
            return;
        }
        let Some(entry) = self.entry_mut(exercise_id) else {
            return;
        };
        entry.sets.push(SetDraft::new());
        self.notify();
    }

    // Out-of-range indices are a caller bug and fail fast instead of
    // being clamped.
    pub fn remove_set(
        &mut self,
        exercise_id: ExerciseID,
        index: usize,
    ) -> Result<(), SessionError> {
        self.ensure_open()?;
        let entry = self
            .entry_mut(exercise_id)
            .ok_or(SessionError::UnknownExercise)?;
        let len = entry.sets.len();
        let Some(draft) = entry.sets.get(index) else {
            return Err(SessionError::SetIndexOutOfRange { index, len });
        };
        if draft.completed {
            return Err(SessionError::SetCompleted);
        }
        entry.sets.remove(index);
        self.notify();
        Ok(())
    }

    // Called on every field change; purely local and leaves the
    // completed flag untouched.
    pub fn update_set(
        &mut self,
        exercise_id: ExerciseID,
        index: usize,
        weight: Weight,
        reps: Reps,
    ) -> Result<(), SessionError> {
        let draft = self.draft_mut(exercise_id, index)?;
        if draft.completed {
            return Err(SessionError::SetCompleted);
        }
        draft.weight = weight;
        draft.reps = reps;
        self.notify();
        Ok(())
    }

    // Persists one draft. Validation happens before the repository is
    // involved; on failure the draft stays unmarked so the caller can
    // retry with the same set id.
    pub async fn save_set(
        &mut self,
        exercise_id: ExerciseID,
        index: usize,
    ) -> Result<(), SessionError> {
        self.ensure_open()?;
        let entry = self
            .entry(exercise_id)
            .ok_or(SessionError::UnknownExercise)?;
        let len = entry.sets.len();
        let draft = entry
            .sets
            .get(index)
            .ok_or(SessionError::SetIndexOutOfRange { index, len })?;
        if draft.completed {
            return Err(SessionError::SetAlreadySaved);
        }
        if !draft.is_valid() {
            return Err(SessionError::InvalidSet);
        }

        let set = ExerciseSet {
            id: draft.id,
            workout_id: self.workout.id,
            exercise_id,
            weight: draft.weight,
            reps: draft.reps,
            created_at: self.clock.now(),
        };
        log_on_error!(
            self.repository.create_exercise_set(&set),
            CreateError,
            "create",
            "exercise set"
        )?;

        if let Some(draft) = self
            .entry_mut(exercise_id)
            .and_then(|entry| entry.sets.get_mut(index))
        {
            draft.completed = true;
        }
        self.notify();
        Ok(())
    }

    // Folds an open pause into the accumulated paused duration before
    // persisting. The fold is pure local state and is kept even when
    // the repository call fails; the session then stays active so a
    // transient failure never loses an in-progress workout.
    pub async fn end(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.timer.resume(self.clock.now());
        self.workout.paused_duration = self.timer.paused_duration();

        let ended_at = self.clock.now();
        log_on_error!(
            self.repository
                .modify_workout(self.workout.id, ended_at, self.workout.paused_duration),
            UpdateError,
            "modify",
            "workout"
        )?;

        self.workout.ended_at = Some(ended_at);
        self.entries.clear();
        self.performances.clear();
        self.notify();
        Ok(())
    }

    // Merges a background performance fetch. The cache feeds later
    // `add_exercise` calls; the entry is only written if the exercise
    // is still part of the session.
    pub fn merge_performance(&mut self, performance: ExercisePerformance) {
        if self.phase() == SessionPhase::Ended {
            return;
        }
        let exercise_id = performance.exercise_id;
        if let Some(entry) = self.entry_mut(exercise_id) {
            entry.last_performance = Some(performance.clone());
        }
        self.performances.insert(exercise_id, performance);
        self.notify();
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.phase() == SessionPhase::Ended {
            return Err(SessionError::Ended);
        }
        Ok(())
    }

    fn entry(&self, exercise_id: ExerciseID) -> Option<&ExerciseEntry> {
        self.entries
            .iter()
            .find(|entry| entry.exercise.id == exercise_id)
    }

    fn entry_mut(&mut self, exercise_id: ExerciseID) -> Option<&mut ExerciseEntry> {
        self.entries
            .iter_mut()
            .find(|entry| entry.exercise.id == exercise_id)
    }

    fn draft_mut(
        &mut self,
        exercise_id: ExerciseID,
        index: usize,
    ) -> Result<&mut SetDraft, SessionError> {
        self.ensure_open()?;
        let entry = self
            .entry_mut(exercise_id)
            .ok_or(SessionError::UnknownExercise)?;
        let len = entry.sets.len();
        entry
            .sets
            .get_mut(index)
            .ok_or(SessionError::SetIndexOutOfRange { index, len })
    }

    fn notify(&self) {
        if self.observers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for observer in &self.observers {
            observer(&snapshot);
        }
    }
}
