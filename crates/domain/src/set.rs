use chrono::{DateTime, Utc};
use derive_more::{Deref, Display, Into};
use uuid::Uuid;

use crate::{CreateError, ExerciseID, WorkoutID};

#[allow(async_fn_in_trait)]
pub trait ExerciseSetRepository {
    async fn create_exercise_set(&self, set: &ExerciseSet) -> Result<(), CreateError>;
}

#[derive(Debug, Default, Display, Clone, Copy, Into, PartialEq, PartialOrd)]
pub struct Weight(f32);

impl Weight {
    pub fn new(value: f32) -> Result<Self, WeightError> {
        if !(0.0..1000.0).contains(&value) {
            return Err(WeightError::OutOfRange);
        }

        let tenths = value * 10.0;

        if (tenths - tenths.round()).abs() > 1e-4 {
            return Err(WeightError::InvalidResolution);
        }

        Ok(Self(value))
    }
}

impl TryFrom<&str> for Weight {
    type Error = WeightError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.parse::<f32>() {
            Ok(parsed_value) => Weight::new(parsed_value),
            Err(_) => Err(WeightError::ParseError),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum WeightError {
    #[error("Weight must be in the range 0.0 to 999.9 kg")]
    OutOfRange,
    #[error("Weight must be a multiple of 0.1 kg")]
    InvalidResolution,
    #[error("Weight must be a decimal")]
    ParseError,
}

#[derive(Debug, Default, Display, Clone, Copy, Into, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reps(u32);

impl Reps {
    pub fn new(value: u32) -> Result<Self, RepsError> {
        if !(0..1000).contains(&value) {
            return Err(RepsError::OutOfRange);
        }

        Ok(Self(value))
    }
}

impl TryFrom<&str> for Reps {
    type Error = RepsError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.parse::<u32>() {
            Ok(parsed_value) => Reps::new(parsed_value),
            Err(_) => Err(RepsError::ParseError),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RepsError {
    #[error("Reps must be in the range 0 to 999")]
    OutOfRange,
    #[error("Reps must be an integer")]
    ParseError,
}

// Renders without a decimal point for integral values, with one decimal
// place otherwise. Weights are validated to 0.1 kg resolution.
#[must_use]
pub fn fmt_weight(weight: Weight) -> String {
    let value = f32::from(weight);
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

#[derive(Deref, Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SetID(Uuid);

impl SetID {
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl From<Uuid> for SetID {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<u128> for SetID {
    fn from(value: u128) -> Self {
        Self(Uuid::from_bytes(value.to_be_bytes()))
    }
}

// One not-yet-persisted set row of the active session. The id is
// assigned at creation and reused on save retries, serving as the
// deduplication token for backends that support one.
#[derive(Debug, Clone, PartialEq)]
pub struct SetDraft {
    pub id: SetID,
    pub weight: Weight,
    pub reps: Reps,
    pub completed: bool,
}

impl SetDraft {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: SetID::random(),
            weight: Weight::default(),
            reps: Reps::default(),
            completed: false,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        f32::from(self.weight) > 0.0 && u32::from(self.reps) > 0
    }

    #[must_use]
    pub fn volume(&self) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        {
            f32::from(self.weight) * u32::from(self.reps) as f32
        }
    }

    #[must_use]
    pub fn display_text(&self) -> String {
        if self.is_valid() {
            format!("{} × {}", fmt_weight(self.weight), self.reps)
        } else {
            "- × -".to_string()
        }
    }
}

impl Default for SetDraft {
    fn default() -> Self {
        Self::new()
    }
}

// The persisted form of a set, as handed to the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseSet {
    pub id: SetID,
    pub workout_id: WorkoutID,
    pub exercise_id: ExerciseID,
    pub weight: Weight,
    pub reps: Reps,
    pub created_at: DateTime<Utc>,
}

impl ExerciseSet {
    #[must_use]
    pub fn volume(&self) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        {
            f32::from(self.weight) * u32::from(self.reps) as f32
        }
    }

    #[must_use]
    pub fn display_text(&self) -> String {
        format!("{} × {}", fmt_weight(self.weight), self.reps)
    }
}
