use std::fmt;

use chrono::{DateTime, Duration, Utc};
use derive_more::Deref;
use uuid::Uuid;

use crate::{CreateError, Name, UpdateError, format_duration};

#[allow(async_fn_in_trait)]
pub trait WorkoutRepository {
    async fn create_workout(&self, category: &WorkoutCategory) -> Result<Workout, CreateError>;
    async fn modify_workout(
        &self,
        id: WorkoutID,
        ended_at: DateTime<Utc>,
        paused_duration: Duration,
    ) -> Result<(), UpdateError>;
}

// The durable workout record. Created by the repository with a
// server-assigned id and canonical start time, finalized once with the
// end time and the total paused duration.
#[derive(Debug, Clone, PartialEq)]
pub struct Workout {
    pub id: WorkoutID,
    pub category: WorkoutCategory,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub paused_duration: Duration,
}

impl Workout {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    #[must_use]
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.ended_at.unwrap_or(now) - self.started_at - self.paused_duration
    }

    #[must_use]
    pub fn formatted_duration(&self, now: DateTime<Utc>) -> String {
        format_duration(self.duration(now))
    }
}

#[derive(Deref, Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct WorkoutID(Uuid);

impl WorkoutID {
    #[must_use]
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl From<Uuid> for WorkoutID {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<u128> for WorkoutID {
    fn from(value: u128) -> Self {
        Self(Uuid::from_bytes(value.to_be_bytes()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkoutCategory {
    Push,
    Pull,
    Legs,
    Shoulders,
    Custom(Name),
}

impl WorkoutCategory {
    // The fixed categories offered for selection. Custom is excluded as
    // it carries a user-provided name.
    #[must_use]
    pub fn predefined() -> [WorkoutCategory; 4] {
        [
            WorkoutCategory::Push,
            WorkoutCategory::Pull,
            WorkoutCategory::Legs,
            WorkoutCategory::Shoulders,
        ]
    }
}

impl fmt::Display for WorkoutCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkoutCategory::Push => write!(f, "Push Day"),
            WorkoutCategory::Pull => write!(f, "Pull Day"),
            WorkoutCategory::Legs => write!(f, "Leg Day"),
            WorkoutCategory::Shoulders => write!(f, "Shoulder Day"),
            WorkoutCategory::Custom(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn timestamp(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn workout() -> Workout {
        Workout {
            id: 1.into(),
            category: WorkoutCategory::Push,
            started_at: timestamp(0),
            ended_at: None,
            paused_duration: Duration::zero(),
        }
    }

    #[rstest]
    #[case(WorkoutCategory::Push, "Push Day")]
    #[case(WorkoutCategory::Pull, "Pull Day")]
    #[case(WorkoutCategory::Legs, "Leg Day")]
    #[case(WorkoutCategory::Shoulders, "Shoulder Day")]
    #[case(
        WorkoutCategory::Custom(Name::new("Arms & Abs").unwrap()),
        "Arms & Abs"
    )]
    fn test_workout_category_display(#[case] category: WorkoutCategory, #[case] expected: &str) {
        assert_eq!(category.to_string(), expected);
    }

    #[test]
    fn test_workout_category_predefined() {
        assert_eq!(
            WorkoutCategory::predefined(),
            [
                WorkoutCategory::Push,
                WorkoutCategory::Pull,
                WorkoutCategory::Legs,
                WorkoutCategory::Shoulders,
            ]
        );
    }

    #[test]
    fn test_workout_is_active() {
        let mut workout = workout();
        assert!(workout.is_active());
        workout.ended_at = Some(timestamp(60));
        assert!(!workout.is_active());
    }

    #[test]
    fn test_workout_duration_active() {
        let mut workout = workout();
        workout.paused_duration = Duration::seconds(10);
        assert_eq!(workout.duration(timestamp(70)), Duration::seconds(60));
        assert_eq!(workout.formatted_duration(timestamp(70)), "1:00");
    }

    #[test]
    fn test_workout_duration_ended_ignores_now() {
        let mut workout = workout();
        workout.ended_at = Some(timestamp(125));
        assert_eq!(workout.duration(timestamp(9999)), Duration::seconds(125));
        assert_eq!(workout.formatted_duration(timestamp(9999)), "2:05");
    }

    #[test]
    fn test_workout_id_nil() {
        assert!(WorkoutID::nil().is_nil());
        assert_eq!(WorkoutID::nil(), WorkoutID::default());
    }
}
