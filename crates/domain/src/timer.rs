use chrono::{DateTime, Duration, Utc};

// Wall-clock access is injected so session arithmetic can be tested
// against a manually driven clock.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// Tracks elapsed active time of one session. While paused, elapsed is
// frozen at the instant the pause began; the pause interval is folded
// into the accumulated paused duration on resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTimer {
    started_at: DateTime<Utc>,
    paused_duration: Duration,
    pause_started_at: Option<DateTime<Utc>>,
}

impl SessionTimer {
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            paused_duration: Duration::zero(),
            pause_started_at: None,
        }
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn paused_duration(&self) -> Duration {
        self.paused_duration
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.pause_started_at.is_some()
    }

    // No-op if already paused.
    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.pause_started_at.is_none() {
            self.pause_started_at = Some(now);
        }
    }

    // No-op if not paused.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if let Some(pause_started_at) = self.pause_started_at.take() {
            self.paused_duration += now - pause_started_at;
        }
    }

    #[must_use]
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.pause_started_at.unwrap_or(now) - self.started_at - self.paused_duration
    }

    #[must_use]
    pub fn formatted(&self, now: DateTime<Utc>) -> String {
        format_duration(self.elapsed(now))
    }
}

// H:MM:SS above one hour, M:SS below, truncated to whole seconds.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = total_seconds % 3600 / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
