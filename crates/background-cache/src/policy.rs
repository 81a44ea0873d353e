//! Expiration rules derived from the user's schedule

use crate::settings::ScheduleSettings;
use crate::types::{LocalImageMode, SchedulePolicy, Source};
use std::time::Duration;

/// How a source's cached entry should be judged under the current schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryRule {
    /// Only an explicit user action replaces the background
    Never,
    /// A fresh image is wanted on every session
    Always,
    /// Local gallery on every-session: expired, and the previous image must
    /// be released before the next one is shown
    RotateGallery,
    /// Expired once the entry is at least `max_age` old
    MaxAge,
}

impl ExpiryRule {
    pub fn for_source(source: Source, settings: &ScheduleSettings) -> Self {
        match settings.schedule {
            SchedulePolicy::EverySession
                if source == Source::Local && settings.local_mode == LocalImageMode::Gallery =>
            {
                ExpiryRule::RotateGallery
            }
            SchedulePolicy::Manual => ExpiryRule::Never,
            SchedulePolicy::EverySession => ExpiryRule::Always,
            SchedulePolicy::Hourly | SchedulePolicy::Daily => ExpiryRule::MaxAge,
        }
    }
}

/// Whether an entry written at `written_at` has aged past `max_age`.
/// A missing entry is always stale.
pub fn is_stale(written_at: Option<i64>, now_millis: i64, max_age: Duration) -> bool {
    match written_at {
        Some(written_at) => {
            let age = now_millis.saturating_sub(written_at);
            age >= 0 && age as u128 >= max_age.as_millis()
        }
        None => true,
    }
}
