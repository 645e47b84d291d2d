use anyhow::{Context, Result};
use time::{Duration, OffsetDateTime, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Today,
    Yesterday,
    Last7Days,
    Last30Days,
    MonthToDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl TimeWindow {
    pub const ALL: [Self; 5] = [
        Self::Today,
        Self::Yesterday,
        Self::Last7Days,
        Self::Last30Days,
        Self::MonthToDate,
    ];

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let candidate = raw.trim();
        Self::ALL
            .into_iter()
            .find(|window| window.key().eq_ignore_ascii_case(candidate))
    }

    /// Unrecognized names fall back to the trailing seven days.
    #[must_use]
    pub fn resolve(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::Last7Days)
    }

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::Last7Days => "last_7_days",
            Self::Last30Days => "last_30_days",
            Self::MonthToDate => "month_to_date",
        }
    }

    pub fn bounds(self, now: OffsetDateTime) -> Result<WindowBounds> {
        let midnight = now.replace_time(Time::MIDNIGHT);
        let bounds = match self {
            Self::Today => WindowBounds {
                start: midnight,
                end: now,
            },
            Self::Yesterday => WindowBounds {
                start: midnight - Duration::days(1),
                end: midnight,
            },
            Self::Last7Days => WindowBounds {
                start: now - Duration::days(7),
                end: now,
            },
            Self::Last30Days => WindowBounds {
                start: now - Duration::days(30),
                end: now,
            },
            Self::MonthToDate => WindowBounds {
                start: midnight
                    .replace_day(1)
                    .context("failed to resolve first day of month")?,
                end: now,
            },
        };
        Ok(bounds)
    }
}
