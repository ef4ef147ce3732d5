//! Reminder rules and the due-ness predicate.
//!
//! A reminder stores a local time-of-day together with the UTC offset it was
//! entered in, plus the weekdays it is active on. It is due at an instant `T`
//! when `T` shifted into the reminder's offset lands on the same minute and
//! on an active weekday.
//!
//! Matching is minute-granular, so the job has to be triggered at least once
//! a minute. Minutes without an invocation are not caught up later: the
//! occurrence is simply never notified.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use std::fmt;

/// The kind of subject a reminder is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Corporate prayer campaigns, gated by each user's notification settings.
    Corporate,
    /// Prayer groups, notifying every member.
    Group,
    /// Corporate prayers a user joined personally.
    Personal,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Corporate, Category::Group, Category::Personal];

    /// Whether the campaign start/end dates restrict this category.
    pub fn has_campaign_window(self) -> bool {
        matches!(self, Category::Corporate | Category::Personal)
    }
}

impl std::str::FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Category, Self::Err> {
        Ok(match s.trim() {
            "corporate" => Category::Corporate,
            "group" => Category::Group,
            "personal" => Category::Personal,
            other => anyhow::bail!("unknown reminder category `{other}`"),
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Category::Corporate => "corporate",
            Category::Group => "group",
            Category::Personal => "personal",
        })
    }
}

/// Set of active weekdays, numbered 0 (Sunday) to 6 (Saturday).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Weekdays(u8);

impl Weekdays {
    /// Parses the stored `days` column.
    ///
    /// Every digit `0`-`6` occurring in the text marks that day active, so
    /// `"135"`, `"1,3,5"` and `"{1,3,5}"` are all Monday, Wednesday and Friday.
    pub fn parse(stored: &str) -> Weekdays {
        stored
            .chars()
            .filter_map(|c| c.to_digit(10))
            .filter(|d| *d <= 6)
            .fold(Weekdays::default(), |days, d| Weekdays(days.0 | 1 << d))
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_sunday()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<Weekday> for Weekdays {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        iter.into_iter().fold(Weekdays::default(), |days, day| {
            Weekdays(days.0 | 1 << day.num_days_from_sunday())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub id: String,
    /// Notification body.
    pub body: String,
    pub local_time: NaiveTime,
    pub offset: FixedOffset,
    pub days: Weekdays,
}

impl Reminder {
    /// Builds the offset from the signed hour and minute parts the store
    /// reports for a `TIME WITH TIME ZONE` value.
    pub fn offset_from_parts(hours: i32, minutes: i32) -> Option<FixedOffset> {
        FixedOffset::east_opt(hours.checked_mul(3600)?.checked_add(minutes.checked_mul(60)?)?)
    }

    /// `true` when `now`, shifted into the reminder's offset, falls on the
    /// reminder's minute and on one of its active weekdays.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.offset);
        same_minute(local.time(), self.local_time) && self.days.contains(local.weekday())
    }

    /// Calendar date of `now` in the reminder's offset.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }
}

fn same_minute(a: NaiveTime, b: NaiveTime) -> bool {
    (a.hour(), a.minute()) == (b.hour(), b.minute())
}

/// Inclusive date range of a corporate prayer campaign. A missing bound is
/// open on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CampaignWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl CampaignWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
    }
}

/// The corporate prayer, group or user a notification is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: String,
    pub title: String,
}

/// A reminder bound to a subject for one user, with that user's device tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub category: Category,
    pub reminder: Reminder,
    pub subject: Subject,
    pub window: CampaignWindow,
    /// The user's per-subject notification flag. Always `true` outside the
    /// corporate category.
    pub opted_in: bool,
    pub tokens: Vec<String>,
}

impl Binding {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.reminder.is_due(now) {
            return false;
        }
        if self.category.has_campaign_window()
            && !self.window.contains(self.reminder.local_date(now))
        {
            return false;
        }
        self.category != Category::Corporate || self.opted_in
    }
}
