//! Canonical application state and its persisted JSON shape.
//!
//! `AppState` is the single unit of persistence and the single unit
//! exchanged with the remote store. Field names serialize as camelCase to
//! stay byte-compatible with blobs written by earlier application versions
//! (`weekStart`, `completedTaskIds`, `isBonus`, …). Every field carries a
//! serde default so partially-written blobs deserialize instead of failing;
//! structural repair of older generations lives in [`crate::migrate`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar;

/// Schema generation written by this version (`schemaVersion`).
///
/// Generation detection stays structural because pre-tag blobs exist; see
/// [`crate::migrate`].
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Default parent PIN for a freshly seeded household.
pub const DEFAULT_PARENT_PIN: &str = "1234";

/// Opaque, stable task identifier. Generated once, never reassigned.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh unique id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A recurring task on the roster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub emoji: String,
    /// Bonus tasks are always available, never scheduled, and earn a
    /// permanent star on first completion per day.
    pub is_bonus: bool,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl Task {
    /// Create a task with a fresh id and the current creation timestamp.
    pub fn new(title: impl Into<String>, emoji: impl Into<String>, is_bonus: bool) -> Self {
        Self {
            id: TaskId::generate(),
            title: title.into(),
            emoji: emoji.into(),
            is_bonus,
            created_at: chrono::Local::now().to_rfc3339(),
        }
    }
}

/// Named weekday, Monday-first. Serializes as `"mon"`…`"sun"`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    /// All seven weekdays in Monday-first order.
    pub const ALL: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    /// Short display label.
    pub fn label(self) -> &'static str {
        match self {
            Weekday::Mon => "Mon",
            Weekday::Tue => "Tue",
            Weekday::Wed => "Wed",
            Weekday::Thu => "Thu",
            Weekday::Fri => "Fri",
            Weekday::Sat => "Sat",
            Weekday::Sun => "Sun",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered task-id list per weekday. Only non-bonus ids appear; an id may
/// be scheduled on several days.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklySchedule {
    pub mon: Vec<TaskId>,
    pub tue: Vec<TaskId>,
    pub wed: Vec<TaskId>,
    pub thu: Vec<TaskId>,
    pub fri: Vec<TaskId>,
    pub sat: Vec<TaskId>,
    pub sun: Vec<TaskId>,
}

impl WeeklySchedule {
    pub fn day(&self, day: Weekday) -> &Vec<TaskId> {
        match day {
            Weekday::Mon => &self.mon,
            Weekday::Tue => &self.tue,
            Weekday::Wed => &self.wed,
            Weekday::Thu => &self.thu,
            Weekday::Fri => &self.fri,
            Weekday::Sat => &self.sat,
            Weekday::Sun => &self.sun,
        }
    }

    pub fn day_mut(&mut self, day: Weekday) -> &mut Vec<TaskId> {
        match day {
            Weekday::Mon => &mut self.mon,
            Weekday::Tue => &mut self.tue,
            Weekday::Wed => &mut self.wed,
            Weekday::Thu => &mut self.thu,
            Weekday::Fri => &mut self.fri,
            Weekday::Sat => &mut self.sat,
            Weekday::Sun => &mut self.sun,
        }
    }

    /// Remove `id` from every day's list.
    pub fn remove_everywhere(&mut self, id: &TaskId) {
        for day in Weekday::ALL {
            self.day_mut(day).retain(|existing| existing != id);
        }
    }

    /// Whether `id` is scheduled on any day.
    pub fn contains_anywhere(&self, id: &TaskId) -> bool {
        Weekday::ALL.iter().any(|&day| self.day(day).contains(id))
    }
}

/// Completion/skip status for one calendar date.
///
/// A task id sits in at most one of the two sets for a given date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DayProgress {
    pub date: NaiveDate,
    pub completed_task_ids: Vec<TaskId>,
    pub skipped_task_ids: Vec<TaskId>,
}

impl DayProgress {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            completed_task_ids: Vec::new(),
            skipped_task_ids: Vec::new(),
        }
    }

    pub fn is_completed(&self, id: &TaskId) -> bool {
        self.completed_task_ids.contains(id)
    }

    pub fn is_skipped(&self, id: &TaskId) -> bool {
        self.skipped_task_ids.contains(id)
    }
}

/// The current, mutable week: its Monday plus exactly seven day entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeekData {
    pub week_start: NaiveDate,
    pub days: Vec<DayProgress>,
}

impl WeekData {
    /// A fresh week at `monday` with all seven days empty.
    pub fn empty(monday: NaiveDate) -> Self {
        Self {
            week_start: monday,
            days: calendar::dates_of_week(monday)
                .into_iter()
                .map(DayProgress::empty)
                .collect(),
        }
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayProgress> {
        self.days.iter().find(|day| day.date == date)
    }

    pub fn day_mut(&mut self, date: NaiveDate) -> Option<&mut DayProgress> {
        self.days.iter_mut().find(|day| day.date == date)
    }

    /// Rebuild `days` to exactly the seven dates of `week_start`, carrying
    /// over any existing entry with a matching date. Returns whether the
    /// list changed. Persisted blobs can arrive with an empty or partial
    /// list; every in-memory week must hold all seven days or same-week
    /// toggles would silently miss.
    pub fn rebuild_days(&mut self) -> bool {
        let dates = calendar::dates_of_week(self.week_start);
        let aligned = self.days.len() == 7
            && self
                .days
                .iter()
                .zip(&dates)
                .all(|(day, &date)| day.date == date);
        if aligned {
            return false;
        }

        let mut old = std::mem::take(&mut self.days);
        self.days = dates
            .into_iter()
            .map(|date| {
                old.iter()
                    .position(|day| day.date == date)
                    .map(|i| old.swap_remove(i))
                    .unwrap_or_else(|| DayProgress::empty(date))
            })
            .collect();
        true
    }
}

impl Default for WeekData {
    fn default() -> Self {
        Self::empty(calendar::monday_of(calendar::today()))
    }
}

/// Immutable summary of a closed week. Created once at rollover.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeekHistory {
    pub week_start: NaiveDate,
    /// 0–100, rounded.
    pub completion_pct: u8,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub bonus_stars_earned: u32,
}

/// One `(title, emoji)` pair inside a saved template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateEntry {
    pub title: String,
    pub emoji: String,
}

/// A named, reusable schedule snapshot. Expressed as `(title, emoji)` pairs
/// rather than ids so it survives task deletion and recreation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeeklyTemplate {
    pub name: String,
    pub days: BTreeMap<Weekday, Vec<TemplateEntry>>,
    pub created_at: String,
}

/// Aggregate root: the whole household state.
///
/// Owned exclusively by the sync engine in memory; everything else receives
/// snapshots. Never deleted, only entities inside it are removed/archived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppState {
    pub schema_version: u32,
    pub tasks: Vec<Task>,
    pub weekly_schedule: WeeklySchedule,
    pub current_week: WeekData,
    pub parent_pin: String,
    /// Closed weeks, oldest first. Append-only.
    pub week_history: Vec<WeekHistory>,
    /// Cumulative bonus stars ever earned. Never decremented.
    pub bonus_stars: u64,
    pub templates: Vec<WeeklyTemplate>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            tasks: Vec::new(),
            weekly_schedule: WeeklySchedule::default(),
            current_week: WeekData::default(),
            parent_pin: DEFAULT_PARENT_PIN.to_owned(),
            week_history: Vec::new(),
            bonus_stars: 0,
            templates: Vec::new(),
        }
    }
}

impl AppState {
    /// First-run state: three starter tasks scheduled Monday–Friday, empty
    /// weekend, default PIN, current week at the Monday containing `today`.
    pub fn seed(today: NaiveDate) -> Self {
        let starters = [
            ("Read for 30 mins", "📚"),
            ("TTRS (Maths)", "🔢"),
            ("Handwriting", "✍️"),
        ];

        let tasks: Vec<Task> = starters
            .iter()
            .map(|&(title, emoji)| Task::new(title, emoji, false))
            .collect();

        let mut schedule = WeeklySchedule::default();
        for day in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ] {
            *schedule.day_mut(day) = tasks.iter().map(|t| t.id.clone()).collect();
        }

        Self {
            tasks,
            weekly_schedule: schedule,
            current_week: WeekData::empty(calendar::monday_of(today)),
            ..Self::default()
        }
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    /// Whether `id` names a bonus task. Unknown ids are not bonus.
    pub fn is_bonus(&self, id: &TaskId) -> bool {
        self.task(id).is_some_and(|t| t.is_bonus)
    }
}
