//! Task and schedule operations: pure transforms over [`AppState`].
//!
//! Every function here is a total function over the current state — unknown
//! ids and out-of-week dates are silent no-ops, never errors. The sync
//! engine routes all of them through its mutate path so persistence and
//! remote propagation always follow.

use chrono::NaiveDate;

use crate::state::{AppState, Task, TaskId, TemplateEntry, WeekData, Weekday, WeeklyTemplate};

/// Partial field update for [`edit_task`]. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub emoji: Option<String>,
    pub is_bonus: Option<bool>,
}

/// Flip `id`'s membership in `date`'s completed set.
///
/// A bonus task transitioning *into* the completed set earns exactly one
/// permanent star; toggling back off never decrements — stars are permanent
/// once earned. Unknown ids and dates outside the current week are no-ops.
pub fn toggle_completion(state: &mut AppState, id: &TaskId, date: NaiveDate) {
    if state.task(id).is_none() {
        return;
    }
    let is_bonus = state.is_bonus(id);

    let Some(day) = state.current_week.day_mut(date) else {
        return;
    };

    if day.is_completed(id) {
        day.completed_task_ids.retain(|existing| existing != id);
    } else {
        day.completed_task_ids.push(id.clone());
        // A task is completed or skipped for a date, never both.
        day.skipped_task_ids.retain(|existing| existing != id);
        if is_bonus {
            state.bonus_stars += 1;
        }
    }
}

/// Flip `id`'s membership in `date`'s skipped set. Skipped tasks leave the
/// expected counts for that date.
pub fn toggle_skip(state: &mut AppState, id: &TaskId, date: NaiveDate) {
    if state.task(id).is_none() {
        return;
    }
    let Some(day) = state.current_week.day_mut(date) else {
        return;
    };

    if day.is_skipped(id) {
        day.skipped_task_ids.retain(|existing| existing != id);
    } else {
        day.skipped_task_ids.push(id.clone());
        day.completed_task_ids.retain(|existing| existing != id);
    }
}

/// Add a task to the roster. Returns its generated id.
pub fn add_task(
    state: &mut AppState,
    title: impl Into<String>,
    emoji: impl Into<String>,
    is_bonus: bool,
) -> TaskId {
    let task = Task::new(title, emoji, is_bonus);
    let id = task.id.clone();
    state.tasks.push(task);
    id
}

/// Apply a partial field update by id. Unknown id is a no-op.
///
/// Turning a task into a bonus task pulls it off the weekly schedule —
/// bonus tasks are never scheduled.
pub fn edit_task(state: &mut AppState, id: &TaskId, update: TaskUpdate) {
    let Some(task) = state.task_mut(id) else {
        return;
    };
    if let Some(title) = update.title {
        task.title = title;
    }
    if let Some(emoji) = update.emoji {
        task.emoji = emoji;
    }
    if let Some(is_bonus) = update.is_bonus {
        task.is_bonus = is_bonus;
        if is_bonus {
            state.weekly_schedule.remove_everywhere(id);
        }
    }
}

/// Remove a task from the roster and purge it from every day of the weekly
/// schedule. Past day progress and week history are left untouched.
pub fn remove_task(state: &mut AppState, id: &TaskId) {
    state.tasks.retain(|task| &task.id != id);
    state.weekly_schedule.remove_everywhere(id);
}

/// Schedule an existing non-bonus task onto a weekday. Idempotent; unknown
/// and bonus ids are no-ops.
pub fn schedule_task(state: &mut AppState, id: &TaskId, day: Weekday) {
    let Some(task) = state.task(id) else {
        return;
    };
    if task.is_bonus {
        return;
    }
    let list = state.weekly_schedule.day_mut(day);
    if !list.contains(id) {
        list.push(id.clone());
    }
}

/// Remove a task from one weekday's list only.
pub fn unschedule_task(state: &mut AppState, id: &TaskId, day: Weekday) {
    state
        .weekly_schedule
        .day_mut(day)
        .retain(|existing| existing != id);
}

/// Create a new non-bonus task and schedule it on `day` in one commit.
pub fn add_task_to_day(
    state: &mut AppState,
    title: impl Into<String>,
    emoji: impl Into<String>,
    day: Weekday,
) -> TaskId {
    let id = add_task(state, title, emoji, false);
    schedule_task(state, &id, day);
    id
}

/// Wholesale replace each target weekday's list with a copy of `source`'s
/// list. Replace, not merge.
pub fn copy_day(state: &mut AppState, source: Weekday, targets: &[Weekday]) {
    let source_list = state.weekly_schedule.day(source).clone();
    for &target in targets {
        if target == source {
            continue;
        }
        *state.weekly_schedule.day_mut(target) = source_list.clone();
    }
}

/// Snapshot the current schedule under `name` as `(title, emoji)` pairs per
/// weekday. Saving under an existing name replaces that template.
pub fn save_template(state: &mut AppState, name: impl Into<String>) {
    let name = name.into();
    let mut days = std::collections::BTreeMap::new();
    for day in Weekday::ALL {
        let entries: Vec<TemplateEntry> = state
            .weekly_schedule
            .day(day)
            .iter()
            .filter_map(|id| state.task(id))
            .filter(|task| !task.is_bonus)
            .map(|task| TemplateEntry {
                title: task.title.clone(),
                emoji: task.emoji.clone(),
            })
            .collect();
        days.insert(day, entries);
    }

    let template = WeeklyTemplate {
        name: name.clone(),
        days,
        created_at: chrono::Local::now().to_rfc3339(),
    };

    if let Some(existing) = state.templates.iter_mut().find(|t| t.name == name) {
        *existing = template;
    } else {
        state.templates.push(template);
    }
}

/// Load the named template: resolve each `(title, emoji)` pair to an
/// existing non-bonus task by exact title match or create a new task,
/// replace the entire weekly schedule with the resolved ids, and reset the
/// current week to empty — a schedule change invalidates in-progress weekly
/// completion tracking.
///
/// Returns `false` (leaving the state untouched) when no template has that
/// name.
pub fn load_template(state: &mut AppState, name: &str) -> bool {
    let Some(template) = state.templates.iter().find(|t| t.name == name).cloned() else {
        return false;
    };

    let mut schedule = crate::state::WeeklySchedule::default();
    for day in Weekday::ALL {
        let Some(entries) = template.days.get(&day) else {
            continue;
        };
        let ids: Vec<TaskId> = entries
            .iter()
            .map(|entry| resolve_or_create(state, entry))
            .collect();
        *schedule.day_mut(day) = ids;
    }

    state.weekly_schedule = schedule;
    state.current_week = WeekData::empty(state.current_week.week_start);
    true
}

fn resolve_or_create(state: &mut AppState, entry: &TemplateEntry) -> TaskId {
    if let Some(task) = state
        .tasks
        .iter()
        .find(|task| !task.is_bonus && task.title == entry.title)
    {
        return task.id.clone();
    }
    add_task(state, entry.title.clone(), entry.emoji.clone(), false)
}

/// Delete the named template. Unknown names are no-ops.
pub fn delete_template(state: &mut AppState, name: &str) {
    state.templates.retain(|t| t.name != name);
}

/// Replace the current week with a fresh empty one at the same Monday.
/// History and schedule are untouched.
pub fn reset_week(state: &mut AppState) {
    state.current_week = WeekData::empty(state.current_week.week_start);
}

/// Update the household PIN.
pub fn set_parent_pin(state: &mut AppState, pin: impl Into<String>) {
    state.parent_pin = pin.into();
}

// ── Read helpers (snapshot queries) ─────────────────────────────────────

/// Scheduled tasks for a weekday, in schedule order. Stale ids and bonus
/// tasks are filtered out.
pub fn tasks_for_day(state: &AppState, day: Weekday) -> Vec<Task> {
    state
        .weekly_schedule
        .day(day)
        .iter()
        .filter_map(|id| state.task(id))
        .filter(|task| !task.is_bonus)
        .cloned()
        .collect()
}

/// Non-bonus roster tasks not yet scheduled on `day`.
pub fn unscheduled_tasks_for_day(state: &AppState, day: Weekday) -> Vec<Task> {
    let scheduled = state.weekly_schedule.day(day);
    state
        .tasks
        .iter()
        .filter(|task| !task.is_bonus && !scheduled.contains(&task.id))
        .cloned()
        .collect()
}

/// All bonus tasks on the roster.
pub fn bonus_tasks(state: &AppState) -> Vec<Task> {
    state.tasks.iter().filter(|t| t.is_bonus).cloned().collect()
}
