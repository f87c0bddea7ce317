//! Structural schema migration for persisted state blobs.
//!
//! Earlier application versions wrote no version tag, so the generation is
//! detected by field presence, then upgraded oldest→newest through a chain
//! of pure `Value -> Value` steps. The migrator is best-effort recovery,
//! not validation: it fills missing fields with documented defaults and
//! falls back to the first-run seed on irrecoverable corruption. It never
//! errors and is idempotent — migrating an already-current blob yields an
//! equivalent state.
//!
//! Known generations:
//! - **Gen 1**: `tasks` (each with a `frequency` of `"daily"`/`"weekly"`),
//!   `currentWeek` (with `weeklyCompletedTaskIds`), `parentPin`.
//! - **Gen 2**: adds `weekHistory` and `bonusStars`.
//! - **Gen 3** (current): adds `weeklySchedule` and `templates`; retires
//!   per-task `frequency` and `weeklyCompletedTaskIds` after folding their
//!   information into the schedule.

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::calendar;
use crate::state::{AppState, CURRENT_SCHEMA_VERSION};

/// Migrate a raw persisted blob of any prior generation to the current
/// in-memory shape.
pub fn migrate(raw: Value) -> AppState {
    let Some(generation) = detect_generation(&raw) else {
        info!("no usable persisted state, starting from seed");
        return AppState::seed(calendar::today());
    };

    let mut value = raw;
    if generation < 2 {
        debug!("upgrading persisted state gen 1 -> gen 2");
        value = gen1_to_gen2(value);
    }
    if generation < 3 {
        debug!("upgrading persisted state gen 2 -> gen 3");
        value = gen2_to_gen3(value);
    }

    // Stamp the explicit tag going forward. Detection stays structural
    // because pre-tag blobs exist in the wild.
    if let Some(obj) = value.as_object_mut() {
        obj.insert("schemaVersion".to_owned(), json!(CURRENT_SCHEMA_VERSION));
    }

    match serde_json::from_value::<AppState>(value) {
        Ok(mut state) => {
            if state.current_week.rebuild_days() {
                debug!("rebuilt current week day entries");
            }
            state
        }
        Err(e) => {
            warn!("persisted state unreadable after migration ({e}), falling back to seed");
            AppState::seed(calendar::today())
        }
    }
}

/// Migrate a serialized blob. Unparseable input yields the seed state.
pub fn migrate_slice(bytes: &[u8]) -> AppState {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => migrate(value),
        Err(e) => {
            warn!("persisted state is not JSON ({e}), falling back to seed");
            AppState::seed(calendar::today())
        }
    }
}

/// Detect the structural generation of `raw`.
///
/// Returns `None` when the blob carries no recognizable state at all
/// (absent, `null`, non-object, or an object with none of the known roots).
fn detect_generation(raw: &Value) -> Option<u32> {
    let obj = raw.as_object()?;

    if obj.contains_key("weeklySchedule") || obj.contains_key("templates") {
        return Some(3);
    }
    if obj.contains_key("weekHistory") || obj.contains_key("bonusStars") {
        return Some(2);
    }
    if obj.contains_key("tasks")
        || obj.contains_key("currentWeek")
        || obj.contains_key("parentPin")
    {
        return Some(1);
    }
    None
}

/// Gen 1 → gen 2: introduce history and the star counter.
fn gen1_to_gen2(mut value: Value) -> Value {
    if let Some(obj) = value.as_object_mut() {
        obj.entry("weekHistory").or_insert_with(|| json!([]));
        obj.entry("bonusStars").or_insert_with(|| json!(0));
    }
    value
}

/// Gen 2 → gen 3: introduce the weekly schedule and templates, folding the
/// retired per-task `frequency` flag into schedule placement.
///
/// `"daily"` (or absent) frequency schedules the task Monday–Friday, the
/// same shape as the first-run seed; `"weekly"` schedules Monday only.
/// `weeklyCompletedTaskIds` carries no per-date information and is dropped
/// once frequencies are folded.
fn gen2_to_gen3(mut value: Value) -> Value {
    let Some(obj) = value.as_object_mut() else {
        return value;
    };

    let schedule = build_schedule_from_frequencies(obj.get("tasks"));
    obj.entry("weeklySchedule").or_insert(schedule);
    obj.entry("templates").or_insert_with(|| json!([]));

    if let Some(tasks) = obj.get_mut("tasks").and_then(Value::as_array_mut) {
        for task in tasks.iter_mut() {
            if let Some(task_obj) = task.as_object_mut() {
                task_obj.remove("frequency");
            }
        }
    }

    if let Some(week) = obj.get_mut("currentWeek").and_then(Value::as_object_mut) {
        week.remove("weeklyCompletedTaskIds");
    }

    value
}

fn build_schedule_from_frequencies(tasks: Option<&Value>) -> Value {
    let mut weekday_ids: Vec<Value> = Vec::new();
    let mut monday_only_ids: Vec<Value> = Vec::new();

    if let Some(tasks) = tasks.and_then(Value::as_array) {
        for task in tasks {
            let Some(task_obj) = task.as_object() else {
                continue;
            };
            if task_obj.get("isBonus").and_then(Value::as_bool) == Some(true) {
                continue;
            }
            let Some(id) = task_obj.get("id").cloned() else {
                continue;
            };
            match task_obj.get("frequency").and_then(Value::as_str) {
                Some("weekly") => monday_only_ids.push(id),
                _ => weekday_ids.push(id),
            }
        }
    }

    let mut monday = monday_only_ids;
    monday.extend(weekday_ids.iter().cloned());

    json!({
        "mon": monday,
        "tue": weekday_ids,
        "wed": weekday_ids,
        "thu": weekday_ids,
        "fri": weekday_ids,
        "sat": [],
        "sun": [],
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::state::{TaskId, Weekday};

    #[test]
    fn migrating_current_state_is_idempotent() {
        let state = AppState::seed(calendar::today());
        let once = migrate(serde_json::to_value(&state).unwrap());
        let twice = migrate(serde_json::to_value(&once).unwrap());
        assert_eq!(once, state);
        assert_eq!(twice, once);
    }

    #[test]
    fn null_and_garbage_fall_back_to_seed() {
        let from_null = migrate(Value::Null);
        assert_eq!(from_null.tasks.len(), 3);

        let from_garbage = migrate_slice(b"not json at all {{{");
        assert_eq!(from_garbage.tasks.len(), 3);

        let from_wrong_shape = migrate(json!([1, 2, 3]));
        assert_eq!(from_wrong_shape.parent_pin, "1234");
    }

    #[test]
    fn empty_object_seeds() {
        let state = migrate(json!({}));
        assert_eq!(state.tasks.len(), 3);
    }

    #[test]
    fn gen1_blob_gains_history_schedule_and_templates() {
        let raw = json!({
            "tasks": [
                {"id": "a", "title": "Read", "emoji": "📚", "isBonus": false,
                 "frequency": "daily", "createdAt": "2024-01-01T00:00:00Z"},
                {"id": "b", "title": "Tidy room", "emoji": "🧹", "isBonus": false,
                 "frequency": "weekly", "createdAt": "2024-01-01T00:00:00Z"},
                {"id": "c", "title": "Extra maths", "emoji": "➕", "isBonus": true,
                 "frequency": "daily", "createdAt": "2024-01-01T00:00:00Z"},
            ],
            "currentWeek": {
                "weekStart": "2026-08-24",
                "days": [],
                "weeklyCompletedTaskIds": ["b"],
            },
            "parentPin": "4321",
        });

        let state = migrate(raw);

        // User data preserved.
        assert_eq!(state.tasks.len(), 3);
        assert_eq!(state.parent_pin, "4321");

        // New-generation fields filled.
        assert!(state.week_history.is_empty());
        assert_eq!(state.bonus_stars, 0);
        assert!(state.templates.is_empty());
        assert_eq!(state.schema_version, CURRENT_SCHEMA_VERSION);

        // Frequencies folded: daily -> Mon–Fri, weekly -> Monday only,
        // bonus never scheduled.
        let a = TaskId::new("a");
        let b = TaskId::new("b");
        let c = TaskId::new("c");
        for day in [Weekday::Mon, Weekday::Tue, Weekday::Fri] {
            assert!(state.weekly_schedule.day(day).contains(&a));
        }
        assert!(state.weekly_schedule.mon.contains(&b));
        assert!(!state.weekly_schedule.tue.contains(&b));
        assert!(!state.weekly_schedule.contains_anywhere(&c));
        assert!(state.weekly_schedule.sat.is_empty());
    }

    #[test]
    fn gen2_blob_keeps_history_and_stars() {
        let raw = json!({
            "tasks": [
                {"id": "a", "title": "Read", "emoji": "📚", "isBonus": false,
                 "createdAt": "2024-01-01T00:00:00Z"},
            ],
            "currentWeek": {"weekStart": "2026-08-24", "days": []},
            "parentPin": "1234",
            "weekHistory": [
                {"weekStart": "2026-08-17", "completionPct": 71,
                 "totalTasks": 7, "completedTasks": 5, "bonusStarsEarned": 2},
            ],
            "bonusStars": 9,
        });

        let state = migrate(raw);
        assert_eq!(state.bonus_stars, 9);
        assert_eq!(state.week_history.len(), 1);
        assert_eq!(state.week_history[0].completion_pct, 71);
        // Gen 2 tasks carry no frequency: treated as daily.
        assert!(state.weekly_schedule.wed.contains(&TaskId::new("a")));
    }

    #[test]
    fn same_week_blob_with_empty_days_is_rebuilt() {
        let monday = calendar::monday_of(calendar::today());
        let raw = json!({
            "tasks": [
                {"id": "a", "title": "Read", "emoji": "📚", "isBonus": false,
                 "createdAt": "2026-01-01T00:00:00Z"},
            ],
            "weeklySchedule": {"mon": ["a"], "tue": ["a"], "wed": ["a"],
                               "thu": ["a"], "fri": ["a"]},
            "templates": [],
            "currentWeek": {"weekStart": monday.to_string(), "days": []},
            "parentPin": "1234",
        });

        let mut state = migrate(raw);
        assert_eq!(state.current_week.week_start, monday);
        assert_eq!(state.current_week.days.len(), 7);

        // Today has an entry, so a toggle lands instead of no-opping.
        let id = TaskId::new("a");
        crate::ops::toggle_completion(&mut state, &id, calendar::today());
        assert!(
            state
                .current_week
                .day(calendar::today())
                .unwrap()
                .is_completed(&id)
        );
    }

    #[test]
    fn gen3_blob_with_missing_fields_is_default_filled() {
        let raw = json!({
            "tasks": [],
            "weeklySchedule": {"mon": [], "tue": []},
            "parentPin": "0000",
        });

        let state = migrate(raw);
        assert_eq!(state.parent_pin, "0000");
        assert!(state.tasks.is_empty());
        assert!(state.week_history.is_empty());
        assert!(state.templates.is_empty());
        // A gen-3 blob is never re-folded.
        assert!(state.weekly_schedule.mon.is_empty());
    }
}
