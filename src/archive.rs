//! Week rollover: close an expired current week into immutable history.
//!
//! `reconcile_week` is an explicit, idempotent step invoked once per state
//! load (and on app foreground), never hidden inside an accessor. It only
//! rewrites the in-memory state; the engine commits the result to the local
//! store as one atomic write so a torn "history appended but week not
//! rolled" state cannot be observed.

use chrono::NaiveDate;
use tracing::info;

use crate::calendar;
use crate::state::{AppState, WeekData, WeekHistory};

/// Consecutive history weeks at or above this completion keep a streak
/// alive.
pub const STREAK_THRESHOLD_PCT: u8 = 80;

/// Roll the current week into history if it has expired.
///
/// Returns `true` when the state was rewritten — a rollover, or a repair
/// of a same-week day list that arrived with missing entries. Invoking it
/// again on an intact same-week state is a no-op.
pub fn reconcile_week(state: &mut AppState, today: NaiveDate) -> bool {
    let this_monday = calendar::monday_of(today);
    if state.current_week.week_start == this_monday {
        return state.current_week.rebuild_days();
    }

    let summary = summarize_week(state);
    info!(
        week_start = %summary.week_start,
        completion_pct = summary.completion_pct,
        completed = summary.completed_tasks,
        expected = summary.total_tasks,
        "archiving expired week"
    );

    state.week_history.push(summary);
    state.current_week = WeekData::empty(this_monday);
    true
}

/// Completion summary of the current week.
///
/// For every date and every scheduled non-bonus task on that weekday: a
/// not-skipped task counts toward "expected"; a completed one additionally
/// toward "completed". Bonus stars earned that week are counted per
/// `(date, bonus task)` completed pair — history bookkeeping only, the
/// running `bonus_stars` total is untouched.
pub fn summarize_week(state: &AppState) -> WeekHistory {
    let mut expected: u32 = 0;
    let mut completed: u32 = 0;
    let mut bonus_earned: u32 = 0;

    for day in &state.current_week.days {
        let weekday = calendar::weekday_of(day.date);
        for id in state.weekly_schedule.day(weekday) {
            // Stale ids (task deleted after scheduling) count as nothing.
            let Some(task) = state.task(id) else {
                continue;
            };
            if task.is_bonus || day.is_skipped(id) {
                continue;
            }
            expected += 1;
            if day.is_completed(id) {
                completed += 1;
            }
        }

        for id in &day.completed_task_ids {
            if state.is_bonus(id) {
                bonus_earned += 1;
            }
        }
    }

    let completion_pct = if expected == 0 {
        0
    } else {
        (100.0 * f64::from(completed) / f64::from(expected)).round() as u8
    };

    WeekHistory {
        week_start: state.current_week.week_start,
        completion_pct,
        total_tasks: expected,
        completed_tasks: completed,
        bonus_stars_earned: bonus_earned,
    }
}

/// Number of consecutive most-recent history weeks at or above
/// [`STREAK_THRESHOLD_PCT`].
pub fn current_streak(history: &[WeekHistory]) -> u32 {
    history
        .iter()
        .rev()
        .take_while(|week| week.completion_pct >= STREAK_THRESHOLD_PCT)
        .count() as u32
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::state::{Task, TaskId, WeekData, Weekday};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn task(id: &str, is_bonus: bool) -> Task {
        Task {
            id: TaskId::new(id),
            title: id.to_owned(),
            emoji: "⭐".to_owned(),
            is_bonus,
            created_at: String::new(),
        }
    }

    /// T1 scheduled Mon/Wed and completed both days; T2 scheduled every day,
    /// completed 3, skipped 2. Expected = 2 + 5 = 7, completed = 2 + 3 = 5,
    /// pct = round(500/7) = 71.
    fn week_with_mixed_progress() -> AppState {
        let monday = d("2026-08-17");
        let t1 = TaskId::new("t1");
        let t2 = TaskId::new("t2");

        let mut state = AppState {
            tasks: vec![task("t1", false), task("t2", false)],
            current_week: WeekData::empty(monday),
            ..AppState::default()
        };
        state.weekly_schedule.mon = vec![t1.clone(), t2.clone()];
        state.weekly_schedule.wed = vec![t1.clone(), t2.clone()];
        for day in [Weekday::Tue, Weekday::Thu, Weekday::Fri, Weekday::Sat, Weekday::Sun] {
            *state.weekly_schedule.day_mut(day) = vec![t2.clone()];
        }

        // T1: completed Mon + Wed.
        state.current_week.days[0].completed_task_ids.push(t1.clone());
        state.current_week.days[2].completed_task_ids.push(t1.clone());
        // T2: completed Mon–Wed, skipped Sat + Sun.
        for i in 0..3 {
            state.current_week.days[i].completed_task_ids.push(t2.clone());
        }
        state.current_week.days[5].skipped_task_ids.push(t2.clone());
        state.current_week.days[6].skipped_task_ids.push(t2.clone());

        state
    }

    #[test]
    fn rollover_exactness() {
        let state = week_with_mixed_progress();
        let summary = summarize_week(&state);

        assert_eq!(summary.total_tasks, 7);
        assert_eq!(summary.completed_tasks, 5);
        assert_eq!(summary.completion_pct, 71);
        assert_eq!(summary.week_start, d("2026-08-17"));
    }

    #[test]
    fn reconcile_same_week_is_cheap_noop() {
        let mut state = week_with_mixed_progress();
        let before = state.clone();

        assert!(!reconcile_week(&mut state, d("2026-08-20")));
        assert_eq!(state, before);
    }

    #[test]
    fn reconcile_expired_week_archives_and_resets() {
        let mut state = week_with_mixed_progress();

        assert!(reconcile_week(&mut state, d("2026-08-26")));
        assert_eq!(state.week_history.len(), 1);
        assert_eq!(state.week_history[0].completion_pct, 71);
        assert_eq!(state.current_week.week_start, d("2026-08-24"));
        assert!(state.current_week.days.iter().all(|day| {
            day.completed_task_ids.is_empty() && day.skipped_task_ids.is_empty()
        }));

        // Second invocation in the same week: no further rollover.
        assert!(!reconcile_week(&mut state, d("2026-08-28")));
        assert_eq!(state.week_history.len(), 1);
    }

    #[test]
    fn same_week_reconcile_repairs_missing_day_entries() {
        let mut state = AppState {
            current_week: WeekData {
                week_start: d("2026-08-24"),
                days: Vec::new(),
            },
            ..AppState::default()
        };

        assert!(reconcile_week(&mut state, d("2026-08-26")));
        assert_eq!(state.current_week.days.len(), 7);
        assert!(state.week_history.is_empty());

        // Intact state: back to the cheap no-op.
        assert!(!reconcile_week(&mut state, d("2026-08-26")));
    }

    #[test]
    fn empty_schedule_rolls_over_at_zero_pct() {
        let mut state = AppState {
            current_week: WeekData::empty(d("2026-08-17")),
            ..AppState::default()
        };

        assert!(reconcile_week(&mut state, d("2026-08-26")));
        assert_eq!(state.week_history[0].completion_pct, 0);
        assert_eq!(state.week_history[0].total_tasks, 0);
    }

    #[test]
    fn bonus_completions_count_stars_not_expected() {
        let mut state = week_with_mixed_progress();
        let bonus = TaskId::new("bonus");
        state.tasks.push(task("bonus", true));
        // Completed on two different dates.
        state.current_week.days[1].completed_task_ids.push(bonus.clone());
        state.current_week.days[4].completed_task_ids.push(bonus.clone());

        let summary = summarize_week(&state);
        assert_eq!(summary.bonus_stars_earned, 2);
        // Expected/completed counts unchanged by bonus activity.
        assert_eq!(summary.total_tasks, 7);
        assert_eq!(summary.completed_tasks, 5);
    }

    #[test]
    fn streak_counts_trailing_weeks_above_threshold() {
        let entry = |pct: u8| WeekHistory {
            completion_pct: pct,
            ..WeekHistory::default()
        };

        assert_eq!(current_streak(&[]), 0);
        assert_eq!(current_streak(&[entry(90)]), 1);
        assert_eq!(current_streak(&[entry(50), entry(85), entry(100)]), 2);
        assert_eq!(current_streak(&[entry(90), entry(79)]), 0);
        assert_eq!(current_streak(&[entry(80), entry(80), entry(80)]), 3);
    }
}
