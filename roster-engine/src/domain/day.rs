use rand::Rng;
use rand::rngs::StdRng;
use shared::types::{CoverageRequirements, Shift, Tier, Violation, ViolationKind};

use crate::config::SchedulerConfig;
use crate::domain::PhaseReport;
use crate::domain::grid::ScheduleGrid;
use crate::domain::roster::Roster;
use crate::domain::rules::{
    can_still_take_consecutive_off, dominant_group, group_of, is_weekend_day, transition_ok,
    work_streak_before,
};

const GROUP_CONSISTENCY_BONUS: f64 = 30.0;
const PREFERENCE_BONUS: f64 = 15.0;
const SENIOR_TIER_BONUS: f64 = 5.0;
const WEEKLY_LOAD_PENALTY: f64 = 10.0;
/// Yesterday's late and night crews can only legally work Late today; on
/// days with no headcount slack they must be seated before anyone else.
const REST_WINDOW_BONUS: f64 = 40.0;

/// Greedy day-shift assignment for one week. Walks the days in calendar
/// order and the shifts in priority order, filling each shift up to its
/// minimum from the scored eligible pool.
pub fn assign_day_shifts_for_week(
    grid: &mut ScheduleGrid,
    roster: &Roster,
    core_order: &[usize],
    week: &[usize],
    previous_week: Option<&[usize]>,
    config: &SchedulerConfig,
    coverage: &CoverageRequirements,
    rng: &mut StdRng,
    report: &mut PhaseReport,
) {
    for &day in week {
        let weekend = is_weekend_day(grid, day);
        for shift in config.day_shift_priority() {
            let minimum = match coverage.for_day(weekend).level(shift) {
                Some(level) => level.minimum,
                None => continue,
            };
            let mut count = grid.count_on_day(day, shift, roster.core_rows());
            if count >= minimum {
                continue;
            }

            // Engineers still holding their week's off window form a second
            // tier: coverage outranks the off guarantee, so they are drafted
            // only when the first tier cannot reach the minimum (the off
            // shortfall surfaces later as an off_day violation instead).
            let mut candidates: Vec<(usize, f64)> = Vec::new();
            let mut reluctant: Vec<(usize, f64)> = Vec::new();
            for &row in core_order {
                if !is_hard_eligible(grid, roster, row, day, shift, weekend) {
                    continue;
                }
                let score = score_candidate(
                    grid,
                    roster,
                    row,
                    day,
                    week,
                    previous_week,
                    shift,
                    weekend,
                    rng,
                );
                if can_still_take_consecutive_off(grid, row, week, day, config.off_days_per_week)
                {
                    candidates.push((row, score));
                } else {
                    reluctant.push((row, score));
                }
            }
            candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
            reluctant.sort_by(|a, b| b.1.total_cmp(&a.1));

            for (row, _) in candidates.into_iter().chain(reluctant) {
                if count >= minimum {
                    break;
                }
                grid.set(row, day, shift);
                count += 1;
            }

            if count < minimum {
                report.violations.push(Violation {
                    kind: ViolationKind::CoverageFailure,
                    engineer_id: None,
                    date: Some(grid.date(day)),
                    shift: Some(shift),
                    message: format!("{shift:?} coverage {count} of {minimum} required"),
                });
            }
        }
    }
}

/// Preference, rest and streak limits; these never bend.
fn is_hard_eligible(
    grid: &ScheduleGrid,
    roster: &Roster,
    row: usize,
    day: usize,
    shift: Shift,
    weekend: bool,
) -> bool {
    grid.is_unassigned(row, day)
        && roster.profile(row).allows(shift, weekend)
        && transition_ok(grid, roster, row, day, shift)
        && work_streak_before(grid, roster, row, day) < 5
}

#[allow(clippy::too_many_arguments)]
fn score_candidate(
    grid: &ScheduleGrid,
    roster: &Roster,
    row: usize,
    day: usize,
    week: &[usize],
    previous_week: Option<&[usize]>,
    shift: Shift,
    weekend: bool,
    rng: &mut StdRng,
) -> f64 {
    let profile = roster.profile(row);
    let mut score = 0.0;

    let previous_shift = if day == 0 {
        roster.tail_last(row)
    } else {
        grid.get(row, day - 1)
    };
    if shift == Shift::Late && matches!(previous_shift, Some(Shift::Late | Shift::Night)) {
        score += REST_WINDOW_BONUS;
    }

    if let Some(previous_week) = previous_week
        && dominant_group(grid, row, previous_week) == group_of(shift)
    {
        score += GROUP_CONSISTENCY_BONUS;
    }
    if profile.prefers(shift, weekend) {
        score += PREFERENCE_BONUS;
    }
    if profile.engineer.tier == Tier::T1 {
        score += SENIOR_TIER_BONUS;
    }
    score -= WEEKLY_LOAD_PENALTY * f64::from(grid.work_count_in(row, week));
    score + rng.gen_range(0.0..2.0)
}
