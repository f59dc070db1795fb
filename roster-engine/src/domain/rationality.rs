use shared::types::{CoverageRequirements, Shift};

use crate::config::SchedulerConfig;
use crate::domain::grid::ScheduleGrid;
use crate::domain::roster::Roster;
use crate::domain::rules::{
    group_of, group_shifts, has_consecutive_off_pair, is_weekend_day, transition_ok,
    transition_violation, work_streak_after, work_streak_before,
};

/// Last structural pass before validation: pull split off days together,
/// break any work streak that crept past six days, and substitute away the
/// remaining forbidden transitions. All checks extend across the month
/// boundary through the previous-month tail.
pub fn rationalize(
    grid: &mut ScheduleGrid,
    roster: &Roster,
    weeks: &[Vec<usize>],
    coverage: &CoverageRequirements,
    config: &SchedulerConfig,
) {
    if config.off_days_per_week >= 2 {
        make_off_pairs_consecutive(grid, roster, weeks, coverage);
    }
    break_long_streaks(grid, roster, coverage);
    repair_transitions(grid, roster, coverage);
}

fn make_off_pairs_consecutive(
    grid: &mut ScheduleGrid,
    roster: &Roster,
    weeks: &[Vec<usize>],
    coverage: &CoverageRequirements,
) {
    for week in weeks {
        if week.len() < 7 {
            continue;
        }
        for &row in roster.core_rows() {
            let offs = grid.off_days_in(row, week);
            if offs.len() < 2 || has_consecutive_off_pair(grid, row, week) {
                continue;
            }

            'search: for &anchor in &offs {
                for neighbor in [anchor + 1, anchor.wrapping_sub(1)] {
                    if !week.contains(&neighbor) {
                        continue;
                    }
                    if !grid.get(row, neighbor).is_some_and(Shift::is_work) {
                        continue;
                    }
                    for &donor in offs.iter().filter(|&&d| d != anchor) {
                        if try_off_swap(grid, roster, coverage, row, neighbor, donor) {
                            break 'search;
                        }
                    }
                }
            }
        }
    }
}

/// Moves the work shift at `work_day` onto `off_day` and rests `work_day`
/// instead. Reverts unless the result is legal on every axis.
fn try_off_swap(
    grid: &mut ScheduleGrid,
    roster: &Roster,
    coverage: &CoverageRequirements,
    row: usize,
    work_day: usize,
    off_day: usize,
) -> bool {
    let Some(shift) = grid.get(row, work_day).filter(|s| s.is_work()) else {
        return false;
    };

    // Taking the shift off `work_day` must not break that day's coverage
    if let Some(level) = coverage
        .for_day(is_weekend_day(grid, work_day))
        .level(shift)
        && grid.count_on_day(work_day, shift, roster.core_rows()) <= level.minimum
    {
        return false;
    }

    grid.set(row, work_day, Shift::Off);
    grid.set(row, off_day, shift);

    let streak = work_streak_before(grid, roster, row, off_day)
        + 1
        + work_streak_after(grid, row, off_day);
    let ok = roster
        .profile(row)
        .allows(shift, is_weekend_day(grid, off_day))
        && transition_ok(grid, roster, row, off_day, shift)
        && streak <= 6;

    if !ok {
        grid.set(row, work_day, shift);
        grid.set(row, off_day, Shift::Off);
    }
    ok
}

fn break_long_streaks(grid: &mut ScheduleGrid, roster: &Roster, coverage: &CoverageRequirements) {
    for row in 0..grid.engineer_count() {
        let mut run = roster.tail_work_run(row);
        for day in 0..grid.day_count() {
            if grid.get(row, day).is_some_and(Shift::counts_toward_streak) {
                run += 1;
            } else {
                run = 0;
                continue;
            }

            if run > 6 {
                // Latest safe day wins so the streak restarts from zero
                let start = day.saturating_sub(6);
                let chosen = (start..=day)
                    .rev()
                    .find(|&d| conversion_keeps_coverage(grid, roster, coverage, row, d))
                    .unwrap_or(day);
                grid.set(row, chosen, Shift::Off);
                run = (day - chosen) as u32;
            }
        }
    }
}

fn conversion_keeps_coverage(
    grid: &ScheduleGrid,
    roster: &Roster,
    coverage: &CoverageRequirements,
    row: usize,
    day: usize,
) -> bool {
    let Some(shift) = grid.get(row, day) else {
        return true;
    };
    let Some(level) = coverage.for_day(is_weekend_day(grid, day)).level(shift) else {
        // Training days have no coverage stake
        return true;
    };
    grid.count_on_day(day, shift, roster.core_rows()) > level.minimum
}

fn repair_transitions(grid: &mut ScheduleGrid, roster: &Roster, coverage: &CoverageRequirements) {
    for row in 0..grid.engineer_count() {
        // Month boundary first
        if let Some(prev) = roster.tail_last(row)
            && let Some(first) = grid.get(row, 0)
            && transition_violation(prev, first).is_some()
        {
            substitute(grid, roster, row, 0);
        }
        for day in 1..grid.day_count() {
            if let Some(prev) = grid.get(row, day - 1)
                && let Some(current) = grid.get(row, day)
                && transition_violation(prev, current).is_some()
            {
                substitute(grid, roster, row, day);
            }
        }
    }
}

/// Replaces the slot at `day` with a transition-compatible shift, same group
/// first, or rests the day when nothing fits.
fn substitute(grid: &mut ScheduleGrid, roster: &Roster, row: usize, day: usize) {
    let Some(current) = grid.get(row, day) else {
        return;
    };
    let weekend = is_weekend_day(grid, day);

    let mut candidates: Vec<Shift> = Vec::with_capacity(6);
    if let Some(group) = group_of(current) {
        candidates.extend(group_shifts(group));
    }
    candidates.extend(Shift::WORK_SHIFTS);

    let mut seen: Vec<Shift> = Vec::with_capacity(6);
    for candidate in candidates {
        if candidate == current || seen.contains(&candidate) {
            continue;
        }
        seen.push(candidate);
        if !roster.profile(row).allows(candidate, weekend) {
            continue;
        }
        if !transition_ok(grid, roster, row, day, candidate) {
            continue;
        }
        grid.set(row, day, candidate);
        return;
    }
    grid.set(row, day, Shift::Off);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::domain::pipeline::initialise_grid;
    use crate::domain::roster::Roster;
    use chrono::NaiveDate;
    use shared::time::month_days;
    use shared::types::{Engineer, ScheduleInput, ShiftRecord, Tier};
    use std::collections::{BTreeMap, BTreeSet};
    use uuid::Uuid;

    fn plain_engineer() -> Engineer {
        Engineer {
            id: Uuid::new_v4(),
            name: "e".to_string(),
            tier: Tier::T2,
            is_floater: false,
            in_training: false,
            state: None,
            preferences: BTreeSet::new(),
            unavailable_days: BTreeSet::new(),
            unavailable_kinds: BTreeMap::new(),
            fixed_off_days: BTreeSet::new(),
        }
    }

    fn setup(engineers: Vec<Engineer>, previous: Vec<ShiftRecord>) -> (ScheduleGrid, Roster) {
        let input = ScheduleInput {
            engineers,
            year: 2026,
            month: 6,
            holidays: Vec::new(),
            approved_requests: Vec::new(),
            coverage: None,
            previous_month: previous,
        };
        let config = SchedulerConfig::default();
        let month_start = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let (roster, _, _) = Roster::build(&input, &config, month_start);
        let days = month_days(2026, 6);
        let grid = initialise_grid(&roster, &days);
        (grid, roster)
    }

    fn week0() -> Vec<usize> {
        (0..7).collect()
    }

    #[test]
    fn split_offs_are_pulled_together() {
        let engineers: Vec<Engineer> = (0..8).map(|_| plain_engineer()).collect();
        let (mut grid, roster) = setup(engineers, Vec::new());
        let config = SchedulerConfig::default();
        let coverage = config.effective_coverage(None);

        // Row 0: offs on Tue and Fri, work elsewhere; plenty of slack rows so
        // coverage stays safe.
        for day in 0..7 {
            grid.set(0, day, Shift::Early);
        }
        grid.set(0, 1, Shift::Off);
        grid.set(0, 4, Shift::Off);
        for row in 1..8 {
            for day in 0..7 {
                grid.set(row, day, Shift::Early);
            }
        }

        rationalize(&mut grid, &roster, &[week0()], &coverage, &config);

        assert!(has_consecutive_off_pair(&grid, 0, &week0()));
        assert_eq!(grid.off_days_in(0, &week0()).len(), 2);
    }

    #[test]
    fn seven_day_streaks_are_broken() {
        let engineers: Vec<Engineer> = (0..8).map(|_| plain_engineer()).collect();
        let (mut grid, roster) = setup(engineers, Vec::new());
        let config = SchedulerConfig::default();
        let coverage = config.effective_coverage(None);

        for row in 0..8 {
            for day in 0..grid.day_count() {
                grid.set(row, day, Shift::Morning);
            }
        }

        rationalize(&mut grid, &roster, &[week0()], &coverage, &config);

        for row in 0..8 {
            let mut run = 0;
            for day in 0..grid.day_count() {
                if grid.get(row, day).is_some_and(Shift::counts_toward_streak) {
                    run += 1;
                    assert!(run <= 6, "row {row} still has a streak past day {day}");
                } else {
                    run = 0;
                }
            }
        }
    }

    #[test]
    fn tail_streak_forces_an_early_rest() {
        let e = plain_engineer();
        let id = e.id;
        let mut previous = Vec::new();
        for day in 26..=31 {
            previous.push(ShiftRecord {
                engineer_id: id,
                date: NaiveDate::from_ymd_opt(2026, 5, day).unwrap(),
                shift: Shift::Morning,
            });
        }
        let mut engineers = vec![e];
        engineers.extend((0..5).map(|_| plain_engineer()));
        let (mut grid, roster) = setup(engineers, previous);
        let config = SchedulerConfig::default();
        let coverage = config.effective_coverage(None);

        for day in 0..7 {
            for row in 0..6 {
                grid.set(row, day, Shift::Morning);
            }
        }

        rationalize(&mut grid, &roster, &[week0()], &coverage, &config);

        // Six tail days of work mean June 1st must already be a rest day
        assert_eq!(grid.get(0, 0), Some(Shift::Off));
    }

    #[test]
    fn forbidden_transition_is_substituted_away() {
        let engineers: Vec<Engineer> = (0..6).map(|_| plain_engineer()).collect();
        let (mut grid, roster) = setup(engineers, Vec::new());
        let config = SchedulerConfig::default();
        let coverage = config.effective_coverage(None);

        for row in 0..6 {
            for day in 0..7 {
                grid.set(row, day, Shift::Morning);
            }
        }
        grid.set(0, 2, Shift::Late);
        // Late -> Morning on day 3 breaks the rest interval

        rationalize(&mut grid, &roster, &[week0()], &coverage, &config);

        let pair = (grid.get(0, 2).unwrap(), grid.get(0, 3).unwrap());
        assert!(
            transition_violation(pair.0, pair.1).is_none(),
            "still forbidden: {pair:?}"
        );
    }
}
