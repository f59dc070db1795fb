use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use shared::types::{CoverageRequirements, Shift, Warning, WarningCode};

use crate::config::SchedulerConfig;
use crate::domain::grid::ScheduleGrid;
use crate::domain::roster::Roster;
use crate::domain::rules::{
    can_still_take_consecutive_off, dominant_group, group_of, group_shifts, is_weekend_day,
    transition_ok, work_streak_after, work_streak_before,
};
use crate::domain::validator::{self, ValidationMode};
use crate::domain::{PhaseReport, day, floater, night, off_days, rationality};

/// The result of one full pipeline pass over the month.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub grid: ScheduleGrid,
    pub violations: Vec<shared::types::Violation>,
    pub warnings: Vec<Warning>,
}

/// Runs the phases in their fixed order. The order is load-bearing: offs are
/// reserved before any work shift exists, which is what keeps the
/// consecutive-work cap satisfiable in later weeks.
#[allow(clippy::too_many_arguments)]
pub fn run_pipeline(
    roster: &Roster,
    config: &SchedulerConfig,
    coverage: &CoverageRequirements,
    days: &[NaiveDate],
    weeks: &[Vec<usize>],
    core_order: &[usize],
    floater_order: &[usize],
    rng: &mut StdRng,
) -> PipelineOutcome {
    let mut report = PhaseReport::default();

    let mut grid = initialise_grid(roster, days);

    off_days::reserve_off_days(
        &mut grid,
        roster,
        core_order,
        weeks,
        config,
        coverage,
        &mut report,
    );

    assign_training(&mut grid, roster);

    night::assign_night_cohorts(
        &mut grid,
        roster,
        core_order,
        weeks,
        config,
        coverage,
        &mut report,
    );
    partial_check(&grid, roster, coverage, weeks, config, "night-cohorts");

    for (index, week) in weeks.iter().enumerate() {
        if index > 0 {
            copy_week_template(
                &mut grid,
                roster,
                core_order,
                &weeks[index - 1],
                week,
                config,
                coverage,
            );
        }
        let previous_week = index.checked_sub(1).map(|prev| weeks[prev].as_slice());
        day::assign_day_shifts_for_week(
            &mut grid,
            roster,
            core_order,
            week,
            previous_week,
            config,
            coverage,
            rng,
            &mut report,
        );
    }
    partial_check(&grid, roster, coverage, weeks, config, "day-shifts");

    off_days::repair_off_days(&mut grid, roster, core_order, weeks, config, coverage);

    floater::assign_floaters(&mut grid, roster, floater_order, weeks, config, coverage);

    fill_remaining(&mut grid, roster, core_order, weeks, config, coverage);
    partial_check(&grid, roster, coverage, weeks, config, "gap-fill");

    balance_workload(&mut grid, roster, weeks, config, &mut report);

    rationality::rationalize(&mut grid, roster, weeks, coverage, config);

    let final_violations = validator::validate(
        &grid,
        roster,
        coverage,
        weeks,
        config,
        ValidationMode::Final,
    );
    report.violations.extend(final_violations);

    PipelineOutcome {
        grid,
        violations: report.violations,
        warnings: report.warnings,
    }
}

/// Phase 1: blackout days become `Unavailable` (or `Off` for predetermined
/// offs), fixed weekly off days become `Off`, everything else stays open.
pub fn initialise_grid(roster: &Roster, days: &[NaiveDate]) -> ScheduleGrid {
    let ids = roster.profiles.iter().map(|p| p.engineer.id).collect();
    let mut grid = ScheduleGrid::new(ids, days.to_vec());

    for (row, profile) in roster.profiles.iter().enumerate() {
        for (day, &date) in days.iter().enumerate() {
            if profile.unavailable.contains(&date) {
                grid.set(row, day, profile.blackout_shift(date));
            } else if profile.fixed_off_on(date) {
                grid.set(row, day, Shift::Off);
            }
        }
    }
    grid
}

/// Phase 3: trainees sit in weekday training sessions and rest on weekends.
fn assign_training(grid: &mut ScheduleGrid, roster: &Roster) {
    for &row in roster.trainee_rows() {
        for day in 0..grid.day_count() {
            if grid.is_unassigned(row, day) {
                let shift = if is_weekend_day(grid, day) {
                    Shift::Off
                } else {
                    Shift::Training
                };
                grid.set(row, day, shift);
            }
        }
    }
}

/// Week-template copy: before solving week k, pre-fill it with each
/// engineer's dominant shift group from week k-1 so people keep a stable
/// rhythm instead of bouncing between groups. The copy never pushes a shift
/// past its minimum; whoever the template cannot seat falls through to the
/// scored assignment.
#[allow(clippy::too_many_arguments)]
fn copy_week_template(
    grid: &mut ScheduleGrid,
    roster: &Roster,
    core_order: &[usize],
    previous_week: &[usize],
    week: &[usize],
    config: &SchedulerConfig,
    coverage: &CoverageRequirements,
) {
    for &row in core_order {
        // Night rhythm is owned by the cohort rotation, not the template
        let Some(group) = dominant_group(grid, row, previous_week)
            .filter(|&group| group != crate::domain::rules::ShiftGroup::Night)
        else {
            continue;
        };
        for &day in week {
            if !grid.is_unassigned(row, day) {
                continue;
            }
            let weekday = grid.date(day).weekday();
            let carried = previous_week
                .iter()
                .find(|&&prev| grid.date(prev).weekday() == weekday)
                .and_then(|&prev| grid.get(row, prev))
                .filter(|&shift| group_of(shift) == Some(group));

            let fallbacks = group_shifts(group)
                .iter()
                .copied()
                .filter(|&shift| Some(shift) != carried);
            for shift in carried.into_iter().chain(fallbacks) {
                if template_slot_fits(grid, roster, row, day, week, shift, config, coverage) {
                    grid.set(row, day, shift);
                    break;
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn template_slot_fits(
    grid: &ScheduleGrid,
    roster: &Roster,
    row: usize,
    day: usize,
    week: &[usize],
    shift: Shift,
    config: &SchedulerConfig,
    coverage: &CoverageRequirements,
) -> bool {
    let weekend = is_weekend_day(grid, day);
    let below_minimum = coverage
        .for_day(weekend)
        .level(shift)
        .is_some_and(|level| grid.count_on_day(day, shift, roster.core_rows()) < level.minimum);
    below_minimum
        && roster.profile(row).allows(shift, weekend)
        && transition_ok(grid, roster, row, day, shift)
        && work_streak_before(grid, roster, row, day) < 5
        && can_still_take_consecutive_off(grid, row, week, day, config.off_days_per_week)
}

/// Phase 8: underworked engineers are offered shifts that still sit below
/// their preferred level; every slot that stays open becomes `Off`.
fn fill_remaining(
    grid: &mut ScheduleGrid,
    roster: &Roster,
    core_order: &[usize],
    weeks: &[Vec<usize>],
    config: &SchedulerConfig,
    coverage: &CoverageRequirements,
) {
    let week_of = week_index(grid, weeks);

    for day in 0..grid.day_count() {
        let weekend = is_weekend_day(grid, day);
        for &row in core_order {
            if !grid.is_unassigned(row, day) {
                continue;
            }
            let week = weeks[week_of[day]].as_slice();
            if grid.work_count_in(row, week) < config.target_shifts_per_week {
                for shift in config.day_shift_priority() {
                    let Some(level) = coverage.for_day(weekend).level(shift) else {
                        continue;
                    };
                    if grid.count_on_day_all(day, shift) >= level.preferred {
                        continue;
                    }
                    if roster.profile(row).allows(shift, weekend)
                        && transition_ok(grid, roster, row, day, shift)
                        && work_streak_before(grid, roster, row, day) < 5
                        && can_still_take_consecutive_off(
                            grid,
                            row,
                            week,
                            day,
                            config.off_days_per_week,
                        )
                    {
                        grid.set(row, day, shift);
                        break;
                    }
                }
            }
            if grid.is_unassigned(row, day) {
                grid.set(row, day, Shift::Off);
            }
        }
    }
}

/// Phase 9: hand shifts from engineers above the weekly target to engineers
/// below the weekly floor, wherever the receiver can legally take them.
fn balance_workload(
    grid: &mut ScheduleGrid,
    roster: &Roster,
    weeks: &[Vec<usize>],
    config: &SchedulerConfig,
    report: &mut PhaseReport,
) {
    for week in weeks {
        if week.len() < 4 {
            continue;
        }
        let mut guard = 0;
        loop {
            guard += 1;
            if guard > 64 {
                break;
            }
            let counts: Vec<(usize, u32)> = roster
                .core_rows()
                .iter()
                .map(|&row| (row, grid.work_count_in(row, week)))
                .collect();

            let Some(&(receiver, _)) = counts
                .iter()
                .filter(|&&(_, count)| count < config.min_shifts_per_week)
                .min_by_key(|&&(row, count)| (count, row))
            else {
                break;
            };

            let mut donors: Vec<(usize, u32)> = counts
                .iter()
                .copied()
                .filter(|&(_, count)| count > config.target_shifts_per_week)
                .collect();
            donors.sort_by_key(|&(row, count)| (std::cmp::Reverse(count), row));

            if !shift_one_over(grid, roster, &donors, receiver, week, config) {
                break;
            }
        }
    }

    let unbalanced = weeks
        .iter()
        .filter(|week| week.len() >= 4)
        .filter(|week| {
            let counts: Vec<u32> = roster
                .core_rows()
                .iter()
                .map(|&row| grid.work_count_in(row, week))
                .collect();
            match (counts.iter().max(), counts.iter().min()) {
                (Some(max), Some(min)) => max - min > 2,
                _ => false,
            }
        })
        .count();
    if unbalanced > 0 {
        report.warnings.push(Warning {
            code: WarningCode::WorkloadImbalance,
            message: format!(
                "Weekly workload spread exceeds 2 shifts in {unbalanced} week(s) after balancing"
            ),
        });
    }
}

fn shift_one_over(
    grid: &mut ScheduleGrid,
    roster: &Roster,
    donors: &[(usize, u32)],
    receiver: usize,
    week: &[usize],
    config: &SchedulerConfig,
) -> bool {
    for &(donor, _) in donors {
        for &day in week {
            // Night slots belong to the cohort rotation and stay put
            let Some(shift) = grid
                .get(donor, day)
                .filter(|s| s.is_work() && *s != Shift::Night)
            else {
                continue;
            };
            if grid.get(receiver, day) != Some(Shift::Off) {
                continue;
            }
            let weekend = is_weekend_day(grid, day);
            if !roster.profile(receiver).allows(shift, weekend) {
                continue;
            }
            if !transition_ok(grid, roster, receiver, day, shift) {
                continue;
            }
            let streak = work_streak_before(grid, roster, receiver, day)
                + 1
                + work_streak_after(grid, receiver, day);
            if streak > 6 {
                continue;
            }
            if !can_still_take_consecutive_off(grid, receiver, week, day, config.off_days_per_week)
            {
                continue;
            }
            grid.set(donor, day, Shift::Off);
            grid.set(receiver, day, shift);
            return true;
        }
    }
    false
}

fn week_index(grid: &ScheduleGrid, weeks: &[Vec<usize>]) -> Vec<usize> {
    let mut week_of = vec![0usize; grid.day_count()];
    for (index, week) in weeks.iter().enumerate() {
        for &day in week {
            week_of[day] = index;
        }
    }
    week_of
}

fn partial_check(
    grid: &ScheduleGrid,
    roster: &Roster,
    coverage: &CoverageRequirements,
    weeks: &[Vec<usize>],
    config: &SchedulerConfig,
    phase: &str,
) {
    let issues = validator::validate(
        grid,
        roster,
        coverage,
        weeks,
        config,
        ValidationMode::Partial,
    );
    tracing::debug!(phase, open_issues = issues.len(), "Partial validation");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::time::month_days;
    use shared::types::{Engineer, ScheduleInput, Tier, UnavailabilityKind};
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

    fn build_roster(engineers: Vec<Engineer>) -> (Roster, Vec<NaiveDate>) {
        let input = ScheduleInput {
            engineers,
            year: 2026,
            month: 6,
            holidays: Vec::new(),
            approved_requests: Vec::new(),
            coverage: None,
            previous_month: Vec::new(),
        };
        let config = SchedulerConfig::default();
        let month_start = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let (roster, _, _) = Roster::build(&input, &config, month_start);
        (roster, month_days(2026, 6))
    }

    #[test]
    fn initialise_prefills_blackouts_and_fixed_offs() {
        let mut blocked = plain_engineer();
        let vacation = NaiveDate::from_ymd_opt(2026, 6, 3).unwrap();
        let predetermined = NaiveDate::from_ymd_opt(2026, 6, 4).unwrap();
        blocked.unavailable_days = [vacation, predetermined].into_iter().collect();
        blocked
            .unavailable_kinds
            .insert(predetermined, UnavailabilityKind::PredeterminedOff);

        let mut fixed = plain_engineer();
        // Friday and Saturday off, every week
        fixed.fixed_off_days = [5u8, 6u8].into_iter().collect();

        let (roster, days) = build_roster(vec![blocked, fixed]);
        let grid = initialise_grid(&roster, &days);

        assert_eq!(grid.get(0, 2), Some(Shift::Unavailable));
        assert_eq!(grid.get(0, 3), Some(Shift::Off));
        assert!(grid.is_unassigned(0, 0));

        // June 5th 2026 is the first Friday
        assert_eq!(grid.get(1, 4), Some(Shift::Off));
        assert_eq!(grid.get(1, 5), Some(Shift::Off));
        assert!(grid.is_unassigned(1, 6));
    }

    #[test]
    fn trainees_get_weekday_training_and_weekend_rest() {
        let mut trainee = plain_engineer();
        trainee.in_training = true;
        let (roster, days) = build_roster(vec![plain_engineer(), trainee]);
        let mut grid = initialise_grid(&roster, &days);

        assign_training(&mut grid, &roster);

        let row = roster.trainee_rows()[0];
        for day in 0..5 {
            assert_eq!(grid.get(row, day), Some(Shift::Training));
        }
        assert_eq!(grid.get(row, 5), Some(Shift::Off));
        assert_eq!(grid.get(row, 6), Some(Shift::Off));
    }

    #[test]
    fn template_copy_keeps_the_dominant_group() {
        let (roster, days) = build_roster(vec![plain_engineer()]);
        let mut grid = initialise_grid(&roster, &days);
        let config = SchedulerConfig::default();
        let coverage = config.effective_coverage(None);

        // Week 1: early group Monday..Friday, weekend off
        for day in 0..5 {
            grid.set(0, day, Shift::Early);
        }
        grid.set(0, 5, Shift::Off);
        grid.set(0, 6, Shift::Off);

        let previous: Vec<usize> = (0..7).collect();
        let week: Vec<usize> = (7..14).collect();
        copy_week_template(&mut grid, &roster, &[0], &previous, &week, &config, &coverage);

        let copied: Vec<usize> = week
            .iter()
            .copied()
            .filter(|&day| grid.get(0, day).is_some_and(Shift::is_work))
            .collect();
        assert!(!copied.is_empty());
        for &day in &copied {
            assert_eq!(grid.get(0, day), Some(Shift::Early));
        }
        // The copy never floods the whole week; an off pair stays reachable
        assert!(can_still_take_consecutive_off(&grid, 0, &week, usize::MAX, 2));
    }

    #[test]
    fn fill_leaves_no_open_slot() {
        let engineers: Vec<Engineer> = (0..5).map(|_| plain_engineer()).collect();
        let (roster, days) = build_roster(engineers);
        let mut grid = initialise_grid(&roster, &days);
        let config = SchedulerConfig::default();
        let coverage = config.effective_coverage(None);

        let mut weeks = Vec::new();
        let mut cursor = 0usize;
        for week in shared::time::weeks_of(2026, 6) {
            weeks.push((cursor..cursor + week.len()).collect::<Vec<usize>>());
            cursor += week.len();
        }

        let core: Vec<usize> = roster.core_rows().to_vec();
        fill_remaining(&mut grid, &roster, &core, &weeks, &config, &coverage);

        assert!(grid.unassigned_slots().is_empty());
    }
}
