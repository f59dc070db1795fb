use std::collections::BTreeSet;

use shared::types::{CoverageRequirements, Shift, Violation, ViolationKind, Warning, WarningCode};

use crate::config::SchedulerConfig;
use crate::domain::PhaseReport;
use crate::domain::grid::ScheduleGrid;
use crate::domain::roster::Roster;
use crate::domain::rules::{is_weekend_day, transition_ok, work_streak_before};

const AVAILABILITY_WEIGHT: f64 = 50.0;
const ROTATION_BONUS: f64 = 30.0;
const PREFERENCE_BONUS: f64 = 20.0;
const MIN_AVAILABILITY_RATIO: f64 = 0.5;

/// Fills night slots in two-week blocks. Each block elects a small cohort of
/// night-eligible engineers and rotates membership between blocks so nobody
/// stays on nights for a whole month.
pub fn assign_night_cohorts(
    grid: &mut ScheduleGrid,
    roster: &Roster,
    core_order: &[usize],
    weeks: &[Vec<usize>],
    config: &SchedulerConfig,
    coverage: &CoverageRequirements,
    report: &mut PhaseReport,
) {
    let eligible: Vec<usize> = core_order
        .iter()
        .copied()
        .filter(|&row| roster.profile(row).night_eligible())
        .collect();

    if (eligible.len() as u32) < config.min_night_count {
        report.violations.push(Violation {
            kind: ViolationKind::InsufficientCoverage,
            engineer_id: None,
            date: None,
            shift: Some(Shift::Night),
            message: format!(
                "Only {} night-eligible engineers for a floor of {} per night",
                eligible.len(),
                config.min_night_count
            ),
        });
    }

    let mut previous_cohort: BTreeSet<usize> = BTreeSet::new();

    for block in weeks.chunks(2) {
        let block_days: Vec<usize> = block.iter().flatten().copied().collect();
        if block_days.is_empty() {
            continue;
        }

        let cohort = elect_cohort(grid, roster, &eligible, &block_days, &previous_cohort, config);
        if (cohort.len() as u32) < config.preferred_night_count {
            report.warnings.push(Warning {
                code: WarningCode::ReducedNightCohort,
                message: format!(
                    "Night cohort for the block starting {} has {} members instead of {}",
                    grid.date(block_days[0]),
                    cohort.len(),
                    config.preferred_night_count
                ),
            });
        }

        for &day in &block_days {
            let weekend = is_weekend_day(grid, day);
            let mut assigned = grid.count_on_day(day, Shift::Night, roster.core_rows());

            // On days where the off reservations leave no slack, pulling a
            // third engineer onto nights would starve the day shifts; the
            // target shrinks toward the floor instead.
            let table = coverage.for_day(weekend);
            let day_shift_need =
                table.early.minimum + table.morning.minimum + table.late.minimum;
            let free: u32 = roster
                .core_rows()
                .iter()
                .filter(|&&row| grid.is_unassigned(row, day))
                .count() as u32;
            let target = free
                .saturating_sub(day_shift_need)
                .clamp(config.min_night_count, config.preferred_night_count);

            for &row in &cohort {
                if assigned >= target {
                    break;
                }
                if grid.is_unassigned(row, day)
                    && roster.profile(row).allows(Shift::Night, weekend)
                    && transition_ok(grid, roster, row, day, Shift::Night)
                    && work_streak_before(grid, roster, row, day) < 6
                {
                    grid.set(row, day, Shift::Night);
                    assigned += 1;
                }
            }

            let minimum = table.night.minimum;
            if assigned < minimum {
                report.violations.push(Violation {
                    kind: ViolationKind::CoverageFailure,
                    engineer_id: None,
                    date: Some(grid.date(day)),
                    shift: Some(Shift::Night),
                    message: format!("Night coverage {assigned} of {minimum} required"),
                });
            }
        }

        previous_cohort = cohort.into_iter().collect();
    }
}

/// Scores the eligible pool for one block and keeps the top scorers with
/// enough free days. Members of the previous cohort lose the rotation bonus.
fn elect_cohort(
    grid: &ScheduleGrid,
    roster: &Roster,
    eligible: &[usize],
    block_days: &[usize],
    previous_cohort: &BTreeSet<usize>,
    config: &SchedulerConfig,
) -> Vec<usize> {
    let mut scored: Vec<(usize, f64)> = Vec::with_capacity(eligible.len());
    for &row in eligible {
        let free = block_days
            .iter()
            .filter(|&&day| grid.is_unassigned(row, day))
            .count();
        let ratio = free as f64 / block_days.len() as f64;
        if ratio < MIN_AVAILABILITY_RATIO {
            continue;
        }

        let profile = roster.profile(row);
        let mut score = ratio * AVAILABILITY_WEIGHT;
        if !previous_cohort.contains(&row) {
            score += ROTATION_BONUS;
        }
        // Explicit preference only; an empty allow-list earns no bonus
        if profile.prefers(Shift::Night, false) || profile.prefers(Shift::Night, true) {
            score += PREFERENCE_BONUS;
        }
        scored.push((row, score));
    }

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    let size = (config.preferred_night_count as usize).min(eligible.len());
    scored.into_iter().take(size).map(|(row, _)| row).collect()
}
