use shared::types::{CoverageRequirements, Shift};

use crate::config::SchedulerConfig;
use crate::domain::grid::ScheduleGrid;
use crate::domain::roster::Roster;
use crate::domain::rules::{is_weekend_day, transition_ok};

/// Supplemental coverage. Floaters top shifts up toward the preferred level
/// (not the minimum), under a weekly cap and a no-collision rule; whatever
/// stays unassigned afterwards becomes time off.
pub fn assign_floaters(
    grid: &mut ScheduleGrid,
    roster: &Roster,
    floater_order: &[usize],
    weeks: &[Vec<usize>],
    config: &SchedulerConfig,
    coverage: &CoverageRequirements,
) {
    let mut week_of = vec![0usize; grid.day_count()];
    for (index, week) in weeks.iter().enumerate() {
        for &day in week {
            week_of[day] = index;
        }
    }

    for day in 0..grid.day_count() {
        let weekend = is_weekend_day(grid, day);
        for shift in config.day_shift_priority() {
            let Some(level) = coverage.for_day(weekend).level(shift) else {
                continue;
            };
            if grid.count_on_day_all(day, shift) >= level.preferred {
                continue;
            }

            for &floater in floater_order {
                if !grid.is_unassigned(floater, day) {
                    continue;
                }
                let week = &weeks[week_of[day]];
                let worked = grid.work_count_in(floater, week);
                // Would-exceed check against the fractional cap: at 2.5 a
                // third shift is out, at 4.0 a fifth.
                if f64::from(worked + 1) > config.floater_weekly_cap {
                    continue;
                }
                if !roster.profile(floater).allows(shift, weekend) {
                    continue;
                }
                if !transition_ok(grid, roster, floater, day, shift) {
                    continue;
                }
                if floater_collision(grid, roster, floater, day, shift) {
                    continue;
                }
                grid.set(floater, day, shift);
                break;
            }
        }
    }

    // Remaining floater slots are time off
    for &floater in floater_order {
        for day in 0..grid.day_count() {
            if grid.is_unassigned(floater, day) {
                grid.set(floater, day, Shift::Off);
            }
        }
    }
}

fn floater_collision(
    grid: &ScheduleGrid,
    roster: &Roster,
    floater: usize,
    day: usize,
    shift: Shift,
) -> bool {
    roster
        .floater_rows()
        .iter()
        .any(|&other| other != floater && grid.get(other, day) == Some(shift))
}
