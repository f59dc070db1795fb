use shared::types::{CoverageRequirements, Shift, Violation, ViolationKind};

use crate::config::SchedulerConfig;
use crate::domain::grid::ScheduleGrid;
use crate::domain::roster::Roster;
use crate::domain::rules::{
    has_consecutive_off_pair, is_weekend_day, rest_hours_between, transition_violation,
};

/// Partial mode runs between pipeline phases where the grid is legitimately
/// incomplete; it applies the same checks except the weekly off requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Partial,
    Final,
}

pub struct ValidationContext<'a> {
    pub grid: &'a ScheduleGrid,
    pub roster: &'a Roster,
    pub coverage: &'a CoverageRequirements,
    pub weeks: &'a [Vec<usize>],
    pub config: &'a SchedulerConfig,
    pub mode: ValidationMode,
}

pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn check(&self, cx: &ValidationContext<'_>) -> Vec<Violation>;
}

/// The end-state rule set, in reporting order.
pub fn build_rules() -> Vec<Box<dyn ValidationRule>> {
    vec![
        Box::new(UnassignedRule),
        Box::new(CoverageRule),
        Box::new(RestPeriodRule),
        Box::new(ConsecutiveDaysRule),
        Box::new(OffDayRule),
        Box::new(FloaterRule),
    ]
}

pub fn validate(
    grid: &ScheduleGrid,
    roster: &Roster,
    coverage: &CoverageRequirements,
    weeks: &[Vec<usize>],
    config: &SchedulerConfig,
    mode: ValidationMode,
) -> Vec<Violation> {
    let cx = ValidationContext {
        grid,
        roster,
        coverage,
        weeks,
        config,
        mode,
    };
    let mut violations = Vec::new();
    for rule in build_rules() {
        let found = rule.check(&cx);
        if !found.is_empty() {
            tracing::trace!(rule = rule.name(), count = found.len(), "Rule reported");
        }
        violations.extend(found);
    }
    violations
}

/// A slot the pipeline never decided is a defect in the engine itself.
struct UnassignedRule;

impl ValidationRule for UnassignedRule {
    fn name(&self) -> &'static str {
        "unassigned_slots"
    }

    fn check(&self, cx: &ValidationContext<'_>) -> Vec<Violation> {
        if cx.mode == ValidationMode::Partial {
            return Vec::new();
        }
        let mut violations = Vec::new();
        for day in 0..cx.grid.day_count() {
            for row in 0..cx.grid.engineer_count() {
                if cx.grid.is_unassigned(row, day) {
                    violations.push(Violation {
                        kind: ViolationKind::Configuration,
                        engineer_id: Some(cx.grid.engineer_id(row)),
                        date: Some(cx.grid.date(day)),
                        shift: None,
                        message: "Slot left unassigned by the pipeline".to_string(),
                    });
                }
            }
        }
        violations
    }
}

/// Core headcount per day and shift against the minimum table.
struct CoverageRule;

impl ValidationRule for CoverageRule {
    fn name(&self) -> &'static str {
        "coverage"
    }

    fn check(&self, cx: &ValidationContext<'_>) -> Vec<Violation> {
        let mut violations = Vec::new();
        for day in 0..cx.grid.day_count() {
            let weekend = is_weekend_day(cx.grid, day);
            for shift in Shift::WORK_SHIFTS {
                let Some(level) = cx.coverage.for_day(weekend).level(shift) else {
                    continue;
                };
                let count = cx.grid.count_on_day(day, shift, cx.roster.core_rows());
                if count < level.minimum {
                    violations.push(Violation {
                        kind: ViolationKind::CoverageViolation,
                        engineer_id: None,
                        date: Some(cx.grid.date(day)),
                        shift: Some(shift),
                        message: format!(
                            "{shift:?} staffed with {count} of {} required",
                            level.minimum
                        ),
                    });
                }
            }
        }
        violations
    }
}

/// Eleven-hour rest between consecutive working days, tail boundary included.
struct RestPeriodRule;

impl ValidationRule for RestPeriodRule {
    fn name(&self) -> &'static str {
        "rest_period"
    }

    fn check(&self, cx: &ValidationContext<'_>) -> Vec<Violation> {
        let mut violations = Vec::new();
        for row in 0..cx.grid.engineer_count() {
            if let Some(prev) = cx.roster.tail_last(row)
                && let Some(first) = cx.grid.get(row, 0)
                && transition_violation(prev, first).is_some()
            {
                violations.push(Violation {
                    kind: ViolationKind::TransitionCrossMonth,
                    engineer_id: Some(cx.grid.engineer_id(row)),
                    date: Some(cx.grid.date(0)),
                    shift: Some(first),
                    message: format!(
                        "{prev:?} on the last day of the previous month followed by {first:?}"
                    ),
                });
            }

            for day in 1..cx.grid.day_count() {
                let (Some(prev), Some(current)) =
                    (cx.grid.get(row, day - 1), cx.grid.get(row, day))
                else {
                    continue;
                };
                if transition_violation(prev, current).is_none() {
                    continue;
                }
                let rest = rest_hours_between(
                    prev,
                    current,
                    is_weekend_day(cx.grid, day - 1),
                    is_weekend_day(cx.grid, day),
                );
                let rest_note = rest
                    .map(|h| format!("{h:.1}h rest"))
                    .unwrap_or_else(|| "short rest".to_string());
                violations.push(Violation {
                    kind: ViolationKind::RestPeriod,
                    engineer_id: Some(cx.grid.engineer_id(row)),
                    date: Some(cx.grid.date(day)),
                    shift: Some(current),
                    message: format!("{prev:?} into {current:?} leaves {rest_note}, 11h required"),
                });
            }
        }
        violations
    }
}

/// No more than six working days in a row, counted across the month boundary.
struct ConsecutiveDaysRule;

impl ValidationRule for ConsecutiveDaysRule {
    fn name(&self) -> &'static str {
        "consecutive_days"
    }

    fn check(&self, cx: &ValidationContext<'_>) -> Vec<Violation> {
        let mut violations = Vec::new();
        for row in 0..cx.grid.engineer_count() {
            let mut run = 0u32;
            let mut start = 0usize;
            for day in 0..=cx.grid.day_count() {
                let working = day < cx.grid.day_count()
                    && cx
                        .grid
                        .get(row, day)
                        .is_some_and(Shift::counts_toward_streak);
                if working {
                    if run == 0 {
                        start = day;
                    }
                    run += 1;
                    continue;
                }
                if run > 0 {
                    let tail = if start == 0 {
                        cx.roster.tail_work_run(row)
                    } else {
                        0
                    };
                    let total = run + tail;
                    if total > 6 {
                        let kind = if run > 6 {
                            ViolationKind::ConsecutiveDays
                        } else {
                            ViolationKind::ConsecutiveDaysCrossMonth
                        };
                        let carried = if tail > 0 {
                            format!(" ({tail} carried over from the previous month)")
                        } else {
                            String::new()
                        };
                        violations.push(Violation {
                            kind,
                            engineer_id: Some(cx.grid.engineer_id(row)),
                            date: Some(cx.grid.date(start)),
                            shift: None,
                            message: format!("{total} consecutive working days{carried}"),
                        });
                    }
                    run = 0;
                }
            }
        }
        violations
    }
}

/// Weekly off requirement: enough off days, and two of them adjacent. Weeks
/// with an unavailability and boundary stubs are exempt.
struct OffDayRule;

impl ValidationRule for OffDayRule {
    fn name(&self) -> &'static str {
        "off_days"
    }

    fn check(&self, cx: &ValidationContext<'_>) -> Vec<Violation> {
        if cx.mode == ValidationMode::Partial {
            return Vec::new();
        }
        let target = cx.config.off_days_per_week;
        let mut violations = Vec::new();
        for row in 0..cx.grid.engineer_count() {
            for week in cx.weeks {
                if week.len() < 7 {
                    continue;
                }
                if week
                    .iter()
                    .any(|&day| cx.grid.get(row, day) == Some(Shift::Unavailable))
                {
                    continue;
                }
                let offs = cx.grid.off_days_in(row, week);
                let week_start = cx.grid.date(week[0]);
                if (offs.len() as u32) < target {
                    violations.push(Violation {
                        kind: ViolationKind::OffDayViolation,
                        engineer_id: Some(cx.grid.engineer_id(row)),
                        date: Some(week_start),
                        shift: None,
                        message: format!(
                            "Only {} off day(s) in the week starting {week_start}, {target} required",
                            offs.len()
                        ),
                    });
                } else if target >= 2 && !has_consecutive_off_pair(cx.grid, row, week) {
                    violations.push(Violation {
                        kind: ViolationKind::OffDayViolation,
                        engineer_id: Some(cx.grid.engineer_id(row)),
                        date: Some(week_start),
                        shift: None,
                        message: format!(
                            "Off days in the week starting {week_start} are not consecutive"
                        ),
                    });
                }
            }
        }
        violations
    }
}

/// Floater weekly cap and the same-shift collision rule.
struct FloaterRule;

impl ValidationRule for FloaterRule {
    fn name(&self) -> &'static str {
        "floaters"
    }

    fn check(&self, cx: &ValidationContext<'_>) -> Vec<Violation> {
        let mut violations = Vec::new();
        for &floater in cx.roster.floater_rows() {
            for week in cx.weeks {
                let worked = cx.grid.work_count_in(floater, week);
                if f64::from(worked) > cx.config.floater_weekly_cap {
                    violations.push(Violation {
                        kind: ViolationKind::FloaterOverwork,
                        engineer_id: Some(cx.grid.engineer_id(floater)),
                        date: Some(cx.grid.date(week[0])),
                        shift: None,
                        message: format!(
                            "Floater worked {worked} shifts in the week starting {}, cap is {}",
                            cx.grid.date(week[0]),
                            cx.config.floater_weekly_cap
                        ),
                    });
                }
            }
        }

        for day in 0..cx.grid.day_count() {
            for shift in Shift::WORK_SHIFTS {
                let both = cx
                    .roster
                    .floater_rows()
                    .iter()
                    .filter(|&&f| cx.grid.get(f, day) == Some(shift))
                    .count();
                if both >= 2 {
                    violations.push(Violation {
                        kind: ViolationKind::FloaterCollision,
                        engineer_id: None,
                        date: Some(cx.grid.date(day)),
                        shift: Some(shift),
                        message: format!("Both floaters hold {shift:?} on {}", cx.grid.date(day)),
                    });
                }
            }
        }
        violations
    }
}
