use shared::time::is_weekend;
use shared::types::Shift;

use crate::domain::grid::ScheduleGrid;
use crate::domain::roster::Roster;

/// ArbZG §5: minimum rest between two working days.
pub const REQUIRED_REST_HOURS: f64 = 11.0;

/// ArbZG-derived cap on consecutive working days, previous-month tail included.
pub const MAX_CONSECUTIVE_WORK_DAYS: u32 = 6;

/// Transitions that break the rest interval. Anything whose left side is not
/// a working shift is allowed.
pub const FORBIDDEN_TRANSITIONS: [(Shift, Shift); 4] = [
    (Shift::Night, Shift::Early),
    (Shift::Night, Shift::Morning),
    (Shift::Late, Shift::Early),
    (Shift::Late, Shift::Morning),
];

// region: Shift times

/// Clock hours since midnight of the shift's start day; `end` runs past 24
/// for the overnight shift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftTimes {
    pub start: f64,
    pub end: f64,
}

/// Operational time table. Only the Late shift differs on weekends (ends an
/// hour earlier); `None` for tokens without clock times.
pub fn shift_times(shift: Shift, weekend: bool) -> Option<ShiftTimes> {
    let times = match shift {
        Shift::Early => ShiftTimes {
            start: 7.0,
            end: 15.5,
        },
        Shift::Morning => ShiftTimes {
            start: 10.0,
            end: 18.5,
        },
        Shift::Late => ShiftTimes {
            start: 15.0,
            end: if weekend { 22.5 } else { 23.5 },
        },
        Shift::Night => ShiftTimes {
            start: 23.0,
            end: 31.5,
        },
        _ => return None,
    };
    Some(times)
}

/// Rest between a shift on day D and a shift on day D+1, from the time table.
/// Used for reporting; legality is decided by [`FORBIDDEN_TRANSITIONS`].
pub fn rest_hours_between(
    prev: Shift,
    next: Shift,
    prev_weekend: bool,
    next_weekend: bool,
) -> Option<f64> {
    let prev_times = shift_times(prev, prev_weekend)?;
    let next_times = shift_times(next, next_weekend)?;
    Some(next_times.start + 24.0 - prev_times.end)
}

// endregion: Shift times

// region: Transitions

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForbiddenTransition {
    pub from: Shift,
    pub to: Shift,
}

/// `Some` when placing `next` the day after `prev` violates the rest rule.
pub fn transition_violation(prev: Shift, next: Shift) -> Option<ForbiddenTransition> {
    if !prev.is_work() || !next.is_work() {
        return None;
    }
    FORBIDDEN_TRANSITIONS
        .iter()
        .find(|&&(from, to)| from == prev && to == next)
        .map(|&(from, to)| ForbiddenTransition { from, to })
}

/// Checks `candidate` at (`row`, `day`) against both neighbours, reaching into
/// the previous-month tail when `day` is the first of the month.
pub fn transition_ok(
    grid: &ScheduleGrid,
    roster: &Roster,
    row: usize,
    day: usize,
    candidate: Shift,
) -> bool {
    let prev = if day == 0 {
        roster.tail_last(row)
    } else {
        grid.get(row, day - 1)
    };
    if let Some(prev) = prev
        && transition_violation(prev, candidate).is_some()
    {
        return false;
    }

    if day + 1 < grid.day_count()
        && let Some(next) = grid.get(row, day + 1)
        && transition_violation(candidate, next).is_some()
    {
        return false;
    }
    true
}

// endregion: Transitions

// region: Shift groups

/// Buckets for consistency scoring; an engineer who mostly worked one group
/// last week scores higher for the same group this week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShiftGroup {
    DayEarly,
    DayLate,
    Night,
}

pub fn group_of(shift: Shift) -> Option<ShiftGroup> {
    match shift {
        Shift::Early | Shift::Morning => Some(ShiftGroup::DayEarly),
        Shift::Late => Some(ShiftGroup::DayLate),
        Shift::Night => Some(ShiftGroup::Night),
        _ => None,
    }
}

pub fn group_shifts(group: ShiftGroup) -> &'static [Shift] {
    match group {
        ShiftGroup::DayEarly => &[Shift::Early, Shift::Morning],
        ShiftGroup::DayLate => &[Shift::Late],
        ShiftGroup::Night => &[Shift::Night],
    }
}

/// The group the engineer worked most during `days`; ties resolve toward the
/// earlier group in declaration order.
pub fn dominant_group(grid: &ScheduleGrid, row: usize, days: &[usize]) -> Option<ShiftGroup> {
    let mut counts = [0u32; 3];
    for &day in days {
        if let Some(shift) = grid.get(row, day)
            && let Some(group) = group_of(shift)
        {
            counts[group as usize] += 1;
        }
    }
    let best = *counts.iter().max()?;
    if best == 0 {
        return None;
    }
    [ShiftGroup::DayEarly, ShiftGroup::DayLate, ShiftGroup::Night]
        .into_iter()
        .find(|&g| counts[g as usize] == best)
}

// endregion: Shift groups

// region: Streaks and off eligibility

/// Length of the work streak ending the day before `day`, walking backward
/// through assigned slots and on into the previous-month tail. An unassigned
/// slot breaks the streak.
pub fn work_streak_before(grid: &ScheduleGrid, roster: &Roster, row: usize, day: usize) -> u32 {
    let mut run = 0;
    let mut cursor = day;
    while cursor > 0 {
        cursor -= 1;
        match grid.get(row, cursor) {
            Some(shift) if shift.counts_toward_streak() => run += 1,
            _ => return run,
        }
    }
    run + roster.tail_work_run(row)
}

/// Length of the assigned work run starting the day after `day`.
pub fn work_streak_after(grid: &ScheduleGrid, row: usize, day: usize) -> u32 {
    let mut run = 0;
    let mut cursor = day + 1;
    while cursor < grid.day_count() {
        match grid.get(row, cursor) {
            Some(shift) if shift.counts_toward_streak() => run += 1,
            _ => break,
        }
        cursor += 1;
    }
    run
}

/// True when two adjacent days of `week` are both `Off` for this engineer.
pub fn has_consecutive_off_pair(grid: &ScheduleGrid, row: usize, week: &[usize]) -> bool {
    week.windows(2).any(|pair| {
        grid.get(row, pair[0]) == Some(Shift::Off) && grid.get(row, pair[1]) == Some(Shift::Off)
    })
}

/// Whether the engineer can still end up with the required off days in this
/// week if `assigning_day` is turned into a work day. Partial boundary weeks
/// and weeks containing an unavailability are exempt from the off
/// requirement; the rest of that calendar week belongs to the adjacent month.
pub fn can_still_take_consecutive_off(
    grid: &ScheduleGrid,
    row: usize,
    week: &[usize],
    assigning_day: usize,
    off_target: u32,
) -> bool {
    if week.len() < 7 {
        return true;
    }
    if week
        .iter()
        .any(|&d| grid.get(row, d) == Some(Shift::Unavailable))
    {
        return true;
    }

    let off_capable = |day: usize| {
        day != assigning_day && matches!(grid.get(row, day), None | Some(Shift::Off))
    };

    if off_target <= 1 {
        return week.iter().any(|&d| off_capable(d));
    }
    week.windows(2)
        .any(|pair| off_capable(pair[0]) && off_capable(pair[1]))
}

// endregion: Streaks and off eligibility

/// Weekend day by index into the grid's calendar.
pub fn is_weekend_day(grid: &ScheduleGrid, day: usize) -> bool {
    is_weekend(grid.date(day))
}

/// Extra headcount a day must keep available beyond its coverage minima.
/// The Monday that opens a night block absorbs the outgoing cohort and the
/// previous evening's late crew, all of whom can only legally work Late.
pub fn rest_carryover(weeks: &[Vec<usize>], day: usize) -> u32 {
    let block_monday = (2..weeks.len())
        .step_by(2)
        .any(|index| weeks[index].first() == Some(&day));
    if block_monday { 2 } else { 0 }
}

/// Sum of the coverage minima a day of this type must staff.
pub fn day_minimum_total(coverage: &shared::types::CoverageRequirements, weekend: bool) -> u32 {
    let table = coverage.for_day(weekend);
    table.early.minimum + table.morning.minimum + table.late.minimum + table.night.minimum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_transitions_match_rest_math() {
        for &(from, to) in &FORBIDDEN_TRANSITIONS {
            let rest = rest_hours_between(from, to, false, false).unwrap();
            assert!(
                rest < REQUIRED_REST_HOURS,
                "{from:?}->{to:?} gives {rest}h which should be short rest"
            );
        }
    }

    #[test]
    fn legal_day_transitions_have_full_rest() {
        for &(prev, next) in &[
            (Shift::Early, Shift::Early),
            (Shift::Early, Shift::Late),
            (Shift::Morning, Shift::Early),
            (Shift::Late, Shift::Late),
            (Shift::Late, Shift::Night),
            (Shift::Night, Shift::Night),
        ] {
            assert!(transition_violation(prev, next).is_none());
            let rest = rest_hours_between(prev, next, false, false).unwrap();
            assert!(rest >= REQUIRED_REST_HOURS, "{prev:?}->{next:?}: {rest}h");
        }
    }

    #[test]
    fn off_left_side_is_always_legal() {
        for next in Shift::WORK_SHIFTS {
            assert!(transition_violation(Shift::Off, next).is_none());
            assert!(transition_violation(Shift::Unavailable, next).is_none());
        }
    }

    #[test]
    fn weekend_late_ends_earlier() {
        let weekday = shift_times(Shift::Late, false).unwrap();
        let weekend = shift_times(Shift::Late, true).unwrap();
        assert_eq!(weekday.end, 23.5);
        assert_eq!(weekend.end, 22.5);
    }

    #[test]
    fn groups_bucket_the_day_shifts() {
        assert_eq!(group_of(Shift::Early), Some(ShiftGroup::DayEarly));
        assert_eq!(group_of(Shift::Morning), Some(ShiftGroup::DayEarly));
        assert_eq!(group_of(Shift::Late), Some(ShiftGroup::DayLate));
        assert_eq!(group_of(Shift::Night), Some(ShiftGroup::Night));
        assert_eq!(group_of(Shift::Off), None);
        assert_eq!(group_of(Shift::Training), None);
    }
}
