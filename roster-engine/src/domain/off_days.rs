use chrono::{Datelike, Weekday};
use shared::types::{CoverageRequirements, Shift, Violation, ViolationKind};

use crate::config::SchedulerConfig;
use crate::domain::PhaseReport;
use crate::domain::grid::ScheduleGrid;
use crate::domain::roster::Roster;
use crate::domain::rules::{
    day_minimum_total, has_consecutive_off_pair, is_weekend_day, rest_carryover,
};

const WEEKEND_DAY_PENALTY: f64 = -15.0;
const HOLIDAY_BONUS: f64 = 5.0;
const MIDWEEK_BONUS: f64 = 3.0;
const ADJACENT_OFF_BONUS: f64 = 12.0;
const SPREAD_PENALTY_PER_ENGINEER: f64 = -3.0;
const TAIL_BREAK_BONUS: f64 = 20.0;

/// Reserve-first off allocation: every core engineer gets their consecutive
/// off pair committed before any day shift is placed, so late weeks cannot be
/// starved by earlier work assignments. Only full Monday-to-Sunday weeks
/// carry the off requirement; a week interrupted by unavailability is exempt.
pub fn reserve_off_days(
    grid: &mut ScheduleGrid,
    roster: &Roster,
    core_order: &[usize],
    weeks: &[Vec<usize>],
    config: &SchedulerConfig,
    coverage: &CoverageRequirements,
    report: &mut PhaseReport,
) {
    for week in weeks {
        if week.len() < 7 {
            continue;
        }
        for &row in core_order {
            if roster.profile(row).has_fixed_off_days() {
                continue;
            }
            if week_has_unavailability(grid, row, week) {
                continue;
            }
            reserve_for_engineer(grid, roster, row, week, weeks, config, coverage, report);
        }
    }
}

fn week_has_unavailability(grid: &ScheduleGrid, row: usize, week: &[usize]) -> bool {
    week.iter()
        .any(|&day| grid.get(row, day) == Some(Shift::Unavailable))
}

/// Resting another engineer on `day` must leave enough available core staff
/// to still reach the day's coverage minima (plus the rest-window carryover).
/// This is the reservation-time edition of the repair gate below.
fn reservation_breaks_coverage(
    grid: &ScheduleGrid,
    roster: &Roster,
    weeks: &[Vec<usize>],
    coverage: &CoverageRequirements,
    day: usize,
) -> bool {
    let weekend = is_weekend_day(grid, day);
    let required = day_minimum_total(coverage, weekend) + rest_carryover(weeks, day);
    let resting = grid.count_on_day(day, Shift::Off, roster.core_rows())
        + grid.count_on_day(day, Shift::Unavailable, roster.core_rows());
    let available_after = (roster.core_rows().len() as u32).saturating_sub(resting + 1);
    available_after < required
}

#[allow(clippy::too_many_arguments)]
fn reserve_for_engineer(
    grid: &mut ScheduleGrid,
    roster: &Roster,
    row: usize,
    week: &[usize],
    weeks: &[Vec<usize>],
    config: &SchedulerConfig,
    coverage: &CoverageRequirements,
    report: &mut PhaseReport,
) {
    let offs = grid.off_days_in(row, week);

    if config.off_days_per_week <= 1 {
        if !offs.is_empty() {
            return;
        }
        let bias_limit = tail_bias_limit(grid, roster, row, week[0]);
        let best = week
            .iter()
            .enumerate()
            .filter(|&(_, &day)| {
                grid.is_unassigned(row, day)
                    && !reservation_breaks_coverage(grid, roster, weeks, coverage, day)
            })
            .map(|(pos, &day)| {
                let mut score = day_score(grid, roster, row, day);
                if bias_limit.is_some_and(|limit| pos <= limit) {
                    score += TAIL_BREAK_BONUS;
                }
                (day, score)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));
        match best {
            Some((day, _)) => grid.set(row, day, Shift::Off),
            None => report.violations.push(reservation_failure(grid, roster, row, week)),
        }
        return;
    }

    if has_consecutive_off_pair(grid, row, week) {
        return;
    }

    let bias_limit = tail_bias_limit(grid, roster, row, week[0]);
    let mut best: Option<(usize, usize, f64)> = None;
    for (pos, pair) in week.windows(2).enumerate() {
        let (d1, d2) = (pair[0], pair[1]);
        if !grid.is_unassigned(row, d1) || !grid.is_unassigned(row, d2) {
            continue;
        }
        if reservation_breaks_coverage(grid, roster, weeks, coverage, d1)
            || reservation_breaks_coverage(grid, roster, weeks, coverage, d2)
        {
            continue;
        }
        let mut score = pair_score(grid, roster, row, d1, d2);
        if bias_limit.is_some_and(|limit| pos <= limit) {
            score += TAIL_BREAK_BONUS;
        }
        if best.is_none_or(|(_, _, s)| score > s) {
            best = Some((d1, d2, score));
        }
    }

    match best {
        Some((d1, d2, _)) => {
            grid.set(row, d1, Shift::Off);
            grid.set(row, d2, Shift::Off);
        }
        // Never fall back to a split pair; report instead.
        None => report.violations.push(reservation_failure(grid, roster, row, week)),
    }
}

/// Verify-and-repair pass run after shift assignment. Restores a consecutive
/// pair where one went missing, reclaiming work slots if it must, but never
/// a slot whose shift would drop below its coverage minimum.
pub fn repair_off_days(
    grid: &mut ScheduleGrid,
    roster: &Roster,
    core_order: &[usize],
    weeks: &[Vec<usize>],
    config: &SchedulerConfig,
    coverage: &CoverageRequirements,
) {
    for week in weeks {
        if week.len() < 7 {
            continue;
        }
        for &row in core_order {
            if roster.profile(row).has_fixed_off_days() {
                continue;
            }
            if week_has_unavailability(grid, row, week) {
                continue;
            }
            if config.off_days_per_week <= 1 {
                if grid.off_days_in(row, week).is_empty() {
                    repair_single(grid, roster, row, week, coverage);
                }
                continue;
            }
            if !has_consecutive_off_pair(grid, row, week) {
                repair_pair(grid, roster, row, week, coverage);
            }
        }
    }
}

fn repair_pair(
    grid: &mut ScheduleGrid,
    roster: &Roster,
    row: usize,
    week: &[usize],
    coverage: &CoverageRequirements,
) {
    // Fewest reclaimed work slots wins; the pair score breaks ties.
    let mut best: Option<(usize, usize, u32, f64)> = None;
    for pair in week.windows(2) {
        let (d1, d2) = (pair[0], pair[1]);
        let mut conversions = 0;
        let mut refused = false;
        for &day in &[d1, d2] {
            match grid.get(row, day) {
                None | Some(Shift::Off) => {}
                Some(shift) if shift.is_work() => {
                    conversions += 1;
                    if conversion_breaks_coverage(grid, roster, day, shift, coverage) {
                        refused = true;
                    }
                }
                _ => refused = true,
            }
        }
        if refused {
            continue;
        }
        let score = pair_score(grid, roster, row, d1, d2);
        let better = match best {
            None => true,
            Some((_, _, c, s)) => conversions < c || (conversions == c && score > s),
        };
        if better {
            best = Some((d1, d2, conversions, score));
        }
    }

    if let Some((d1, d2, _, _)) = best {
        grid.set(row, d1, Shift::Off);
        grid.set(row, d2, Shift::Off);
    }
}

fn repair_single(
    grid: &mut ScheduleGrid,
    roster: &Roster,
    row: usize,
    week: &[usize],
    coverage: &CoverageRequirements,
) {
    let mut best: Option<(usize, u32, f64)> = None;
    for &day in week {
        let conversions = match grid.get(row, day) {
            None => 0,
            Some(shift) if shift.is_work() => {
                if conversion_breaks_coverage(grid, roster, day, shift, coverage) {
                    continue;
                }
                1
            }
            _ => continue,
        };
        let score = day_score(grid, roster, row, day);
        let better = match best {
            None => true,
            Some((_, c, s)) => conversions < c || (conversions == c && score > s),
        };
        if better {
            best = Some((day, conversions, score));
        }
    }
    if let Some((day, _, _)) = best {
        grid.set(row, day, Shift::Off);
    }
}

/// Reclaiming this slot must not push the day's shift below its minimum.
/// Weekends are where this bites (the -100 rule), but a weekday at exactly
/// its minimum is just as unrecoverable.
fn conversion_breaks_coverage(
    grid: &ScheduleGrid,
    roster: &Roster,
    day: usize,
    shift: Shift,
    coverage: &CoverageRequirements,
) -> bool {
    let weekend = is_weekend_day(grid, day);
    let Some(level) = coverage.for_day(weekend).level(shift) else {
        return false;
    };
    grid.count_on_day(day, shift, roster.core_rows()) <= level.minimum
}

fn reservation_failure(
    grid: &ScheduleGrid,
    roster: &Roster,
    row: usize,
    week: &[usize],
) -> Violation {
    Violation {
        kind: ViolationKind::OffDayReservationFailed,
        engineer_id: Some(grid.engineer_id(row)),
        date: Some(grid.date(week[0])),
        shift: None,
        message: format!(
            "No consecutive off slots available for {} in the week starting {}",
            roster.profile(row).engineer.name,
            grid.date(week[0])
        ),
    }
}

fn pair_score(grid: &ScheduleGrid, roster: &Roster, row: usize, d1: usize, d2: usize) -> f64 {
    let mut score = day_score(grid, roster, row, d1) + day_score(grid, roster, row, d2);
    let before_is_off = d1 > 0 && grid.get(row, d1 - 1) == Some(Shift::Off);
    let after_is_off = d2 + 1 < grid.day_count() && grid.get(row, d2 + 1) == Some(Shift::Off);
    if before_is_off || after_is_off {
        score += ADJACENT_OFF_BONUS;
    }
    score
}

fn day_score(grid: &ScheduleGrid, roster: &Roster, row: usize, day: usize) -> f64 {
    let date = grid.date(day);
    let mut score = 0.0;
    if is_weekend_day(grid, day) {
        // The team works weekends; offs belong midweek
        score += WEEKEND_DAY_PENALTY;
    }
    if roster.profile(row).holidays.contains(&date) {
        score += HOLIDAY_BONUS;
    }
    if matches!(date.weekday(), Weekday::Tue | Weekday::Wed | Weekday::Thu) {
        score += MIDWEEK_BONUS;
    }
    score += SPREAD_PENALTY_PER_ENGINEER * f64::from(grid.count_on_day_all(day, Shift::Off));
    score
}

/// Length of the unbroken work run reaching back from the week start into the
/// previous month, counting unassigned slots pessimistically as work. Returns
/// the largest pair start position that still caps the streak at six, or
/// `None` when the run is short or broken before the month boundary.
fn tail_bias_limit(
    grid: &ScheduleGrid,
    roster: &Roster,
    row: usize,
    week_start_day: usize,
) -> Option<usize> {
    let mut run = 0u32;
    let mut day = week_start_day;
    while day > 0 {
        day -= 1;
        match grid.get(row, day) {
            Some(shift) if !shift.counts_toward_streak() => return None,
            _ => run += 1,
        }
    }
    let tail = roster.tail_work_run(row);
    if tail == 0 {
        return None;
    }
    run += tail;
    if run < 4 {
        return None;
    }
    Some(6usize.saturating_sub(run as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pipeline::initialise_grid;
    use chrono::NaiveDate;
    use shared::time::{month_days, weeks_of};
    use shared::types::{Engineer, ScheduleInput, ShiftRecord, Tier, UnavailabilityKind};
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

    fn setup(input: &ScheduleInput) -> (ScheduleGrid, Roster, Vec<Vec<usize>>) {
        let config = SchedulerConfig::default();
        let month_start = NaiveDate::from_ymd_opt(input.year, input.month, 1).unwrap();
        let (roster, _, _) = Roster::build(input, &config, month_start);
        let days = month_days(input.year, input.month);
        let grid = initialise_grid(&roster, &days);

        let mut weeks = Vec::new();
        let mut cursor = 0usize;
        for week in weeks_of(input.year, input.month) {
            weeks.push((cursor..cursor + week.len()).collect());
            cursor += week.len();
        }
        (grid, roster, weeks)
    }

    fn june_input(engineers: Vec<Engineer>) -> ScheduleInput {
        ScheduleInput {
            engineers,
            year: 2026,
            month: 6,
            holidays: Vec::new(),
            approved_requests: Vec::new(),
            coverage: None,
            previous_month: Vec::new(),
        }
    }

    /// Coverage with no minima, for tests that exercise the scoring rather
    /// than the reservation capacity gate.
    fn open_coverage() -> CoverageRequirements {
        let day = shared::types::DayCoverage {
            early: shared::types::CoverageLevel::flat(0),
            morning: shared::types::CoverageLevel::flat(0),
            late: shared::types::CoverageLevel::flat(0),
            night: shared::types::CoverageLevel::flat(0),
        };
        CoverageRequirements {
            weekday: day,
            weekend: day,
        }
    }

    #[test]
    fn every_engineer_gets_a_consecutive_pair() {
        let engineers: Vec<Engineer> = (0..15).map(|_| plain_engineer()).collect();
        let input = june_input(engineers);
        let (mut grid, roster, weeks) = setup(&input);
        let config = SchedulerConfig::default();
        let coverage = config.effective_coverage(None);
        let core_order: Vec<usize> = roster.core_rows().to_vec();
        let mut report = PhaseReport::default();

        reserve_off_days(
            &mut grid,
            &roster,
            &core_order,
            &weeks,
            &config,
            &coverage,
            &mut report,
        );

        assert!(report.violations.is_empty(), "{:?}", report.violations);
        for &row in roster.core_rows() {
            for week in weeks.iter().filter(|w| w.len() == 7) {
                assert!(
                    has_consecutive_off_pair(&grid, row, week),
                    "row {row} missing an off pair in week starting {}",
                    grid.date(week[0])
                );
                assert_eq!(grid.off_days_in(row, week).len(), 2);
            }
        }
    }

    #[test]
    fn reserve_never_starves_a_day_below_its_minimum() {
        let engineers: Vec<Engineer> = (0..15).map(|_| plain_engineer()).collect();
        let input = june_input(engineers);
        let (mut grid, roster, weeks) = setup(&input);
        let config = SchedulerConfig::default();
        let coverage = config.effective_coverage(None);
        let core_order: Vec<usize> = roster.core_rows().to_vec();
        let mut report = PhaseReport::default();

        reserve_off_days(
            &mut grid,
            &roster,
            &core_order,
            &weeks,
            &config,
            &coverage,
            &mut report,
        );

        for day in 0..grid.day_count() {
            let weekend = is_weekend_day(&grid, day);
            let resting = grid.count_on_day(day, Shift::Off, roster.core_rows());
            let available = roster.core_rows().len() as u32 - resting;
            assert!(
                available >= day_minimum_total(&coverage, weekend),
                "day {day} left with {available} available engineers"
            );
        }
    }

    #[test]
    fn long_tail_pulls_the_pair_to_the_week_start() {
        let engineers: Vec<Engineer> = (0..6).map(|_| plain_engineer()).collect();
        let tired = engineers[0].id;
        let mut input = june_input(engineers);
        for day in 27..=31 {
            input.previous_month.push(ShiftRecord {
                engineer_id: tired,
                date: NaiveDate::from_ymd_opt(2026, 5, day).unwrap(),
                shift: Shift::Late,
            });
        }
        let (mut grid, roster, weeks) = setup(&input);
        let config = SchedulerConfig::default();
        let core_order: Vec<usize> = roster.core_rows().to_vec();
        let mut report = PhaseReport::default();

        reserve_off_days(
            &mut grid,
            &roster,
            &core_order,
            &weeks,
            &config,
            &open_coverage(),
            &mut report,
        );

        // Five working days carried over: the pair must start on Monday or
        // Tuesday so the streak never exceeds six.
        assert!(
            grid.get(0, 0) == Some(Shift::Off) || grid.get(0, 1) == Some(Shift::Off),
            "first off too late: {:?} {:?}",
            grid.get(0, 0),
            grid.get(0, 1)
        );
    }

    #[test]
    fn existing_consecutive_pair_is_left_alone() {
        let mut e = plain_engineer();
        let d1 = NaiveDate::from_ymd_opt(2026, 6, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 6, 3).unwrap();
        e.unavailable_days = [d1, d2].into_iter().collect();
        e.unavailable_kinds = [
            (d1, UnavailabilityKind::PredeterminedOff),
            (d2, UnavailabilityKind::PredeterminedOff),
        ]
        .into_iter()
        .collect();
        let input = june_input(vec![e, plain_engineer()]);
        let (mut grid, roster, weeks) = setup(&input);
        let config = SchedulerConfig::default();
        let core_order: Vec<usize> = roster.core_rows().to_vec();
        let mut report = PhaseReport::default();

        reserve_off_days(
            &mut grid,
            &roster,
            &core_order,
            &weeks,
            &config,
            &open_coverage(),
            &mut report,
        );

        assert_eq!(grid.off_days_in(0, &weeks[0]).len(), 2);
    }

    #[test]
    fn isolated_free_days_report_a_reservation_failure() {
        let mut e = plain_engineer();
        // Predetermined offs on Tue, Thu and Sat leave no adjacent free pair
        for day in [2u32, 4, 6] {
            let date = NaiveDate::from_ymd_opt(2026, 6, day).unwrap();
            e.unavailable_days.insert(date);
            e.unavailable_kinds
                .insert(date, UnavailabilityKind::PredeterminedOff);
        }
        let input = june_input(vec![e, plain_engineer()]);
        let (mut grid, roster, weeks) = setup(&input);
        let config = SchedulerConfig::default();
        let core_order: Vec<usize> = roster.core_rows().to_vec();
        let mut report = PhaseReport::default();

        reserve_off_days(
            &mut grid,
            &roster,
            &core_order,
            &weeks,
            &config,
            &open_coverage(),
            &mut report,
        );

        assert!(
            report
                .violations
                .iter()
                .any(|v| v.kind == ViolationKind::OffDayReservationFailed
                    && v.engineer_id == Some(grid.engineer_id(0)))
        );
    }

    #[test]
    fn repair_reclaims_a_work_slot_next_to_a_lone_off() {
        let engineers: Vec<Engineer> = (0..8).map(|_| plain_engineer()).collect();
        let input = june_input(engineers);
        let (mut grid, roster, weeks) = setup(&input);
        let config = SchedulerConfig::default();
        let coverage = config.effective_coverage(None);
        let core_order: Vec<usize> = roster.core_rows().to_vec();

        // Row 0: full work week except a lone Wednesday off. The other rows
        // carry enough Early coverage that reclaiming a slot is safe.
        for day in 0..7 {
            grid.set(0, day, if day == 2 { Shift::Off } else { Shift::Early });
            for row in 1..8 {
                grid.set(row, day, Shift::Early);
            }
        }
        repair_off_days(&mut grid, &roster, &core_order, &weeks, &config, &coverage);

        assert!(has_consecutive_off_pair(&grid, 0, &weeks[0]));
        // One reclaimed slot, adjacent to the existing off
        let offs = grid.off_days_in(0, &weeks[0]);
        assert_eq!(offs.len(), 2);
        assert!(offs.contains(&2));
    }

    #[test]
    fn repair_refuses_to_break_weekend_coverage() {
        let engineers: Vec<Engineer> = (0..3).map(|_| plain_engineer()).collect();
        let input = june_input(engineers);
        let (mut grid, roster, weeks) = setup(&input);
        let config = SchedulerConfig::default();
        let coverage = config.effective_coverage(None);

        // Row 0 sits in sessions Monday through Friday and holds one of
        // exactly two weekend Early shifts. The only reclaimable pair is
        // Sat+Sun, and taking it would push Saturday below the minimum of 2.
        for day in 0..5 {
            grid.set(0, day, Shift::Training);
        }
        for row in 0..2 {
            grid.set(row, 5, Shift::Early);
            grid.set(row, 6, Shift::Early);
        }
        repair_off_days(&mut grid, &roster, &[0], &weeks, &config, &coverage);

        assert_eq!(grid.get(0, 5), Some(Shift::Early));
        assert_eq!(grid.get(0, 6), Some(Shift::Early));
        assert!(!has_consecutive_off_pair(&grid, 0, &weeks[0]));
    }
}
