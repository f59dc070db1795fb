use std::collections::BTreeMap;

use shared::types::{EngineerStats, ScheduleStats, Shift};

use crate::domain::grid::ScheduleGrid;

/// Per-engineer totals and per-day working headcounts for the delivered grid.
pub fn compute_stats(grid: &ScheduleGrid) -> ScheduleStats {
    let mut engineers = BTreeMap::new();
    let mut coverage: BTreeMap<_, BTreeMap<Shift, u32>> = BTreeMap::new();

    for row in 0..grid.engineer_count() {
        let mut stats = EngineerStats::default();
        for day in 0..grid.day_count() {
            let Some(shift) = grid.get(row, day) else {
                continue;
            };
            *stats.shift_breakdown.entry(shift).or_insert(0) += 1;
            match shift {
                Shift::Off => stats.off_days += 1,
                Shift::Unavailable => stats.unavailable_days += 1,
                _ => stats.total_shifts += 1,
            }
            if shift.is_work() {
                *coverage
                    .entry(grid.date(day))
                    .or_default()
                    .entry(shift)
                    .or_insert(0) += 1;
            }
        }
        engineers.insert(grid.engineer_id(row), stats);
    }

    ScheduleStats {
        engineers,
        coverage,
    }
}
