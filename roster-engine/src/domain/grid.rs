use std::collections::BTreeMap;

use chrono::NaiveDate;
use shared::types::Shift;
use uuid::Uuid;

/// Dense (engineer × day) slot grid. `None` marks a slot the pipeline has not
/// decided yet; by the time a grid leaves the engine every slot is `Some`.
#[derive(Debug, Clone)]
pub struct ScheduleGrid {
    engineer_ids: Vec<Uuid>,
    days: Vec<NaiveDate>,
    slots: Vec<Option<Shift>>,
}

impl ScheduleGrid {
    pub fn new(engineer_ids: Vec<Uuid>, days: Vec<NaiveDate>) -> Self {
        let slots = vec![None; engineer_ids.len() * days.len()];
        Self {
            engineer_ids,
            days,
            slots,
        }
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn engineer_count(&self) -> usize {
        self.engineer_ids.len()
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    pub fn date(&self, day: usize) -> NaiveDate {
        self.days[day]
    }

    pub fn engineer_id(&self, row: usize) -> Uuid {
        self.engineer_ids[row]
    }

    fn index(&self, row: usize, day: usize) -> usize {
        debug_assert!(row < self.engineer_ids.len() && day < self.days.len());
        row * self.days.len() + day
    }

    pub fn get(&self, row: usize, day: usize) -> Option<Shift> {
        self.slots[self.index(row, day)]
    }

    pub fn set(&mut self, row: usize, day: usize, shift: Shift) {
        let index = self.index(row, day);
        self.slots[index] = Some(shift);
    }

    pub fn is_unassigned(&self, row: usize, day: usize) -> bool {
        self.get(row, day).is_none()
    }

    /// Headcount holding `shift` on `day` among the given rows.
    pub fn count_on_day(&self, day: usize, shift: Shift, rows: &[usize]) -> u32 {
        rows.iter()
            .filter(|&&row| self.get(row, day) == Some(shift))
            .count() as u32
    }

    /// Headcount holding `shift` on `day` over the whole roster.
    pub fn count_on_day_all(&self, day: usize, shift: Shift) -> u32 {
        (0..self.engineer_count())
            .filter(|&row| self.get(row, day) == Some(shift))
            .count() as u32
    }

    /// Operational shifts the engineer holds within `days`.
    pub fn work_count_in(&self, row: usize, days: &[usize]) -> u32 {
        days.iter()
            .filter(|&&day| self.get(row, day).is_some_and(Shift::is_work))
            .count() as u32
    }

    /// Day indices within `days` where the engineer is `Off`.
    pub fn off_days_in(&self, row: usize, days: &[usize]) -> Vec<usize> {
        days.iter()
            .copied()
            .filter(|&day| self.get(row, day) == Some(Shift::Off))
            .collect()
    }

    /// Remaining unassigned slots, row-major order.
    pub fn unassigned_slots(&self) -> Vec<(usize, usize)> {
        let mut open = Vec::new();
        for row in 0..self.engineer_count() {
            for day in 0..self.day_count() {
                if self.is_unassigned(row, day) {
                    open.push((row, day));
                }
            }
        }
        open
    }

    /// Freezes the grid into the external representation. Any slot the
    /// pipeline left open becomes `Off`; the fill phase makes that a no-op in
    /// practice.
    pub fn into_schedule(self) -> BTreeMap<Uuid, BTreeMap<NaiveDate, Shift>> {
        let mut schedule = BTreeMap::new();
        for (row, &id) in self.engineer_ids.iter().enumerate() {
            let mut per_day = BTreeMap::new();
            for (day, &date) in self.days.iter().enumerate() {
                per_day.insert(date, self.get(row, day).unwrap_or(Shift::Off));
            }
            schedule.insert(id, per_day);
        }
        schedule
    }
}
