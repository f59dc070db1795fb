use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use shared::types::{
    Engineer, HolidayEntry, RequestKind, ScheduleInput, Shift, UnavailabilityKind, Violation,
    ViolationKind, Warning, WarningCode,
};
use uuid::Uuid;

use crate::config::SchedulerConfig;

/// How many trailing days of the previous month participate in cross-month
/// streak and transition checks.
pub const TAIL_DAYS: i64 = 6;

/// An engineer enriched with everything the strategies ask per day: resolved
/// holiday set, merged unavailability, and the effective preference lists.
#[derive(Debug, Clone)]
pub struct EngineerProfile {
    pub engineer: Engineer,
    pub holidays: BTreeSet<NaiveDate>,
    pub unavailable: BTreeSet<NaiveDate>,
    weekday_allowed: Option<BTreeSet<Shift>>,
    weekend_allowed: Option<BTreeSet<Shift>>,
}

impl EngineerProfile {
    fn build(
        engineer: Engineer,
        holidays: &[HolidayEntry],
        requested_off: Option<&BTreeSet<NaiveDate>>,
    ) -> Self {
        let holiday_set = holidays
            .iter()
            .filter(|entry| match &entry.states {
                None => true,
                Some(states) if states.is_empty() => true,
                Some(states) => engineer
                    .state
                    .as_ref()
                    .is_some_and(|state| states.contains(state)),
            })
            .map(|entry| entry.date)
            .collect();

        let mut unavailable = engineer.unavailable_days.clone();
        if let Some(requested) = requested_off {
            unavailable.extend(requested.iter().copied());
        }

        let weekday: BTreeSet<Shift> = engineer
            .preferences
            .iter()
            .filter(|p| !p.is_weekend())
            .map(|p| p.shift())
            .collect();
        let weekend: BTreeSet<Shift> = engineer
            .preferences
            .iter()
            .filter(|p| p.is_weekend())
            .map(|p| p.shift())
            .collect();

        // Empty list means unconstrained; a weekend list replaces the weekday
        // list on weekend days.
        let weekday_allowed = (!weekday.is_empty()).then_some(weekday.clone());
        let weekend_allowed = if !weekend.is_empty() {
            Some(weekend)
        } else {
            weekday_allowed.clone()
        };

        Self {
            engineer,
            holidays: holiday_set,
            unavailable,
            weekday_allowed,
            weekend_allowed,
        }
    }

    /// Preference filter for a work shift on a weekday/weekend day.
    pub fn allows(&self, shift: Shift, weekend: bool) -> bool {
        let allowed = if weekend {
            &self.weekend_allowed
        } else {
            &self.weekday_allowed
        };
        match allowed {
            None => true,
            Some(set) => set.contains(&shift),
        }
    }

    /// Whether the engineer named this shift explicitly (soft preference).
    pub fn prefers(&self, shift: Shift, weekend: bool) -> bool {
        self.engineer
            .preferences
            .iter()
            .any(|p| p.shift() == shift && (p.is_weekend() == weekend || !p.is_weekend()))
    }

    pub fn night_eligible(&self) -> bool {
        self.engineer.preferences.is_empty() || self.prefers(Shift::Night, false)
            || self.prefers(Shift::Night, true)
    }

    /// What the pre-filled slot for a blackout date should be.
    pub fn blackout_shift(&self, date: NaiveDate) -> Shift {
        match self.engineer.unavailable_kinds.get(&date) {
            Some(UnavailabilityKind::PredeterminedOff) => Shift::Off,
            _ => Shift::Unavailable,
        }
    }

    pub fn fixed_off_on(&self, date: NaiveDate) -> bool {
        let weekday = date.weekday().number_from_monday() as u8;
        self.engineer.fixed_off_days.contains(&weekday)
    }

    pub fn has_fixed_off_days(&self) -> bool {
        !self.engineer.fixed_off_days.is_empty()
    }
}

/// The immutable per-run context: engineer partitions, previous-month tail
/// and the month geometry. Built once; every driver iteration reuses it.
#[derive(Debug)]
pub struct Roster {
    pub profiles: Vec<EngineerProfile>,
    core_rows: Vec<usize>,
    floater_rows: Vec<usize>,
    trainee_rows: Vec<usize>,
    tail: Vec<BTreeMap<NaiveDate, Shift>>,
    month_start: NaiveDate,
}

impl Roster {
    pub fn build(
        input: &ScheduleInput,
        config: &SchedulerConfig,
        month_start: NaiveDate,
    ) -> (Self, Vec<Violation>, Vec<Warning>) {
        let mut violations = Vec::new();
        let mut warnings = Vec::new();

        // Approved time-off requests merge into the blackout days up front.
        let known_ids: HashSet<Uuid> = input.engineers.iter().map(|e| e.id).collect();
        let mut requested_off: HashMap<Uuid, BTreeSet<NaiveDate>> = HashMap::new();
        for request in &input.approved_requests {
            if request.kind != RequestKind::TimeOff {
                continue;
            }
            if !known_ids.contains(&request.engineer_id) {
                warnings.push(Warning {
                    code: WarningCode::Configuration,
                    message: format!(
                        "Approved request references unknown engineer {}",
                        request.engineer_id
                    ),
                });
                continue;
            }
            requested_off
                .entry(request.engineer_id)
                .or_default()
                .extend(request.dates.iter().copied());
        }

        let profiles: Vec<EngineerProfile> = input
            .engineers
            .iter()
            .map(|engineer| {
                EngineerProfile::build(
                    engineer.clone(),
                    &input.holidays,
                    requested_off.get(&engineer.id),
                )
            })
            .collect();

        let mut core_rows = Vec::new();
        let mut floater_rows = Vec::new();
        let mut trainee_rows = Vec::new();
        let mut demoted_floaters = 0usize;
        for (row, profile) in profiles.iter().enumerate() {
            if profile.engineer.in_training {
                trainee_rows.push(row);
            } else if profile.engineer.is_floater {
                if floater_rows.len() < config.max_floaters {
                    floater_rows.push(row);
                } else {
                    demoted_floaters += 1;
                    core_rows.push(row);
                }
            } else {
                core_rows.push(row);
            }
        }
        if demoted_floaters > 0 {
            violations.push(Violation {
                kind: ViolationKind::Configuration,
                engineer_id: None,
                date: None,
                shift: None,
                message: format!(
                    "{} floaters declared beyond the supported {}; extras were scheduled as core staff",
                    demoted_floaters, config.max_floaters
                ),
            });
        }

        // Previous-month rows outside the tail window are dropped.
        let row_of: HashMap<Uuid, usize> = profiles
            .iter()
            .enumerate()
            .map(|(row, p)| (p.engineer.id, row))
            .collect();
        let window_start = month_start - Duration::days(TAIL_DAYS);
        let mut tail: Vec<BTreeMap<NaiveDate, Shift>> = vec![BTreeMap::new(); profiles.len()];
        let mut trimmed = 0usize;
        for record in &input.previous_month {
            match row_of.get(&record.engineer_id) {
                Some(&row) if record.date >= window_start && record.date < month_start => {
                    tail[row].insert(record.date, record.shift);
                }
                _ => trimmed += 1,
            }
        }
        if trimmed > 0 {
            warnings.push(Warning {
                code: WarningCode::Configuration,
                message: format!(
                    "{trimmed} previous-month rows outside the {TAIL_DAYS}-day tail window were ignored"
                ),
            });
        }

        let roster = Self {
            profiles,
            core_rows,
            floater_rows,
            trainee_rows,
            tail,
            month_start,
        };
        (roster, violations, warnings)
    }

    pub fn core_rows(&self) -> &[usize] {
        &self.core_rows
    }

    pub fn floater_rows(&self) -> &[usize] {
        &self.floater_rows
    }

    pub fn trainee_rows(&self) -> &[usize] {
        &self.trainee_rows
    }

    pub fn month_start(&self) -> NaiveDate {
        self.month_start
    }

    pub fn profile(&self, row: usize) -> &EngineerProfile {
        &self.profiles[row]
    }

    /// Shift worked on the last day of the previous month, if handed over.
    pub fn tail_last(&self, row: usize) -> Option<Shift> {
        self.tail[row]
            .get(&(self.month_start - Duration::days(1)))
            .copied()
    }

    /// Consecutive streak-counting days at the end of the previous month.
    /// A date missing from the hand-over breaks the run.
    pub fn tail_work_run(&self, row: usize) -> u32 {
        let mut run = 0;
        let mut date = self.month_start - Duration::days(1);
        while let Some(shift) = self.tail[row].get(&date) {
            if !shift.counts_toward_streak() {
                break;
            }
            run += 1;
            date -= Duration::days(1);
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::types::{ApprovedRequest, ShiftPreference, ShiftRecord, Tier};

    fn engineer(name: &str) -> Engineer {
        Engineer {
            id: Uuid::new_v4(),
            name: name.to_string(),
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

    fn input_with(engineers: Vec<Engineer>) -> ScheduleInput {
        ScheduleInput {
            engineers,
            year: 2026,
            month: 2,
            holidays: Vec::new(),
            approved_requests: Vec::new(),
            coverage: None,
            previous_month: Vec::new(),
        }
    }

    fn month_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
    }

    #[test]
    fn empty_preferences_allow_everything() {
        let profile = EngineerProfile::build(engineer("a"), &[], None);
        for shift in Shift::WORK_SHIFTS {
            assert!(profile.allows(shift, false));
            assert!(profile.allows(shift, true));
        }
        assert!(profile.night_eligible());
    }

    #[test]
    fn weekend_preferences_replace_weekday_list() {
        let mut e = engineer("a");
        e.preferences = [ShiftPreference::Early, ShiftPreference::WeekendNight]
            .into_iter()
            .collect();
        let profile = EngineerProfile::build(e, &[], None);

        assert!(profile.allows(Shift::Early, false));
        assert!(!profile.allows(Shift::Night, false));
        // On weekends only the weekend list counts
        assert!(profile.allows(Shift::Night, true));
        assert!(!profile.allows(Shift::Early, true));
        assert!(profile.night_eligible());
    }

    #[test]
    fn state_holidays_apply_only_to_matching_engineers() {
        let mut bavarian = engineer("a");
        bavarian.state = Some("BY".to_string());
        let other = engineer("b");

        let holidays = vec![
            HolidayEntry {
                date: NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
                name: "Heilige Drei Könige".to_string(),
                states: Some(vec!["BY".to_string(), "BW".to_string()]),
            },
            HolidayEntry {
                date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
                name: "Tag der Arbeit".to_string(),
                states: None,
            },
        ];

        let bavarian = EngineerProfile::build(bavarian, &holidays, None);
        let other = EngineerProfile::build(other, &holidays, None);
        assert_eq!(bavarian.holidays.len(), 2);
        assert_eq!(other.holidays.len(), 1);
    }

    #[test]
    fn surplus_floaters_are_demoted_with_a_violation() {
        let mut engineers = vec![engineer("a"), engineer("b"), engineer("c"), engineer("d")];
        for e in engineers.iter_mut().take(3) {
            e.is_floater = true;
        }
        let input = input_with(engineers);
        let (roster, violations, _) =
            Roster::build(&input, &SchedulerConfig::default(), month_start());

        assert_eq!(roster.floater_rows().len(), 2);
        assert_eq!(roster.core_rows().len(), 2);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::Configuration);
    }

    #[test]
    fn approved_time_off_merges_into_blackouts() {
        let e = engineer("a");
        let id = e.id;
        let mut input = input_with(vec![e]);
        let date = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        input.approved_requests.push(ApprovedRequest {
            engineer_id: id,
            kind: RequestKind::TimeOff,
            dates: vec![date],
        });

        let (roster, _, warnings) =
            Roster::build(&input, &SchedulerConfig::default(), month_start());
        assert!(roster.profile(0).unavailable.contains(&date));
        assert!(warnings.is_empty());
    }

    #[test]
    fn tail_keeps_only_the_final_six_days() {
        let e = engineer("a");
        let id = e.id;
        let mut input = input_with(vec![e]);
        for day in 20..=31 {
            input.previous_month.push(ShiftRecord {
                engineer_id: id,
                date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
                shift: Shift::Early,
            });
        }

        let (roster, _, warnings) =
            Roster::build(&input, &SchedulerConfig::default(), month_start());
        assert_eq!(roster.tail_work_run(0), 6);
        assert_eq!(roster.tail_last(0), Some(Shift::Early));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn tail_run_stops_at_an_off_day() {
        let e = engineer("a");
        let id = e.id;
        let mut input = input_with(vec![e]);
        for (day, shift) in [(29, Shift::Off), (30, Shift::Late), (31, Shift::Late)] {
            input.previous_month.push(ShiftRecord {
                engineer_id: id,
                date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
                shift,
            });
        }

        let (roster, _, _) = Roster::build(&input, &SchedulerConfig::default(), month_start());
        assert_eq!(roster.tail_work_run(0), 2);
    }
}
