use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// region: Roster Types

/// One shift token per engineer per day. `"Off"` is the canonical spelling on
/// output; the legacy `"OFF"` spelling is accepted on input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Shift {
    Early,
    Morning,
    Late,
    Night,
    #[serde(alias = "OFF")]
    Off,
    Unavailable,
    Training,
}

impl Shift {
    /// Operational shifts that put an engineer on the floor.
    pub fn is_work(self) -> bool {
        matches!(self, Self::Early | Self::Morning | Self::Late | Self::Night)
    }

    /// Everything that counts toward the consecutive-day limit.
    pub fn counts_toward_streak(self) -> bool {
        !matches!(self, Self::Off | Self::Unavailable)
    }

    pub const WORK_SHIFTS: [Shift; 4] = [Self::Early, Self::Morning, Self::Late, Self::Night];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    T1,
    T2,
    T3,
}

/// An allow-list entry. An empty preference set means "any shift"; if any
/// `Weekend*` entry is present, the weekend entries replace the weekday list
/// on Saturdays and Sundays.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ShiftPreference {
    Early,
    Morning,
    Late,
    Night,
    WeekendEarly,
    WeekendMorning,
    WeekendLate,
    WeekendNight,
}

impl ShiftPreference {
    pub fn is_weekend(self) -> bool {
        matches!(
            self,
            Self::WeekendEarly | Self::WeekendMorning | Self::WeekendLate | Self::WeekendNight
        )
    }

    pub fn shift(self) -> Shift {
        match self {
            Self::Early | Self::WeekendEarly => Shift::Early,
            Self::Morning | Self::WeekendMorning => Shift::Morning,
            Self::Late | Self::WeekendLate => Shift::Late,
            Self::Night | Self::WeekendNight => Shift::Night,
        }
    }
}

/// Per-date tag refining a blackout day. `predetermined_off` (legacy alias
/// `unavailable`) pre-fills the slot as `Off` so it counts toward the weekly
/// off requirement; every other kind yields `Unavailable`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnavailabilityKind {
    #[serde(alias = "unavailable")]
    PredeterminedOff,
    TimeOff,
    Sick,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engineer {
    pub id: Uuid,
    pub name: String,
    pub tier: Tier,
    #[serde(default)]
    pub is_floater: bool,
    #[serde(default)]
    pub in_training: bool,
    /// German state code (e.g. "BY"); selects which state holidays apply.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub preferences: BTreeSet<ShiftPreference>,
    #[serde(default)]
    pub unavailable_days: BTreeSet<NaiveDate>,
    #[serde(default)]
    pub unavailable_kinds: BTreeMap<NaiveDate, UnavailabilityKind>,
    /// ISO weekday numbers (Monday = 1 .. Sunday = 7) forced to `Off`.
    #[serde(default)]
    pub fixed_off_days: BTreeSet<u8>,
}

/// Federal holidays carry no state list; state holidays apply only to
/// engineers whose state is listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayEntry {
    pub date: NaiveDate,
    pub name: String,
    #[serde(default)]
    pub states: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    TimeOff,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedRequest {
    pub engineer_id: Uuid,
    pub kind: RequestKind,
    pub dates: Vec<NaiveDate>,
}

// endregion: Roster Types

// region: Coverage

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoverageLevel {
    pub minimum: u32,
    pub preferred: u32,
}

impl CoverageLevel {
    pub fn flat(n: u32) -> Self {
        Self {
            minimum: n,
            preferred: n,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayCoverage {
    pub early: CoverageLevel,
    pub morning: CoverageLevel,
    pub late: CoverageLevel,
    pub night: CoverageLevel,
}

impl DayCoverage {
    pub fn level(&self, shift: Shift) -> Option<CoverageLevel> {
        match shift {
            Shift::Early => Some(self.early),
            Shift::Morning => Some(self.morning),
            Shift::Late => Some(self.late),
            Shift::Night => Some(self.night),
            _ => None,
        }
    }
}

/// Minimum and preferred headcount per shift, weekday and weekend tables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoverageRequirements {
    pub weekday: DayCoverage,
    pub weekend: DayCoverage,
}

impl Default for CoverageRequirements {
    fn default() -> Self {
        Self {
            weekday: DayCoverage {
                early: CoverageLevel::flat(3),
                morning: CoverageLevel::flat(3),
                late: CoverageLevel::flat(3),
                night: CoverageLevel {
                    minimum: 2,
                    preferred: 3,
                },
            },
            weekend: DayCoverage {
                early: CoverageLevel::flat(2),
                morning: CoverageLevel::flat(2),
                late: CoverageLevel::flat(2),
                night: CoverageLevel::flat(2),
            },
        }
    }
}

impl CoverageRequirements {
    pub fn for_day(&self, weekend: bool) -> &DayCoverage {
        if weekend { &self.weekend } else { &self.weekday }
    }
}

// endregion: Coverage

// region: Engine Input / Output

/// One cell of a schedule grid in row form; also used to hand over the
/// trailing days of the previous month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftRecord {
    pub engineer_id: Uuid,
    pub date: NaiveDate,
    pub shift: Shift,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub engineers: Vec<Engineer>,
    pub year: i32,
    pub month: u32,
    #[serde(default)]
    pub holidays: Vec<HolidayEntry>,
    #[serde(default)]
    pub approved_requests: Vec<ApprovedRequest>,
    #[serde(default)]
    pub coverage: Option<CoverageRequirements>,
    /// Only rows within the six days before the month are kept.
    #[serde(default)]
    pub previous_month: Vec<ShiftRecord>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ViolationKind {
    #[serde(rename = "coverage_failure")]
    CoverageFailure,
    #[serde(rename = "coverage_violation")]
    CoverageViolation,
    #[serde(rename = "off_day_reservation_failed")]
    OffDayReservationFailed,
    #[serde(rename = "off_day_violation")]
    OffDayViolation,
    #[serde(rename = "ARBZG_REST_PERIOD")]
    RestPeriod,
    #[serde(rename = "ARBZG_CONSECUTIVE_DAYS")]
    ConsecutiveDays,
    #[serde(rename = "ARBZG_CONSECUTIVE_DAYS_CROSS_MONTH")]
    ConsecutiveDaysCrossMonth,
    #[serde(rename = "transition_violation")]
    Transition,
    #[serde(rename = "transition_violation_cross_month")]
    TransitionCrossMonth,
    #[serde(rename = "floater_overwork")]
    FloaterOverwork,
    #[serde(rename = "floater_collision")]
    FloaterCollision,
    #[serde(rename = "configuration")]
    Configuration,
    #[serde(rename = "insufficient_coverage")]
    InsufficientCoverage,
}

/// Constraint failures are recorded, never thrown; the engine keeps going so
/// the best partial schedule survives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engineer_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<Shift>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    ReducedNightCohort,
    WorkloadImbalance,
    Configuration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub code: WarningCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A constraint toggle the caller may apply before re-running the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryOption {
    pub id: String,
    pub title: String,
    pub impact: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineerStats {
    pub total_shifts: u32,
    pub shift_breakdown: BTreeMap<Shift, u32>,
    pub off_days: u32,
    pub unavailable_days: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleStats {
    pub engineers: BTreeMap<Uuid, EngineerStats>,
    /// Working headcount per day and shift, floaters included.
    pub coverage: BTreeMap<NaiveDate, BTreeMap<Shift, u32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOutput {
    /// Dense: every engineer has a shift token for every day of the month.
    pub schedule: BTreeMap<Uuid, BTreeMap<NaiveDate, Shift>>,
    pub success: bool,
    pub violations: Vec<Violation>,
    pub warnings: Vec<Warning>,
    pub stats: ScheduleStats,
    pub options: Vec<RecoveryOption>,
    pub version: String,
}

// endregion: Engine Input / Output
