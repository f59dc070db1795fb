use shared::types::{RecoveryOption, Severity, Violation, ViolationKind};

/// Turns the surviving violation set into the actionable toggles a caller can
/// apply before re-running the engine. Order is fixed so the list is stable
/// for a given violation set.
pub fn recovery_options(violations: &[Violation]) -> Vec<RecoveryOption> {
    if violations.is_empty() {
        return Vec::new();
    }

    let has = |kinds: &[ViolationKind]| violations.iter().any(|v| kinds.contains(&v.kind));
    let mut options = Vec::new();

    if has(&[
        ViolationKind::CoverageFailure,
        ViolationKind::CoverageViolation,
        ViolationKind::InsufficientCoverage,
    ]) {
        options.push(RecoveryOption {
            id: "relax_coverage".to_string(),
            title: "Relax coverage minimums".to_string(),
            impact: "Lowers every per-shift minimum by one engineer; thinner staffing on the floor"
                .to_string(),
            severity: Severity::Medium,
        });
        options.push(RecoveryOption {
            id: "increase_floater_hours".to_string(),
            title: "Raise the floater weekly cap to 4".to_string(),
            impact: "Floaters absorb up to four shifts per week instead of two".to_string(),
            severity: Severity::Medium,
        });
    }

    if has(&[
        ViolationKind::OffDayReservationFailed,
        ViolationKind::OffDayViolation,
    ]) {
        options.push(RecoveryOption {
            id: "reduce_off_days".to_string(),
            title: "Reduce guaranteed off days to one per week".to_string(),
            impact: "Drops the consecutive-pair guarantee; engineers get a single weekly rest day"
                .to_string(),
            severity: Severity::High,
        });
    }

    if has(&[
        ViolationKind::RestPeriod,
        ViolationKind::ConsecutiveDays,
        ViolationKind::ConsecutiveDaysCrossMonth,
        ViolationKind::Transition,
        ViolationKind::TransitionCrossMonth,
    ]) {
        options.push(RecoveryOption {
            id: "labor_law_review".to_string(),
            title: "Working-time law conflict needs review".to_string(),
            impact: "Rest-period or consecutive-day limits cannot be relaxed automatically"
                .to_string(),
            severity: Severity::Critical,
        });
    }

    options.push(RecoveryOption {
        id: "manual_edit".to_string(),
        title: "Edit the schedule manually".to_string(),
        impact: "Publish the best partial schedule and resolve the rest by hand".to_string(),
        severity: Severity::Low,
    });

    options
}
