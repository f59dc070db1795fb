use std::collections::HashSet;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use shared::time::{month_days, weeks_of};
use shared::types::{ScheduleInput, ScheduleOutput};
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::domain::pipeline::{self, PipelineOutcome};
use crate::domain::roster::Roster;
use crate::domain::{recovery, stats};
use crate::error::EngineError;

/// Early-stop thresholds: a near-clean plan is accepted after a modest number
/// of retries instead of burning the whole budget.
const GOOD_ENOUGH_AFTER_10: usize = 2;
const ACCEPTABLE_AFTER_50: usize = 5;

/// Shuffle-and-retry driver around the pipeline. Iteration 0 runs in input
/// order; every later iteration reshuffles core engineers and floaters
/// independently and keeps the best grid seen so far.
pub struct ScheduleDriver {
    config: SchedulerConfig,
    cancel: CancellationToken,
}

impl ScheduleDriver {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Aborts at the next iteration boundary, returning the best partial.
    pub fn with_cancellation(config: SchedulerConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    #[tracing::instrument(skip_all, fields(year = input.year, month = input.month))]
    pub fn generate(&self, input: &ScheduleInput) -> Result<ScheduleOutput, EngineError> {
        let month_start = validate_input(input)?;
        if self.config.max_iterations == 0 {
            return Err(EngineError::InvalidInput(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        let (roster, base_violations, mut warnings) =
            Roster::build(input, &self.config, month_start);
        let coverage = self.config.effective_coverage(input.coverage.as_ref());

        let days = month_days(input.year, input.month);
        let mut weeks: Vec<Vec<usize>> = Vec::new();
        let mut cursor = 0usize;
        for week in weeks_of(input.year, input.month) {
            weeks.push((cursor..cursor + week.len()).collect());
            cursor += week.len();
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed.unwrap_or(0));
        let mut core_order: Vec<usize> = roster.core_rows().to_vec();
        let mut floater_order: Vec<usize> = roster.floater_rows().to_vec();

        let mut best: Option<PipelineOutcome> = None;
        let mut best_total = usize::MAX;

        for iteration in 0..self.config.max_iterations {
            // Iteration 0 always runs so a best partial exists to return
            if iteration > 0 {
                if self.cancel.is_cancelled() {
                    tracing::warn!(iteration, "Cancelled; returning best partial");
                    break;
                }
                core_order.shuffle(&mut rng);
                floater_order.shuffle(&mut rng);
            }

            let outcome = pipeline::run_pipeline(
                &roster,
                &self.config,
                &coverage,
                &days,
                &weeks,
                &core_order,
                &floater_order,
                &mut rng,
            );
            let total = base_violations.len() + outcome.violations.len();

            if total < best_total {
                tracing::debug!(iteration, violations = total, "New best schedule");
                best_total = total;
                best = Some(outcome);
            }

            let done = iteration + 1;
            if best_total == 0
                || (done >= 10 && best_total <= GOOD_ENOUGH_AFTER_10)
                || (done >= 50 && best_total <= ACCEPTABLE_AFTER_50)
            {
                break;
            }
        }

        // Iteration 0 is unconditional, so an outcome always exists here
        let Some(outcome) = best else {
            return Err(EngineError::InvalidInput(
                "No schedule produced".to_string(),
            ));
        };

        let mut violations = base_violations;
        violations.extend(outcome.violations);
        warnings.extend(outcome.warnings);

        let stats = stats::compute_stats(&outcome.grid);
        let success = violations.is_empty();
        let options = recovery::recovery_options(&violations);

        tracing::info!(
            success,
            violations = violations.len(),
            warnings = warnings.len(),
            "Schedule generation finished"
        );

        Ok(ScheduleOutput {
            schedule: outcome.grid.into_schedule(),
            success,
            violations,
            warnings,
            stats,
            options,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}

/// Convenience wrapper for hosts that do not need cancellation.
pub fn generate_schedule(
    input: &ScheduleInput,
    config: SchedulerConfig,
) -> Result<ScheduleOutput, EngineError> {
    ScheduleDriver::new(config).generate(input)
}

fn validate_input(input: &ScheduleInput) -> Result<chrono::NaiveDate, EngineError> {
    let month_start = chrono::NaiveDate::from_ymd_opt(input.year, input.month, 1)
        .ok_or_else(|| {
            EngineError::InvalidInput(format!("{}-{} is not a valid month", input.year, input.month))
        })?;

    if input.engineers.is_empty() {
        return Err(EngineError::InvalidInput(
            "At least one engineer is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for engineer in &input.engineers {
        if !seen.insert(engineer.id) {
            return Err(EngineError::InvalidInput(format!(
                "Duplicate engineer id {}",
                engineer.id
            )));
        }
    }

    Ok(month_start)
}
