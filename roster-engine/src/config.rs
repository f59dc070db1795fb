use std::path::Path;

use serde::Deserialize;
use shared::types::{CoverageRequirements, Shift};

use crate::error::EngineError;

/// Engine tunables, loadable from a TOML file. Defaults carry the values the
/// operations team runs with; hosts override per deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Retry budget for the iterative driver.
    pub max_iterations: u32,
    /// Night cohort size and per-day night target.
    pub preferred_night_count: u32,
    /// Hard per-day night floor.
    pub min_night_count: u32,
    /// Fill phase tops engineers up toward this many shifts per week.
    pub target_shifts_per_week: u32,
    /// Balance phase pulls engineers below this up via swaps.
    pub min_shifts_per_week: u32,
    /// Weekly floater allowance, compared with `>`. The fractional literal is
    /// load-bearing: 0, 1 and 2 shifts pass, 3 violates.
    pub floater_weekly_cap: f64,
    /// Off days every engineer gets per week; 2 requires a consecutive pair.
    pub off_days_per_week: u32,
    /// Supplemental staff beyond this count are demoted to core duty.
    pub max_floaters: usize,
    /// Keeps Morning last in the assignment order so spare capacity lands on
    /// the Early/Late load peaks.
    pub deprioritize_morning: bool,
    /// Lowers every coverage minimum by one (floor 1).
    pub relax_coverage: bool,
    pub coverage: CoverageRequirements,
    /// RNG seed for reproducible runs; `None` behaves like `Some(0)`.
    pub seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            preferred_night_count: 3,
            min_night_count: 2,
            target_shifts_per_week: 5,
            min_shifts_per_week: 4,
            floater_weekly_cap: 2.5,
            off_days_per_week: 2,
            max_floaters: 2,
            deprioritize_morning: true,
            relax_coverage: false,
            coverage: CoverageRequirements::default(),
            seed: None,
        }
    }
}

impl SchedulerConfig {
    /// Loads a config file, layering the parsed values over the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }

    /// Day-shift assignment order.
    pub fn day_shift_priority(&self) -> [Shift; 3] {
        if self.deprioritize_morning {
            [Shift::Early, Shift::Late, Shift::Morning]
        } else {
            [Shift::Early, Shift::Morning, Shift::Late]
        }
    }

    /// Coverage table for a run: input override beats the config table, and
    /// `relax_coverage` lowers each minimum by one without going below 1.
    pub fn effective_coverage(
        &self,
        input_override: Option<&CoverageRequirements>,
    ) -> CoverageRequirements {
        let mut coverage = input_override.copied().unwrap_or(self.coverage);
        if self.relax_coverage {
            for table in [&mut coverage.weekday, &mut coverage.weekend] {
                for level in [
                    &mut table.early,
                    &mut table.morning,
                    &mut table.late,
                    &mut table.night,
                ] {
                    level.minimum = level.minimum.saturating_sub(1).max(1);
                    level.preferred = level.preferred.max(level.minimum);
                }
            }
        }
        coverage
    }
}
