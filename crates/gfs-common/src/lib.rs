//! Common types shared across the GFS catalog crates.
//!
//! This crate owns parameter resolution: turning a loosely typed `cycle`
//! (timestamp, ISO string, `"today"`, `"latest"`) and a `max_lead_time` into
//! a canonical [`ForecastCycle`] and an ordered [`LeadTimeSequence`].

pub mod cycle;
pub mod error;
pub mod lead;

pub use cycle::{
    default_publication_latency, floor_to_cycle, parse_compact_date, parse_run_hour, resolve_cycle,
    CycleInput, ForecastCycle, ModelCycle, ResolvedCycle, DEFAULT_PUBLICATION_LATENCY_HOURS,
};
pub use error::{ParameterError, ParameterResult};
pub use lead::{
    parse_lead_token, resolve_lead_input, resolve_lead_times, LeadTimeInput, LeadTimeSequence,
    DEFAULT_MAX_LEAD_TIME, HIGH_LEAD_TIME_WARNING_HOURS, LEAD_TIME_STEP_HOURS,
    MAX_LEAD_TIME_HOURS,
};
