//! Fetch, filter and re-serialize metrics exposed in the Prometheus text format.
pub mod prom;
