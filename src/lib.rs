//! Batch submission of Sentinel-1 ARD processing jobs.
//!
//! Scenes returned by a catalog query are turned into work units (single
//! scenes or interferometric pairs), already-processed units are skipped, and
//! the rest are split into scheduler jobs sized by a fitted walltime model.

pub mod bbox;
pub mod catalog;
pub mod config;
pub mod emit;
pub mod estimator;
pub mod filter;
pub mod pairing;
pub mod partition;
pub mod pipeline;
pub mod work_unit;
