//! Attendance, leave and payroll reporting.
//!
//! Fetching happens in the handlers; everything here works on rows that
//! were already loaded.

pub mod aggregator;
pub mod export;
pub mod period;
pub mod reducer;
pub mod render;
