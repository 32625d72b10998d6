//! Hardware-facing infrastructure: the TWAI controller boundary.
pub mod twai;
