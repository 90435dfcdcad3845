pub mod anomaly;
pub mod config;
pub mod payroll;
