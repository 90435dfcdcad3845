pub mod anomaly;
pub mod appointment;
pub mod daily_sales;
pub mod notification;
pub mod organization;
pub mod payroll_connection;
