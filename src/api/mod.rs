pub mod attendance;
pub mod employee;
pub mod job;
pub mod leave_request;
pub mod payroll;
pub mod report;
pub mod settings;
pub mod system_log;

#[cfg(test)]
mod tests;
