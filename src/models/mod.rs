pub mod authorization;
pub mod occurrence;
pub mod recurrence;
pub mod schedule;
