pub mod bulk_schedule_service;
pub mod conflict_detector;
pub mod recurrence_engine;
pub mod schedule_utils;
pub mod slot_resolver;
pub mod unit_accountant;
