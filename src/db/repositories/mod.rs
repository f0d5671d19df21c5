pub mod authorization_repository;
pub mod booking_repository;
