pub mod checkin;
pub mod models;
