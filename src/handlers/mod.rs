pub mod analysis;
pub mod auth;
pub mod diaries;
pub mod health;
pub mod lock;
pub mod users;
