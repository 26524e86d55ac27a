pub mod analysis;
pub mod diary;
pub mod lock;
pub mod user;
