pub mod dashboard;
pub mod drive;
pub mod status;
