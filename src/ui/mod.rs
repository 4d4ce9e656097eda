pub mod status;
pub mod summary;
