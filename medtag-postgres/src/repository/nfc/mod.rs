pub mod access_log_repository;
pub mod emergency_access_repository;
pub mod tag_repository;
