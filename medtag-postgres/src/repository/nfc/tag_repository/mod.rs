pub mod repo_impl;

mod create;
mod find_by_uid;
mod list_by_user;
mod record_scan;
mod revoke;

pub use repo_impl::TagRepositoryImpl;
