pub mod repo_impl;

mod append;
mod list;

pub use repo_impl::AuditEventRepositoryImpl;
