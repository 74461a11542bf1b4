pub mod repo_impl;

mod append;
mod list;
mod resolve;

pub use repo_impl::SecurityEventRepositoryImpl;
