// Library for tests to access modules

pub mod collector;
pub mod config;
pub mod docker_repo;
pub mod error;
pub mod history_repo;
pub mod history_writer;
pub mod models;
pub mod query;
pub mod restore;
pub mod routes;
pub mod series_store;
pub mod supervisor;
pub mod sysinfo_repo;
