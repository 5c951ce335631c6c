pub mod ask;
pub mod cache;
pub mod config;
pub mod reflect;
pub mod sql;
pub mod validate_sql;
