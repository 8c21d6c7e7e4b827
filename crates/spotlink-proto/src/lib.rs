pub mod config;
pub mod normalize;
pub mod platform;
pub mod protocol;
pub mod query;
pub mod sanitize;
pub mod status;
