pub mod metrics;
pub mod server;
pub mod status;
pub mod version;
pub mod web;
