pub mod acquire;
pub mod batch;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod logging;
pub mod model;
pub mod report;
pub mod util;
pub mod verify;
