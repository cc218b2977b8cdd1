pub mod config;
pub mod link;
pub mod profile;
pub mod protocol;
pub mod scheduler;
pub mod status;
pub mod timer;
pub mod traits;
