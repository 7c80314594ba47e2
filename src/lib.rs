pub mod driver;
pub mod engine;
pub mod flow;
pub mod report;
pub mod site;
pub mod utils;

// Re-export common items
pub use flow::run;
pub use site::load_profile;
pub use utils::config::Config;
