pub mod config;
pub mod parser;

pub use config::{CollectorConfig, DashboardConfig, VigilConfig, VigilConfigBuilder};
pub use parser::{parse_config_from_file, parse_config_from_str};
