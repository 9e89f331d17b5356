mod config;
pub use config::Config;

mod target;
pub use target::StoreTarget;

pub mod env {
    pub const LOG_DIRECTIVE: &str = "KVJSON_LOG";
}
