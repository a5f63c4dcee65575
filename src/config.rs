//! Build-time Configuration
//!
//! `SCOT_*` variables are baked in at compile time and applied over the
//! defaults.

use scot_sync::ScotConfig;

fn build_time(key: &str) -> Option<&'static str> {
    match key {
        "SCOT_API_BASE" => option_env!("SCOT_API_BASE"),
        "SCOT_CLIENT_ID" => option_env!("SCOT_CLIENT_ID"),
        "SCOT_ORDER_PUNCH_URL" => option_env!("SCOT_ORDER_PUNCH_URL"),
        "SCOT_ORDER_POST_URL" => option_env!("SCOT_ORDER_POST_URL"),
        "SCOT_REQUEST_TIMEOUT_MS" => option_env!("SCOT_REQUEST_TIMEOUT_MS"),
        "SCOT_POLL_INTERVAL_SECS" => option_env!("SCOT_POLL_INTERVAL_SECS"),
        _ => None,
    }
}

pub fn load(debug: bool) -> ScotConfig {
    let config = ScotConfig { debug, ..ScotConfig::default() }.with_overrides(|key| build_time(key).map(str::to_string));
    if let Err(e) = config.validate() {
        log::error!("configuration: {}", e);
    }
    config
}
