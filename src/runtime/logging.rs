use std::str::FromStr;

use log::LevelFilter;

use crate::config::LogSettings;

/// Install `colog` at the configured level and route panics through `log`.
pub fn init(settings: &LogSettings) {
    let level = LevelFilter::from_str(&settings.level).unwrap_or(LevelFilter::Info);

    let mut clog = colog::default_builder();
    clog.filter(None, level);
    if clog.try_init().is_err() {
        return;
    }

    if level.to_string().to_lowercase() != settings.level.to_lowercase() {
        log::warn!("unknown log level {:?}, using {level}", settings.level);
    }

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));
}
