mod commands;
mod config;
mod error;
mod fetch;
mod playback;
mod runtime;
mod settings;
mod store;
mod voice;

fn main() -> Result<(), error::Error> {
    runtime::run()
}
