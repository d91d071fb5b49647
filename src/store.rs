//! Track store: the persistent, content-addressed cache of downloaded audio.
//!
//! Records live in SQLite (`db`), the audio in one file per track named by
//! its id. `model` holds the `Track` value shared by the rest of the crate.

mod db;
mod model;

pub use db::TrackStore;
#[cfg(test)]
pub use db::STAGING_DIR;
pub use model::Track;

#[cfg(test)]
mod tests;
