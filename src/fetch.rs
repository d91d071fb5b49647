//! Fetch pipeline: user reference -> identifier -> cached or downloaded track.

mod acquire;
mod catalog;
mod fetcher;
mod inflight;
mod reference;

pub use acquire::YoutubeDl;
pub use catalog::YouTubeCatalog;
pub use fetcher::Fetcher;
pub use reference::{canonicalize, identifier};
#[cfg(test)]
pub use acquire::Acquirer;
#[cfg(test)]
pub use catalog::{Catalog, ContentInfo};

#[cfg(test)]
mod tests;
