use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{FetchError, StoreError};
use crate::settings::LiveSettings;
use crate::store::{Track, TrackStore};

use super::acquire::{Acquirer, discard_staged};
use super::catalog::Catalog;
use super::inflight::InFlight;
use super::reference::{canonicalize, identifier, start_offset};

/// Resolves user references to cached tracks, downloading on a miss.
pub struct Fetcher {
    store: Arc<TrackStore>,
    catalog: Arc<dyn Catalog>,
    acquirer: Arc<dyn Acquirer>,
    live: Arc<LiveSettings>,
    in_flight: InFlight,
    max_duration: Duration,
}

impl Fetcher {
    pub fn new(
        store: Arc<TrackStore>,
        catalog: Arc<dyn Catalog>,
        acquirer: Arc<dyn Acquirer>,
        live: Arc<LiveSettings>,
        max_duration: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            acquirer,
            live,
            in_flight: InFlight::default(),
            max_duration,
        }
    }

    #[cfg(test)]
    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Resolve `input` (a URL or a chat message containing a link) to a track.
    ///
    /// A second call for the same identifier while the first is running fails
    /// fast with `AlreadyProcessing`. The identifier is released on every
    /// return path.
    pub fn resolve(&self, input: &str) -> Result<Track, FetchError> {
        let source = canonicalize(input);
        if source.is_empty() {
            return Err(FetchError::InvalidReference(input.to_string()));
        }
        let id = identifier(&source);
        let offset = start_offset(&source);

        let _claim = self
            .in_flight
            .begin(&id)
            .ok_or(FetchError::AlreadyProcessing)?;

        if self.live.is_blacklisted(&id) {
            info!("refusing blacklisted {source}");
            return Err(FetchError::Blacklisted);
        }

        match self.store.lookup(&id) {
            Ok(track) => {
                debug!("cache hit for {source} ({id})");
                return Ok(track.with_start_offset(offset));
            }
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let track = self.download(&id, &source)?;
        Ok(track.with_start_offset(offset))
    }

    fn download(&self, id: &str, source: &str) -> Result<Track, FetchError> {
        let content_id = self
            .catalog
            .content_id(source)
            .ok_or_else(|| FetchError::InvalidReference(source.to_string()))?;

        let info = self.catalog.describe(&content_id)?;
        if info.duration > self.max_duration {
            info!(
                "{content_id} is {:?}, over the {:?} limit",
                info.duration, self.max_duration
            );
            return Err(FetchError::TooLong {
                duration: info.duration,
                limit: self.max_duration,
            });
        }

        let staged = self.store.staging_path(id);
        if let Err(e) = self.acquirer.acquire(&content_id, &staged) {
            warn!("download of {content_id} failed: {e}");
            discard_staged(&staged);
            return Err(e);
        }

        let track = Track::new(id, source, info.title);
        match self.store.create(&track, &staged) {
            Ok(()) => Ok(track),
            Err(StoreError::AlreadyExists(_)) => {
                debug!("{id} was registered concurrently; keeping the existing file");
                discard_staged(&staged);
                Ok(self.store.lookup(id)?)
            }
            Err(e) => {
                discard_staged(&staged);
                Err(e.into())
            }
        }
    }
}
