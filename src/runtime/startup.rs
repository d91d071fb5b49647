use log::{error, info, warn};

use crate::playback::Engine;
use crate::settings::LiveSettings;
use crate::store::TrackStore;

/// Log every record without a file and every file without a record.
pub fn report_integrity(store: &TrackStore) {
    match store.verify() {
        Ok(faults) if faults.is_empty() => match store.count() {
            Ok(n) => info!("track store holds {n} tracks"),
            Err(e) => warn!("could not count tracks: {e}"),
        },
        Ok(faults) => {
            for fault in &faults {
                warn!("{fault}");
            }
            warn!("track store has {} integrity faults", faults.len());
        }
        Err(e) => error!("could not verify the track store: {e}"),
    }
}

/// With autoplay on, start a random track right away instead of waiting for
/// the first command.
pub fn resume_autoplay(engine: &Engine, live: &LiveSettings) {
    if !live.autoplay() {
        return;
    }
    match engine.random(1) {
        Ok(picks) if picks.is_empty() => info!("autoplay is on but nothing is cached"),
        Ok(_) => {}
        Err(e) => warn!("autoplay could not start: {e}"),
    }
}
