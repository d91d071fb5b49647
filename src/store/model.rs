/// A playable track: a cached audio file plus the metadata shown to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// SHA-256 hex of `source`; also the backing file name.
    pub id: String,
    /// Canonical reference the track was fetched from.
    pub source: String,
    pub title: String,
    /// Seconds to skip at the start, taken from a `t=` timecode. Never stored.
    pub start_offset: Option<u32>,
}

impl Track {
    pub fn new(id: impl Into<String>, source: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            title: title.into(),
            start_offset: None,
        }
    }

    pub fn with_start_offset(mut self, start_offset: Option<u32>) -> Self {
        self.start_offset = start_offset;
        self
    }
}
