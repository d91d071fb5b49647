use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tempfile::{TempDir, tempdir};

use super::catalog::{parse_iso8601_duration, parse_video_list};
use super::reference::{parse_timecode, start_offset, youtube_video_id};
use super::*;
use crate::config::Settings;
use crate::error::FetchError;
use crate::settings::LiveSettings;
use crate::store::{STAGING_DIR, Track, TrackStore};

/// Content id = last path segment; durations looked up by content id.
struct FakeCatalog {
    durations: HashMap<String, Duration>,
    describes: AtomicUsize,
}

impl FakeCatalog {
    fn new(entries: &[(&str, u64)]) -> Self {
        Self {
            durations: entries
                .iter()
                .map(|(id, secs)| (id.to_string(), Duration::from_secs(*secs)))
                .collect(),
            describes: AtomicUsize::new(0),
        }
    }
}

impl Catalog for FakeCatalog {
    fn content_id(&self, reference: &str) -> Option<String> {
        let url = url::Url::parse(reference).ok()?;
        url.path_segments()?.last().map(str::to_string)
    }

    fn describe(&self, content_id: &str) -> Result<ContentInfo, FetchError> {
        self.describes.fetch_add(1, Ordering::SeqCst);
        let duration = self
            .durations
            .get(content_id)
            .copied()
            .ok_or_else(|| FetchError::InvalidReference(content_id.to_string()))?;
        Ok(ContentInfo {
            title: format!("Title of {content_id}"),
            duration,
        })
    }
}

#[derive(Default)]
struct FakeAcquirer {
    calls: AtomicUsize,
    fail: bool,
    /// When set, signal `started` and wait for `release` before writing.
    gate: Option<(Mutex<Sender<()>>, Mutex<Receiver<()>>)>,
}

impl Acquirer for FakeAcquirer {
    fn acquire(&self, content_id: &str, dest: &Path) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((started, release)) = &self.gate {
            started.lock().unwrap().send(()).unwrap();
            release.lock().unwrap().recv().unwrap();
        }
        if self.fail {
            let mut partial = dest.as_os_str().to_owned();
            partial.push(".webm.part");
            fs::write(partial, b"half").unwrap();
            return Err(FetchError::DownloadFailed(format!("{content_id}: exit 1")));
        }
        fs::write(dest, format!("audio for {content_id}")).unwrap();
        Ok(())
    }
}

/// Registers the same track under another title while its own download runs.
struct RacingAcquirer {
    store: Arc<TrackStore>,
    id: String,
}

impl Acquirer for RacingAcquirer {
    fn acquire(&self, _content_id: &str, dest: &Path) -> Result<(), FetchError> {
        let winner = Track::new(self.id.clone(), "http://site/x", "Winner");
        let staged = self.store.staging_path(&self.id);
        fs::write(&staged, b"winner").unwrap();
        self.store.create(&winner, &staged).unwrap();
        fs::write(dest, b"loser").unwrap();
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    store: Arc<TrackStore>,
    live: Arc<LiveSettings>,
    catalog: Arc<FakeCatalog>,
    acquirer: Arc<FakeAcquirer>,
    fetcher: Arc<Fetcher>,
}

fn harness(catalog: FakeCatalog, acquirer: FakeAcquirer) -> Harness {
    let dir = tempdir().unwrap();
    let store = Arc::new(TrackStore::open_in_memory(dir.path()).unwrap());
    let live = Arc::new(LiveSettings::in_memory(&Settings::default()));
    let catalog = Arc::new(catalog);
    let acquirer = Arc::new(acquirer);
    let fetcher = Arc::new(Fetcher::new(
        store.clone(),
        catalog.clone(),
        acquirer.clone(),
        live.clone(),
        Duration::from_secs(3600),
    ));
    Harness {
        _dir: dir,
        store,
        live,
        catalog,
        acquirer,
        fetcher,
    }
}

fn staging_is_empty(store: &TrackStore) -> bool {
    fs::read_dir(store.files_dir().join(STAGING_DIR))
        .unwrap()
        .next()
        .is_none()
}

#[test]
fn sequential_resolves_of_one_reference_fetch_once() {
    let h = harness(FakeCatalog::new(&[("x", 200)]), FakeAcquirer::default());

    let first = h.fetcher.resolve("http://site/x").unwrap();
    let second = h.fetcher.resolve("http://site/x").unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.id, identifier("http://site/x"));
    assert_eq!(first.title, "Title of x");
    assert_eq!(h.acquirer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.catalog.describes.load(Ordering::SeqCst), 1);
    assert!(h.store.path_for(&first.id).is_file());
    assert!(h.fetcher.in_flight().is_empty());
}

#[test]
fn markup_and_raw_link_resolve_to_the_same_track() {
    let h = harness(FakeCatalog::new(&[("x", 200)]), FakeAcquirer::default());

    let raw = h.fetcher.resolve("http://site/x").unwrap();
    let wrapped = h
        .fetcher
        .resolve(r#"<a href="http://site/x">http://site/x</a>"#)
        .unwrap();

    assert_eq!(raw.id, wrapped.id);
    assert_eq!(h.acquirer.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn concurrent_resolves_of_one_reference_fetch_once() {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let acquirer = FakeAcquirer {
        gate: Some((Mutex::new(started_tx), Mutex::new(release_rx))),
        ..FakeAcquirer::default()
    };
    let h = harness(FakeCatalog::new(&[("x", 200)]), acquirer);

    let fetcher = h.fetcher.clone();
    let first = thread::spawn(move || fetcher.resolve("http://site/x"));

    started_rx.recv().unwrap();
    assert!(h.fetcher.in_flight().contains(&identifier("http://site/x")));
    let second = h.fetcher.resolve("http://site/x");
    assert!(matches!(second, Err(FetchError::AlreadyProcessing)));

    release_tx.send(()).unwrap();
    let first = first.join().unwrap().unwrap();
    assert_eq!(first.id, identifier("http://site/x"));
    assert_eq!(h.acquirer.calls.load(Ordering::SeqCst), 1);
    assert!(h.fetcher.in_flight().is_empty());
}

#[test]
fn losing_the_registration_race_returns_the_winner() {
    let dir = tempdir().unwrap();
    let store = Arc::new(TrackStore::open_in_memory(dir.path()).unwrap());
    let id = identifier("http://site/x");
    let fetcher = Fetcher::new(
        store.clone(),
        Arc::new(FakeCatalog::new(&[("x", 200)])),
        Arc::new(RacingAcquirer {
            store: store.clone(),
            id: id.clone(),
        }),
        Arc::new(LiveSettings::in_memory(&Settings::default())),
        Duration::from_secs(3600),
    );

    let track = fetcher.resolve("http://site/x").unwrap();

    assert_eq!(track.id, id);
    assert_eq!(track.title, "Winner");
    assert_eq!(fs::read(store.path_for(&id)).unwrap(), b"winner");
    assert_eq!(store.count().unwrap(), 1);
    assert!(staging_is_empty(&store));
    assert!(fetcher.in_flight().is_empty());
}

#[test]
fn too_long_leaves_no_record_no_file_and_no_claim() {
    let h = harness(FakeCatalog::new(&[("x", 2 * 3600)]), FakeAcquirer::default());

    let err = h.fetcher.resolve("http://site/x").unwrap_err();
    assert!(matches!(err, FetchError::TooLong { .. }));

    assert_eq!(h.store.count().unwrap(), 0);
    assert!(!h.store.path_for(&identifier("http://site/x")).exists());
    assert!(staging_is_empty(&h.store));
    assert!(!h.fetcher.in_flight().contains(&identifier("http://site/x")));
    assert_eq!(h.acquirer.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn failed_download_cleans_partial_files_and_releases_claim() {
    let acquirer = FakeAcquirer {
        fail: true,
        ..FakeAcquirer::default()
    };
    let h = harness(FakeCatalog::new(&[("x", 200)]), acquirer);

    let err = h.fetcher.resolve("http://site/x").unwrap_err();
    assert!(matches!(err, FetchError::DownloadFailed(_)));
    assert_eq!(h.store.count().unwrap(), 0);
    assert!(staging_is_empty(&h.store));
    assert!(h.fetcher.in_flight().is_empty());
}

#[test]
fn blacklisted_reference_is_refused_even_when_cached() {
    let h = harness(FakeCatalog::new(&[("x", 200)]), FakeAcquirer::default());
    h.fetcher.resolve("http://site/x").unwrap();

    h.live.blacklist(&identifier("http://site/x"));
    let err = h.fetcher.resolve("http://site/x").unwrap_err();
    assert!(matches!(err, FetchError::Blacklisted));
    assert!(h.fetcher.in_flight().is_empty());
}

#[test]
fn unsupported_reference_is_invalid() {
    let h = harness(FakeCatalog::new(&[]), FakeAcquirer::default());
    let err = h.fetcher.resolve("just some words").unwrap_err();
    assert!(matches!(err, FetchError::InvalidReference(_)));
    let err = h.fetcher.resolve("   ").unwrap_err();
    assert!(matches!(err, FetchError::InvalidReference(_)));
    assert!(h.fetcher.in_flight().is_empty());
}

#[test]
fn timecode_in_reference_sets_start_offset() {
    let h = harness(FakeCatalog::new(&[("x", 200)]), FakeAcquirer::default());
    let track = h.fetcher.resolve("http://site/x?t=1h2m3s").unwrap();
    assert_eq!(track.start_offset, Some(3723));

    let plain = h.fetcher.resolve("http://site/x").unwrap();
    assert_eq!(plain.start_offset, None);
}

#[test]
fn canonicalize_extracts_href_and_decodes_entities() {
    assert_eq!(
        canonicalize(r#"<a href="https://www.youtube.com/watch?v=abc&amp;t=30">link</a>"#),
        "https://www.youtube.com/watch?v=abc&t=30"
    );
    assert_eq!(
        canonicalize("<A HREF='http://youtu.be/xyz'>x</A>"),
        "http://youtu.be/xyz"
    );
    assert_eq!(canonicalize("  http://youtu.be/xyz  "), "http://youtu.be/xyz");
}

#[test]
fn identifier_is_sha256_hex() {
    assert_eq!(
        identifier("abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn youtube_video_id_accepts_known_shapes() {
    for url in [
        "http://youtu.be/_lOT2p_FCvA",
        "www.youtube.com/watch?v=_lOT2p_FCvA&feature=feedu",
        "http://www.youtube.com/embed/_lOT2p_FCvA",
        "http://www.youtube.com/v/_lOT2p_FCvA?version=3&hl=en_US",
        "youtube.com/watch?v=_lOT2p_FCvA",
    ] {
        assert_eq!(youtube_video_id(url).as_deref(), Some("_lOT2p_FCvA"), "{url}");
    }
    assert_eq!(
        youtube_video_id(
            "https://www.youtube.com/watch?v=rTHlyTphWP0&index=6&list=PLjeDyYvG6-40qawYNR4juzvSOg-ezZ2a6"
        )
        .as_deref(),
        Some("rTHlyTphWP0")
    );
}

#[test]
fn youtube_video_id_rejects_other_shapes() {
    assert_eq!(youtube_video_id("youtu.be/watch?v=_lOT2p_FCvA"), None);
    assert_eq!(youtube_video_id("http://example.com/watch?v=abc"), None);
    assert_eq!(youtube_video_id("https://www.youtube.com/feed"), None);
    assert_eq!(youtube_video_id("not a url"), None);
}

#[test]
fn timecodes_add_labelled_parts_and_bare_numbers_are_absolute() {
    assert_eq!(parse_timecode("1h2m3s"), Some(3723));
    assert_eq!(parse_timecode("2m"), Some(120));
    assert_eq!(parse_timecode("45s"), Some(45));
    assert_eq!(parse_timecode("90"), Some(90));
    assert_eq!(parse_timecode("1m30"), Some(30));
    assert_eq!(parse_timecode("soon"), None);
    assert_eq!(parse_timecode(""), None);
}

#[test]
fn start_offset_reads_query_and_fragment() {
    assert_eq!(
        start_offset("https://www.youtube.com/watch?v=abc&t=1h2m3s"),
        Some(3723)
    );
    assert_eq!(start_offset("https://youtu.be/abc?t=42"), Some(42));
    assert_eq!(start_offset("youtu.be/abc#t=1m"), Some(60));
    assert_eq!(start_offset("https://youtu.be/abc"), None);
}

#[test]
fn iso8601_durations() {
    assert_eq!(parse_iso8601_duration("PT1H2M3S"), Some(Duration::from_secs(3723)));
    assert_eq!(parse_iso8601_duration("PT4M"), Some(Duration::from_secs(240)));
    assert_eq!(
        parse_iso8601_duration("P1DT1S"),
        Some(Duration::from_secs(86_401))
    );
    assert_eq!(parse_iso8601_duration("P0D"), Some(Duration::ZERO));
    assert_eq!(parse_iso8601_duration("PT"), None);
    assert_eq!(parse_iso8601_duration("P1M"), None);
    assert_eq!(parse_iso8601_duration("1H"), None);
}

#[test]
fn video_list_body_is_parsed() {
    let body = r#"{
        "kind": "youtube#videoListResponse",
        "items": [{
            "id": "abc",
            "snippet": {"title": "Some Song", "channelTitle": "Someone"},
            "contentDetails": {"duration": "PT3M20S", "dimension": "2d"}
        }]
    }"#;
    let info = parse_video_list("abc", body).unwrap();
    assert_eq!(info.title, "Some Song");
    assert_eq!(info.duration, Duration::from_secs(200));

    let empty = parse_video_list("abc", r#"{"items": []}"#).unwrap_err();
    assert!(matches!(empty, FetchError::InvalidReference(_)));
}
