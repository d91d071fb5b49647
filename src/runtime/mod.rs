use std::io;
use std::sync::Arc;

use log::{error, info, warn};
use rodio::OutputStreamBuilder;

use crate::commands::Dispatcher;
use crate::error::Error;
use crate::fetch::{Fetcher, YouTubeCatalog, YoutubeDl};
use crate::playback::{Engine, FfmpegTranscoder, PumpTiming, pump};
use crate::settings::LiveSettings;
use crate::store::TrackStore;
use crate::voice::{ConsoleClient, LocalSink};

mod logging;
mod settings;
mod startup;

pub fn run() -> Result<(), Error> {
    let (settings, problem) = settings::load_settings();
    logging::init(&settings.log);
    if let Some(msg) = problem {
        warn!("{msg}");
    }

    let store = Arc::new(TrackStore::open(
        &settings.store.database,
        &settings.store.files_dir,
    )?);
    startup::report_integrity(&store);
    let live = Arc::new(LiveSettings::load(&settings.store.state_file, &settings));

    let transcoder = Arc::new(FfmpegTranscoder::new(
        settings.playback.ffmpeg.clone(),
        settings.playback.frame_bytes,
    ));
    let engine = Arc::new(Engine::new(
        store.clone(),
        transcoder,
        live.clone(),
        &settings.playback,
    ));

    if settings.fetch.youtube_api_key.is_none() {
        warn!("fetch.youtube_api_key is not set; only cached tracks can be played");
    }
    let fetcher = Arc::new(Fetcher::new(
        store.clone(),
        Arc::new(YouTubeCatalog::new(
            settings.fetch.api_base.clone(),
            settings.fetch.youtube_api_key.clone(),
        )),
        Arc::new(YoutubeDl::new(settings.fetch.downloader.clone())),
        live.clone(),
        settings.fetch.max_duration(),
    ));

    let mut stream = OutputStreamBuilder::open_default_stream()?;
    // rodio logs to stderr when OutputStream is dropped.
    stream.log_on_drop(false);
    let sink = Arc::new(LocalSink::new(stream.mixer(), settings.playback.frame_bytes));
    let pump = pump::spawn(engine.clone(), sink, PumpTiming::from(&settings.playback))?;

    let client = Arc::new(ConsoleClient::new(&settings.voice));
    let dispatcher = Dispatcher::new(
        client.clone(),
        engine.clone(),
        fetcher,
        live.clone(),
        live.clone(),
    );

    startup::resume_autoplay(&engine, &live);
    info!("ready; type !help for commands, end input to quit");

    let mut workers = Vec::new();
    let listened = client.listen(io::stdin().lock(), |message| {
        workers.retain(|w: &std::thread::JoinHandle<()>| !w.is_finished());
        if let Some(worker) = dispatcher.handle(&message) {
            workers.push(worker);
        }
    });

    info!("shutting down");
    for worker in workers {
        if worker.join().is_err() {
            error!("a fetch worker panicked");
        }
    }
    engine.shutdown();
    if pump.join().is_err() {
        error!("audio pump panicked");
    }
    drop(stream);

    listened.map_err(Error::from)
}
