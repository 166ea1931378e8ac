//! The tracking loop.
//!
//! One cycle:
//! 1. ask every source for what it has now (bounded by its own timeout),
//! 2. record the frames if asked to,
//! 3. decode and ingest them in source order,
//! 4. rewrite the export file and print the summary.
//!
//! Then sleep until the next cycle.  The stop flag is checked between cycles and during the
//! sleep, on exit every source is closed and the export written one last time.
//!

use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use eyre::{eyre, Result};
use tracing::{debug, error, info, trace, warn};

use skytrack_common::Config;
use skytrack_sources::{AprsFi, Radio, RawFrame, Receivable, Recorder, Replay, Source};
use skytrack_tracks::{write_tracks, DedupPolicy, LandingModel, TimeWindow, TrackStore};

use crate::TrackOpts;

/// Granularity of the sleep between cycles
const TICK: Duration = Duration::from_millis(100);

/// Open every source asked for on the command-line.
///
#[tracing::instrument(skip(cfg))]
pub fn open_sources(cfg: &Config, opts: &TrackOpts) -> Result<Vec<Source>> {
    let mut sources = vec![];

    if let Some(dev) = &opts.radio {
        sources.push(Source::from(Radio::open(dev)?));
    }
    if let Some(file) = &opts.replay {
        sources.push(Source::from(Replay::open(file, opts.follow)?));
    }
    if opts.aprs_fi {
        let callsigns = if opts.callsigns.is_empty() {
            cfg.callsigns.clone()
        } else {
            opts.callsigns.clone()
        };
        let aprsfi = AprsFi::new(
            &cfg.aprsfi.url,
            cfg.aprsfi.api_key.clone(),
            callsigns,
            Duration::from_secs(cfg.aprsfi.timeout),
        )?;
        sources.push(Source::from(aprsfi));
    }

    if sources.is_empty() {
        return Err(eyre!("no source, use --radio, --replay or --aprs-fi"));
    }
    debug!(
        "sources: {:?}",
        sources.iter().map(|s| s.name()).collect::<Vec<_>>()
    );
    Ok(sources)
}

/// Empty store with the configured policies.
///
pub fn new_store(cfg: &Config) -> Result<TrackStore> {
    let policy = DedupPolicy::from_str(&cfg.dedup)
        .map_err(|_| eyre!("unknown dedup policy {:?}", cfg.dedup))?;
    let model = LandingModel::from_window(cfg.landing_window);
    trace!("dedup={policy} landing={model:?}");
    Ok(TrackStore::new(policy, model))
}

/// Run the loop until `stop` is raised or every source is exhausted, return the final store.
///
#[tracing::instrument(skip(cfg, stop))]
pub fn track_balloons(
    cfg: &Config,
    opts: &TrackOpts,
    stop: Arc<AtomicBool>,
) -> Result<TrackStore> {
    let mut store = new_store(cfg)?.with_window(TimeWindow::new(opts.start, opts.end));
    if let Some(launch) = opts.launch {
        store = store.with_launch(launch);
    }
    let mut sources = open_sources(cfg, opts)?;
    let mut recorder = opts.record.as_deref().map(Recorder::create).transpose()?;

    let interval = Duration::from_secs(opts.interval.unwrap_or(cfg.interval));
    let wait = Duration::from_secs(cfg.radio.timeout);
    info!(
        "Tracking every {}s from {} source(s)",
        interval.as_secs(),
        sources.len()
    );

    let mut cycle = 0usize;
    while !stop.load(Ordering::Relaxed) {
        cycle += 1;

        let mut batch: Vec<RawFrame> = vec![];
        for src in sources.iter_mut() {
            match src.receive(wait) {
                Ok(frames) => {
                    trace!("{}: {} frames", src.name(), frames.len());
                    batch.extend(frames);
                }
                Err(e) => warn!("{}: {e}", src.name()),
            }
        }

        if let Some(rec) = recorder.as_mut() {
            if let Err(e) = rec.record(&batch) {
                error!("{e}");
            }
        }

        let stats = store.ingest_frames(batch.iter().map(|f| (f.text.as_str(), f.received)));
        info!("cycle {cycle}: {stats}");

        if stats.appended > 0 {
            export(&store, opts.output.as_deref());
            println!("{}", store.summary());
        }

        if sources.iter().all(|s| s.is_exhausted()) {
            info!("All sources exhausted");
            break;
        }
        pause(interval, &stop);
    }

    // Shutdown
    //
    for src in sources.iter_mut() {
        if let Err(e) = src.close() {
            warn!("{}: {e}", src.name());
        }
    }
    export(&store, opts.output.as_deref());
    info!("{} track(s) after {cycle} cycle(s)", store.len());
    Ok(store)
}

/// A failed export is not worth stopping the tracking for.
///
fn export(store: &TrackStore, output: Option<&Path>) {
    if let Some(path) = output {
        if let Err(e) = write_tracks(store, path) {
            error!("export: {e}");
        }
    }
}

/// Sleep for `interval`, waking up early if `stop` is raised.
///
fn pause(interval: Duration, stop: &AtomicBool) {
    let start = Instant::now();
    while !stop.load(Ordering::Relaxed) {
        let elapsed = start.elapsed();
        if elapsed >= interval {
            break;
        }
        sleep(TICK.min(interval - elapsed));
    }
}
