use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{crate_authors, crate_description, crate_version, CommandFactory, Parser};
use clap_complete::generate;
use eyre::Result;
use tracing::{info, trace, warn};

use skytrack_common::{init_logging, level_from, Config};
use trackctl::{list_formats, parse_frames, track_balloons, ListSubCommand, Opts, SubCommand};

/// Binary name, using a different binary name
pub const NAME: &str = env!("CARGO_BIN_NAME");
/// Binary version
pub const VERSION: &str = crate_version!();
/// Authors
pub const AUTHORS: &str = crate_authors!();

fn main() -> Result<()> {
    let opts = Opts::parse();

    // Initialise logging.
    //
    let level = level_from(opts.debug, opts.verbose);
    let log_dir = opts.log_dir.as_ref().map(|p| p.to_string_lossy().to_string());
    init_logging(NAME, level, opts.tree, log_dir)?;

    // Banner
    //
    banner()?;

    let cfg = Config::load(opts.config.as_deref())?;
    trace!("config = {cfg:?}");

    handle_subcmd(&cfg, &opts.subcmd)
}

pub fn handle_subcmd(cfg: &Config, subcmd: &SubCommand) -> Result<()> {
    match subcmd {
        // Handle `track`
        //
        SubCommand::Track(topts) => {
            trace!("track");

            let stop = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&stop);
            ctrlc::set_handler(move || {
                warn!("Interrupted, finishing");
                flag.store(true, Ordering::Relaxed);
            })?;

            let store = track_balloons(cfg, topts, stop)?;
            info!("{} track(s) followed", store.len());
        }

        // Handle `parse`
        //
        SubCommand::Parse(popts) => {
            trace!("parse");

            parse_frames(popts)?;
        }

        // Standalone completion generation
        //
        // NOTE: you can generate UNIX shells completion on Windows and vice-versa.  Not worth
        //       trying to limit depending on the OS.
        //
        SubCommand::Completion(copts) => {
            let generator = copts.shell;
            generate(generator, &mut Opts::command(), NAME, &mut io::stdout());
        }

        // Standalone `list` command
        //
        SubCommand::List(lopts) => match lopts.cmd {
            ListSubCommand::Formats => {
                info!("Listing all formats:");

                let str = list_formats()?;
                eprintln!("{}", str);
            }
        },

        // Standalone `version` command
        //
        SubCommand::Version => {
            eprintln!("Modules: ");
            eprintln!("\t{}", skytrack_common::version());
            eprintln!("\t{}", skytrack_formats::version());
            eprintln!("\t{}", skytrack_sources::version());
            eprintln!("\t{}", skytrack_tracks::version());
        }
    }
    Ok(())
}

/// Display banner
///
fn banner() -> Result<()> {
    Ok(eprintln!(
        r##"
{}/{} by {}
{}
"##,
        NAME,
        VERSION,
        AUTHORS,
        crate_description!()
    ))
}
