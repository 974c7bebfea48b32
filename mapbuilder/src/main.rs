use std::process::ExitCode;

mod logger;

use logger::{LogAbout, LogSev};
use navcore::assembler::global_wmo_logical_name;
use navcore::blob::{BlobProvider, FsBlobProvider};
use navcore::map::Map;
use navcore::navgen::{NavGenConfig, PassthroughNavGen};
use navcore::orchestrator::{self, BuildConfig};
use std::path::PathBuf;
use std::sync::Arc;

struct Args {
    data: PathBuf,
    map_name: String,
    output: PathBuf,
    adt: Option<(u8, u8)>,
    jobs: usize,
}

fn print_usage() {
    eprintln!(
        "Usage: mapbuilder --data <dir> --map <name> --output <dir> [--adtX <x> --adtY <y>] [--jobs <n>]\n\
         \n\
         Options:\n\
         \x20\x20-d, --data    <dir>   root of the game's resource tree (required)\n\
         \x20\x20-m, --map     <name>  logical map name, e.g. Azeroth (required)\n\
         \x20\x20-o, --output  <dir>   directory to write Nav/ and BVH/ into (required)\n\
         \x20\x20-x, --adtX    <x>     build only this tile's X index (requires --adtY)\n\
         \x20\x20-y, --adtY    <y>     build only this tile's Y index (requires --adtX)\n\
         \x20\x20-j, --jobs    <n>     worker thread count (default: 4)\n\
         \x20\x20-h, --help            print this message"
    );
}

/// Hand-rolled flag parsing (§1, §6): no argument-parsing crate, mirroring
/// the reference tool's own plain option loop.
fn parse_args(argv: &[String]) -> Result<Args, String> {
    let mut data: Option<PathBuf> = None;
    let mut map_name: Option<String> = None;
    let mut output: Option<PathBuf> = None;
    let mut adt_x: Option<u8> = None;
    let mut adt_y: Option<u8> = None;
    let mut jobs: usize = 4;

    let mut i = 0;
    while i < argv.len() {
        let flag = argv[i].as_str();
        let mut take_value = |name: &str| -> Result<String, String> {
            i += 1;
            argv.get(i)
                .cloned()
                .ok_or_else(|| format!("missing value for {name}"))
        };
        match flag {
            "-h" | "--help" => return Err(String::new()),
            "-d" | "--data" => data = Some(PathBuf::from(take_value(flag)?)),
            "-m" | "--map" => map_name = Some(take_value(flag)?),
            "-o" | "--output" => output = Some(PathBuf::from(take_value(flag)?)),
            "-x" | "--adtX" => {
                adt_x = Some(
                    take_value(flag)?
                        .parse::<u8>()
                        .map_err(|_| "--adtX expects an integer in [0, 63]".to_string())?,
                )
            }
            "-y" | "--adtY" => {
                adt_y = Some(
                    take_value(flag)?
                        .parse::<u8>()
                        .map_err(|_| "--adtY expects an integer in [0, 63]".to_string())?,
                )
            }
            "-j" | "--jobs" => {
                jobs = take_value(flag)?
                    .parse::<usize>()
                    .map_err(|_| "--jobs expects a positive integer".to_string())?;
            }
            other => return Err(format!("unrecognized argument: {other}")),
        }
        i += 1;
    }

    let adt = match (adt_x, adt_y) {
        (Some(x), Some(y)) => Some((x, y)),
        (None, None) => None,
        _ => return Err("--adtX and --adtY must be given together".to_string()),
    };

    Ok(Args {
        data: data.ok_or("missing required --data")?,
        map_name: map_name.ok_or("missing required --map")?,
        output: output.ok_or("missing required --output")?,
        adt,
        jobs,
    })
}

fn run(args: Args) -> Result<(), String> {
    let blob: Arc<dyn BlobProvider> =
        Arc::new(FsBlobProvider::new(args.data.clone()));

    // A map is global iff its top-level root WMO exists; otherwise it's a
    // tile grid (§4.4, §9: no explicit CLI signal for this distinction).
    let is_global = blob.open(&global_wmo_logical_name(&args.map_name)).is_ok();

    let map = Arc::new(Map::new(args.map_name.clone(), blob, is_global));

    logger::one(
        None,
        LogSev::Info,
        LogAbout::Cli,
        &format!(
            "building map '{}' (global={is_global}) from {} into {}",
            args.map_name,
            args.data.display(),
            args.output.display()
        ),
    );

    let cfg = BuildConfig {
        map_name: args.map_name.clone(),
        out_dir: args.output,
        jobs: args.jobs,
        requested_tile: args.adt,
        navgen_config: NavGenConfig::default(),
    };

    let report = orchestrator::run(map, cfg, Arc::new(PassthroughNavGen))
        .map_err(|e| format!("build failed: {e}"))?;

    logger::one(
        None,
        LogSev::Info,
        LogAbout::Orchestrator,
        &format!(
            "{} tile(s) built, {} failed",
            report.tiles_built.len(),
            report.tiles_failed.len()
        ),
    );
    for (coord, reason) in &report.tiles_failed {
        logger::one(
            None,
            LogSev::Warn,
            LogAbout::Orchestrator,
            &format!("tile ({}, {}) failed: {reason}", coord.x, coord.y),
        );
    }

    if report.tiles_failed.is_empty() {
        Ok(())
    } else {
        Err(format!("{} tile(s) failed to build", report.tiles_failed.len()))
    }
}

fn main() -> ExitCode {
    color_eyre::install().ok();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(message) => {
            if message.is_empty() {
                print_usage();
                return ExitCode::SUCCESS;
            }
            eprintln!("error: {message}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            logger::one(None, LogSev::Error, LogAbout::Cli, &message);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_required_flags() {
        let args = parse_args(&argv(&["-d", "/data", "-m", "Azeroth", "-o", "/out"])).unwrap();
        assert_eq!(args.data, PathBuf::from("/data"));
        assert_eq!(args.map_name, "Azeroth");
        assert_eq!(args.output, PathBuf::from("/out"));
        assert_eq!(args.adt, None);
        assert_eq!(args.jobs, 4);
    }

    #[test]
    fn rejects_lone_adt_x() {
        let err = parse_args(&argv(&[
            "-d", "/data", "-m", "Azeroth", "-o", "/out", "--adtX", "5",
        ]))
        .unwrap_err();
        assert!(err.contains("adtX and --adtY"));
    }

    #[test]
    fn accepts_adt_pair_and_jobs() {
        let args = parse_args(&argv(&[
            "--data", "/data", "--map", "Azeroth", "--output", "/out", "--adtX", "5", "--adtY",
            "9", "--jobs", "8",
        ]))
        .unwrap();
        assert_eq!(args.adt, Some((5, 9)));
        assert_eq!(args.jobs, 8);
    }

    #[test]
    fn help_flag_short_circuits_with_empty_error() {
        let err = parse_args(&argv(&["--help"])).unwrap_err();
        assert!(err.is_empty());
    }

    #[test]
    fn missing_required_flag_is_an_error() {
        let err = parse_args(&argv(&["--data", "/data"])).unwrap_err();
        assert!(err.contains("--map"));
    }
}
