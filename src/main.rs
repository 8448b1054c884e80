//! Binary entry point: parse arguments, build the shared matcher, run the
//! pipeline, map the outcome to a grep-compatible exit status.

use lexgrep::config::CategorySet;
use lexgrep::{cli, logging, sink, Matcher, Pool, Walker};
use regex::bytes::Regex;
use std::process;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

fn main() {
    process::exit(run());
}

fn run() -> i32 {
    let mut cfg = match cli::parse_args(std::env::args().skip(1)) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("lexgrep: {err}");
            eprintln!("run 'lexgrep -help' for details");
            return 2;
        }
    };

    if let Err(err) = logging::init(&cfg.log) {
        eprintln!("lexgrep: opening log {}: {err}", cfg.log);
        return 2;
    }

    let regex = match Regex::new(&cfg.pattern) {
        Ok(regex) => regex,
        Err(err) => {
            eprintln!("lexgrep: bad pattern: {err}");
            return 2;
        }
    };

    // The pattern doubles as the value query while `V` is active; an
    // unparseable query drops `V` and the run continues on text alone.
    let value = cli::resolve_value_query(cfg.cats, &cfg.pattern);
    if value.is_none() {
        cfg.cats.clear(CategorySet::V);
    }

    let out = match sink::open_output(&cfg.output) {
        Ok(out) => out,
        Err(err) => {
            eprintln!("lexgrep: opening output {}: {err}", cfg.output);
            return 2;
        }
    };

    info!("scan begins (categories: {})", cfg.cats);
    let start = Instant::now();

    let matcher = Arc::new(Matcher::new(regex, cfg.cats, value));
    let cfg = Arc::new(cfg);
    let mut pool = Pool::new(Arc::clone(&cfg), matcher, out);
    Walker::new(&cfg, &mut pool).run();
    let summary = pool.finish();

    let elapsed = start.elapsed().as_secs_f64();
    info!("scan ends");
    summary.print(elapsed, cfg.summary);

    // Grep-compatible status: 0 with matches, 1 without, 2 reserved for
    // run-level failures handled above.
    if summary.matches > 0 {
        0
    } else {
        1
    }
}
