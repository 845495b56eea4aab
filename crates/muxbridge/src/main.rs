mod exit;
mod logging;

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info};

use muxbridge_frame::FrameReader;
use muxbridge_router::{Router, RouterConfig};
use muxbridge_transport::StdioBridge;

use crate::exit::{io_error, router_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::logging::{init_logging, LogFormat, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "muxbridge",
    version,
    about = "Channel-multiplexed administration bridge speaking frames over stdio"
)]
struct Cli {
    /// Base directory whose dist/ tree backs http-stream1 channels.
    #[arg(long, value_name = "DIR", env = "MUXBRIDGE_BASE", default_value = ".")]
    base: PathBuf,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    log_level: LogLevel,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

fn run(cli: Cli) -> CliResult<i32> {
    let config = RouterConfig::detect(cli.base);

    let (transport, bridge) =
        StdioBridge::start().map_err(|err| transport_error("starting stdio bridge", err))?;
    let reader = FrameReader::new(
        transport
            .try_clone()
            .map_err(|err| io_error("cloning transport socket", err))?,
    );

    let mut router = Router::new(transport, config);
    router
        .send_init()
        .map_err(|err| router_error("announcing init", err))?;
    info!("bridge running");

    // The dispatch loop gets its own thread; this one waits for the stdout
    // pump to drain so no frame is lost on shutdown. The thread queues its
    // outcome before dropping the transport, so once the pump signals
    // completion the result is already readable.
    let (outcome_tx, outcome_rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = outcome_tx.send(router.serve(reader));
    });

    bridge
        .wait()
        .map_err(|err| transport_error("waiting for stdio to drain", err))?;
    debug!("stdio drained");

    match outcome_rx.recv_timeout(Duration::from_millis(250)) {
        Ok(Ok(())) => Ok(SUCCESS),
        Ok(Err(err)) => Err(router_error("dispatch loop", err)),
        // Output side is gone while the dispatch loop still blocks on
        // stdin. Nothing more can be delivered either way.
        Err(mpsc::RecvTimeoutError::Timeout) => Ok(SUCCESS),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(CliError::new(INTERNAL, "dispatch thread panicked"))
        }
    }
}
