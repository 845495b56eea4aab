use std::io::{ErrorKind, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tracing::{debug, warn};

use crate::error::{Result, TransportError};

/// Block size for the pump loops, matching a generous pipe buffer.
const BLOCK_SIZE: usize = 1024 * 1024;

/// Bridges process stdio onto a socket-like transport.
///
/// One end of a connected socketpair is handed to the dispatch loop as its
/// transport; the other end is driven by two pump threads. The input pump
/// copies stdin into the bridge and shuts down the write half on stdin EOF.
/// The output pump copies the bridge to stdout and fires the completion
/// signal when the transport end is dropped. The pumps never touch dispatch
/// state; bytes and one completion signal are the only things that cross.
pub struct StdioBridge {
    done_rx: Receiver<()>,
}

impl StdioBridge {
    /// Create the socketpair and start both pump threads over real stdio.
    ///
    /// Returns the transport end for the dispatch loop alongside the bridge
    /// handle used to await completion.
    pub fn start() -> Result<(UnixStream, StdioBridge)> {
        let (transport, pump_end) = UnixStream::pair()?;
        let pump_out_end = pump_end.try_clone()?;
        let (done_tx, done_rx) = mpsc::channel();

        // The pump threads block on raw stdio reads and cannot be joined on
        // exit; the process ends while they are still parked in read().
        thread::spawn(move || pump_input(std::io::stdin(), pump_end));
        thread::spawn(move || pump_output(pump_out_end, std::io::stdout(), done_tx));

        Ok((transport, StdioBridge { done_rx }))
    }

    /// Block until the output pump observes end-of-stream on the bridge.
    ///
    /// This fires when the dispatch loop drops its transport end, which is
    /// the cue for the process to exit.
    pub fn wait(&self) -> Result<()> {
        self.done_rx.recv().map_err(|_| TransportError::PumpLost)
    }
}

/// Copy `src` into the bridge socket until EOF, then shut down the write
/// half so the dispatch loop sees end-of-stream without the process dying.
fn pump_input<R: Read>(mut src: R, mut bridge: UnixStream) {
    let mut buf = vec![0u8; BLOCK_SIZE];
    loop {
        let read = match src.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!("input pump read failed: {err}");
                break;
            }
        };
        if let Err(err) = bridge.write_all(&buf[..read]) {
            warn!("input pump write failed: {err}");
            break;
        }
    }
    debug!("input exhausted; shutting down bridge write half");
    let _ = bridge.shutdown(Shutdown::Write);
}

/// Copy the bridge socket into `dst` until EOF, then fire the completion
/// signal. No shutdown here: completion is what makes the process exit.
fn pump_output<W: Write>(mut bridge: UnixStream, mut dst: W, done: Sender<()>) {
    let mut buf = vec![0u8; BLOCK_SIZE];
    loop {
        let read = match bridge.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!("output pump read failed: {err}");
                break;
            }
        };
        if dst.write_all(&buf[..read]).and_then(|()| dst.flush()).is_err() {
            break;
        }
    }
    debug!("bridge closed; signaling completion");
    let _ = done.send(());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn input_pump_forwards_then_shuts_down_write() {
        let (ours, theirs) = UnixStream::pair().unwrap();

        let pump = thread::spawn(move || {
            pump_input(Cursor::new(b"forwarded bytes".to_vec()), ours);
        });

        let mut received = Vec::new();
        let mut theirs = theirs;
        theirs.read_to_end(&mut received).unwrap();

        assert_eq!(received, b"forwarded bytes");
        pump.join().unwrap();
    }

    #[test]
    fn output_pump_signals_completion_on_eof() {
        let (ours, theirs) = UnixStream::pair().unwrap();
        let (done_tx, done_rx) = mpsc::channel();

        let collected = thread::spawn(move || {
            let mut out = Vec::new();
            pump_output(ours, &mut out, done_tx);
            out
        });

        let mut theirs = theirs;
        theirs.write_all(b"to stdout").unwrap();
        drop(theirs);

        done_rx.recv().unwrap();
        assert_eq!(collected.join().unwrap(), b"to stdout");
    }

    #[test]
    fn pumps_bridge_full_round_trip() {
        // Wire the two pumps back to back through a socketpair and check the
        // bytes survive the trip in both directions.
        let (transport, pump_end) = UnixStream::pair().unwrap();
        let pump_out_end = pump_end.try_clone().unwrap();
        let (done_tx, done_rx) = mpsc::channel();

        thread::spawn(move || pump_input(Cursor::new(b"stdin data".to_vec()), pump_end));
        let stdout = thread::spawn(move || {
            let mut out = Vec::new();
            pump_output(pump_out_end, &mut out, done_tx);
            out
        });

        let mut transport = transport;
        let mut inbound = Vec::new();
        transport.read_to_end(&mut inbound).unwrap();
        assert_eq!(inbound, b"stdin data");

        transport.write_all(b"reply data").unwrap();
        drop(transport);

        done_rx.recv().unwrap();
        assert_eq!(stdout.join().unwrap(), b"reply data");
    }
}
