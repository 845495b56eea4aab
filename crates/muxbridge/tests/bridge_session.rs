#![cfg(unix)]

//! End-to-end session against the real binary over piped stdio.

use std::io::Write;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use muxbridge_frame::{FrameReader, FrameWriter, CONTROL};
use serde_json::{json, Value};

struct Session {
    child: Child,
    reader: FrameReader<ChildStdout>,
    writer: FrameWriter<ChildStdin>,
}

impl Session {
    fn start() -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_muxbridge"))
            .arg("--log-level")
            .arg("error")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .expect("bridge should start");

        let reader = FrameReader::new(child.stdout.take().expect("stdout should be piped"));
        let writer = FrameWriter::new(child.stdin.take().expect("stdin should be piped"));
        Self {
            child,
            reader,
            writer,
        }
    }

    fn send_control(&mut self, message: Value) {
        let mut payload = message.to_string().into_bytes();
        payload.push(b'\n');
        self.writer
            .send(CONTROL, &payload)
            .expect("control frame should send");
    }

    fn next_control(&mut self) -> Value {
        read_control(&mut self.reader)
    }

    fn handshake(&mut self) -> Value {
        let init = self.next_control();
        assert_eq!(init["command"], "init");
        self.send_control(json!({"command": "init", "version": 1, "host": "me"}));
        init
    }

    fn finish(self) -> std::process::ExitStatus {
        let Self {
            mut child,
            mut reader,
            writer,
        } = self;
        // Dropping stdin signals EOF; the bridge acknowledges and exits.
        drop(writer);
        let close = read_control(&mut reader);
        assert_eq!(close, json!({"command": "close"}));
        child.wait().expect("bridge should exit")
    }
}

fn read_control(reader: &mut FrameReader<ChildStdout>) -> Value {
    loop {
        let frame = reader.read_frame().expect("frame should arrive");
        if frame.is_control() {
            return serde_json::from_slice(&frame.payload).expect("control payload should be JSON");
        }
    }
}

#[test]
fn announces_itself_and_exits_cleanly_on_eof() {
    let mut session = Session::start();
    let init = session.handshake();

    assert_eq!(init["version"], 1);
    assert_eq!(init["host"], "me");
    assert!(init["packages"].is_object());
    assert!(init["os-release"].is_object());
    assert_eq!(init["session-id"], 1);

    let status = session.finish();
    assert!(status.success());
}

#[test]
fn echo_channel_round_trip() {
    let mut session = Session::start();
    session.handshake();

    session.send_control(json!({
        "command": "open", "channel": "e1", "payload": "echo", "host": "me"
    }));
    let ready = session.next_control();
    assert_eq!(ready["command"], "ready");
    assert_eq!(ready["channel"], "e1");

    session
        .writer
        .send("e1", b"over the pipes")
        .expect("data frame should send");
    let frame = session.reader.read_frame().expect("echo should arrive");
    assert_eq!(frame.channel, "e1");
    assert_eq!(frame.payload.as_ref(), b"over the pipes");

    let status = session.finish();
    assert!(status.success());
}

#[test]
fn fsread_channel_delivers_a_file() {
    let path = std::env::temp_dir().join(format!("muxbridge-e2e-{}", std::process::id()));
    std::fs::write(&path, b"from disk").expect("fixture should be writable");

    let mut session = Session::start();
    session.handshake();
    session.send_control(json!({
        "command": "open", "channel": "f1", "payload": "fsread1", "host": "me",
        "path": path.to_str().unwrap()
    }));

    let ready = session.next_control();
    assert_eq!(ready["command"], "ready");

    let frame = session.reader.read_frame().expect("file data should arrive");
    assert_eq!(frame.channel, "f1");
    assert_eq!(frame.payload.as_ref(), b"from disk");

    let done = session.next_control();
    assert_eq!(done["command"], "done");
    assert_eq!(done["channel"], "f1");

    assert!(session.finish().success());
    let _ = std::fs::remove_file(&path);
}

#[test]
fn garbage_input_reports_protocol_error_close() {
    let mut session = Session::start();
    session.handshake();

    // A size line that cannot be parsed poisons the whole connection.
    session
        .writer
        .get_mut()
        .write_all(b"bogus-size\n")
        .expect("raw bytes should write");

    let close = session.next_control();
    assert_eq!(close["command"], "close");
    assert_eq!(close["problem"], "protocol-error");

    // The fatal frame error surfaces as the data-invalid exit code, not 0.
    let status = session.child.wait().expect("bridge should exit");
    assert!(!status.success());
    assert_eq!(status.code(), Some(60));
}
