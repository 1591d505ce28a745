//! Shared helpers for the crate's unit tests.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use orion_proto::Frame;

use crate::session::{Session, SessionRegistry};
use crate::sink::{FrameSink, SinkCommand};

/// A registered session together with the receiving end of its sink.
pub(crate) struct TestSession {
    pub session: Arc<Session>,
    pub rx: UnboundedReceiver<SinkCommand>,
}

/// Open a session whose outbound frames the test can observe.
pub(crate) fn open_session(registry: &SessionRegistry) -> TestSession {
    let (sink, rx) = FrameSink::channel();
    let session = registry.open(sink);
    TestSession { session, rx }
}

/// Drain every queued frame, decoded; close commands are skipped.
pub(crate) fn drain_frames(rx: &mut UnboundedReceiver<SinkCommand>) -> Vec<Frame> {
    let mut frames = Vec::new();
    while let Ok(cmd) = rx.try_recv() {
        if let SinkCommand::Frame(text) = cmd {
            frames.push(Frame::decode(&text).expect("well-formed frame"));
        }
    }
    frames
}
