#![allow(dead_code)]

use radio_core::{RequestId, StationRecord, StreamHandle, Transport};

/// Transport double that records every call and tracks which handles are live.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    next_id: u64,
    pub live: Vec<u64>,
    pub acquired: Vec<(String, RequestId)>,
    pub released: Vec<u64>,
    pub paused: Vec<u64>,
    pub resumed: Vec<u64>,
    /// Every call in order: "acquire", "release", "pause", "resume".
    pub log: Vec<&'static str>,
}

impl RecordingTransport {
    /// acquire calls minus release calls.
    pub fn outstanding(&self) -> usize {
        self.acquired.len() - self.released.len()
    }
}

impl Transport for RecordingTransport {
    fn acquire(&mut self, url: &str, request: RequestId) -> anyhow::Result<StreamHandle> {
        self.next_id += 1;
        self.live.push(self.next_id);
        self.acquired.push((url.to_string(), request));
        self.log.push("acquire");
        Ok(StreamHandle::new(self.next_id))
    }

    fn release(&mut self, handle: StreamHandle) {
        self.live.retain(|id| *id != handle.id());
        self.released.push(handle.id());
        self.log.push("release");
    }

    fn pause(&mut self, handle: &StreamHandle) {
        self.paused.push(handle.id());
        self.log.push("pause");
    }

    fn resume(&mut self, handle: &StreamHandle) {
        self.resumed.push(handle.id());
        self.log.push("resume");
    }
}

pub fn station(name: &str) -> StationRecord {
    StationRecord::new(
        name,
        format!("https://{}.example/stream", name.to_lowercase()),
        format!("https://{}.example/art.png", name.to_lowercase()),
    )
}
