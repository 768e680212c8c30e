//! In-memory loopback transport standing in for the QUIC/WebTransport stack
//! the core leaves opaque.
//!
//! [`FixtureTransport`] never touches the network: `connect` spawns an
//! in-process relay task that plays the server side of the handshake and
//! serves one synthetic catalog (one video track, one audio track) plus
//! periodic media objects for whatever gets subscribed. This lets the demo
//! binary drive the full session/video/audio pipeline without a real relay.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use moq_player_core::error::TransportError;
use moq_player_core::protocol_constants::{
    MOQ_VERSION, PRIORITY_AUDIO, PRIORITY_CATALOG, PRIORITY_VIDEO, TRACK_NAME_AUDIO_PREFIX,
    TRACK_NAME_CATALOG, TRACK_NAME_VIDEO,
};
use moq_player_core::stream_buffer::StreamBuffer;
use moq_player_core::transport::{Connection, RecvStream, SendStream, Transport};
use moq_player_core::wire::control::{self, ControlMessage};
use moq_player_core::wire::data::{ObjectExtensions, ObjectHeader, SubgroupHeader};
use moq_player_core::wire::{frame_control_message, try_read_framed_message};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const DEMO_CATALOG: &str = r#"{
    "version": 1,
    "streamingFormat": "moq",
    "streamingFormatVersion": "15",
    "tracks": [
        { "name": "catalog", "selectionParams": { "codec": "none" } },
        { "name": "video", "selectionParams": { "codec": "avc1.42001f", "width": 1280, "height": 720 } },
        { "name": "audio0", "selectionParams": { "codec": "opus", "samplerate": 48000, "channelConfig": 2 } }
    ]
}"#;

const FRAME_INTERVAL: Duration = Duration::from_millis(33);
const AUDIO_QUANTUM: Duration = Duration::from_millis(20);

struct ChannelSendStream {
    tx: mpsc::UnboundedSender<Bytes>,
}

#[async_trait]
impl SendStream for ChannelSendStream {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.tx
            .send(Bytes::copy_from_slice(bytes))
            .map_err(|_| TransportError::Closed("relay dropped".into()))
    }

    async fn finish(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

struct ChannelRecvStream {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

#[async_trait]
impl RecvStream for ChannelRecvStream {
    async fn read_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

type UniQueue = Arc<Mutex<VecDeque<mpsc::UnboundedReceiver<Bytes>>>>;

struct FixtureConnection {
    control_client_tx: mpsc::UnboundedSender<Bytes>,
    control_client_rx: Mutex<Option<mpsc::UnboundedReceiver<Bytes>>>,
    pending_uni: UniQueue,
}

#[async_trait]
impl Connection for FixtureConnection {
    async fn open_bi(&self) -> Result<(Box<dyn SendStream>, Box<dyn RecvStream>), TransportError> {
        let rx = self
            .control_client_rx
            .lock()
            .take()
            .ok_or_else(|| TransportError::Closed("control stream already opened".into()))?;
        Ok((
            Box::new(ChannelSendStream {
                tx: self.control_client_tx.clone(),
            }),
            Box::new(ChannelRecvStream { rx }),
        ))
    }

    async fn accept_uni(&self) -> Result<Box<dyn RecvStream>, TransportError> {
        loop {
            if let Some(rx) = self.pending_uni.lock().pop_front() {
                return Ok(Box::new(ChannelRecvStream { rx }));
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    async fn close(&self, _reason: &str) {}
}

/// A [`Transport`] backed entirely by in-process channels and a synthetic
/// relay task — no socket is ever opened.
#[derive(Debug, Default)]
pub struct FixtureTransport;

#[async_trait]
impl Transport for FixtureTransport {
    async fn connect(&self, _stream_key: &str) -> Result<Box<dyn Connection>, TransportError> {
        let (relay_to_client, client_from_relay) = mpsc::unbounded_channel::<Bytes>();
        let (client_to_relay, relay_from_client) = mpsc::unbounded_channel::<Bytes>();
        let pending_uni: UniQueue = Arc::new(Mutex::new(VecDeque::new()));

        tokio::spawn(run_relay(relay_to_client, relay_from_client, pending_uni.clone()));

        Ok(Box::new(FixtureConnection {
            control_client_tx: client_to_relay,
            control_client_rx: Mutex::new(Some(client_from_relay)),
            pending_uni,
        }))
    }
}

async fn read_one_control(rx: &mut mpsc::UnboundedReceiver<Bytes>, buf: &mut StreamBuffer) -> Option<ControlMessage> {
    loop {
        match try_read_framed_message(buf) {
            Ok(Some(msg)) => return Some(msg),
            Ok(None) => match rx.recv().await {
                Some(chunk) => buf.push_chunk(chunk),
                None => return None,
            },
            Err(e) => {
                log::warn!("[mock_transport] malformed control message from client: {e}");
                return None;
            }
        }
    }
}

fn send_control(tx: &mpsc::UnboundedSender<Bytes>, msg: ControlMessage) {
    let payload = control::encode(&msg);
    let framed = frame_control_message(control::msg_type(&msg), &payload);
    let _ = tx.send(framed);
}

/// Plays the server side of the handshake, then serves one subscription per
/// client `SUBSCRIBE`: the catalog as a single one-shot object, video/audio
/// as an open-ended stream of synthetic objects at a fixed cadence.
async fn run_relay(
    to_client: mpsc::UnboundedSender<Bytes>,
    mut from_client: mpsc::UnboundedReceiver<Bytes>,
    pending_uni: UniQueue,
) {
    let mut buf = StreamBuffer::new();

    match read_one_control(&mut from_client, &mut buf).await {
        Some(ControlMessage::ClientSetup { .. }) => {}
        _ => return,
    }
    send_control(
        &to_client,
        ControlMessage::ServerSetup {
            selected_version: MOQ_VERSION,
            max_request_id: 1_000,
        },
    );
    send_control(&to_client, ControlMessage::MaxRequestId { max_request_id: 1_000 });

    let mut next_alias: u64 = 0;
    let mut aliases: HashMap<String, u64> = HashMap::new();
    let mut request_track: HashMap<u64, String> = HashMap::new();
    let mut streams: HashMap<String, JoinHandle<()>> = HashMap::new();

    loop {
        let msg = match read_one_control(&mut from_client, &mut buf).await {
            Some(msg) => msg,
            None => break,
        };
        match msg {
            ControlMessage::Subscribe {
                request_id,
                track_name,
                ..
            } => {
                let alias = *aliases.entry(track_name.clone()).or_insert_with(|| {
                    let alias = next_alias;
                    next_alias += 1;
                    alias
                });
                request_track.insert(request_id, track_name.clone());
                send_control(
                    &to_client,
                    ControlMessage::SubscribeOk {
                        request_id,
                        track_alias: alias,
                    },
                );

                if track_name == TRACK_NAME_CATALOG {
                    push_catalog_stream(alias, &pending_uni);
                } else if track_name == TRACK_NAME_VIDEO {
                    streams.entry(track_name).or_insert_with(|| tokio::spawn(run_video_stream(alias, pending_uni.clone())));
                } else if track_name.starts_with(TRACK_NAME_AUDIO_PREFIX) {
                    streams
                        .entry(track_name)
                        .or_insert_with(|| tokio::spawn(run_audio_stream(alias, pending_uni.clone())));
                }
            }
            ControlMessage::Unsubscribe { request_id } => {
                if let Some(track_name) = request_track.remove(&request_id) {
                    if let Some(handle) = streams.remove(&track_name) {
                        handle.abort();
                    }
                }
            }
            _ => {}
        }
    }

    for (_, handle) in streams {
        handle.abort();
    }
}

fn push_catalog_stream(track_alias: u64, pending_uni: &UniQueue) {
    let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
    pending_uni.lock().push_back(rx);

    let header = SubgroupHeader {
        track_alias,
        group_id: 0,
        subgroup_id: 0,
        priority: PRIORITY_CATALOG,
    };
    let _ = tx.send(Bytes::from(header.encode()));

    let object = ObjectHeader {
        object_id: 0,
        extensions: ObjectExtensions::default(),
        payload: Bytes::from_static(DEMO_CATALOG.as_bytes()),
    };
    let _ = tx.send(Bytes::from(object.encode()));
    // `tx` drops here, ending the stream cleanly after its single object —
    // matches how the session's catalog handler reads exactly one object.
}

async fn run_video_stream(track_alias: u64, pending_uni: UniQueue) {
    let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
    pending_uni.lock().push_back(rx);

    let header = SubgroupHeader {
        track_alias,
        group_id: 0,
        subgroup_id: 0,
        priority: PRIORITY_VIDEO,
    };
    if tx.send(Bytes::from(header.encode())).is_err() {
        return;
    }

    let mut ticker = tokio::time::interval(FRAME_INTERVAL);
    let mut object_id: u64 = 0;
    let mut pts: i64 = 0;
    loop {
        ticker.tick().await;
        let is_keyframe = object_id % 30 == 0;
        let object = ObjectHeader {
            object_id,
            extensions: ObjectExtensions {
                capture_timestamp: pts,
                is_keyframe,
                codec_config: if object_id == 0 {
                    Some(Bytes::from_static(b"avc1-demo-config"))
                } else {
                    None
                },
            },
            payload: Bytes::from(vec![0u8; 64]),
        };
        if tx.send(Bytes::from(object.encode())).is_err() {
            return;
        }
        object_id += 1;
        pts += FRAME_INTERVAL.as_micros() as i64;
    }
}


async fn run_audio_stream(track_alias: u64, pending_uni: UniQueue) {
    let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
    pending_uni.lock().push_back(rx);

    let header = SubgroupHeader {
        track_alias,
        group_id: 0,
        subgroup_id: 0,
        priority: PRIORITY_AUDIO,
    };
    if tx.send(Bytes::from(header.encode())).is_err() {
        return;
    }

    let mut ticker = tokio::time::interval(AUDIO_QUANTUM);
    let mut object_id: u64 = 0;
    let mut pts: i64 = 0;
    loop {
        ticker.tick().await;
        let object = ObjectHeader {
            object_id,
            extensions: ObjectExtensions {
                capture_timestamp: pts,
                is_keyframe: false,
                codec_config: None,
            },
            payload: Bytes::from(vec![0u8; 32]),
        };
        if tx.send(Bytes::from(object.encode())).is_err() {
            return;
        }
        object_id += 1;
        pts += AUDIO_QUANTUM.as_micros() as i64;
    }
}
