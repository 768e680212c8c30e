//! The MoQ session: handshake, subscription bookkeeping, catalog
//! exchange, and per-subgroup demux.
//!
//! Three logical tasks run for the lifetime of a session: the control
//! reader, the catalog/data stream acceptor, and one handler task per
//! accepted unidirectional stream. The acceptor is started before any media
//! subscribe is issued, so a keyframe racing ahead of its own `SUBSCRIBE_OK`
//! is buffered rather than lost (see [`resolve_track_name`]).

pub mod state;
pub mod subscription;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, Mutex as AsyncMutex};

use crate::caption;
use crate::catalog::{self, TrackKind};
use crate::config::PlayerConfig;
use crate::error::PlayerError;
use crate::events::PlayerSink;
use crate::protocol_constants::{
    FILTER_NEXT_GROUP_START, MOQ_VERSION, PRIORITY_AUDIO, PRIORITY_CATALOG,
    TRACK_NAME_AUDIO_PREFIX, TRACK_NAME_CATALOG, TRACK_NAME_STATS,
};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::stats;
use crate::stream_buffer::StreamBuffer;
use crate::transport::{Connection, RecvStream, SendStream, Transport};
use crate::wire::control::{self, ControlMessage};
use crate::wire::data::{ObjectHeader, SubgroupHeader};
use crate::wire::{frame_control_message, try_read_framed_message};

use state::SessionState;
use subscription::SubscriptionTable;

/// The client-enforced subscription ceiling offered in `CLIENT_SETUP`. The
/// server's own ceiling, read back via `SERVER_SETUP`/`MAX_REQUEST_ID`, is
/// what `subscribe` actually checks against.
const CLIENT_MAX_REQUEST_ID: u64 = 100;

struct Inner {
    state: Mutex<SessionState>,
    next_request_id: AtomicU64,
    server_max_request_id: AtomicU64,
    namespace: Vec<String>,
    subscriptions: Mutex<SubscriptionTable>,
    pending_replies: Mutex<HashMap<u64, oneshot::Sender<Result<u64, PlayerError>>>>,
    sinks: Arc<dyn PlayerSink>,
    config: PlayerConfig,
    connection: Arc<dyn Connection>,
    control_send: AsyncMutex<Box<dyn SendStream>>,
    spawner: TokioSpawner,
}

impl Inner {
    /// Closes the session, if it isn't already closed: fails every pending
    /// subscribe, closes the transport, and notifies the sink. Idempotent.
    async fn close_internal(&self, reason: &str) {
        let was_already_closed = {
            let mut state = self.state.lock();
            let was_closed = state.is_closed();
            *state = state.on_closed();
            was_closed
        };
        if was_already_closed {
            return;
        }

        let failed = self.subscriptions.lock().fail_all_pending();
        {
            let mut pending = self.pending_replies.lock();
            for record in failed {
                if let Some(tx) = pending.remove(&record.request_id) {
                    let _ = tx.send(Err(PlayerError::TransportClosed));
                }
            }
        }
        self.connection.close(reason).await;
        self.sinks.on_close();
    }
}

/// A live MoQ session for one stream key.
///
/// Cheaply `Clone`: every clone shares the same handshake state, control
/// stream, and subscription table via the inner `Arc`.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Opens the transport, performs the `CLIENT_SETUP`/`SERVER_SETUP`
    /// handshake, reads the initial `MAX_REQUEST_ID`, starts the stream
    /// acceptor, and issues the catalog subscribe. Returns once the
    /// catalog's `SUBSCRIBE_OK` is received — the catalog object itself
    /// arrives asynchronously and flips the session to `Active` via
    /// `on_track_info`.
    pub async fn connect(
        transport: &dyn Transport,
        stream_key: String,
        product_namespace: String,
        config: PlayerConfig,
        sinks: Arc<dyn PlayerSink>,
        spawner: TokioSpawner,
    ) -> Result<Self, PlayerError> {
        config
            .validate()
            .map_err(PlayerError::ProtocolError)?;

        let connection: Arc<dyn Connection> = Arc::from(transport.connect(&stream_key).await?);
        let (mut control_send, mut control_recv) = connection.open_bi().await?;

        let client_setup = ControlMessage::ClientSetup {
            versions: vec![MOQ_VERSION],
            stream_key: stream_key.clone(),
            max_request_id: CLIENT_MAX_REQUEST_ID,
        };
        write_control_message(control_send.as_mut(), &client_setup).await?;

        let mut handshake_buf = StreamBuffer::new();
        let server_setup =
            read_one_control_message(control_recv.as_mut(), &mut handshake_buf).await?;
        let (selected_version, mut server_max_request_id) = match server_setup {
            ControlMessage::ServerSetup {
                selected_version,
                max_request_id,
            } => (selected_version, max_request_id),
            other => {
                return Err(PlayerError::ProtocolError(format!(
                    "expected SERVER_SETUP, got {other:?}"
                )))
            }
        };
        if selected_version != MOQ_VERSION {
            return Err(PlayerError::ProtocolError(format!(
                "server selected unsupported version {selected_version:#x}"
            )));
        }

        let initial_max =
            read_one_control_message(control_recv.as_mut(), &mut handshake_buf).await?;
        match initial_max {
            ControlMessage::MaxRequestId { max_request_id } => {
                server_max_request_id = max_request_id;
            }
            other => {
                return Err(PlayerError::ProtocolError(format!(
                    "expected initial MAX_REQUEST_ID, got {other:?}"
                )))
            }
        }

        let inner = Arc::new(Inner {
            state: Mutex::new(SessionState::Connecting.on_server_setup_ok()),
            next_request_id: AtomicU64::new(0),
            server_max_request_id: AtomicU64::new(server_max_request_id),
            namespace: vec![product_namespace, stream_key],
            subscriptions: Mutex::new(SubscriptionTable::new()),
            pending_replies: Mutex::new(HashMap::new()),
            sinks,
            config,
            connection: connection.clone(),
            control_send: AsyncMutex::new(control_send),
            spawner: spawner.clone(),
        });

        spawner.spawn({
            let inner = inner.clone();
            async move {
                control_reader_loop(inner, control_recv).await;
            }
        });

        // Started before any media subscribe: a data stream for a track
        // whose SUBSCRIBE_OK hasn't landed yet is buffered, not dropped.
        spawner.spawn({
            let inner = inner.clone();
            let connection = connection.clone();
            async move {
                stream_acceptor_loop(inner, connection).await;
            }
        });

        let session = Self { inner };
        session.subscribe(TRACK_NAME_CATALOG, PRIORITY_CATALOG).await?;
        Ok(session)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    /// Allocates the next `request_id`, sends `SUBSCRIBE` with filter
    /// `NextGroupStart`, and awaits the server's reply.
    pub async fn subscribe(&self, track_name: &str, priority: u8) -> Result<u64, PlayerError> {
        let request_id = self.inner.next_request_id.fetch_add(1, Ordering::SeqCst);
        if request_id > self.inner.server_max_request_id.load(Ordering::SeqCst) {
            return Err(PlayerError::RequestIdExhausted);
        }

        self.inner
            .subscriptions
            .lock()
            .insert_pending(request_id, track_name.to_string());

        let (tx, rx) = oneshot::channel();
        self.inner.pending_replies.lock().insert(request_id, tx);

        let msg = ControlMessage::Subscribe {
            request_id,
            track_namespace: self.inner.namespace.clone(),
            track_name: track_name.to_string(),
            priority,
            filter: FILTER_NEXT_GROUP_START,
        };
        self.send_control(&msg).await?;

        rx.await.map_err(|_| PlayerError::TransportClosed)?
    }

    /// Sends `UNSUBSCRIBE` and removes both indices. A no-op if `track_name`
    /// has no active or pending subscription.
    pub async fn unsubscribe(&self, track_name: &str) -> Result<(), PlayerError> {
        let Some(record) = self
            .inner
            .subscriptions
            .lock()
            .remove_by_track_name(track_name)
        else {
            return Ok(());
        };
        let msg = ControlMessage::Unsubscribe {
            request_id: record.request_id,
        };
        self.send_control(&msg).await
    }

    /// Idempotent diff: unsubscribes audio tracks not in `wanted`, subscribes
    /// those missing. A second call with the same set sends nothing.
    pub async fn subscribe_audio(&self, wanted: &HashSet<String>) -> Result<(), PlayerError> {
        let current: HashSet<String> = self
            .inner
            .subscriptions
            .lock()
            .active_track_names()
            .into_iter()
            .filter(|name| name.starts_with(TRACK_NAME_AUDIO_PREFIX))
            .collect();

        for stale in current.difference(wanted) {
            self.unsubscribe(stale).await?;
        }
        for missing in wanted.difference(&current) {
            self.subscribe(missing, PRIORITY_AUDIO).await?;
        }
        Ok(())
    }

    /// Cancels pending subscribes, closes the transport, and notifies the
    /// sink via `on_close`.
    pub async fn close(&self) {
        self.inner.close_internal("local close").await;
    }

    async fn send_control(&self, msg: &ControlMessage) -> Result<(), PlayerError> {
        let mut guard = self.inner.control_send.lock().await;
        write_control_message(guard.as_mut(), msg).await
    }
}

async fn write_control_message(
    send: &mut dyn SendStream,
    msg: &ControlMessage,
) -> Result<(), PlayerError> {
    let payload = control::encode(msg);
    let framed = frame_control_message(control::msg_type(msg), &payload);
    send.write(&framed).await.map_err(PlayerError::from)
}

/// Reads chunks until one complete framed control message is available.
async fn read_one_control_message(
    recv: &mut dyn RecvStream,
    buf: &mut StreamBuffer,
) -> Result<ControlMessage, PlayerError> {
    loop {
        match try_read_framed_message(buf) {
            Ok(Some(msg)) => return Ok(msg),
            Ok(None) => match recv.read_chunk().await {
                Ok(Some(chunk)) => buf.push_chunk(chunk),
                Ok(None) => return Err(PlayerError::TransportClosed),
                Err(e) => return Err(e.into()),
            },
            Err(e) => return Err(e.into()),
        }
    }
}

async fn control_reader_loop(inner: Arc<Inner>, mut recv: Box<dyn RecvStream>) {
    let mut buf = StreamBuffer::new();
    loop {
        let msg = match read_one_control_message(recv.as_mut(), &mut buf).await {
            Ok(msg) => msg,
            Err(e) => {
                log::info!("[session] control reader closing: {e}");
                inner.close_internal(&e.to_string()).await;
                return;
            }
        };

        match msg {
            ControlMessage::SubscribeOk {
                request_id,
                track_alias,
            } => {
                let applied = inner
                    .subscriptions
                    .lock()
                    .apply_subscribe_ok(request_id, track_alias);
                if !applied {
                    inner
                        .close_internal("SUBSCRIBE_OK for unknown request_id")
                        .await;
                    return;
                }
                if let Some(tx) = inner.pending_replies.lock().remove(&request_id) {
                    let _ = tx.send(Ok(track_alias));
                }
            }
            ControlMessage::SubscribeError {
                request_id,
                code,
                reason,
            } => {
                inner.subscriptions.lock().apply_subscribe_error(request_id);
                if let Some(tx) = inner.pending_replies.lock().remove(&request_id) {
                    let _ = tx.send(Err(PlayerError::SubscribeFailed { code, reason }));
                }
            }
            ControlMessage::MaxRequestId { max_request_id } => {
                inner
                    .server_max_request_id
                    .store(max_request_id, Ordering::SeqCst);
            }
            ControlMessage::GoAway { .. } => {
                inner.close_internal("GOAWAY").await;
                return;
            }
            other => {
                inner
                    .close_internal(&format!("unexpected control message: {other:?}"))
                    .await;
                return;
            }
        }
    }
}

async fn stream_acceptor_loop(inner: Arc<Inner>, connection: Arc<dyn Connection>) {
    loop {
        match connection.accept_uni().await {
            Ok(recv) => {
                let inner = inner.clone();
                inner.spawner.spawn(async move {
                    handle_stream(inner, recv).await;
                });
            }
            Err(e) => {
                log::info!("[session] stream acceptor stopping: {e}");
                inner.close_internal(&e.to_string()).await;
                return;
            }
        }
    }
}

async fn next_subgroup_header(
    recv: &mut dyn RecvStream,
    buf: &mut StreamBuffer,
) -> Result<Option<SubgroupHeader>, PlayerError> {
    loop {
        match SubgroupHeader::try_read(buf) {
            Ok(Some(header)) => return Ok(Some(header)),
            Ok(None) => {
                if buf.is_exhausted() {
                    return Ok(None);
                }
                match recv.read_chunk().await {
                    Ok(Some(chunk)) => buf.push_chunk(chunk),
                    Ok(None) => buf.mark_ended(),
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn next_object(
    recv: &mut dyn RecvStream,
    buf: &mut StreamBuffer,
) -> Result<Option<ObjectHeader>, PlayerError> {
    loop {
        match ObjectHeader::try_read(buf) {
            Ok(Some(obj)) => return Ok(Some(obj)),
            Ok(None) => {
                if buf.is_exhausted() {
                    return Ok(None);
                }
                match recv.read_chunk().await {
                    Ok(Some(chunk)) => buf.push_chunk(chunk),
                    Ok(None) => buf.mark_ended(),
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn lookup_track_name(inner: &Inner, track_alias: u64) -> Option<String> {
    inner
        .subscriptions
        .lock()
        .by_track_alias(track_alias)
        .map(|record| record.track_name.clone())
}

/// Waits for `track_alias` to be registered (a late `SUBSCRIBE_OK`),
/// polling at the configured interval, up to the configured wait.
async fn resolve_track_name(inner: &Inner, track_alias: u64) -> Option<String> {
    if let Some(name) = lookup_track_name(inner, track_alias) {
        return Some(name);
    }
    let poll_interval =
        Duration::from_millis(inner.config.track_alias_poll_interval_ms.max(1));
    let attempts = (inner.config.track_alias_wait_ms / poll_interval.as_millis().max(1) as u64)
        .max(1);
    for _ in 0..attempts {
        tokio::time::sleep(poll_interval).await;
        if let Some(name) = lookup_track_name(inner, track_alias) {
            return Some(name);
        }
    }
    None
}

async fn handle_stream(inner: Arc<Inner>, mut recv: Box<dyn RecvStream>) {
    let mut buf = StreamBuffer::new();
    let header = match next_subgroup_header(recv.as_mut(), &mut buf).await {
        Ok(Some(header)) => header,
        Ok(None) => return,
        Err(e) => {
            log::warn!("[session] dropping stream with bad subgroup header: {e}");
            return;
        }
    };

    let Some(track_name) = resolve_track_name(&inner, header.track_alias).await else {
        log::warn!(
            "[session] track_alias {} never registered, discarding stream",
            header.track_alias
        );
        return;
    };

    if track_name == TRACK_NAME_CATALOG {
        handle_catalog_stream(&inner, recv.as_mut(), &mut buf).await;
        return;
    }

    loop {
        match next_object(recv.as_mut(), &mut buf).await {
            Ok(Some(obj)) => dispatch_object(&inner, &track_name, &header, &obj),
            Ok(None) => return,
            Err(e) => {
                log::warn!("[session] object read error on '{track_name}': {e}");
                return;
            }
        }
    }
}

async fn handle_catalog_stream(
    inner: &Inner,
    recv: &mut dyn RecvStream,
    buf: &mut StreamBuffer,
) {
    match next_object(recv, buf).await {
        Ok(Some(obj)) => match catalog::parse_catalog(&obj.payload) {
            Ok(tracks) => {
                {
                    let mut state = inner.state.lock();
                    *state = state.on_catalog_decoded();
                }
                tracing::debug!(track_count = tracks.len(), ?tracks, "catalog resolved");
                inner.sinks.on_track_info(&tracks);
            }
            Err(e) => {
                log::warn!("[session] malformed catalog object: {e}");
                inner.close_internal("malformed catalog object").await;
            }
        },
        Ok(None) => log::warn!("[session] catalog stream ended without an object"),
        Err(e) => log::warn!("[session] catalog stream read error: {e}"),
    }
}

fn dispatch_object(inner: &Inner, track_name: &str, header: &SubgroupHeader, obj: &ObjectHeader) {
    if track_name == TRACK_NAME_STATS {
        match stats::parse_stats(&obj.payload) {
            Ok(parsed) => inner.sinks.on_server_stats(&parsed),
            Err(e) => log::debug!("[session] dropping malformed stats object: {e}"),
        }
        return;
    }

    match catalog::classify_track_name(track_name) {
        Some((TrackKind::Video, _)) => inner.sinks.on_video_frame(
            &obj.payload,
            obj.extensions.is_keyframe,
            obj.extensions.capture_timestamp,
            header.group_id,
            obj.extensions.codec_config.as_ref(),
        ),
        Some((TrackKind::Audio, track_index)) => inner.sinks.on_audio_frame(
            &obj.payload,
            obj.extensions.capture_timestamp,
            header.group_id,
            track_index,
        ),
        Some((TrackKind::Caption, _)) => match caption::parse_caption(&obj.payload) {
            Ok(parsed) => inner
                .sinks
                .on_caption_frame(&parsed, obj.extensions.capture_timestamp),
            Err(e) => log::debug!("[session] dropping malformed caption object: {e}"),
        },
        None => log::debug!("[session] object on unrecognised track '{track_name}', dropping"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TrackDescriptor;
    use crate::error::TransportError;
    use crate::transport::test_support::MockConnection;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    struct TestTransport {
        connection: Mutex<Option<Box<dyn Connection>>>,
    }

    #[async_trait]
    impl Transport for TestTransport {
        async fn connect(&self, _stream_key: &str) -> Result<Box<dyn Connection>, TransportError> {
            self.connection
                .lock()
                .take()
                .ok_or_else(|| TransportError::Closed("already connected".into()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        tracks: Mutex<Vec<TrackDescriptor>>,
        video_frames: Mutex<Vec<(i64, bool)>>,
        audio_frames: Mutex<Vec<(i64, u32)>>,
        closed: AtomicUsize,
    }

    impl PlayerSink for RecordingSink {
        fn on_track_info(&self, tracks: &[TrackDescriptor]) {
            *self.tracks.lock() = tracks.to_vec();
        }
        fn on_video_frame(
            &self,
            _payload: &Bytes,
            is_keyframe: bool,
            pts: i64,
            _group_id: u64,
            _codec_config: Option<&Bytes>,
        ) {
            self.video_frames.lock().push((pts, is_keyframe));
        }
        fn on_audio_frame(&self, _payload: &Bytes, pts: i64, _group_id: u64, track_index: u32) {
            self.audio_frames.lock().push((pts, track_index));
        }
        fn on_caption_frame(&self, _parsed: &caption::CaptionObject, _pts: i64) {}
        fn on_server_stats(&self, _stats: &stats::StatsObject) {}
        fn on_close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_error(&self, _reason: &str) {}
    }

    struct Harness {
        session: Session,
        server_tx: mpsc::UnboundedSender<Bytes>,
        server_rx: mpsc::UnboundedReceiver<Bytes>,
        pending_uni: Arc<Mutex<VecDeque<mpsc::UnboundedReceiver<Bytes>>>>,
        sink: Arc<RecordingSink>,
    }

    async fn connected_harness(server_max_request_id: u64) -> Harness {
        let (server_tx, client_rx) = mpsc::unbounded_channel::<Bytes>();
        let (client_tx, mut server_rx) = mpsc::unbounded_channel::<Bytes>();
        let pending_uni = Arc::new(Mutex::new(VecDeque::new()));

        let mock = MockConnection {
            control_server_tx: server_tx.clone(),
            control_client_rx: Arc::new(Mutex::new(Some(client_rx))),
            control_server_rx: Arc::new(Mutex::new(None)),
            control_client_tx: client_tx,
            pending_uni: pending_uni.clone(),
        };
        let transport = TestTransport {
            connection: Mutex::new(Some(Box::new(mock))),
        };
        let sink = Arc::new(RecordingSink::default());
        let spawner = TokioSpawner::current();

        let connect_fut = Session::connect(
            &transport,
            "abc123".to_string(),
            "demo".to_string(),
            PlayerConfig {
                track_alias_wait_ms: 100,
                track_alias_poll_interval_ms: 5,
                ..PlayerConfig::default()
            },
            sink.clone(),
            spawner,
        );
        tokio::pin!(connect_fut);

        // Drive the server side of the handshake: CLIENT_SETUP -> reply with
        // SERVER_SETUP + MAX_REQUEST_ID, then SUBSCRIBE(catalog) -> SUBSCRIBE_OK.
        let _client_setup = server_rx.recv().await.expect("client sent CLIENT_SETUP");
        send_framed(
            &server_tx,
            ControlMessage::ServerSetup {
                selected_version: MOQ_VERSION,
                max_request_id: server_max_request_id,
            },
        );
        send_framed(
            &server_tx,
            ControlMessage::MaxRequestId {
                max_request_id: server_max_request_id,
            },
        );

        let catalog_subscribe = server_rx.recv().await.expect("client sent SUBSCRIBE");
        let request_id = match decode_framed(&catalog_subscribe) {
            ControlMessage::Subscribe { request_id, .. } => request_id,
            other => panic!("expected catalog SUBSCRIBE, got {other:?}"),
        };
        send_framed(
            &server_tx,
            ControlMessage::SubscribeOk {
                request_id,
                track_alias: 0,
            },
        );

        let session = connect_fut.await.expect("connect succeeds");
        Harness {
            session,
            server_tx,
            server_rx,
            pending_uni,
            sink,
        }
    }

    fn send_framed(tx: &mpsc::UnboundedSender<Bytes>, msg: ControlMessage) {
        let payload = control::encode(&msg);
        let framed = frame_control_message(control::msg_type(&msg), &payload);
        tx.send(framed).unwrap();
    }

    fn decode_framed(bytes: &Bytes) -> ControlMessage {
        let mut buf = StreamBuffer::new();
        buf.push_chunk(bytes.clone());
        try_read_framed_message(&mut buf).unwrap().unwrap()
    }

    #[tokio::test]
    async fn connect_completes_after_catalog_subscribe_ok() {
        let harness = connected_harness(100).await;
        assert_eq!(harness.session.state(), SessionState::CatalogWait);
    }

    #[tokio::test]
    async fn subscribe_video_allocates_request_id_and_awaits_ok() {
        let mut harness = connected_harness(100).await;

        let subscribe_fut = harness.session.subscribe("video", 0);
        tokio::pin!(subscribe_fut);

        let sent = harness.server_rx.recv().await.unwrap();
        let request_id = match decode_framed(&sent) {
            ControlMessage::Subscribe {
                request_id,
                track_name,
                ..
            } => {
                assert_eq!(track_name, "video");
                request_id
            }
            other => panic!("unexpected message: {other:?}"),
        };
        send_framed(
            &harness.server_tx,
            ControlMessage::SubscribeOk {
                request_id,
                track_alias: 42,
            },
        );

        let track_alias = subscribe_fut.await.unwrap();
        assert_eq!(track_alias, 42);
    }

    #[tokio::test]
    async fn request_id_exhausted_when_over_server_max() {
        // server_max_request_id == 0: catalog already consumed request_id 0.
        let harness = connected_harness(0).await;
        let err = harness.session.subscribe("video", 0).await.unwrap_err();
        assert!(matches!(err, PlayerError::RequestIdExhausted));
    }

    #[tokio::test]
    async fn subscribe_audio_second_call_sends_nothing_once_active() {
        let mut harness = connected_harness(100).await;

        let mut wanted = HashSet::new();
        wanted.insert("audio0".to_string());

        let subscribe_fut = harness.session.subscribe_audio(&wanted);
        tokio::pin!(subscribe_fut);
        let sent = harness.server_rx.recv().await.unwrap();
        let request_id = match decode_framed(&sent) {
            ControlMessage::Subscribe { request_id, .. } => request_id,
            other => panic!("unexpected message: {other:?}"),
        };
        send_framed(
            &harness.server_tx,
            ControlMessage::SubscribeOk {
                request_id,
                track_alias: 7,
            },
        );
        subscribe_fut.await.unwrap();

        // Second call with the same wanted set: no additional SUBSCRIBE/UNSUBSCRIBE.
        harness.session.subscribe_audio(&wanted).await.unwrap();
        assert!(harness.server_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_track_alias_stream_is_buffered_until_subscribe_ok() {
        let mut harness = connected_harness(100).await;

        // Push a data stream for an alias that hasn't been registered yet.
        let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
        harness.pending_uni.lock().push_back(rx);

        let header = SubgroupHeader {
            track_alias: 99,
            group_id: 1,
            subgroup_id: 0,
            priority: 0,
        };
        tx.send(Bytes::from(header.encode())).unwrap();
        let object = ObjectHeader {
            object_id: 0,
            extensions: crate::wire::data::ObjectExtensions {
                capture_timestamp: 12345,
                is_keyframe: true,
                codec_config: None,
            },
            payload: Bytes::from_static(b"keyframe"),
        };
        tx.send(Bytes::from(object.encode())).unwrap();

        let subscribe_fut = harness.session.subscribe("video", 0);
        tokio::pin!(subscribe_fut);
        let sent = harness.server_rx.recv().await.unwrap();
        let request_id = match decode_framed(&sent) {
            ControlMessage::Subscribe { request_id, .. } => request_id,
            other => panic!("unexpected message: {other:?}"),
        };
        send_framed(
            &harness.server_tx,
            ControlMessage::SubscribeOk {
                request_id,
                track_alias: 99,
            },
        );
        subscribe_fut.await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let frames = harness.sink.video_frames.lock();
        assert_eq!(*frames, vec![(12345, true)]);
    }
}
