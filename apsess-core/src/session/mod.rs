pub mod audio_key;
pub mod token;

use std::{
    collections::HashMap,
    io,
    net::{Shutdown, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use quick_protobuf::MessageRead;
use rand::RngCore;
use serde::de::DeserializeOwned;

use crate::{
    api_client::ApiClient,
    config::SessionConfig,
    connection::{
        shannon_codec::{ShannonDecoder, ShannonEncoder, ShannonMsg},
        Transport,
    },
    credentials::{self, Credentials},
    error::Error,
    event,
    item_id::{FileId, ItemId},
    mercury::{MercuryDispatcher, MercuryRequest, MercuryResponse},
    product_info,
    protocol::authentication::APWelcome,
    system_info,
    util::deserialize_protobuf,
};

use self::{audio_key::AudioKeyDispatcher, audio_key::AudioKey, token::TokenProvider};

/// Watchdog interval: the access point pings roughly every two minutes; a
/// silence longer than this means the connection is dead.
const PING_WATCHDOG_TIMEOUT: Duration = Duration::from_secs(125);

/// Phase of the auth barrier. Callers blocked in `mercury()`/`tokens()` wake
/// on every transition via the shared `Condvar`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Connected,
    Authenticated,
    Reconnecting,
    Closing,
    Closed,
}

struct Inner {
    config: SessionConfig,
    phase: Mutex<SessionPhase>,
    barrier: Condvar,
    worker: Mutex<Option<SessionWorker>>,
    welcome: Mutex<Option<APWelcome>>,
    user_attrs: Arc<Mutex<HashMap<String, String>>>,
    token_provider: TokenProvider,
    api_client: ApiClient,
}

/// Orchestrates one logical, possibly-reconnecting connection to the access
/// point: handshake, login, the 3-thread worker, and the subsystems that
/// ride on top of it (Mercury, audio keys, tokens).
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Resolve an access point, handshake, log in, and start servicing the
    /// connection. Blocks for the whole login round trip.
    pub fn connect(config: SessionConfig) -> Result<Self, Error> {
        let (transport, welcome, credentials) = Self::login(&config)?;

        if config.store_credentials {
            if let Err(err) = credentials::store(&config.stored_credentials_file, &credentials) {
                log::warn!("failed to persist credentials: {:?}", err);
            }
        }

        let inner = Arc::new(Inner {
            token_provider: TokenProvider::new(system_info::CLIENT_ID, config.device_id.clone()),
            api_client: ApiClient::new(config.proxy_url.as_deref()),
            config,
            phase: Mutex::new(SessionPhase::Connected),
            barrier: Condvar::new(),
            worker: Mutex::new(None),
            welcome: Mutex::new(Some(welcome)),
            user_attrs: Arc::new(Mutex::new(HashMap::new())),
        });
        let session = Self { inner };

        let worker = SessionWorker::run(
            transport,
            session.reconnect_callback(),
            session.inner.user_attrs.clone(),
        );
        *session.inner.worker.lock() = Some(worker);
        session.enter_phase(SessionPhase::Authenticated);

        session.send_after_welcome_messages()?;
        session.subscribe_user_attributes();

        if session.inner.config.install_signal_handlers {
            session.install_signal_handlers();
        }

        Ok(session)
    }

    /// One-shot: a process can only ever register one `ctrlc` handler, so a
    /// second session enabling this is logged and ignored rather than
    /// panicking.
    fn install_signal_handlers(&self) {
        let session = self.clone();
        let result = ctrlc::set_handler(move || {
            log::info!("signal received, closing session");
            session.close();
        });
        if let Err(err) = result {
            log::warn!("failed to install signal handlers: {:?}", err);
        }
    }

    fn login(config: &SessionConfig) -> Result<(Transport, APWelcome, Credentials), Error> {
        let proxy_url = config.proxy_url.as_deref();
        let ap = Transport::resolve_accesspoint_with_fallback(proxy_url);
        let mut transport = Transport::connect(&ap)?;
        let (welcome, credentials) =
            transport.authenticate(config.login_credentials.clone(), &config.device_id)?;
        Ok((transport, welcome, credentials))
    }

    fn enter_phase(&self, phase: SessionPhase) {
        *self.inner.phase.lock() = phase;
        self.inner.barrier.notify_all();
    }

    /// A `Fn` that triggers `reconnect()` on whatever thread calls it,
    /// shared between the ping watchdog and a post-auth decode/encode
    /// failure in `dispatch_messages`.
    fn reconnect_callback(&self) -> impl Fn() + Send + Sync + 'static {
        let weak = Arc::downgrade(&self.inner);
        move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let session = Session { inner };
            if let Err(err) = session.reconnect() {
                log::error!("reconnect after watchdog timeout failed: {:?}", err);
            }
        }
    }

    /// Two informational packets the access point expects right after a
    /// successful login: a random padding packet and the preferred locale.
    fn send_after_welcome_messages(&self) -> Result<(), Error> {
        let handle = self.handle()?;

        let mut random_bytes = [0_u8; 20];
        rand::rng().fill_bytes(&mut random_bytes);
        handle.send_raw(ShannonMsg::UNKNOWN_0X0F, random_bytes.to_vec())?;

        let mut locale_payload = vec![0x00, 0x00, 0x10, 0x00, 0x02];
        locale_payload.extend_from_slice(b"preferred-locale");
        locale_payload.extend_from_slice(self.inner.config.preferred_locale.as_bytes());
        handle.send_raw(ShannonMsg::PREFERRED_LOCALE, locale_payload)?;

        Ok(())
    }

    fn subscribe_user_attributes(&self) {
        let handle = match self.handle() {
            Ok(handle) => handle,
            Err(_) => return,
        };
        let (callback, receiver) = unbounded();
        if handle.subscribe("spotify:user:attributes:update".to_string(), callback).is_err() {
            return;
        }
        thread::spawn(move || {
            for event in receiver {
                log::debug!("user attributes update: {:?}", event.uri);
            }
        });
    }

    /// Build and send a `LANGUAGE` telemetry event over Mercury.
    pub fn set_language(&self, lang: &str) -> Result<(), Error> {
        let body = event::language_event(lang);
        let handle = self.handle()?;
        let request = MercuryRequest::send("hm://event-service/v1/events".to_string(), body);
        let _ = handle.send_mercury(request)?;
        Ok(())
    }

    /// Fetch (or reuse from cache) a bearer token covering `scopes`.
    pub fn token(&self, scopes: &[&str]) -> Result<String, Error> {
        let handle = self.handle()?;
        self.inner.token_provider.get(scopes, |uri| {
            handle.get_mercury_bytes(uri.to_string())
        })
    }

    pub fn api_client(&self) -> &ApiClient {
        &self.inner.api_client
    }

    pub fn device_id(&self) -> &str {
        &self.inner.config.device_id
    }

    pub fn user_attributes(&self) -> HashMap<String, String> {
        self.inner.user_attrs.lock().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        *self.inner.phase.lock()
    }

    /// True once authenticated and the worker servicing the connection is
    /// still alive — false once `reconnect()` is in flight, a reconnect has
    /// failed, or `close()` has been called.
    pub fn is_valid(&self) -> bool {
        if *self.inner.phase.lock() != SessionPhase::Authenticated {
            return false;
        }
        self.inner
            .worker
            .lock()
            .as_ref()
            .is_some_and(|worker| !worker.has_terminated())
    }

    /// Block until the session leaves `Connected`/`Reconnecting` and becomes
    /// either `Authenticated` or `Closed`. This is the auth barrier.
    fn handle(&self) -> Result<SessionHandle, Error> {
        let mut phase = self.inner.phase.lock();
        while matches!(*phase, SessionPhase::Connected | SessionPhase::Reconnecting) {
            self.inner.barrier.wait(&mut phase);
        }
        match *phase {
            SessionPhase::Authenticated => {}
            _ => return Err(Error::SessionClosed),
        }
        drop(phase);

        self.inner
            .worker
            .lock()
            .as_ref()
            .map(SessionWorker::handle)
            .ok_or(Error::SessionClosed)
    }

    /// Drop the current worker, resolve a fresh access point, and
    /// re-authenticate with the credentials from the previous welcome.
    pub fn reconnect(&self) -> Result<(), Error> {
        self.enter_phase(SessionPhase::Reconnecting);

        if let Some(worker) = self.inner.worker.lock().take() {
            worker.handle().request_shutdown();
            worker.join();
        }

        let previous = self
            .inner
            .welcome
            .lock()
            .clone()
            .ok_or(Error::SessionClosed)?;
        let credentials = Credentials::from_reusable_auth(
            previous.canonical_username,
            previous.reusable_auth_credentials,
            previous.reusable_auth_credentials_type,
        );

        let proxy_url = self.inner.config.proxy_url.as_deref();
        let ap = Transport::resolve_accesspoint_with_fallback(proxy_url);
        let mut transport = Transport::connect(&ap)?;
        let (welcome, reusable) = transport.authenticate(credentials, &self.inner.config.device_id)?;

        if self.inner.config.store_credentials {
            if let Err(err) = credentials::store(&self.inner.config.stored_credentials_file, &reusable) {
                log::warn!("failed to persist credentials: {:?}", err);
            }
        }
        *self.inner.welcome.lock() = Some(welcome);

        let worker = SessionWorker::run(
            transport,
            self.reconnect_callback(),
            self.inner.user_attrs.clone(),
        );
        *self.inner.worker.lock() = Some(worker);
        self.enter_phase(SessionPhase::Authenticated);

        Ok(())
    }

    /// Idempotent: stops the worker threads, closes the underlying
    /// connection, and clears session state.
    pub fn close(&self) {
        let mut phase = self.inner.phase.lock();
        if matches!(*phase, SessionPhase::Closing | SessionPhase::Closed) {
            return;
        }
        *phase = SessionPhase::Closing;
        drop(phase);

        if let Some(worker) = self.inner.worker.lock().take() {
            worker.handle().request_shutdown();
            worker.join();
        }
        *self.inner.welcome.lock() = None;

        self.enter_phase(SessionPhase::Closed);
    }

    pub fn get_mercury_protobuf<T>(&self, uri: String) -> Result<T, Error>
    where
        T: MessageRead<'static>,
    {
        self.handle()?.get_mercury_protobuf(uri)
    }

    pub fn get_mercury_json<T>(&self, uri: String) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        self.handle()?.get_mercury_json(uri)
    }

    pub fn get_audio_key(&self, track: ItemId, file: FileId) -> Result<AudioKey, Error> {
        self.handle()?.get_audio_key(track, file)
    }

    pub fn get_country_code(&self) -> Option<String> {
        self.handle().ok()?.get_country_code()
    }
}

/// Cheap-to-clone handle into the live worker, for callers who already hold
/// the auth barrier (or don't need it, like `get_country_code`).
#[derive(Clone)]
pub struct SessionHandle {
    sender: Sender<DispatchCmd>,
}

impl SessionHandle {
    pub fn get_mercury_protobuf<T>(&self, uri: String) -> Result<T, Error>
    where
        T: MessageRead<'static>,
    {
        let payload = self.get_mercury_bytes(uri)?;
        deserialize_protobuf(&payload)
    }

    pub fn get_mercury_json<T>(&self, uri: String) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let payload = self.get_mercury_bytes(uri)?;
        Ok(serde_json::from_slice(&payload)?)
    }

    pub fn get_mercury_bytes(&self, uri: String) -> Result<Vec<u8>, Error> {
        let response = self.send_mercury(MercuryRequest::get(uri))?;
        response
            .payload
            .into_iter()
            .next()
            .ok_or(Error::UnexpectedResponse)
    }

    pub fn send_mercury(&self, request: MercuryRequest) -> Result<MercuryResponse, Error> {
        let (callback, receiver) = unbounded();
        self.sender
            .send(DispatchCmd::MercuryReq { callback, request })?;
        receiver.recv().map_err(|_| Error::SessionClosed)
    }

    pub fn subscribe(
        &self,
        uri: String,
        callback: Sender<MercuryResponse>,
    ) -> Result<(), Error> {
        self.sender
            .send(DispatchCmd::MercurySub { uri, callback })
            .map_err(Error::from)
    }

    pub fn get_audio_key(&self, track: ItemId, file: FileId) -> Result<AudioKey, Error> {
        let (callback, receiver) = unbounded();
        self.sender.send(DispatchCmd::AudioKeyReq {
            callback,
            track,
            file,
        })?;
        receiver.recv().map_err(|_| Error::SessionClosed)?
    }

    pub fn get_country_code(&self) -> Option<String> {
        let (callback, receiver) = unbounded();
        self.sender.send(DispatchCmd::CountryCodeReq { callback }).ok()?;
        receiver.recv().ok()?
    }

    fn send_raw(&self, cmd: u8, payload: Vec<u8>) -> Result<(), Error> {
        self.sender
            .send(DispatchCmd::SendRaw(ShannonMsg::new(cmd, payload)))
            .map_err(Error::from)
    }

    pub fn request_shutdown(&self) {
        let _ = self.sender.send(DispatchCmd::Shutdown);
    }
}

pub struct SessionWorker {
    sender: Sender<DispatchCmd>,
    decoding_thread: JoinHandle<()>,
    encoding_thread: JoinHandle<()>,
    dispatching_thread: JoinHandle<()>,
    watchdog_thread: JoinHandle<()>,
    terminated: Arc<AtomicBool>,
}

impl SessionWorker {
    pub fn run(
        transport: Transport,
        on_reconnect: impl Fn() + Send + Sync + 'static,
        user_attrs: Arc<Mutex<HashMap<String, String>>>,
    ) -> Self {
        let on_reconnect: Arc<dyn Fn() + Send + Sync> = Arc::new(on_reconnect);
        let (disp_send, disp_recv) = unbounded();
        let (msg_send, msg_recv) = unbounded();
        let (watchdog_reset_send, watchdog_reset_recv) = unbounded();
        let terminated = Arc::new(AtomicBool::new(false));

        Self {
            decoding_thread: {
                let decoder = transport.decoder;
                let disp_send = disp_send.clone();
                thread::spawn(move || decode_shannon_messages(decoder, disp_send))
            },
            encoding_thread: {
                let encoder = transport.encoder;
                let disp_send = disp_send.clone();
                thread::spawn(move || encode_shannon_messages(encoder, msg_recv, disp_send))
            },
            dispatching_thread: {
                let stream = transport.stream;
                let terminated = terminated.clone();
                let watchdog_reset_send = watchdog_reset_send.clone();
                let on_reconnect = on_reconnect.clone();
                thread::spawn(move || {
                    dispatch_messages(
                        disp_recv,
                        msg_send,
                        stream,
                        watchdog_reset_send,
                        user_attrs,
                        on_reconnect,
                    );
                    terminated.store(true, Ordering::SeqCst);
                })
            },
            watchdog_thread: {
                thread::spawn(move || run_ping_watchdog(watchdog_reset_recv, move || on_reconnect()))
            },
            sender: disp_send,
            terminated,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn join(self) {
        if let Err(err) = self.dispatching_thread.join() {
            log::error!("session dispatching thread panicked: {:?}", err);
        }
        if let Err(err) = self.encoding_thread.join() {
            log::error!("session encoding thread panicked: {:?}", err);
        }
        if let Err(err) = self.decoding_thread.join() {
            log::error!("session decoding thread panicked: {:?}", err);
        }
        if let Err(err) = self.watchdog_thread.join() {
            log::error!("ping watchdog thread panicked: {:?}", err);
        }
    }

    pub fn has_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

/// Renews a deadline every time a `PING` resets it; fires `on_timeout` once
/// and exits if 125 seconds pass without a reset, or exits silently once the
/// dispatch thread drops the reset sender (on shutdown).
fn run_ping_watchdog(reset: Receiver<()>, on_timeout: impl Fn()) {
    loop {
        match reset.recv_timeout(PING_WATCHDOG_TIMEOUT) {
            Ok(()) => continue,
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("no PING received within watchdog interval, reconnecting");
                on_timeout();
                return;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn decode_shannon_messages(mut decoder: ShannonDecoder<TcpStream>, dispatch: Sender<DispatchCmd>) {
    loop {
        match decoder.decode() {
            Ok(msg) => {
                if dispatch.send(DispatchCmd::DecodedMsg(msg)).is_err() {
                    break;
                }
            }
            Err(err) => {
                let _ = dispatch.send(DispatchCmd::DecoderError(err));
                break;
            }
        };
    }
}

fn encode_shannon_messages(
    mut encoder: ShannonEncoder<TcpStream>,
    messages: Receiver<ShannonMsg>,
    dispatch: Sender<DispatchCmd>,
) {
    for msg in messages {
        if let Err(err) = encoder.encode(msg) {
            let _ = dispatch.send(DispatchCmd::EncoderError(err));
            break;
        }
    }
}

enum DispatchCmd {
    MercuryReq {
        request: MercuryRequest,
        callback: Sender<MercuryResponse>,
    },
    MercurySub {
        uri: String,
        callback: Sender<MercuryResponse>,
    },
    AudioKeyReq {
        track: ItemId,
        file: FileId,
        callback: Sender<Result<AudioKey, Error>>,
    },
    CountryCodeReq {
        callback: Sender<Option<String>>,
    },
    SendRaw(ShannonMsg),
    DecodedMsg(ShannonMsg),
    DecoderError(io::Error),
    EncoderError(io::Error),
    Shutdown,
}

fn dispatch_messages(
    dispatch: Receiver<DispatchCmd>,
    messages: Sender<ShannonMsg>,
    stream: TcpStream,
    watchdog_reset: Sender<()>,
    user_attrs: Arc<Mutex<HashMap<String, String>>>,
    on_reconnect: Arc<dyn Fn() + Send + Sync>,
) {
    let mut mercury = MercuryDispatcher::new();
    let mut audio_key = AudioKeyDispatcher::new();
    let mut country_code = None;

    for disp in dispatch {
        match disp {
            DispatchCmd::MercuryReq { request, callback } => {
                let msg = mercury.enqueue_request(request, callback);
                let _ = messages.send(msg);
            }
            DispatchCmd::MercurySub { uri, callback } => {
                let msg = mercury.subscribe(uri, callback);
                let _ = messages.send(msg);
            }
            DispatchCmd::AudioKeyReq { track, file, callback } => {
                let msg = audio_key.enqueue_request(track, file, callback);
                let _ = messages.send(msg);
            }
            DispatchCmd::CountryCodeReq { callback } => {
                let _ = callback.send(country_code.clone());
            }
            DispatchCmd::SendRaw(msg) => {
                let _ = messages.send(msg);
            }
            DispatchCmd::DecodedMsg(msg) if msg.cmd == ShannonMsg::PING => {
                let _ = watchdog_reset.send(());
                let _ = messages.send(pong_message(msg));
            }
            DispatchCmd::DecodedMsg(msg) if msg.cmd == ShannonMsg::PONG_ACK => {
                // No-op, acknowledged.
            }
            DispatchCmd::DecodedMsg(msg) if msg.cmd == ShannonMsg::COUNTRY_CODE => {
                match parse_country_code(msg) {
                    Ok(code) => country_code = Some(code),
                    Err(err) => log::warn!("malformed country code: {:?}", err),
                }
            }
            DispatchCmd::DecodedMsg(msg) if msg.cmd == ShannonMsg::LICENSE_VERSION => {
                log_license_version(&msg.payload);
            }
            DispatchCmd::DecodedMsg(msg) if msg.cmd == ShannonMsg::UNKNOWN_0X10 => {
                log::debug!("unknown 0x10 packet: {} bytes", msg.payload.len());
            }
            DispatchCmd::DecodedMsg(msg) if msg.cmd == ShannonMsg::AES_KEY => {
                audio_key.handle_aes_key(msg)
            }
            DispatchCmd::DecodedMsg(msg) if msg.cmd == ShannonMsg::AES_KEY_ERROR => {
                audio_key.handle_aes_key_error(msg)
            }
            DispatchCmd::DecodedMsg(msg)
                if matches!(
                    msg.cmd,
                    ShannonMsg::MERCURY_REQ
                        | ShannonMsg::MERCURY_SUB
                        | ShannonMsg::MERCURY_UNSUB
                        | ShannonMsg::MERCURY_PUB
                ) =>
            {
                mercury.handle_mercury_req(msg)
            }
            DispatchCmd::DecodedMsg(msg)
                if matches!(msg.cmd, ShannonMsg::CHANNEL_ERROR | ShannonMsg::STREAM_CHUNK_RES) =>
            {
                log::debug!("dropped channel-collaborator packet: {:#x}", msg.cmd);
            }
            DispatchCmd::DecodedMsg(msg) if msg.cmd == ShannonMsg::PRODUCT_INFO => {
                user_attrs
                    .lock()
                    .extend(product_info::parse_product_info(&msg.payload));
            }
            DispatchCmd::DecodedMsg(msg) => {
                log::debug!("ignored message: {:#x}", msg.cmd);
            }
            DispatchCmd::DecoderError(err) => {
                log::error!("connection error: {:?}", err);
                let _ = stream.shutdown(Shutdown::Write);
                spawn_reconnect(on_reconnect.clone());
                break;
            }
            DispatchCmd::EncoderError(err) => {
                log::error!("connection error: {:?}", err);
                let _ = stream.shutdown(Shutdown::Read);
                spawn_reconnect(on_reconnect.clone());
                break;
            }
            DispatchCmd::Shutdown => {
                log::info!("connection shutdown");
                let _ = stream.shutdown(Shutdown::Both);
                break;
            }
        }
    }
}

/// `LICENSE_VERSION` carries an `i16` license id and, for some ids, a
/// trailing human-readable string. Logged only, there's nothing else in this
/// crate that reacts to the license in effect.
fn log_license_version(payload: &[u8]) {
    if payload.len() < 2 {
        log::debug!("malformed license version packet: {} bytes", payload.len());
        return;
    }
    let id = i16::from_be_bytes([payload[0], payload[1]]);
    let rest = &payload[2..];
    if rest.is_empty() {
        log::debug!("license version: {}", id);
    } else {
        log::debug!("license version: {} ({})", id, String::from_utf8_lossy(rest));
    }
}

/// Runs `on_reconnect` on a fresh thread rather than calling it inline: the
/// caller is the dispatching thread itself, and `Session::reconnect()` joins
/// that same thread as part of tearing down the old worker, which would
/// deadlock if called from it directly.
fn spawn_reconnect(on_reconnect: Arc<dyn Fn() + Send + Sync>) {
    thread::spawn(move || on_reconnect());
}

fn pong_message(ping: ShannonMsg) -> ShannonMsg {
    ShannonMsg::new(ShannonMsg::PONG, ping.payload)
}

fn parse_country_code(msg: ShannonMsg) -> Result<String, Error> {
    String::from_utf8(msg.payload).map_err(|_| Error::UnexpectedResponse)
}
