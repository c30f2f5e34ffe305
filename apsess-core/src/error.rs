use std::sync::mpsc::RecvTimeoutError;
use std::{error, fmt, io};

#[derive(Debug)]
pub enum Error {
    NoEndpoint,
    SocketError(io::Error),
    BadSignature,
    BadMac,
    HandshakeRejected,
    AuthFailed { code: i32, name: &'static str },
    ProtocolError(String),
    SessionClosed,
    TokenFetchError(String),
    TransientIO(io::Error),
    UnexpectedResponse,
    ConfigError(String),
    JsonError(Box<dyn error::Error + Send>),
    ProtobufError(quick_protobuf::Error),
    SendError,
    RecvTimeoutError(RecvTimeoutError),
    JoinError,
    HttpStatus(u16),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEndpoint => write!(f, "no access point endpoint available"),
            Self::SocketError(err) => write!(f, "socket error: {err}"),
            Self::BadSignature => write!(f, "server handshake signature did not verify"),
            Self::BadMac => write!(f, "packet MAC did not verify"),
            Self::HandshakeRejected => write!(f, "handshake rejected by server"),
            Self::AuthFailed { code, name } => {
                write!(f, "authentication failed: {name} ({code})")
            }
            Self::ProtocolError(msg) => write!(f, "protocol error: {msg}"),
            Self::SessionClosed => write!(f, "session is closed"),
            Self::TokenFetchError(msg) => write!(f, "token fetch failed: {msg}"),
            Self::TransientIO(err) => write!(f, "transient I/O error: {err}"),
            Self::UnexpectedResponse => write!(f, "unexpected server response"),
            Self::ConfigError(msg) => write!(f, "configuration error: {msg}"),
            Self::JsonError(err) => err.fmt(f),
            Self::ProtobufError(err) => write!(f, "protobuf error: {err}"),
            Self::SendError => write!(f, "failed to send into a channel"),
            Self::RecvTimeoutError(err) => write!(f, "channel receive timeout: {err}"),
            Self::JoinError => write!(f, "failed to join thread"),
            Self::HttpStatus(code) => write!(f, "HTTP status {code}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::SocketError(err)
    }
}

impl From<quick_protobuf::Error> for Error {
    fn from(err: quick_protobuf::Error) -> Error {
        Error::ProtobufError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::JsonError(Box::new(err))
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Error {
        Error::JsonError(Box::new(err))
    }
}

impl<T> From<crossbeam_channel::SendError<T>> for Error {
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        Error::SendError
    }
}

impl From<RecvTimeoutError> for Error {
    fn from(err: RecvTimeoutError) -> Self {
        Error::RecvTimeoutError(err)
    }
}
