use std::fmt;

/// Transport-layer failure kinds that leave a connection in a state worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Socket,
    Transport,
    NotConnected,
    IncompleteRead,
    ImproperConnectionState,
    CannotSendRequest,
    CannotSendHeader,
    ResponseNotReady,
    BadStatusLine,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Socket => "Socket",
            TransportKind::Transport => "Transport",
            TransportKind::NotConnected => "NotConnected",
            TransportKind::IncompleteRead => "IncompleteRead",
            TransportKind::ImproperConnectionState => "ImproperConnectionState",
            TransportKind::CannotSendRequest => "CannotSendRequest",
            TransportKind::CannotSendHeader => "CannotSendHeader",
            TransportKind::ResponseNotReady => "ResponseNotReady",
            TransportKind::BadStatusLine => "BadStatusLine",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Options(String),

    #[error("{0}")]
    Config(String),

    #[error("{0} is not a valid category")]
    InvalidCategory(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("{0}")]
    Authentication(String),

    #[error("authorization code exchange failed: {0}")]
    AuthExchange(String),

    #[error("{kind} ({message})")]
    Transport { kind: TransportKind, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Server response ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("{0}")]
    Protocol(String),

    #[error("{0}")]
    Playlist(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub const EXIT_INTERRUPTED: i32 = 130;

impl Error {
    /// Default retry classification: transport and I/O failures, and server-side HTTP errors.
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::Transport { .. } | Error::Io(_) => true,
            Error::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Error::Options(_) => "OptionsError",
            Error::Config(_) => "ConfigError",
            Error::InvalidCategory(_) => "InvalidCategory",
            Error::InvalidValue { .. } => "InvalidValue",
            Error::Authentication(_) => "AuthenticationError",
            Error::AuthExchange(_) => "FlowExchangeError",
            Error::Transport { kind, .. } => kind.as_str(),
            Error::Io(_) => "IOError",
            Error::Http { .. } => "RequestError",
            Error::Protocol(_) => "ProtocolError",
            Error::Playlist(_) => "PlaylistError",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Options(_) | Error::Config(_) => 2,
            Error::InvalidCategory(_) | Error::InvalidValue { .. } | Error::Http { .. } => 3,
            Error::Authentication(_) => 4,
            Error::AuthExchange(_) => 6,
            Error::Transport { .. } | Error::Io(_) => 7,
            Error::Protocol(_) => 8,
            Error::Playlist(_) => 1,
        }
    }

    /// Builds a request error from a non-success response, keeping the body for diagnosis.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => Error::Http {
                status,
                body: body.trim().to_string(),
            },
            Err(err) => err.into(),
        }
    }
}

pub fn exit_code(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => err.exit_code(),
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Error::Http {
                status: status.as_u16(),
                body: err.to_string(),
            };
        }

        let kind = if err.is_connect() {
            TransportKind::NotConnected
        } else if err.is_timeout() {
            TransportKind::ResponseNotReady
        } else if has_io_source(&err) {
            TransportKind::Socket
        } else if err.is_body() || err.is_decode() {
            TransportKind::IncompleteRead
        } else if err.is_request() {
            TransportKind::CannotSendRequest
        } else if err.is_builder() {
            TransportKind::CannotSendHeader
        } else if err.is_redirect() {
            TransportKind::ImproperConnectionState
        } else {
            TransportKind::Transport
        };

        Error::Transport {
            kind,
            message: err.to_string(),
        }
    }
}

fn has_io_source(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if cause.is::<std::io::Error>() {
            return true;
        }
        source = cause.source();
    }
    false
}
