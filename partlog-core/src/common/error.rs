use std::{any::Any, cell::RefCell, error::Error as StdError, fmt, net::SocketAddr};

use backtrace::Backtrace;

pub type Result<T> = std::result::Result<T, Error>;
type Cause = Box<dyn StdError + Send + Sync>;

thread_local! {
    pub static BACKTRACE: RefCell<Option<Backtrace>> = RefCell::new(None);
}

pub struct Error {
    inner: Box<ErrorImpl>,
    description: Option<String>,
}

struct ErrorImpl {
    kind: Kind,
    cause: Option<Cause>,
    connect_info: Option<SocketAddr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Malformed frame on the wire
    Frame,

    /// Bytes that can't be decoded into a record or index entry
    Decode,

    /// A well-formed request carrying out-of-range values
    Validation,

    /// A bounded container is full
    Capacity,

    IO,

    Net,

    Bind,

    /// Open, write or sync failure on a partition file
    File,

    Path,

    Timeout,

    Config,

    General,
}

impl Error {
    pub fn new(
        kind: Kind,
        description: Option<String>,
        cause: Option<Cause>,
        connect_info: Option<SocketAddr>,
    ) -> Self {
        Self {
            description,
            inner: Box::new(ErrorImpl {
                kind,
                cause,
                connect_info,
            }),
        }
    }

    pub fn new_frame(cause: Option<Cause>, description: Option<String>) -> Self {
        Error::new(Kind::Frame, description, cause, None)
    }

    pub fn new_decode(description: &str) -> Self {
        Error::new(Kind::Decode, Some(description.to_owned()), None, None)
    }

    pub fn new_validation(description: &str) -> Self {
        Error::new(Kind::Validation, Some(description.to_owned()), None, None)
    }

    pub fn new_capacity(description: &str) -> Self {
        Error::new(Kind::Capacity, Some(description.to_owned()), None, None)
    }

    pub fn new_io(cause: Option<Cause>, connect_info: Option<SocketAddr>) -> Self {
        Error::new(Kind::IO, None, cause, connect_info)
    }

    pub fn new_net(
        cause: Option<Cause>,
        description: Option<String>,
        connect_info: Option<SocketAddr>,
    ) -> Self {
        Error::new(Kind::Net, description, cause, connect_info)
    }

    pub fn new_bind(cause: Option<Cause>) -> Self {
        Error::new(Kind::Bind, None, cause, None)
    }

    pub fn new_file(cause: Option<Cause>, description: Option<String>) -> Self {
        Error::new(Kind::File, description, cause, None)
    }

    pub fn new_path(cause: Option<Cause>, description: Option<String>) -> Self {
        Error::new(Kind::Path, description, cause, None)
    }

    pub fn new_timeout(description: &str) -> Self {
        Error::new(Kind::Timeout, Some(description.to_owned()), None, None)
    }

    pub fn new_config(cause: Option<Cause>, description: Option<String>) -> Self {
        Error::new(Kind::Config, description, cause, None)
    }

    pub fn new_general(description: &str) -> Self {
        Error::new(Kind::General, Some(description.to_owned()), None, None)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.inner.kind, Kind::Timeout)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.inner.kind, Kind::Validation)
    }

    /// Failures of the request itself rather than of the broker: the peer
    /// gets its connection closed and nothing else happens.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self.inner.kind,
            Kind::Frame | Kind::Decode | Kind::Validation | Kind::IO | Kind::Timeout
        )
    }

    pub fn get_kind(&self) -> Kind {
        self.inner.kind
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("partlog_core::Error");
        f.field(&self.inner.kind);
        if let Some(ref cause) = self.inner.cause {
            f.field(cause);
        }
        if let Some(ref connect_info) = self.inner.connect_info {
            f.field(connect_info);
        }
        if let Some(ref description) = self.description {
            f.field(description);
        }
        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(description) = &self.description {
            f.write_str(description)?
        } else {
            write!(f, "{:?}", self.inner.kind)?
        }

        if let Some(ref cause) = self.inner.cause {
            write!(f, ": {}", cause)?
        }

        if let Some(ref connect_info) = self.inner.connect_info {
            write!(f, ", {}", connect_info)?
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .cause
            .as_ref()
            .map(|cause| &**cause as &(dyn StdError + 'static))
    }
}

/// Stash a backtrace for every panic so `trace_panic` can log it after
/// `catch_unwind`.
pub fn hook_panic() {
    std::panic::set_hook(Box::new(|_| {
        let trace = Backtrace::new();
        BACKTRACE.with(move |b| b.borrow_mut().replace(trace));
    }));
}

pub fn trace_panic(error: &Box<dyn Any + Send>) -> (Backtrace, &str) {
    let b = BACKTRACE.with(|b| b.borrow_mut().take()).unwrap_or_default();
    let err_msg = panic_message::panic_message(error);

    (b, err_msg)
}
