use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("secret {namespace}/{name} has no UTF-8 value under key {key:?}")]
    MissingKey {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("unable to identify driver from URL: {0}")]
    UnknownDriver(String),

    #[error("unsupported driver: {0}")]
    UnsupportedDriver(String),

    #[error("failed to parse URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The git hosting service answered with an error status.
    #[error("{message} (status {status})")]
    Provider { status: u16, message: String },

    #[error("request to git host failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("request to git host timed out")]
    Timeout,

    #[error("failed to generate a secure token: {0}")]
    Generation(String),

    #[error("invalid resource: {0}")]
    InvalidResource(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn not_found(kind: &'static str, namespace: &str, name: &str) -> Self {
        Error::NotFound {
            kind,
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        }
    }

    /// True when the git host reported that the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Provider { status: 404, .. })
    }

    pub fn is_unknown_driver(&self) -> bool {
        matches!(self, Error::UnknownDriver(_))
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Transport(err)
        }
    }
}
