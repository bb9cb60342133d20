//! Request correlation
//!
//! A `Correlator` yields one `request_id` and one `request_context` for the
//! lifetime of the process that owns it. Both are generated lazily on first
//! access and cached.

use std::sync::OnceLock;

/// Length of generated request ids (lowercase hex)
pub const REQUEST_ID_LEN: usize = 16;

/// What triggered the current unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// An inbound request (e.g. HTTP)
    Request { method: String, path: String },
    /// A command-line invocation
    Command { argv: Vec<String> },
}

impl Invocation {
    /// Describe the current process from its command line
    pub fn current_command() -> Self {
        Self::from_os_args(std::env::args_os())
    }

    /// Command invocation from raw arguments; non-UTF-8 bytes are replaced
    pub fn from_os_args<I>(args: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<std::ffi::OsStr>,
    {
        Invocation::Command {
            argv: args
                .into_iter()
                .map(|a| a.as_ref().to_string_lossy().into_owned())
                .collect(),
        }
    }

    /// Human-readable description used as `request_context`
    pub fn describe(&self) -> String {
        match self {
            Invocation::Request { method, path } => {
                format!("{} {}", method.to_ascii_uppercase(), path)
            }
            Invocation::Command { argv } => argv.join(" "),
        }
    }
}

#[derive(Debug, Clone)]
struct Correlation {
    request_id: String,
    request_context: String,
}

/// Produces a stable request id/context pair
#[derive(Debug)]
pub struct Correlator {
    invocation: Invocation,
    cached: OnceLock<Correlation>,
}

impl Correlator {
    pub fn new(invocation: Invocation) -> Self {
        Self {
            invocation,
            cached: OnceLock::new(),
        }
    }

    /// Correlator for a request-driven invocation
    pub fn for_request(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Invocation::Request {
            method: method.into(),
            path: path.into(),
        })
    }

    /// Correlator for a command-driven invocation
    pub fn for_command<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Invocation::Command {
            argv: argv.into_iter().map(Into::into).collect(),
        })
    }

    fn correlation(&self) -> &Correlation {
        self.cached.get_or_init(|| {
            let correlation = Correlation {
                request_id: generate_request_id(),
                request_context: self.invocation.describe(),
            };
            tracing::debug!(
                request_id = %correlation.request_id,
                context = %correlation.request_context,
                "Request correlation initialized"
            );
            correlation
        })
    }

    /// The process-wide request id
    pub fn request_id(&self) -> &str {
        &self.correlation().request_id
    }

    /// The process-wide request context
    pub fn request_context(&self) -> &str {
        &self.correlation().request_context
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(Invocation::current_command())
    }
}

/// Fresh random request id of `REQUEST_ID_LEN` hex characters
pub fn generate_request_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    hex[..REQUEST_ID_LEN].to_string()
}
