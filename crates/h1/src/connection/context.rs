use std::time::Duration;

/// How long to wait for the next initial before giving up on the connection.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum size of a start-line plus all header lines, terminators included.
pub const DEFAULT_MAX_INITIAL_LENGTH: usize = 8 * 1024;
/// Buffered body bytes are drained once they reach this size.
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024;

/// Configuration shared by every stream of a connection.
///
/// ```
/// use std::time::Duration;
/// use micro_h1::connection::H1Context;
///
/// let context = H1Context::server()
///     .with_idle_timeout(Duration::from_secs(30))
///     .with_allow_keep_alive(false);
/// assert!(!context.is_client());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H1Context {
    is_client: bool,
    idle_timeout: Duration,
    max_initial_length: usize,
    allow_keep_alive: bool,
    chunk_size: usize,
    require_request_framing: bool,
}

impl H1Context {
    pub fn new(is_client: bool) -> Self {
        Self {
            is_client,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_initial_length: DEFAULT_MAX_INITIAL_LENGTH,
            allow_keep_alive: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            require_request_framing: false,
        }
    }

    pub fn server() -> Self {
        Self::new(false)
    }

    pub fn client() -> Self {
        Self::new(true)
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    #[must_use]
    pub fn with_max_initial_length(mut self, max_initial_length: usize) -> Self {
        self.max_initial_length = max_initial_length;
        self
    }

    #[must_use]
    pub fn with_allow_keep_alive(mut self, allow_keep_alive: bool) -> Self {
        self.allow_keep_alive = allow_keep_alive;
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// When set, a request without `content-length` or `transfer-encoding` is rejected
    /// instead of being read as having no body.
    #[must_use]
    pub fn with_require_request_framing(mut self, require_request_framing: bool) -> Self {
        self.require_request_framing = require_request_framing;
        self
    }

    pub fn is_client(&self) -> bool {
        self.is_client
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn max_initial_length(&self) -> usize {
        self.max_initial_length
    }

    pub fn allow_keep_alive(&self) -> bool {
        self.allow_keep_alive
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn require_request_framing(&self) -> bool {
        self.require_request_framing
    }

    pub(crate) fn role(&self) -> &'static str {
        if self.is_client { "client" } else { "server" }
    }
}

impl Default for H1Context {
    fn default() -> Self {
        Self::server()
    }
}
