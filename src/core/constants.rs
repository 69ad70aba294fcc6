// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and banners)
pub const APP_NAME: &str = "Malten";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "malten";

// =============================================================================
// Environment Variables - Logging
// =============================================================================

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "MALTEN_LOG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

pub const ENV_HOST: &str = "MALTEN_HOST";
pub const ENV_PORT: &str = "MALTEN_PORT";
pub const ENV_MAX_STREAMS: &str = "MALTEN_MAX_STREAMS";
pub const ENV_MAX_MESSAGES_PER_STREAM: &str = "MALTEN_MAX_MESSAGES_PER_STREAM";
pub const ENV_MAX_MESSAGE_BYTES: &str = "MALTEN_MAX_MESSAGE_BYTES";
pub const ENV_STREAM_TTL_SECS: &str = "MALTEN_STREAM_TTL_SECS";
pub const ENV_REAPER_INTERVAL_SECS: &str = "MALTEN_REAPER_INTERVAL_SECS";

// =============================================================================
// Server Defaults
// =============================================================================

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9090;

// =============================================================================
// Engine Limits
// =============================================================================

/// Maximum number of concurrent streams held in the StreamTable
pub const MAX_STREAMS: usize = 1000;

/// Maximum number of messages retained per stream's ring buffer
pub const MAX_MESSAGES_PER_STREAM: usize = 1000;

/// Maximum size in bytes of a message's text; longer text is truncated
pub const MAX_MESSAGE_BYTES: usize = 512;

/// Maximum size in bytes of a stream id
pub const MAX_STREAM_ID_BYTES: usize = 64;

/// Default stream idle TTL (24 hours)
pub const STREAM_TTL_DEFAULT_SECS: u64 = 24 * 60 * 60;

/// Reaper tick interval
pub const REAPER_INTERVAL_SECS: u64 = 1;

/// Per-observer outbound queue capacity (strict single-slot backpressure)
pub const OBSERVER_QUEUE: usize = 1;

/// Maximum time a transport will wait to enqueue an Engine command
pub const WAIT_ENQUEUE_SECS: u64 = 1;

/// Depth of the Engine's inbound command channel
pub const ENGINE_QUEUE_DEPTH: usize = 1024;

/// Stream id used when a request omits `stream`
pub const DEFAULT_STREAM_ID: &str = "~";

/// Length, in random bytes, of an auto-generated stream id (8 alnum chars)
pub const AUTO_STREAM_ID_LEN: usize = 8;

/// How long `POST /commands` waits for a matching `command_result` before
/// falling back to the async-style `{id, status: "queued"}` response.
pub const COMMAND_TIMEOUT_SECS: u64 = 10;

/// Default page size for `GET /messages` when `limit` is omitted.
pub const DEFAULT_MESSAGE_LIMIT: usize = 25;

// =============================================================================
// Metadata Resolver
// =============================================================================

/// Outbound HTTP timeout for link-preview resolution
pub const RESOLVER_TIMEOUT_SECS: u64 = 5;

/// Number of concurrent metadata-resolution worker tasks
pub const RESOLVER_WORKER_COUNT: usize = 4;

/// Depth of the bounded work queue feeding resolver workers
pub const RESOLVER_QUEUE_DEPTH: usize = 256;

// =============================================================================
// WebSocket Framing
// =============================================================================

pub const WS_PING_PERIOD_SECS: u64 = 15;
pub const WS_PONG_WAIT_SECS: u64 = 60;

// =============================================================================
// Authentication / Session
// =============================================================================

/// Cookie name carrying the anonymous session token
pub const SESSION_COOKIE_NAME: &str = "malten_session";

/// Number of random bytes in a session token (hex-encoded to 32 chars)
pub const SESSION_TOKEN_BYTES: usize = 16;

// =============================================================================
// Request Body Limits
// =============================================================================

/// Default body limit for API requests (1 MB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

// =============================================================================
// Shutdown
// =============================================================================

/// Graceful shutdown timeout in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
