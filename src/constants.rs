//! TigerStyle Constants
//!
//! Every limit and default used by the service, named with units.

/// Token entropy in bytes (128 bits)
pub const TOKEN_ENTROPY_BYTES: usize = 16;

/// Rendered token length in hex characters
pub const TOKEN_HEX_LENGTH: usize = TOKEN_ENTROPY_BYTES * 2;

/// Separator between key components; never valid inside a token
pub const KEY_SEPARATOR: char = ':';

/// Prefix for every key owned by the key-value engine
pub const KV_KEY_PREFIX: &str = "inc";

/// Keys deleted per batch when dropping the key-value schema
pub const KV_DROP_BATCH_COUNT: usize = 500;

/// Maximum pooled relational connections
pub const PG_POOL_CONNECTIONS_MAX: u32 = 10;

/// Time to wait for a pooled connection
pub const PG_ACQUIRE_TIMEOUT_MS: u64 = 5_000;

/// Row-lock wait limit applied to every relational session
pub const PG_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Statement limit applied to every relational session
pub const PG_STATEMENT_TIMEOUT_MS: u64 = 10_000;

/// Default HTTP bind address
pub const HTTP_BIND_ADDRESS_DEFAULT: &str = "0.0.0.0:8080";

/// Environment variables consulted for the backend URL, in priority order
pub const BACKEND_URL_ENV_VARS: [&str; 3] = ["DB_URL", "PG_DB_URL", "REDIS_DB_URL"];

/// Environment variable naming the statsd sink (`host:port`)
pub const STATSD_HOST_ENV_VAR: &str = "STATSD_HOST";

/// Host used when `STATSD_HOST` gives only `:port`
pub const STATSD_HOST_DEFAULT: &str = "127.0.0.1";

/// Port used when `STATSD_HOST` gives no port
pub const STATSD_PORT_DEFAULT: u16 = 8125;
