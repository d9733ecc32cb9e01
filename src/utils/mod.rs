//! # Utility Modules
//!
//! Supporting utilities for cryptography, compression, logging, and timing.
//!
//! ## Components
//! - **Crypto**: RSA login key pair, verify token, AES-128-CFB8 stream cipher
//! - **Compression**: zlib with threshold and declared-length limits
//! - **Logging**: Structured logging configuration
//! - **Timeout**: Timeout defaults and async timeout wrappers
//! - **Metrics**: Thread-safe observability counters
//!
//! ## Security
//! - Cryptographically secure RNG (getrandom, OsRng)
//! - Decompression bomb protection (8 MiB limit)
//! - Memory zeroing for the shared secret (zeroize crate)

pub mod compression;
pub mod crypto;
pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{Metrics, MetricsSnapshot};
