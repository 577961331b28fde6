//! Prisma Cloud client - connection handling for the REST API
//!
//! This crate provides:
//! - `ConnectionConfig` validation into an immutable `ValidatedConfig`
//! - `PrismaClient`, the authenticated request dispatcher (login, retries, TLS)
//! - `ConnectionPool`, one cached `Connection` per logical connection name

pub mod client;
pub mod config;
pub mod error;
pub mod pool;

pub use client::{ApiRequest, PrismaClient, AUTH_HEADER};
pub use config::{ConnectionConfig, Credentials, Protocol, ValidatedConfig};
pub use error::{ClientError, Result};
pub use pool::{Connection, ConnectionPool};
