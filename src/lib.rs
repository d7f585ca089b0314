// ABOUTME: Library root for cairn - throwaway containers for integration tests.
// ABOUTME: The cairn binary is in main.rs.

//! Start a container, wait until it is ready, use it, and have it removed
//! even if the test forgets to.
//!
//! ```no_run
//! use cairn::container::Orchestrator;
//! use cairn::modules::{Preset, Redis};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::connect_local()?;
//! let redis = orchestrator.start(Redis::new().build()?).await?;
//! let port = redis.mapped_port(6379).await?;
//! println!("redis at {}:{}", redis.host(), port);
//! redis.remove().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod container;
pub mod context;
pub mod error;
pub mod launch;
pub mod modules;
pub mod ports;
pub mod registry;
pub mod runtime;
pub mod types;
pub mod wait;
