//! Atlas: streaming chat backend core.
//!
//! Runs an agent over persisted conversation history and turns its raw
//! event stream into a small NDJSON wire protocol, while keeping conversation
//! metadata, session checkpoints and memories in sync.
//!
//! # Quick Start
//!
//! ```no_run
//! use atlas::prelude::*;
//! use futures::StreamExt;
//!
//! # async fn example() -> atlas::error::Result<()> {
//! let ctx = AppContext::open(AtlasConfig::load()?)?;
//! let mut frames = ctx
//!     .chat()
//!     .stream_responses(&Caller::anonymous(), ChatRequest::new("What's the weather in Paris?"));
//! while let Some(frame) = frames.next().await {
//!     print!("{}", frame.to_ndjson()?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod memory;
pub mod model;
pub mod normalize;
pub mod prelude;
pub mod service;
pub mod session;
pub mod tools;
pub mod translator;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod storage;

#[cfg(feature = "cli")]
pub mod cli;
