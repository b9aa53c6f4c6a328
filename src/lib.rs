// SPDX-License-Identifier: Apache-2.0

//! Live line follower for growing and rotating files.
//!
//! A [`follower::Follower`] streams newly appended lines from one file,
//! survives rotation and truncation, reassembles lines split across read
//! boundaries, and hands each line to a pluggable [`parser::LineParser`]
//! before emitting it as a structured record.
//!
//! ```no_run
//! use linetail::follower::{Follower, FollowerConfig, StartPolicy};
//! use linetail::parser::PlainParser;
//!
//! # fn main() -> linetail::Result<()> {
//! let config = FollowerConfig {
//!     path: "/var/log/app.log".into(),
//!     start_policy: StartPolicy::TailLines(10),
//!     ..Default::default()
//! };
//! let parser = PlainParser::new().with_path(&config.path);
//! let mut handle = Follower::new(config, Box::new(parser))?.start()?;
//!
//! while let Some(result) = handle.recv() {
//!     println!("{:?}", result);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bounded_channel;
pub mod error;
pub mod follower;
pub mod identity;
pub mod line_buffer;
pub mod parser;
pub mod watcher;

pub use error::{Error, Result};
pub use follower::{Follower, FollowerConfig, FollowerHandle, RotationPolicy, StartPolicy};
pub use identity::{FileIdentity, PathSnapshot};
pub use parser::{LineParser, ParseFailKind, ParseResult};
