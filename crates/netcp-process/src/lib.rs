//! # netcp Process
//!
//! Runs an external command with exactly one of its standard streams
//! connected to a pipe held by the parent.
//!
//! ```no_run
//! use std::io::Read;
//! use netcp_process::{Redirection, Subprocess};
//!
//! let mut child = Subprocess::new(["printf", "hello"], Redirection::Stdout).unwrap();
//! child.exec().unwrap();
//!
//! let mut output = String::new();
//! child.take_stdout().unwrap().read_to_string(&mut output).unwrap();
//! child.wait().unwrap();
//! assert_eq!(output, "hello");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod subprocess;

pub use error::{ProcessError, ProcessResult};
pub use subprocess::{Redirection, Stream, Subprocess};

/// Exit status `_exit`ed by a child whose `execvp` failed
pub const EXEC_FAILURE_STATUS: i32 = 127;
