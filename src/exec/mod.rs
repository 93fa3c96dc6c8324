// src/exec/mod.rs

//! Process execution helpers.
//!
//! - [`command`] builds shell commands and renders command templates.
//! - [`output`] drains child stdout/stderr into the log.

pub mod command;
pub mod output;

use std::future::Future;
use std::pin::Pin;

pub use command::{path_with, render_template, shell_command};
pub use output::{RelayLevel, collect_tail, join_tail, relay_lines};

/// Boxed future returned by the collaborator traits, so they stay
/// object-safe and can be swapped for fakes in tests.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
