//! Development server with live reload for quarry sites.
//!
//! Serves the built output tree, reruns build tasks when sources change and
//! notifies connected browsers over a WebSocket when output files change.

pub mod dispatch;
pub mod livereload;
pub mod server;
pub mod watcher;

pub use dispatch::{next_batch, Dispatcher, WatchRule, WatchTable};
pub use livereload::{ReloadHub, ReloadMessage};
pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent};
