//! The streaming subsystem: an append-only quad log with secondary indexes,
//! written by a single producer worker and scanned by concurrent readers
//! while the producer is still running.

mod log;
mod pool;
mod reader;

pub use log::StreamLog;
pub use pool::WorkerPool;
pub use reader::{StreamError, StreamReader};
