//! Concurrent execution of path probes.
//!
//! One task per source port, joined before the results are merged.

pub mod fanout;

pub use fanout::PathEnumerator;
