//! Streaming feature writers.

pub mod jsonl;
