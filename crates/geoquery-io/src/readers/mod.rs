//! Streaming feature readers.

pub mod jsonl;
