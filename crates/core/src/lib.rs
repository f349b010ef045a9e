//! mixcast core: mixer domain model, volume curve, wire protocol and configuration
//!
//! Everything in this crate is free of I/O against the sound card or the
//! network. Device backends and the broadcast server live in `mixcast-infra`.

pub mod domain;
