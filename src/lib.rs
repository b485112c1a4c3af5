//! `dmxctl` drives DMX512 lighting fixtures through a USB-to-RS485 adapter.
//!
//! # Structure
//!
//! Fixture models ([models::FixtureSpec]) describe which channel and value range controls each
//! capability. A [fixture::Fixture] binds a model to a base address in a [universe::Universe],
//! which holds the 512 channel values. Writes are published as immutable frames, and a
//! [scheduler::Scheduler] resends the latest frame over a [link::Link] at the DMX refresh rate.
//! A [session::Session] wires all of it from a [models::Config].

#[macro_use]
extern crate tracing;

pub mod dmx;
pub mod fixture;
pub mod link;
pub mod models;
pub mod scheduler;
pub mod session;
pub mod universe;
