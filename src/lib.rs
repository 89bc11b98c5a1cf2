//! Hardware-independent core library for the phon vocal-effort sensing
//! node.
//!
//! This crate contains all platform-agnostic logic for the node: sample
//! classification, running pitch statistics, the flash-backed circular
//! telemetry log, the remote configuration surface, and the sampling loop
//! that ties them together. Hardware enters through small traits
//! ([`controller::VoiceAdc`], [`controller::TickSource`],
//! [`actuator::Haptic`], [`store::BlockStore`]) so the same code runs on
//! the embedded target and on desktop hosts for tests.
//!
//! It is `#![no_std]` with `extern crate alloc` for the in-memory store
//! backend.

#![no_std]

extern crate alloc;

pub mod actuator;
pub mod config;
pub mod controller;
pub mod error;
pub mod gate;
pub mod record;
pub mod remote;
pub mod ring;
pub mod stats;
pub mod store;
pub mod telemetry;
