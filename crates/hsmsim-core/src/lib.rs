//! Protocol engine for the payment HSM simulator.
//!
//! This crate is the transport-independent core: it turns one request
//! frame into one response frame, byte-for-byte the way the mimicked
//! device would. The daemon crate owns sockets and sessions; everything
//! here is pure computation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              handler                     │  validate → transform → respond
//! ├─────────────────────┬────────────────────┤
//! │      command        │   crypto / derive  │  field grammar │ 3DES, PVV, CVV
//! ├─────────────────────┴────────────────────┤
//! │                frame                     │  [len u16 BE][header][cmd][payload]
//! └──────────────────────────────────────────┘
//! ```
//!
//! A request flows bottom-up: [`frame::parse`] splits framing from the
//! command, [`command::parse_request`] partitions the payload into named
//! fields, [`handler::dispatch`] runs the per-command state machine
//! against the immutable [`context::HsmContext`], and [`frame::build`]
//! wraps the response body back up.
//!
//! # Failure regimes
//!
//! Frame and grammar violations are connection-fatal and produce no
//! response; semantic failures (parity, verification, crypto errors)
//! produce a well-formed response whose error code is non-zero. The
//! distinction is part of the wire contract.

pub mod command;
pub mod context;
pub mod crypto;
pub mod derive;
pub mod frame;
pub mod handler;

pub use command::{parse_request, CommandError, FieldMap, Request};
pub use context::{ContextError, HsmContext, Policy, DEFAULT_LMK_HEX};
pub use frame::{FrameError, MAX_FRAME_LEN};
pub use handler::{dispatch, Response};
