//! Write Gate — mediates every `write`/`sign` tool call through
//! a human confirmation on the call's originating channel, built on the
//! same `Before`-chain-and-FIFO-queue idioms as `skynet-hooks` and the
//! `DashMap`-keyed lookup tables in `skynet-gateway`'s connection state.

pub mod error;
pub mod gate;

pub use error::{Result, WriteGateError};
pub use gate::WriteGate;
