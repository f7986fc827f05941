// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-threaded mio event loop (C7) and per-connection state (C6
//! transport boundary).

pub mod connection;
pub mod worker;

pub use connection::Connection;
pub use worker::Worker;
