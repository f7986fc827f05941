// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Storage engine: fixed-size slot pool (C1) plus the cuckoo hash table
//! built over it (C2).

pub mod cuckoo;
pub mod slab;

pub use cuckoo::{Cuckoo, InsertReport};
pub use slab::{ItemView, SlotHandle, SlotPool};
