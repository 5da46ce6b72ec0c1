// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Round Domain Layer
//!
//! Pure round-level rules. No I/O dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`round`] | `RoundDecision`, `decide` |

pub mod round;

pub use round::*;
