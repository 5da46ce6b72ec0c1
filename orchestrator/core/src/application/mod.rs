// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod delegation;
pub mod lifecycle;

pub use delegation::{DelegationService, SpecialistDelegate};
pub use lifecycle::SubAgentLifecycleManager;
