// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engine module - judging-state backends and collaborator contracts.

pub mod mock;
mod traits;

pub use mock::MockEngine;
pub use traits::*;
