// ABOUTME: Domain models re-exported from the esign-core foundation crate
// ABOUTME: Users, clients, agents, cases, documents, signatures, and logs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

pub use esign_core::models::*;
