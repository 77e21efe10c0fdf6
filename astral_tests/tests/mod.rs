// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! This crate contains the integration test suite for `astral_alloc` and `astral_renderer`.
//!
//! - The `util` module contains in-memory backings that stand in for GPU buffers and
//!   textures, plus a counting allocation tracer.
//! - We do not use the default Rust test harness, but instead use this `mod.rs` file as the
//!   entry point to run all other tests, so the backings are shared between topics.
//! - Tests are grouped by the atlas they exercise. Put the topic at the start of the test
//!   name, e.g. `shadow_map_id_is_generational` rather than `generational_shadow_map_id`.

#![allow(missing_docs, reason = "we don't need docs for testing")]
#![allow(clippy::cast_possible_truncation, reason = "not critical for testing")]

mod shadow_map;
mod util;
