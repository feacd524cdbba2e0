//! Test module for vesper-core
//!
//! This module contains scenario tests for:
//! - Lifecycle supervision (startup, forced error, restart timing)
//! - The debounced search loop end to end over the event channel
//! - Dispatch routing (action prefix, wallpaper, app launch)
//! - Config hot-reload behavior observed by the launcher

// Scores and volumes in fixtures are exact constants
#![allow(clippy::float_cmp)]

mod launcher_loop_tests;
mod lifecycle_tests;
