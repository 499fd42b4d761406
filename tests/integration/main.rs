//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem.
//! `bridge_tests` runs against mock adapters; `event_loop_tests` drives
//! the real poll loop over sockets and a timerfd.

mod bridge_tests;
mod mock_hw;
