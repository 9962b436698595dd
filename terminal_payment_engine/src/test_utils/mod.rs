//! Helpers for tests that need a real database or a controllable processor. Enable the `test_utils` feature to use
//! them from other crates.
pub mod prepare_env;
pub mod scripted_processor;

pub use prepare_env::{prepare_test_env, random_db_path, tear_down};
pub use scripted_processor::{Fault, Op, ScriptedProcessor};
