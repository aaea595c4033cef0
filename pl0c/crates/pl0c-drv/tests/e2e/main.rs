//! End-to-end tests for the `pl0` binary.

mod cli_tests;
