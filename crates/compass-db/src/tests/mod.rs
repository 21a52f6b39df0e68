//! Integration tests against a live PostgreSQL instance.
//!
//! All tests here are `#[ignore]`d so the default test run passes without a
//! database; run them with `cargo test -- --ignored` against the test
//! database described in [`crate::test_fixtures`].
