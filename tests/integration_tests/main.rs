//! Integration tests that run the built `profgantt` binary.

mod gantt;
