//! Integration tests for pull-all.

mod cli;
mod scenarios;
