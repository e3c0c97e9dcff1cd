//! Integration tests for the image seeding pipeline
//!
//! These tests use wiremock servers in place of the iNaturalist, Commons and
//! GBIF APIs and run the client and orchestrator end to end.

mod common;
mod harvest_tests;
mod http_tests;
mod pipeline_tests;
