mod common;
mod orchestrator_tests;
