//! Lifecycle scenarios: create, inspect, power management and removal.

mod scenarios;
mod test_helpers;
