#![allow(non_snake_case)]
pub mod angle;
pub mod config;
pub mod consistency;
pub mod data_parsing;
pub mod error;
pub mod measurement;
pub mod plotting;
pub mod simulator;
pub mod state_estimator;
