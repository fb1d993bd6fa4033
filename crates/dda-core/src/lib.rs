pub mod cases;
pub mod common;
pub mod compare;
pub mod domain;
pub mod engines;
pub mod extract;
pub mod numerics;
pub mod orchestrator;
pub mod reconcile;
pub mod results;
pub mod runner;
