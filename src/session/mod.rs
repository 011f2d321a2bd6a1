// src/session/mod.rs

pub mod controller;
pub mod eligibility;
pub mod guard;
pub mod machine;
pub mod registry;
pub mod review;
pub mod timer;
