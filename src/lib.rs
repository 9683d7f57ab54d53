//! carematch - caregiver matching service
//!
//! Guardians submit care requests, caregivers register as providers, and an
//! administrator links the two through a three-step matching workflow. Every
//! entity carries a human-readable serial number drawn from a per-namespace
//! counter.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{
    find_orphaned_matches, format_labeled, format_serial, rank, MatchWorkflow, SequenceAllocator,
    WorkflowState,
};
pub use models::{Match, Namespace, Provider, Request, SerialNumber};
