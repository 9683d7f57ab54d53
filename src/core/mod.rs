// Core matching exports
pub mod reconcile;
pub mod region;
pub mod sequence;
pub mod serial;
pub mod submission;
pub mod workflow;

pub use reconcile::{find_orphaned_matches, OrphanedMatch};
pub use region::rank;
pub use sequence::{AllocationError, SequenceAllocator, DEFAULT_MAX_ATTEMPTS};
pub use serial::{format_labeled, format_serial};
pub use submission::{SubmissionError, SubmissionService};
pub use workflow::{
    plan_commit, reduce, MatchWorkflow, PartialCommit, Step, WorkflowAction, WorkflowDeps,
    WorkflowError, WorkflowState, WorkflowView,
};
