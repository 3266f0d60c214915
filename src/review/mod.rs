//! Cross-review stages: peer review, conflict resolution, consensus.

mod conflict;
mod consensus;
mod peer;

pub use conflict::ConflictResolver;
pub use consensus::calculate_consensus;
pub use peer::PeerReviewCoordinator;
