pub mod credit;
pub mod error;
pub mod fetcher;
pub mod orchestrator;
pub mod repository;
pub mod store;

pub use credit::{
    CreditEntry, CreditKind, CreditLedger, CreditPolicy, NoopCreditLedger, TieredCreditPolicy,
};
pub use error::{Result, StoreError, VerifyError};
pub use fetcher::{
    build_fetcher, ApifyEngagementFetcher, EngagementFetcher, FetchError, PostEngagement,
    UnconfiguredFetcher,
};
pub use orchestrator::{apply_attempt, NewSubmission, SubmitOutcome, SweepReport, Verifier};
pub use repository::{MemorySubmissionStore, SubmissionRepository};
pub use store::PgSubmissionStore;
