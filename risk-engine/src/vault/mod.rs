pub mod summary;

pub use summary::{
    summarize, CapBreach, InitialSnapshot, MissingInput, PendingEdits, SummaryInputs,
    SummaryState, VaultSummary,
};
