pub mod reconcile;
pub mod reference_index;
pub mod reprocess;
