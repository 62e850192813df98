pub mod enrichment;
pub mod lifecycle;
pub mod materializer;
pub mod reconcile;
