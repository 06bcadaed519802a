// ── Reconcilers ──
//
// One module per remote entity type, each exposing the same lifecycle:
// create, read, update, delete, exists, import. Every operation takes the
// client handle explicitly and runs to completion on the caller's thread.
// Nothing retries; the first remote failure ends the operation.

pub mod pipeline;
pub mod team;
pub mod toggle;

pub use toggle::Toggle;
