//! Back-office core for a municipal business-permit portal.
//!
//! The crate models the only part of the portal with real invariants: the
//! approval ledger shared by the department assessors, the role gating that
//! sequences their work, the tax assessment Treasury issues from the ledger,
//! the three payment settlement channels, and the claim release that follows
//! full payment. Everything visual or transport-shaped lives behind the
//! traits in [`workflows::permit::repository`] and the collaborator seams on
//! the service.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
