//! Borderless Common Types
//!
//! Shared types used across the Borderless wallet ledger: wallet and
//! transaction identifiers, the closed currency set, amount handling and the
//! ledger error taxonomy.

pub mod identifiers;
pub mod monetary;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
pub use time::*;
