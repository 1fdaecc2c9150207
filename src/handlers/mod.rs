// handlers/mod.rs - two tiers
//
// Public (no auth): `/` and `/health`
// CRM (JWT + tenant resolution): `/api/crm/*`

pub mod crm;
pub mod extract;
pub mod root;

pub use root::{health, root};
