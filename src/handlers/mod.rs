// handlers/mod.rs - Handler tiers
//
// Public (no auth) -> Master (JWT, master role) -> Protected (JWT + resolved tenant scope)

pub mod master;
pub mod protected;
pub mod public;
