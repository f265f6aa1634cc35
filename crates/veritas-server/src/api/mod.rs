//! API routes and handlers

mod health;
mod models;
mod predict;
mod router;

pub use router::create_router;
