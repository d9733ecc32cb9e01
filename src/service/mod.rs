//! # External Collaborators
//!
//! Interfaces to the parts of the server that live outside the gateway.
//!
//! ## Components
//! - **Auth**: `IdentityVerifier`, `GameProfile`, and the HTTP session-server client
//! - **Scheduler**: submit-and-return queue that carries work to the simulation
//! - **World**: the opaque simulation model that receives joins, departures and input

pub mod auth;
pub mod scheduler;
pub mod world;

pub use auth::{GameProfile, HttpSessionVerifier, IdentityVerifier};
pub use scheduler::{ChannelScheduler, Scheduler, TaskQueue, WorldTask};
pub use world::{PlayerAction, World};
