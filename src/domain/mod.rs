//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `subscription` - Subscription aggregate, transition engine, dunning and
//!   provider event decoding

pub mod foundation;
pub mod subscription;
