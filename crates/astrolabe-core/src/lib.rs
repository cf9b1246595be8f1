//! Astrolabe Core Types and Definitions
//!
//! This crate provides the foundational types shared by the Astrolabe layout
//! engine and its front ends. It includes:
//!
//! - **Identifiers**: Interned node/edge identifiers ([`identifier::Id`])
//! - **Geometry**: 3D vectors and bounding boxes ([`geometry`] module)
//! - **Graph**: Node and edge records and their owning store ([`graph`] module)

pub mod geometry;
pub mod graph;
pub mod identifier;
