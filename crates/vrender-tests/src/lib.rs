//! Integration test crate for VRender.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! Everything runs against the recording backend; no GPU is required.

#[cfg(test)]
mod geometry;

#[cfg(test)]
mod presentation;

#[cfg(test)]
mod upload;
