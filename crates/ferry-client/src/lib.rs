//! Client SDK for the Ferry RPC stack.
//!
//! This crate provides the transport half of a remote stub:
//! - Client builder and pooled HTTP/2 connections
//! - Unary calls carrying call metadata and deadlines
//! - Capture of response headers and trailers

pub mod client;

pub use client::{ClientBuilder, ClientConfig, ClientError, FerryClient};
