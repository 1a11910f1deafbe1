//! Visitguard - Request Rate Limiting for Booking Endpoints
//!
//! This crate implements the sliding-window rate limiter that protects a
//! booking site's public endpoints (postcode check, booking, enquiry) from
//! abuse. Callers identify themselves with an opaque string, usually a
//! client address, and receive a yes/no admission decision, either in
//! process through [`ratelimit::RateLimiter`] or over HTTP through
//! [`http::router`].

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
