//! Darkroom - order and payment backend for a print studio storefront
//!
//! This library provides the order/payment lifecycle core: idempotent
//! payment-intent creation, Stripe webhook verification, webhook-driven
//! order status transitions, and the HTTP surface around them.

pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod rate_limit;
