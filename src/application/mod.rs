//! Application layer orchestrating the registration flow.
//!
//! Defines the `RegistrationService`, the entry point for duplicate checks,
//! registrations, payment callbacks and status queries. One service exists per
//! configured event; they share the pending store and payment gateway.

pub mod service;
