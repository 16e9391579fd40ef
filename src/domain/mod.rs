//! Core types of the registration flow and the ports it talks through.

pub mod callback;
pub mod checksum;
pub mod event;
pub mod notification;
pub mod ports;
pub mod registration;
