//! Delivery of finished briefings to readers.
//!
//! - [`email`]: SMTP via `lettre`, HTML body plus attachment

pub mod email;

pub use email::{DeliveryError, EmailSender, EmailSettings};
