//! Dispatches due prayer reminders as push notifications.
//!
//! Each invocation loads the reminder bindings of the configured categories,
//! keeps those due at the current minute and sends them through Firebase
//! Cloud Messaging in batches. Nothing is stored between invocations.

pub mod batch;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod errors;
pub mod fcm;
pub mod handlers;
pub mod job;
pub mod logger;
pub mod reminder;
pub mod selector;

#[cfg(test)]
mod tests;
