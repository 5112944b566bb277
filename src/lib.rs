//! Branching chat conversations.
//!
//! A linear, possibly still streaming message array is reconciled into a
//! tree of alternate continuations ([`adapter`]). From the tree and the
//! user's navigation ([`navigation`]) the crate derives which linear path to
//! show and resend ([`resolver`]) and a layered graph of every branch
//! ([`layout`]). [`session::ChatSession`] wires these to a
//! [`transport::ChatTransport`].

pub mod adapter;
pub mod color;
pub mod config;
pub mod error;
pub mod event;
pub mod layout;
pub mod message;
pub mod navigation;
pub mod resolver;
pub mod schedule;
pub mod session;
pub mod style;
pub mod transport;
pub mod tree;
pub mod tui;
