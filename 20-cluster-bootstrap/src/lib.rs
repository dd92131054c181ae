//! Cluster bootstrap and peer discovery over plain TCP.
//!
//! A node either starts a cluster on its own or joins one through a single
//! known member: it sends a join request, stores the peer list it gets back,
//! then announces itself to each of those peers. Every connection carries one
//! newline-terminated JSON message in each direction.
//!
//! - [`cli`] parses flags into a [`config::NodeConfig`].
//! - [`message`] defines the wire message, its [`message::Intent`], and the
//!   line codec.
//! - [`registry`] stores each node's peers (in memory or in a JSON file).
//! - [`handler`] decides the reply and registry writes for one message.
//! - [`listener`] accepts connections and runs the handler on each.
//! - [`join`] and [`broadcast`] are the client side of the startup path.
//! - [`node`] ties the pieces together.

pub mod broadcast;
pub mod cli;
pub mod config;
pub mod error;
pub mod handler;
pub mod identity;
pub mod join;
pub mod listener;
pub mod message;
pub mod node;
pub mod registry;
