//! This is a plugin for Bevy game engine to steer crowds of agents across a triangulated
//! navigation mesh, tick by tick
//!

pub mod navigation;
pub mod bundle;
pub mod plugin;

pub mod prelude;
