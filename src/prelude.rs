//! `use bevy_navmesh_steering_plugin::prelude::*;` to import common structures and methods
//!

#[doc(hidden)]
pub use crate::navigation::{
	agent::*, agent_grid::*, navmesh::*, pathing::*, steering::*, stuck::*, triangle_index::*, *,
};

#[doc(hidden)]
pub use crate::{
	bundle::*,
	plugin::{nav_layer::*, *},
};
