//! Battle Stage - turn-based sprite battle orchestration
//!
//! - `battle`: roster, action queue, action resolution and the turn controller
//! - `steps`: declarative skill choreography played through a scene binding
//! - `sprites`: sprite sheet slicing and animation clips
//! - `core`: ids, settings and errors shared by everything above

pub mod battle;
pub mod core;
pub mod sprites;
pub mod steps;
