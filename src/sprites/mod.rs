//! Sprite sheet frames and animation clips consumed by unit rendering.

pub mod animation;
pub mod frames;

pub use animation::{AnimationClip, AnimationPlayer};
pub use frames::{slice_frames, SpriteFrame, SpriteSheet};
