//! Animation clips over sprite sheet frames.

use serde::{Deserialize, Serialize};

/// A named run of frames in a unit's sprite sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    /// First frame index in the sheet.
    #[serde(alias = "startFrame")]
    pub start_frame: u32,
    /// Number of frames in the clip.
    #[serde(alias = "frameCount")]
    pub frame_count: u32,
    /// Milliseconds per frame.
    #[serde(default = "default_frame_duration", alias = "frameDuration")]
    pub frame_duration_ms: u64,
    /// Whether the clip restarts after the last frame.
    #[serde(default, rename = "loop", alias = "looping")]
    pub looping: bool,
}

fn default_frame_duration() -> u64 {
    100
}

impl AnimationClip {
    /// Exclusive end frame index in the sheet, `None` if it overflows.
    pub fn end_frame(&self) -> Option<u32> {
        self.start_frame.checked_add(self.frame_count)
    }

    /// Check the clip fits a sheet of `total` frames.
    pub fn validate(&self, total: u32) -> Result<(), String> {
        match self.end_frame() {
            Some(end) if end <= total => Ok(()),
            Some(end) => Err(format!(
                "uses frames {}..{} but the sheet has {}",
                self.start_frame, end, total
            )),
            None => Err(format!(
                "{} frames starting at {} run past the last frame index",
                self.frame_count, self.start_frame
            )),
        }
    }

    /// Wall time of one pass through the clip.
    pub fn duration_ms(&self) -> u64 {
        self.frame_duration_ms.saturating_mul(self.frame_count as u64)
    }

    /// Sheet frame shown `elapsed_ms` after the clip started.
    ///
    /// Non-looping clips hold their last frame.
    pub fn frame_at(&self, elapsed_ms: u64) -> u32 {
        if self.frame_count == 0 || self.frame_duration_ms == 0 {
            return self.start_frame;
        }
        let step = elapsed_ms / self.frame_duration_ms;
        let offset = if self.looping {
            step % self.frame_count as u64
        } else {
            step.min(self.frame_count as u64 - 1)
        };
        self.start_frame.saturating_add(offset as u32)
    }
}

/// Controls playback of one clip for a single unit.
#[derive(Clone, Debug, Default)]
pub struct AnimationPlayer {
    /// Key of the clip being played.
    pub current_key: Option<String>,
    /// Current frame offset within the clip.
    pub current_frame: u32,
    /// Time accumulator for frame advancement (milliseconds).
    pub frame_timer: u64,
    /// Whether the current clip has finished (non-looping only).
    pub finished: bool,
}

impl AnimationPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to a clip. Resets the frame if the key changed.
    pub fn play(&mut self, key: &str) {
        if self.current_key.as_deref() != Some(key) {
            self.current_key = Some(key.to_string());
            self.current_frame = 0;
            self.frame_timer = 0;
            self.finished = false;
        }
    }

    /// Start a clip from its first frame, even if it is already playing.
    pub fn restart(&mut self, key: &str) {
        self.current_key = None;
        self.play(key);
    }

    /// Advance playback, returns true if the frame changed.
    pub fn update(&mut self, dt_ms: u64, clip: &AnimationClip) -> bool {
        if self.finished || clip.frame_count == 0 || clip.frame_duration_ms == 0 {
            return false;
        }

        self.frame_timer += dt_ms;
        if self.frame_timer < clip.frame_duration_ms {
            return false;
        }

        while self.frame_timer >= clip.frame_duration_ms && !self.finished {
            self.frame_timer -= clip.frame_duration_ms;
            let next = self.current_frame + 1;
            if next >= clip.frame_count {
                if clip.looping {
                    self.current_frame = 0;
                } else {
                    self.current_frame = clip.frame_count - 1;
                    self.finished = true;
                }
            } else {
                self.current_frame = next;
            }
        }
        true
    }

    /// Frame index in the sheet for the current state.
    pub fn sheet_frame(&self, clip: &AnimationClip) -> u32 {
        clip.start_frame.saturating_add(self.current_frame)
    }
}
