//! # Memory Tags
//!
//! Closed taxonomy used to split allocation statistics by subsystem.

use std::fmt;

/// Subsystem an allocation is charged to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum MemoryTag {
    /// Untagged allocation.
    #[default]
    NoTag = 0,
    /// Objects created through the construction helpers.
    Default,

    // Level
    /// In-bounds level data.
    Foreground,
    /// Out-of-bounds level data.
    Background,
    /// Level interiors.
    Interior,

    // Animation
    /// Standard animation data.
    Animation,
    /// Locomotion animation.
    AnimationLocomotion,
    /// Motion matching databases.
    AnimationMotionMatching,

    // Graphics
    /// Fire, smoke, rain, sparks.
    Particles,
    /// Props and characters.
    Actors,

    // Audio
    /// Global audio state.
    AudioGlobal,
    /// Sound effects.
    AudioSfx,
    /// Music.
    AudioMusic,
    /// Dialogue.
    AudioSpeech,
    /// Non-dialogue character sounds.
    AudioVox,

    // AI
    /// Global AI state.
    Ai,
    /// AI tasks.
    AiTask,
    /// AI brains.
    AiBrain,

    // Misc
    /// Frontend.
    Gui,
    /// Physics.
    Physics,
    /// Cinematics.
    Cinematic,
    /// Lighting.
    Lighting,
    /// Gameplay.
    Gameplay,
    /// Scripting.
    Script,
    /// Multiplayer networking.
    Net,
    /// Debug-only data.
    Debug,
    /// Short-lived scratch data.
    Temp,
}

impl MemoryTag {
    /// Number of tags. Sizes per-tag arrays.
    pub const COUNT: usize = Self::ALL.len();

    /// Every tag, in discriminant order.
    pub const ALL: [Self; 27] = [
        Self::NoTag,
        Self::Default,
        Self::Foreground,
        Self::Background,
        Self::Interior,
        Self::Animation,
        Self::AnimationLocomotion,
        Self::AnimationMotionMatching,
        Self::Particles,
        Self::Actors,
        Self::AudioGlobal,
        Self::AudioSfx,
        Self::AudioMusic,
        Self::AudioSpeech,
        Self::AudioVox,
        Self::Ai,
        Self::AiTask,
        Self::AiBrain,
        Self::Gui,
        Self::Physics,
        Self::Cinematic,
        Self::Lighting,
        Self::Gameplay,
        Self::Script,
        Self::Net,
        Self::Debug,
        Self::Temp,
    ];

    /// Index into per-tag arrays.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoTag => "NoTag",
            Self::Default => "Default",
            Self::Foreground => "Foreground",
            Self::Background => "Background",
            Self::Interior => "Interior",
            Self::Animation => "Animation",
            Self::AnimationLocomotion => "AnimationLocomotion",
            Self::AnimationMotionMatching => "AnimationMotionMatching",
            Self::Particles => "Particles",
            Self::Actors => "Actors",
            Self::AudioGlobal => "AudioGlobal",
            Self::AudioSfx => "AudioSFX",
            Self::AudioMusic => "AudioMusic",
            Self::AudioSpeech => "AudioSpeech",
            Self::AudioVox => "AudioVox",
            Self::Ai => "AI",
            Self::AiTask => "AITask",
            Self::AiBrain => "AIBrain",
            Self::Gui => "GUI",
            Self::Physics => "Physics",
            Self::Cinematic => "Cinematic",
            Self::Lighting => "Lighting",
            Self::Gameplay => "Gameplay",
            Self::Script => "Script",
            Self::Net => "Net",
            Self::Debug => "Debug",
            Self::Temp => "Temp",
        }
    }
}

impl fmt::Display for MemoryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
