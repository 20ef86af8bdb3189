//! Presence state and access requirements
//!
//! A [`PresenceState`] is a snapshot of the user's current mode, emotional
//! tone, focus, and social setting. A [`PresenceRequirement`] states what a
//! resource demands. Matching is per field:
//!
//! - mode and emotional tone must be equal
//! - focus must be at least the required level
//! - the social setting must be at least as private as required
//!
//! The first failing field, in that order, is reported as the denial reason.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Broad activity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceMode {
    /// Settled, low-intensity activity
    Calm,
    /// Concentrated on a single task
    Focused,
    /// Open-ended making or brainstorming
    Creative,
    /// Light, recreational activity
    Playful,
    /// Looking back or journaling
    Reflective,
}

/// Emotional tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalTone {
    /// No strong feeling either way
    Neutral,
    /// Affectionate or at ease
    Warm,
    /// Elated
    Joyful,
    /// Stressed or on edge
    Tense,
    /// Low or grieving
    Somber,
}

/// Focus level, ordered from least to most focused
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FocusLevel {
    /// Attention spread across many things
    Scattered,
    /// Easily distracted
    Low,
    /// Ordinary attention
    Moderate,
    /// Sustained attention
    High,
    /// Fully absorbed
    Deep,
}

/// Social setting, ordered from most to least private
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SocialContext {
    /// Nobody else present
    Alone,
    /// One or two trusted people
    Intimate,
    /// A handful of people
    SmallGroup,
    /// Open or shared space
    Public,
}

macro_rules! display_snake_case {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    $(Self::$variant => $name,)+
                })
            }
        }
    };
}

display_snake_case!(PresenceMode {
    Calm => "calm",
    Focused => "focused",
    Creative => "creative",
    Playful => "playful",
    Reflective => "reflective",
});

display_snake_case!(EmotionalTone {
    Neutral => "neutral",
    Warm => "warm",
    Joyful => "joyful",
    Tense => "tense",
    Somber => "somber",
});

display_snake_case!(FocusLevel {
    Scattered => "scattered",
    Low => "low",
    Moderate => "moderate",
    High => "high",
    Deep => "deep",
});

display_snake_case!(SocialContext {
    Alone => "alone",
    Intimate => "intimate",
    SmallGroup => "small_group",
    Public => "public",
});

/// Snapshot of the user's current presence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceState {
    /// Current activity mode
    pub mode: PresenceMode,
    /// Current emotional tone
    pub emotional_tone: EmotionalTone,
    /// Current focus
    pub focus_level: FocusLevel,
    /// Current social setting
    pub social_context: SocialContext,
    /// When this snapshot was taken (defaults to now when deserialized)
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl PresenceState {
    /// Snapshot taken now
    pub fn new(
        mode: PresenceMode,
        emotional_tone: EmotionalTone,
        focus_level: FocusLevel,
        social_context: SocialContext,
    ) -> Self {
        Self {
            mode,
            emotional_tone,
            focus_level,
            social_context,
            timestamp: Utc::now(),
        }
    }

    /// Age of the snapshot relative to `now`
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.timestamp)
    }

    /// Whether the snapshot is older than `max_age` at `now`
    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age_at(now) > max_age
    }
}

impl Default for PresenceState {
    /// Neutral, moderately focused, alone
    fn default() -> Self {
        Self::new(
            PresenceMode::Calm,
            EmotionalTone::Neutral,
            FocusLevel::Moderate,
            SocialContext::Alone,
        )
    }
}

/// Presence a resource demands before it can be unlocked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRequirement {
    /// Mode that must match exactly
    pub mode: PresenceMode,
    /// Tone that must match exactly
    pub emotional_tone: EmotionalTone,
    /// Minimum focus
    pub focus_level: FocusLevel,
    /// Least private setting allowed
    pub social_context: SocialContext,
}

impl PresenceRequirement {
    /// Create a requirement
    pub fn new(
        mode: PresenceMode,
        emotional_tone: EmotionalTone,
        focus_level: FocusLevel,
        social_context: SocialContext,
    ) -> Self {
        Self {
            mode,
            emotional_tone,
            focus_level,
            social_context,
        }
    }

    /// First mismatch between `state` and this requirement, if any
    pub fn mismatch(&self, state: &PresenceState) -> Option<String> {
        if state.mode != self.mode {
            return Some(format!(
                "presence mode {} does not match required {}",
                state.mode, self.mode
            ));
        }
        if state.emotional_tone != self.emotional_tone {
            return Some(format!(
                "emotional tone {} does not match required {}",
                state.emotional_tone, self.emotional_tone
            ));
        }
        if state.focus_level < self.focus_level {
            return Some(format!(
                "focus level {} below required {}",
                state.focus_level, self.focus_level
            ));
        }
        if state.social_context > self.social_context {
            return Some(format!(
                "social context {} less private than required {}",
                state.social_context, self.social_context
            ));
        }
        None
    }

    /// Whether `state` satisfies this requirement
    pub fn is_satisfied_by(&self, state: &PresenceState) -> bool {
        self.mismatch(state).is_none()
    }
}

impl From<&PresenceState> for PresenceRequirement {
    /// Requirement matched exactly by `state`
    fn from(state: &PresenceState) -> Self {
        Self::new(
            state.mode,
            state.emotional_tone,
            state.focus_level,
            state.social_context,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(focus: FocusLevel, social: SocialContext) -> PresenceState {
        PresenceState::new(PresenceMode::Focused, EmotionalTone::Neutral, focus, social)
    }

    fn requirement(focus: FocusLevel, social: SocialContext) -> PresenceRequirement {
        PresenceRequirement::new(PresenceMode::Focused, EmotionalTone::Neutral, focus, social)
    }

    #[test]
    fn test_exact_match_satisfies() {
        let s = state(FocusLevel::High, SocialContext::Alone);
        let r = PresenceRequirement::from(&s);
        assert!(r.is_satisfied_by(&s));
    }

    #[test]
    fn test_higher_focus_satisfies() {
        let r = requirement(FocusLevel::Moderate, SocialContext::Public);
        assert!(r.is_satisfied_by(&state(FocusLevel::Deep, SocialContext::Alone)));
        assert!(r.is_satisfied_by(&state(FocusLevel::Moderate, SocialContext::Alone)));
    }

    #[test]
    fn test_lower_focus_reports_reason() {
        let r = requirement(FocusLevel::Deep, SocialContext::Public);
        let reason = r
            .mismatch(&state(FocusLevel::Scattered, SocialContext::Alone))
            .unwrap();
        assert_eq!(reason, "focus level scattered below required deep");
    }

    #[test]
    fn test_more_public_setting_denied() {
        let r = requirement(FocusLevel::Low, SocialContext::Intimate);
        assert!(r.is_satisfied_by(&state(FocusLevel::Low, SocialContext::Alone)));
        assert!(r.is_satisfied_by(&state(FocusLevel::Low, SocialContext::Intimate)));

        let reason = r
            .mismatch(&state(FocusLevel::Low, SocialContext::Public))
            .unwrap();
        assert_eq!(
            reason,
            "social context public less private than required intimate"
        );
    }

    #[test]
    fn test_mode_checked_first() {
        let r = requirement(FocusLevel::Deep, SocialContext::Alone);
        let s = PresenceState::new(
            PresenceMode::Playful,
            EmotionalTone::Tense,
            FocusLevel::Scattered,
            SocialContext::Public,
        );
        let reason = r.mismatch(&s).unwrap();
        assert!(reason.starts_with("presence mode playful"));
    }

    #[test]
    fn test_tone_mismatch() {
        let r = requirement(FocusLevel::Low, SocialContext::Public);
        let s = PresenceState::new(
            PresenceMode::Focused,
            EmotionalTone::Warm,
            FocusLevel::Deep,
            SocialContext::Alone,
        );
        assert_eq!(
            r.mismatch(&s).unwrap(),
            "emotional tone warm does not match required neutral"
        );
    }

    #[test]
    fn test_staleness() {
        let mut s = PresenceState::default();
        let now = Utc::now();
        s.timestamp = now - Duration::seconds(120);

        assert!(s.is_stale(Duration::seconds(60), now));
        assert!(!s.is_stale(Duration::seconds(300), now));
        assert_eq!(s.age_at(now).num_seconds(), 120);
    }

    #[test]
    fn test_serde_snake_case() {
        let r = requirement(FocusLevel::High, SocialContext::SmallGroup);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["social_context"], "small_group");
        assert_eq!(json["focus_level"], "high");

        let parsed: PresenceRequirement = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, r);
    }

    #[test]
    fn test_state_without_timestamp_is_fresh() {
        let json = r#"{
            "mode": "calm",
            "emotional_tone": "neutral",
            "focus_level": "deep",
            "social_context": "alone"
        }"#;
        let state: PresenceState = serde_json::from_str(json).unwrap();
        assert_eq!(state.focus_level, FocusLevel::Deep);
        assert!(state.age_at(Utc::now()).num_seconds() < 5);
    }
}
