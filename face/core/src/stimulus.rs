//! Stimulus Mapper
//!
//! The only place in the crate that looks at strings. Utterances are
//! classified into a [`StimulusEvent`] by keyword containment, touch codes
//! come in already structured, and [`reaction`] turns either into what the
//! face should do.
//!
//! # Keyword priority
//!
//! Groups are checked in a fixed order and the first hit wins. The order is
//! a contract: keyword sets overlap ("i don't love" contains "love"), and the
//! earlier group always takes it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::frames::AnimationName;
use crate::volume::VolumeChange;

/// Where the touch sensor was tapped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Touch {
    /// Top of the head, tapped 1-3 times
    Head {
        /// Tap count
        taps: u8,
    },
    /// Left cheek
    CheekLeft,
    /// Right cheek
    CheekRight,
    /// Both cheeks at once
    CheekBoth,
}

impl Touch {
    /// Most taps the head sensor distinguishes
    pub const MAX_HEAD_TAPS: u8 = 3;

    /// Head touch with the tap count clamped to `1..=3`
    #[must_use]
    pub fn head(taps: u8) -> Self {
        Self::Head {
            taps: taps.clamp(1, Self::MAX_HEAD_TAPS),
        }
    }
}

impl fmt::Display for Touch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Head { taps } => write!(f, "head×{taps}"),
            Self::CheekLeft => f.write_str("cheek_left"),
            Self::CheekRight => f.write_str("cheek_right"),
            Self::CheekBoth => f.write_str("cheek_both"),
        }
    }
}

/// Symbolic stimulus consumed by the expression machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulusEvent {
    /// Going to sleep
    Sleep,
    /// Someone is too close to the screen
    Proximity,
    /// Phone usage detected
    Phone,
    /// Affection
    Love,
    /// Dislike
    Hate,
    /// Asked to be quiet
    Silence,
    /// Joke told
    Laugh,
    /// Focus mode on
    FocusOn,
    /// Focus mode off
    FocusOff,
    /// Nothing in particular
    Idle,
    /// Touch sensor
    Touch(Touch),
}

impl StimulusEvent {
    /// Parse a command token: a catalog event name, a touch identifier, or
    /// one of the short command aliases
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim().to_lowercase();
        let event = match token.as_str() {
            "sleep" => Self::Sleep,
            "proximity" => Self::Proximity,
            "phone" => Self::Phone,
            "love" => Self::Love,
            "hate" => Self::Hate,
            "silence" => Self::Silence,
            "laugh" | "happy" | "joke" => Self::Laugh,
            "focus_on" | "focus" => Self::FocusOn,
            "focus_off" | "unfocus" => Self::FocusOff,
            "idle" | "idle_center" => Self::Idle,
            "angry" => Self::Touch(Touch::head(1)),
            "blush" => Self::Touch(Touch::head(2)),
            "cheek_left" => Self::Touch(Touch::CheekLeft),
            "cheek_right" => Self::Touch(Touch::CheekRight),
            "cheek_both" => Self::Touch(Touch::CheekBoth),
            other => return parse_head(other).map(Self::Touch),
        };
        Some(event)
    }
}

/// `head`, `head2`, `head×3`, `headx2`
fn parse_head(token: &str) -> Option<Touch> {
    let rest = token.strip_prefix("head")?;
    let rest = rest.trim_start_matches(['×', 'x', '*', '_']);
    if rest.is_empty() {
        return Some(Touch::head(1));
    }
    rest.parse::<u8>().ok().map(Touch::head)
}

impl fmt::Display for StimulusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sleep => f.write_str("sleep"),
            Self::Proximity => f.write_str("proximity"),
            Self::Phone => f.write_str("phone"),
            Self::Love => f.write_str("love"),
            Self::Hate => f.write_str("hate"),
            Self::Silence => f.write_str("silence"),
            Self::Laugh => f.write_str("laugh"),
            Self::FocusOn => f.write_str("focus_on"),
            Self::FocusOff => f.write_str("focus_off"),
            Self::Idle => f.write_str("idle"),
            Self::Touch(touch) => write!(f, "touch:{touch}"),
        }
    }
}

/// What the face does in response to a stimulus
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    /// Play an expression
    Animate(AnimationName),
    /// Return to the resting face
    Rest,
    /// Change the speaker volume; the display is untouched
    AdjustVolume(VolumeChange),
}

/// Keyword groups in priority order
pub const KEYWORD_GROUPS: &[(StimulusEvent, &[&str])] = &[
    (
        StimulusEvent::Sleep,
        &["sleep", "go to sleep", "sleep mode", "going to sleep"],
    ),
    (
        StimulusEvent::Proximity,
        &[
            "proximity",
            "too close",
            "close to the screen",
            "close to screen",
            "come closer",
            "you are close",
            "you're close",
            "move back",
            "back up",
            "sit back",
            "distance",
        ],
    ),
    (
        StimulusEvent::Phone,
        &[
            "phone",
            "mobile",
            "cell",
            "cellphone",
            "smartphone",
            "scroll",
            "scrolling",
            "instagram",
            "reels",
            "tiktok",
            "youtube shorts",
            "using phone",
            "on my phone",
            "picked up my phone",
            "device",
        ],
    ),
    (
        StimulusEvent::Love,
        &[
            "love",
            "i love you",
            "i love u",
            "love you",
            "heart",
            "\u{2764}\u{fe0f}",
            "\u{2764}",
            "\u{2665}",
        ],
    ),
    (
        StimulusEvent::Hate,
        &[
            "hate",
            "i hate you",
            "dislike",
            "i dislike",
            "dont like",
            "don't like",
            "i dont like",
            "i don't like",
            "i dont love",
            "i don't love",
        ],
    ),
    (
        StimulusEvent::Silence,
        &["silence", "mute", "be quiet", "quiet", "stop talking", "shut up"],
    ),
    (StimulusEvent::Laugh, &["joke", "funny", "make me laugh"]),
    (
        StimulusEvent::FocusOn,
        &[
            "focus mode on",
            "focus on",
            "turn on focus",
            "enable focus",
            "start focus",
        ],
    ),
    (
        StimulusEvent::FocusOff,
        &[
            "focus mode off",
            "focus off",
            "turn off focus",
            "disable focus",
            "stop focus",
        ],
    ),
];

/// Classify free text by case-insensitive keyword containment
///
/// Never fails: text matching no group is [`StimulusEvent::Idle`].
#[must_use]
pub fn classify_utterance(text: &str) -> StimulusEvent {
    let text = text.trim().to_lowercase();

    KEYWORD_GROUPS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map_or(StimulusEvent::Idle, |(event, _)| *event)
}

/// Map a stimulus to the face's reaction
#[must_use]
pub fn reaction(event: StimulusEvent) -> Reaction {
    use StimulusEvent as E;

    match event {
        E::Sleep => Reaction::Animate(AnimationName::Sleep),
        E::Proximity => Reaction::Animate(AnimationName::Proximity),
        E::Phone => Reaction::Animate(AnimationName::Phone),
        E::Love => Reaction::Animate(AnimationName::Love),
        E::Hate => Reaction::Animate(AnimationName::Hate),
        E::Silence => Reaction::Animate(AnimationName::Silence),
        E::Laugh => Reaction::Animate(AnimationName::Laugh),
        E::FocusOn => Reaction::Animate(AnimationName::FocusOn),
        E::FocusOff => Reaction::Animate(AnimationName::FocusOff),
        E::Idle => Reaction::Rest,
        E::Touch(touch) => touch_reaction(touch),
    }
}

fn touch_reaction(touch: Touch) -> Reaction {
    match touch {
        Touch::Head { taps: 0 | 1 } => Reaction::Animate(AnimationName::Angry),
        Touch::Head { taps: 2 } => Reaction::Animate(AnimationName::Blush),
        Touch::Head { .. } => Reaction::Animate(AnimationName::Sleep),
        Touch::CheekLeft => Reaction::AdjustVolume(VolumeChange::Down),
        Touch::CheekRight => Reaction::AdjustVolume(VolumeChange::Up),
        Touch::CheekBoth => Reaction::Animate(AnimationName::Love),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_group_maps_its_own_phrase() {
        let cases = [
            ("time to sleep now", StimulusEvent::Sleep),
            ("you are too close", StimulusEvent::Proximity),
            ("I picked up my phone", StimulusEvent::Phone),
            ("I love you", StimulusEvent::Love),
            ("I hate mondays", StimulusEvent::Hate),
            ("please be quiet", StimulusEvent::Silence),
            ("tell me a joke", StimulusEvent::Laugh),
            ("turn on focus", StimulusEvent::FocusOn),
            ("turn off focus", StimulusEvent::FocusOff),
            ("what's the weather", StimulusEvent::Idle),
        ];

        for (phrase, expected) in cases {
            assert_eq!(classify_utterance(phrase), expected, "phrase: {phrase}");
        }
    }

    #[test]
    fn test_sleep_outranks_love() {
        assert_eq!(
            classify_utterance("I love to sleep"),
            StimulusEvent::Sleep
        );
    }

    #[test]
    fn test_love_shadows_negated_love() {
        // "i don't love" is listed under hate, but love is checked first
        assert_eq!(classify_utterance("I don't love you"), StimulusEvent::Love);
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        assert_eq!(classify_utterance("SHUT UP"), StimulusEvent::Silence);
        assert_eq!(classify_utterance("  Focus Mode On "), StimulusEvent::FocusOn);
    }

    #[test]
    fn test_heart_symbol_is_love() {
        assert_eq!(classify_utterance("\u{2764}\u{fe0f}"), StimulusEvent::Love);
        assert_eq!(classify_utterance("\u{2665}"), StimulusEvent::Love);
    }

    #[test]
    fn test_empty_text_is_idle() {
        assert_eq!(classify_utterance(""), StimulusEvent::Idle);
        assert_eq!(reaction(StimulusEvent::Idle), Reaction::Rest);
    }

    #[test]
    fn test_touch_table() {
        assert_eq!(
            reaction(StimulusEvent::Touch(Touch::head(1))),
            Reaction::Animate(AnimationName::Angry)
        );
        assert_eq!(
            reaction(StimulusEvent::Touch(Touch::head(2))),
            Reaction::Animate(AnimationName::Blush)
        );
        assert_eq!(
            reaction(StimulusEvent::Touch(Touch::head(3))),
            Reaction::Animate(AnimationName::Sleep)
        );
        assert_eq!(
            reaction(StimulusEvent::Touch(Touch::CheekLeft)),
            Reaction::AdjustVolume(VolumeChange::Down)
        );
        assert_eq!(
            reaction(StimulusEvent::Touch(Touch::CheekRight)),
            Reaction::AdjustVolume(VolumeChange::Up)
        );
        assert_eq!(
            reaction(StimulusEvent::Touch(Touch::CheekBoth)),
            Reaction::Animate(AnimationName::Love)
        );
    }

    #[test]
    fn test_head_taps_are_clamped() {
        assert_eq!(Touch::head(0), Touch::Head { taps: 1 });
        assert_eq!(Touch::head(9), Touch::Head { taps: 3 });
    }

    #[test]
    fn test_tokens() {
        assert_eq!(StimulusEvent::from_token("happy"), Some(StimulusEvent::Laugh));
        assert_eq!(StimulusEvent::from_token("Unfocus"), Some(StimulusEvent::FocusOff));
        assert_eq!(
            StimulusEvent::from_token("head×2"),
            Some(StimulusEvent::Touch(Touch::head(2)))
        );
        assert_eq!(
            StimulusEvent::from_token("head3"),
            Some(StimulusEvent::Touch(Touch::head(3)))
        );
        assert_eq!(
            StimulusEvent::from_token("head"),
            Some(StimulusEvent::Touch(Touch::head(1)))
        );
        assert_eq!(
            StimulusEvent::from_token("blush"),
            Some(StimulusEvent::Touch(Touch::head(2)))
        );
        assert_eq!(StimulusEvent::from_token("headache"), None);
        assert_eq!(StimulusEvent::from_token("dance"), None);
    }

    #[test]
    fn test_every_non_touch_event_animates_or_rests() {
        let events = [
            StimulusEvent::Sleep,
            StimulusEvent::Proximity,
            StimulusEvent::Phone,
            StimulusEvent::Love,
            StimulusEvent::Hate,
            StimulusEvent::Silence,
            StimulusEvent::Laugh,
            StimulusEvent::FocusOn,
            StimulusEvent::FocusOff,
        ];
        for event in events {
            assert!(
                matches!(reaction(event), Reaction::Animate(name) if !name.is_idle()),
                "{event} should animate"
            );
        }
    }
}
