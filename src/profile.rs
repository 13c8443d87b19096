use serde::Serialize;

/// Leading character that turns the next character into a command letter.
pub const COMMAND_MARKER: char = '/';

/// Sampling parameters sent to the inference endpoint as `options`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationProfile {
    pub num_predict: u32,
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub repeat_penalty: f64,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
}

pub const SHORT: GenerationProfile = GenerationProfile {
    num_predict: 100,
    temperature: 0.7,
    top_k: 40,
    top_p: 0.9,
    repeat_penalty: 1.1,
    presence_penalty: 0.0,
    frequency_penalty: 0.0,
};

pub const NORMAL: GenerationProfile = GenerationProfile {
    num_predict: 250,
    temperature: 0.7,
    top_k: 40,
    top_p: 0.9,
    repeat_penalty: 1.1,
    presence_penalty: 0.0,
    frequency_penalty: 0.0,
};

pub const LONG: GenerationProfile = GenerationProfile {
    num_predict: 500,
    temperature: 0.8,
    top_k: 40,
    top_p: 0.9,
    repeat_penalty: 1.1,
    presence_penalty: 0.0,
    frequency_penalty: 0.0,
};

/// The closed set of profiles a user can pick with a command letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileKind {
    #[default]
    Short,
    Normal,
    Long,
}

impl ProfileKind {
    fn from_command_letter(letter: char) -> Option<Self> {
        match letter {
            's' => Some(ProfileKind::Short),
            'n' => Some(ProfileKind::Normal),
            'l' => Some(ProfileKind::Long),
            _ => None,
        }
    }

    pub fn profile(self) -> &'static GenerationProfile {
        match self {
            ProfileKind::Short => &SHORT,
            ProfileKind::Normal => &NORMAL,
            ProfileKind::Long => &LONG,
        }
    }
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileKind::Short => write!(f, "short"),
            ProfileKind::Normal => write!(f, "normal"),
            ProfileKind::Long => write!(f, "long"),
        }
    }
}

/// Pick the profile for a message.
///
/// Only the first two characters of the trimmed text are looked at: the
/// marker and the command letter right after it. Anything else, including a
/// bare marker, falls back to the default profile.
pub fn select_profile(text: &str) -> ProfileKind {
    let mut chars = text.trim().chars();
    if chars.next() != Some(COMMAND_MARKER) {
        return ProfileKind::default();
    }
    chars
        .next()
        .and_then(ProfileKind::from_command_letter)
        .unwrap_or_default()
}
