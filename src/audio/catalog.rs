//! Dashboard playlist catalog.
//!
//! Maps a discovery method and an age group to one of six recorded variants
//! per method. Files live under [`AUDIO_BASE_PATH`] and are named
//! `<prefix>-<n>.mp3`, where `n` orders the variants as:
//!
//! | n | age group | relationship |
//! |---|-----------|--------------|
//! | 1 | 18-34     | casual       |
//! | 2 | 18-34     | strong       |
//! | 3 | 35-54     | casual       |
//! | 4 | 35-54     | strong       |
//! | 5 | 55+       | casual       |
//! | 6 | 55+       | strong       |
//!
//! Known age groups always resolve to the strong variant. Casual variants are
//! only reached through the random fallback for an unknown age group.

use rand::Rng;
use serde::Serialize;

/// Directory holding the playlist files.
pub const AUDIO_BASE_PATH: &str = "/audio/dashboard-playlist/";

/// Number of variants recorded per method.
pub const VARIANTS_PER_METHOD: u8 = 6;

/// How the listener discovers music. Serializes as its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryMethod {
    Radio,
    FriendsAndFamily,
    Streaming,
    SocialMedia,
    LiveEvents,
}

impl DiscoveryMethod {
    pub const ALL: [DiscoveryMethod; 5] = [
        DiscoveryMethod::Radio,
        DiscoveryMethod::FriendsAndFamily,
        DiscoveryMethod::Streaming,
        DiscoveryMethod::SocialMedia,
        DiscoveryMethod::LiveEvents,
    ];

    /// The name used by the quiz and dashboard.
    pub fn display_name(&self) -> &'static str {
        match self {
            DiscoveryMethod::Radio => "Radio",
            DiscoveryMethod::FriendsAndFamily => "Friends and family recommendations",
            DiscoveryMethod::Streaming => "Streaming service recommendations",
            DiscoveryMethod::SocialMedia => "Social media",
            DiscoveryMethod::LiveEvents => "Live events and concerts",
        }
    }

    /// File name prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiscoveryMethod::Radio => "radio",
            DiscoveryMethod::FriendsAndFamily => "friends",
            DiscoveryMethod::Streaming => "streaming",
            DiscoveryMethod::SocialMedia => "social",
            DiscoveryMethod::LiveEvents => "concerts",
        }
    }

    /// Parses a display name, ignoring case and surrounding whitespace.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.display_name().eq_ignore_ascii_case(name))
    }
}

impl Serialize for DiscoveryMethod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.display_name())
    }
}

impl std::fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Listener age band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AgeGroup {
    #[serde(rename = "18-34")]
    From18To34,
    #[serde(rename = "35-54")]
    From35To54,
    #[serde(rename = "55+")]
    From55,
}

impl AgeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::From18To34 => "18-34",
            AgeGroup::From35To54 => "35-54",
            AgeGroup::From55 => "55+",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "18-34" => Some(AgeGroup::From18To34),
            "35-54" => Some(AgeGroup::From35To54),
            "55+" => Some(AgeGroup::From55),
            _ => None,
        }
    }

    /// Variant number of the strong-connection recording for this band.
    pub fn strong_variant(&self) -> u8 {
        match self {
            AgeGroup::From18To34 => 2,
            AgeGroup::From35To54 => 4,
            AgeGroup::From55 => 6,
        }
    }
}

/// How strongly the listener connects with the method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    Casual,
    Strong,
}

/// A resolved playlist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub method: DiscoveryMethod,
    /// Variant number, 1 to 6.
    pub variant: u8,
    pub age_group: AgeGroup,
    pub relationship: Relationship,
    pub title: &'static str,
    /// Asset path, e.g. `/audio/dashboard-playlist/radio-2.mp3`.
    pub path: String,
    /// True if the variant was picked at random.
    pub fallback: bool,
}

impl Track {
    /// Builds the track for a method and variant. Returns None for a variant
    /// outside 1..=6.
    pub fn new(method: DiscoveryMethod, variant: u8) -> Option<Self> {
        if !(1..=VARIANTS_PER_METHOD).contains(&variant) {
            return None;
        }
        let age_group = match variant {
            1 | 2 => AgeGroup::From18To34,
            3 | 4 => AgeGroup::From35To54,
            _ => AgeGroup::From55,
        };
        let relationship = if variant % 2 == 0 {
            Relationship::Strong
        } else {
            Relationship::Casual
        };
        Some(Self {
            method,
            variant,
            age_group,
            relationship,
            title: title(method, variant),
            path: asset_path(method, variant),
            fallback: false,
        })
    }
}

/// Asset path for a method and variant.
pub fn asset_path(method: DiscoveryMethod, variant: u8) -> String {
    format!("{}{}-{}.mp3", AUDIO_BASE_PATH, method.prefix(), variant)
}

/// Song title of a variant. Variants outside 1..=6 have no title.
pub fn title(method: DiscoveryMethod, variant: u8) -> &'static str {
    use DiscoveryMethod::*;

    let titles: [&'static str; 6] = match method {
        Radio => [
            "Turn It Up",
            "Turn the Dial",
            "Static Heartbeats",
            "Frequency Love",
            "On The Air",
            "Golden Frequencies",
        ],
        FriendsAndFamily => [
            "Friendship in Stereo",
            "All My Friends Are the Stars",
            "Echoes in the Hallway",
            "Echoes of Us",
            "Golden Years Groove",
            "Golden Days",
        ],
        Streaming => [
            "Background Noise",
            "Deep Dive",
            "Easy Living",
            "Waves of Discovery",
            "Golden Days",
            "Golden Tides",
        ],
        SocialMedia => [
            "Digital Glow",
            "Viral Harmony",
            "Middle of the Feed",
            "Echoes in the Feed",
            "Golden Hours",
            "Echoes in the Scroll",
        ],
        LiveEvents => [
            "Under the Neon Lights",
            "Rare Sparks",
            "Dancing in the Dark",
            "Live Sparks",
            "Silver Echoes",
            "Echoes of the Night",
        ],
    };

    variant
        .checked_sub(1)
        .and_then(|i| titles.get(i as usize))
        .copied()
        .unwrap_or("")
}

/// Resolves a method name and age group to a track.
///
/// An unknown method resolves to nothing. An unknown age group resolves to a
/// uniformly random variant of the method.
pub fn resolve<R: Rng + ?Sized>(method: &str, age_group: &str, rng: &mut R) -> Option<Track> {
    let method = DiscoveryMethod::parse(method)?;
    match AgeGroup::parse(age_group) {
        Some(age) => Track::new(method, age.strong_variant()),
        None => {
            let variant = rng.gen_range(1..=VARIANTS_PER_METHOD);
            Track::new(method, variant).map(|mut track| {
                track.fallback = true;
                track
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn radio_resolves_to_strong_variants() {
        let mut rng = rng();
        let paths: Vec<String> = ["18-34", "35-54", "55+"]
            .iter()
            .map(|age| resolve("Radio", age, &mut rng).unwrap().path)
            .collect();
        assert_eq!(
            paths,
            vec![
                "/audio/dashboard-playlist/radio-2.mp3",
                "/audio/dashboard-playlist/radio-4.mp3",
                "/audio/dashboard-playlist/radio-6.mp3",
            ]
        );
    }

    #[test]
    fn every_method_has_a_prefix() {
        let mut rng = rng();
        let cases = [
            ("Friends and family recommendations", "friends-2.mp3"),
            ("Streaming service recommendations", "streaming-2.mp3"),
            ("Social media", "social-2.mp3"),
            ("Live events and concerts", "concerts-2.mp3"),
        ];
        for (method, file) in cases {
            let track = resolve(method, "18-34", &mut rng).unwrap();
            assert!(track.path.ends_with(file), "{} -> {}", method, track.path);
            assert_eq!(track.relationship, Relationship::Strong);
            assert!(!track.fallback);
        }
    }

    #[test]
    fn method_names_are_normalized() {
        assert_eq!(DiscoveryMethod::parse("  radio "), Some(DiscoveryMethod::Radio));
        assert_eq!(
            DiscoveryMethod::parse("SOCIAL MEDIA"),
            Some(DiscoveryMethod::SocialMedia)
        );
        assert_eq!(DiscoveryMethod::parse("Unknown Method"), None);
    }

    #[test]
    fn unknown_method_resolves_to_nothing() {
        assert!(resolve("Unknown Method", "18-34", &mut rng()).is_none());
        assert!(resolve("Unknown Method", "70+", &mut rng()).is_none());
    }

    #[test]
    fn unknown_age_group_picks_random_variant() {
        let mut rng = rng();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let track = resolve("Radio", "70+", &mut rng).unwrap();
            assert!(track.fallback);
            assert!((1..=6).contains(&track.variant));
            seen.insert(track.variant);
        }
        assert_eq!(seen.len(), 6, "casual variants reachable only here");
    }

    #[test]
    fn variant_layout() {
        let casual = Track::new(DiscoveryMethod::Streaming, 3).unwrap();
        assert_eq!(casual.age_group, AgeGroup::From35To54);
        assert_eq!(casual.relationship, Relationship::Casual);
        assert_eq!(casual.title, "Easy Living");

        let strong = Track::new(DiscoveryMethod::LiveEvents, 6).unwrap();
        assert_eq!(strong.age_group, AgeGroup::From55);
        assert_eq!(strong.title, "Echoes of the Night");

        assert!(Track::new(DiscoveryMethod::Radio, 0).is_none());
        assert!(Track::new(DiscoveryMethod::Radio, 7).is_none());
    }

    #[test]
    fn titles_present_for_all_variants() {
        for method in DiscoveryMethod::ALL {
            for variant in 1..=VARIANTS_PER_METHOD {
                assert!(!title(method, variant).is_empty());
            }
            assert_eq!(title(method, 0), "");
            assert_eq!(title(method, 7), "");
        }
    }

    #[test]
    fn track_serializes_display_fields() {
        let track = Track::new(DiscoveryMethod::Radio, 2).unwrap();
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["age_group"], "18-34");
        assert_eq!(json["relationship"], "strong");
        assert_eq!(json["title"], "Turn the Dial");
        assert_eq!(json["method"], "Radio");
    }
}
