//! Static concept tables keyed by desired emotion and sales platform.

use crate::common::{Concepts, utils::title_case};

pub const DEFAULT_EMOTION: &str = "trust";
pub const DEFAULT_PLATFORM: &str = "local-market";

pub const EMOTIONS: [&str; 3] = ["trust", "excitement", "calm"];
pub const PLATFORMS: [&str; 3] = ["local-market", "premium-retail", "online"];

const LAYOUTS: [&str; 3] = ["Typography Focus", "Image Dominant", "Balanced Composition"];

fn concept_templates(emotion: &str) -> Option<[(&'static str, &'static str); 3]> {
    match emotion {
        "trust" => Some([
            ("Premium", "Trusted Quality"),
            ("Farm-Fresh", "Nature's Best"),
            ("Authentic", "Heritage Crafted"),
        ]),
        "excitement" => Some([
            ("Bold", "Adventure Awaits"),
            ("Vibrant", "Energy Unleashed"),
            ("Dynamic", "Pure Excitement"),
        ]),
        "calm" => Some([
            ("Peaceful", "Serenity Found"),
            ("Gentle", "Natural Harmony"),
            ("Pure", "Tranquil Essence"),
        ]),
        _ => None,
    }
}

fn palette(emotion: &str) -> Option<[&'static str; 4]> {
    match emotion {
        "trust" => Some(["#2E7D32", "#8BC34A", "#FFC107", "#795548"]),
        "excitement" => Some(["#FF5722", "#FF9800", "#4CAF50", "#F44336"]),
        "calm" => Some(["#4CAF50", "#81C784", "#A5D6A7", "#C8E6C9"]),
        _ => None,
    }
}

fn styles(platform: &str) -> Option<[&'static str; 3]> {
    match platform {
        "local-market" => Some(["Rustic Artisan", "Traditional Heritage", "Community Crafted"]),
        "premium-retail" => Some(["Modern Premium", "Elegant Sophisticated", "Luxury Natural"]),
        "online" => Some(["Clean Modern", "Instagram-Ready", "Digital Native"]),
        _ => None,
    }
}

/// Packaging concepts for a product. Unknown emotions fall back to the
/// `trust` bucket and unknown platforms to `local-market`.
pub fn generate_concepts(product_name: &str, emotion: &str, platform: &str) -> Concepts {
    let emotion_key = emotion.trim().to_ascii_lowercase();
    let emotion_key = if concept_templates(&emotion_key).is_some() {
        emotion_key
    } else {
        DEFAULT_EMOTION.to_string()
    };
    let platform_key = platform.trim().to_ascii_lowercase();

    let templates = concept_templates(&emotion_key)
        .or_else(|| concept_templates(DEFAULT_EMOTION))
        .unwrap_or_default();
    let colors = palette(&emotion_key)
        .or_else(|| palette(DEFAULT_EMOTION))
        .unwrap_or_default();
    let styles = styles(&platform_key)
        .or_else(|| styles(DEFAULT_PLATFORM))
        .unwrap_or_default();

    Concepts {
        concepts: templates
            .iter()
            .map(|(adjective, promise)| format!("{adjective} {product_name} - {promise}"))
            .collect(),
        styles: styles.iter().map(ToString::to_string).collect(),
        colors: colors.iter().map(ToString::to_string).collect(),
        keywords: vec![
            title_case(&emotion_key),
            "Quality".to_string(),
            "Natural".to_string(),
            "Fresh".to_string(),
        ],
        layouts: LAYOUTS.iter().map(ToString::to_string).collect(),
    }
}

/// Generic bundle used when the caller has nothing but a product name.
pub fn fallback_concepts(product_name: &str) -> Concepts {
    Concepts {
        concepts: vec![
            format!("Premium {product_name} - Farm Fresh Quality"),
            format!("Natural {product_name} - Sustainably Grown"),
            format!("Artisan {product_name} - Traditionally Crafted"),
        ],
        styles: vec![
            "Modern Organic".to_string(),
            "Rustic Premium".to_string(),
            "Clean Natural".to_string(),
        ],
        colors: vec![
            "#2E7D32".to_string(),
            "#8BC34A".to_string(),
            "#FFC107".to_string(),
            "#795548".to_string(),
        ],
        keywords: vec![
            "Quality".to_string(),
            "Natural".to_string(),
            "Fresh".to_string(),
            "Trusted".to_string(),
        ],
        layouts: vec![
            "Typography Focus".to_string(),
            "Natural Elements".to_string(),
            "Clean Layout".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn every_table_pair_has_full_shape() {
        let hex = Regex::new("^#[0-9A-Fa-f]{6}$").unwrap();
        for emotion in EMOTIONS {
            for platform in PLATFORMS {
                let concepts = generate_concepts("Honey Jar", emotion, platform);
                assert_eq!(concepts.concepts.len(), 3, "{emotion}/{platform}");
                assert_eq!(concepts.styles.len(), 3, "{emotion}/{platform}");
                assert_eq!(concepts.colors.len(), 4, "{emotion}/{platform}");
                assert_eq!(concepts.keywords.len(), 4, "{emotion}/{platform}");
                assert!(concepts.colors.iter().all(|c| hex.is_match(c)));
                assert!(concepts.concepts.iter().all(|c| c.contains("Honey Jar")));
            }
        }
    }

    #[test]
    fn unknown_keys_use_default_bucket() {
        let fallback = generate_concepts("Rice", "nostalgia", "space-station");
        let default = generate_concepts("Rice", DEFAULT_EMOTION, DEFAULT_PLATFORM);
        assert_eq!(fallback, default);
        assert_eq!(fallback.keywords[0], "Trust");
        assert_eq!(fallback.styles[0], "Rustic Artisan");
    }

    #[test]
    fn known_keys_are_case_insensitive() {
        let concepts = generate_concepts("Chili Oil", "Excitement", "ONLINE");
        assert_eq!(concepts.concepts[0], "Bold Chili Oil - Adventure Awaits");
        assert_eq!(concepts.styles[1], "Instagram-Ready");
        assert_eq!(concepts.colors[0], "#FF5722");
        assert_eq!(concepts.keywords[0], "Excitement");
    }

    #[test]
    fn fallback_bundle_shape() {
        let concepts = fallback_concepts("Maple Syrup");
        assert_eq!(concepts.concepts.len(), 3);
        assert_eq!(concepts.colors.len(), 4);
        assert_eq!(concepts.keywords.len(), 4);
    }
}
