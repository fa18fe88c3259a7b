//! Canned packaging advice, the last stop of the generator cascade.
//!
//! Callers must treat the output as opaque prose.

use crate::common::{Advice, ProductData, utils::join_and};

fn color_paragraph(color: &str) -> Option<&'static str> {
    Some(match color {
        "green" => {
            "Green is a strong choice for farm products. It reads as fresh, natural and healthy at a glance, and shoppers trust it."
        }
        "blue" => {
            "Blue signals reliability and calm confidence. It suits premium products and makes the package feel professional."
        }
        "red" => {
            "Red creates urgency and pulls eyes across a crowded shelf. It works well when you want quick purchase decisions."
        }
        "yellow" => {
            "Yellow carries energy and warmth. It fits honey, citrus and anything that should feel sunny and vibrant."
        }
        "orange" => {
            "Orange feels friendly and approachable. It suggests natural goodness without looking expensive."
        }
        "brown" => {
            "Brown says earthy and authentic. It is a natural match for organic or traditional products that lean on their origins."
        }
        _ => return None,
    })
}

fn platform_paragraph(platform: &str) -> Option<&'static str> {
    Some(match platform {
        "farmers-market" => {
            "At a farmers market people buy the grower as much as the produce. Let the package tell your story and invite a conversation."
        }
        "premium-retail" => {
            "Premium retail shelves need packaging that justifies the price. Lean on quality cues, restraint and a polished finish."
        }
        "online" => {
            "For online sales the package has to photograph well and feel special when it arrives. Plan for the unboxing moment."
        }
        "local-market" => {
            "Local markets reward products that feel familiar yet a little special. Balance approachability with clear quality signals."
        }
        _ => return None,
    })
}

fn emotion_paragraph(emotion: &str) -> Option<&'static str> {
    Some(match emotion {
        "trust" => {
            "To build trust keep the layout clean, the fonts plain and the information easy to find. Clutter erodes confidence."
        }
        "excitement" => {
            "Excitement comes from bold colour, dynamic layouts and expressive type. Make it jump off the shelf."
        }
        "comfort" => {
            "Comfort comes from warm, familiar design: rounded shapes, soft colours and friendly wording."
        }
        "premium" => {
            "A premium feel needs sophistication: generous white space, refined type and perhaps a metallic accent."
        }
        _ => return None,
    })
}

fn product_paragraph(product: &ProductData) -> Option<&'static str> {
    let name = product.product_name.to_lowercase();
    let tagline = product.tagline.to_lowercase();
    if name.contains("honey") {
        Some(
            "Honey invites hexagon patterns that echo the honeycomb, and warm golden tones that show off the product itself.",
        )
    } else if name.contains("tomato") {
        Some(
            "Tomato products shine with vine imagery or a glimpse of the field. Show the farm-to-table freshness.",
        )
    } else if name.contains("organic") || tagline.contains("organic") {
        Some(
            "Organic products should look pure: leaves, earth tones or a very simple layout that lets the ingredients speak.",
        )
    } else {
        None
    }
}

/// Assembles the advice text for a product. Deterministic for a given input.
pub fn professional_advice(product: &ProductData) -> String {
    let primary = product.primary_color().to_lowercase();
    let scheme = if product.colors.is_empty() {
        "green".to_string()
    } else {
        join_and(&product.colors, 3)
    };

    let mut parts = vec![format!(
        "Thanks for the details on {}, there is plenty here to work with.",
        product.product_name
    )];

    parts.extend(color_paragraph(&primary).map(str::to_string));
    parts.extend(platform_paragraph(&product.sales_platform).map(str::to_string));
    parts.extend(emotion_paragraph(&product.desired_emotion).map(str::to_string));
    parts.extend(product_paragraph(product).map(str::to_string));

    let story = product.product_story.trim();
    if story.chars().count() > 10 {
        let excerpt: String = story.chars().take(50).collect();
        parts.push(format!(
            "Your story about {excerpt}... is a real asset. Print a short version on the package, people buy stories as much as products."
        ));
    }

    parts.push("Recommended next steps:".to_string());
    parts.push(format!(
        "✓ Use your {scheme} colour scheme consistently across every material"
    ));
    parts.push(
        "✓ Keep the tagline short enough to read from arm's length".to_string(),
    );
    parts.push("✓ Add a small mark or symbol that stands for your farm or brand".to_string());
    parts.push("✓ Ask yourself: would I pick this up in the store?".to_string());
    parts.push("Your product has real potential.".to_string());
    parts.push(
        "Image generation is unavailable right now, so use this advice to sketch a layout or brief a local designer."
            .to_string(),
    );

    parts.join("\n\n")
}

pub fn concept_summary(product: &ProductData) -> Vec<String> {
    vec![
        format!(
            "Brand positioning: premium {} for {} customers",
            product.product_name.to_lowercase(),
            product.sales_platform
        ),
        format!(
            "Emotional appeal: designed to create {} and connection",
            product.desired_emotion
        ),
        "Visual strategy: clean, professional packaging that stands out".to_string(),
        "Target message: quality you can trust, freshness you can see".to_string(),
    ]
}

pub fn advise(product: &ProductData) -> Advice {
    Advice {
        professional_advice: professional_advice(product),
        concept_summary: concept_summary(product),
        next_steps: vec![
            "Review the advice above".to_string(),
            "Sketch a first layout from the recommendations".to_string(),
            "Share these notes with a local designer".to_string(),
            "Try image generation again later".to_string(),
        ],
        user_message: format!(
            "Image generation is unavailable at the moment, so here is packaging advice tailored to {}.",
            product.product_name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn honey() -> ProductData {
        let mut product = ProductData::new("Wildflower Honey");
        product.colors = vec!["Yellow".to_string(), "brown".to_string()];
        product.sales_platform = "farmers-market".to_string();
        product.desired_emotion = "comfort".to_string();
        product.product_story = "Three generations of beekeeping in the hills above the valley".to_string();
        product
    }

    #[test]
    fn advice_picks_paragraphs_by_lookup() {
        let text = professional_advice(&honey());
        assert!(text.contains("Yellow carries energy"));
        assert!(text.contains("farmers market"));
        assert!(text.contains("Comfort comes from"));
        assert!(text.contains("hexagon"));
        assert!(text.contains("Your story about Three generations of beekeeping in the hills above"));
        assert!(text.contains("Yellow and brown colour scheme"));
    }

    #[test]
    fn advice_is_deterministic() {
        assert_eq!(advise(&honey()), advise(&honey()));
    }

    #[test]
    fn missing_colours_default_to_green() {
        let product = ProductData::new("Organic Oats");
        let text = professional_advice(&product);
        assert!(text.contains("Green is a strong choice"));
        assert!(text.contains("Organic products should look pure"));
        assert!(text.contains("your green colour scheme"));
        assert!(!text.contains("Your story about"));
    }

    #[test]
    fn organic_tagline_counts() {
        let mut product = ProductData::new("Rolled Oats");
        product.tagline = "Certified Organic".to_string();
        assert!(professional_advice(&product).contains("Organic products"));
    }

    #[test]
    fn summary_mentions_platform_and_emotion() {
        let summary = concept_summary(&honey());
        assert_eq!(summary.len(), 4);
        assert!(summary[0].contains("wildflower honey for farmers-market"));
        assert!(summary[1].contains("comfort"));
    }
}
