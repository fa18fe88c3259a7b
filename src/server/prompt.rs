use crate::common::{
    Concepts, Customizations, ProductData,
    utils::{join_and, vec_str},
};

/// Collapse a multi-line template into the single line the image models expect.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn color_scheme(product: &ProductData) -> String {
    if product.colors.is_empty() {
        "green".to_string()
    } else {
        join_and(&product.colors, 3)
    }
}

/// Text-to-image prompt used by the Replicate and `DeepAI` generators.
pub fn packaging_prompt(product: &ProductData) -> String {
    single_line(&format!(
        "Professional agricultural product packaging design for {name},
        modern clean style, {colors} color scheme, premium typography,
        {tagline}, conveying {emotion}, suitable for {platform},
        product photography style, white background, high quality commercial design,
        realistic packaging mockup, professional studio lighting, eco-friendly agricultural branding",
        name = product.product_name,
        colors = color_scheme(product),
        tagline = product.tagline_or_default(),
        emotion = product.desired_emotion,
        platform = product.sales_platform,
    ))
}

/// Prompt for the self-hosted diffusion service, which receives raw form fields.
pub fn self_hosted_prompt(product_name: &str, colors: &str, emotion: &str, platform: &str) -> String {
    single_line(&format!(
        "Professional agricultural product packaging design for {product_name},
        modern clean style, {colors} color scheme, premium typography,
        conveying {emotion}, suitable for {platform}, product photography style,
        white background, high quality commercial design, realistic packaging mockup,
        professional studio lighting, eco-friendly agricultural branding",
        colors = colors.replace(',', " and "),
    ))
}

/// Multimodal prompt for Gemini, seeded with the derived concepts.
pub fn design_prompt(product: &ProductData, concepts: &Concepts) -> String {
    let concept_names = concepts.concepts.iter().take(2).cloned().collect::<Vec<_>>();
    let styles = concepts.styles.iter().take(2).cloned().collect::<Vec<_>>();
    format!(
        "Create a professional packaging design for {name}.\n\n\
         Product details:\n- Name: {name}\n- Tagline: {tagline}\n\n\
         Design concepts to incorporate: {concepts}\n\
         Style preferences: {styles}\n\
         Palette: {palette}\n\n\
         Requirements:\n\
         - Modern, clean aesthetic suitable for agricultural products\n\
         - Product name prominently displayed\n\
         - Natural, trustworthy color palette\n\
         - Readability and shelf appeal\n\
         - Sustainability messaging\n\n\
         Use the attached product photo as reference. Generate a high-quality packaging mockup \
         that would appeal to {platform} customers.",
        name = product.product_name,
        tagline = product.tagline_or_default(),
        concepts = vec_str(&concept_names),
        styles = vec_str(&styles),
        palette = vec_str(&concepts.colors),
        platform = product.sales_platform,
    )
}

pub fn customization_prompt(customizations: &Customizations) -> String {
    let mut prompt = String::from("Apply the following customizations to the packaging design:\n");
    if !customizations.colors.is_empty() {
        prompt.push_str(&format!(
            "- Update color scheme to use: {}\n",
            vec_str(&customizations.colors)
        ));
    }
    for (key, value) in &customizations.text_changes {
        prompt.push_str(&format!("- Change {key} to: {value}\n"));
    }
    for (key, value) in &customizations.style_preferences {
        prompt.push_str(&format!("- Apply {key}: {value}\n"));
    }
    prompt.push_str("\nMaintain overall design quality and professional appearance.");
    prompt
}

/// Designer brief describing what the concept tables were asked for.
pub fn concept_brief(product: &ProductData) -> String {
    let emotion = &product.desired_emotion;
    let platform = &product.sales_platform;
    format!(
        "Packaging brief for an agricultural product.\n\n\
         Product name: {name}\nTagline: {tagline}\nDesired emotion: {emotion}\n\
         Sales platform: {platform}\nProduct story: {story}\n\n\
         Deliverables: three concept names that evoke {emotion} and suit {platform}, \
         three style approaches, four complementary hex colors, four emotional keywords \
         and three layout suggestions for shelf appeal.",
        name = product.product_name,
        tagline = product.tagline_or_default(),
        story = if product.product_story.is_empty() {
            "-"
        } else {
            product.product_story.as_str()
        },
    )
}
