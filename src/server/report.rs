use crate::{
    common::{Concepts, ProductData, utils::vec_str},
    server::{cascade::Generation, prompt, storage::StorageService},
};
use anyhow::Result;
use std::{fmt::Write as _, path::PathBuf};

pub const REPORT_FILE: &str = "report.txt";

fn numbered(out: &mut String, title: &str, items: &[String]) {
    let _ = writeln!(out, "{title}:");
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "  {}. {item}", i + 1);
    }
    out.push('\n');
}

/// Plain-text summary of a design, kept next to its mockups.
pub fn render_report(
    design_id: &str,
    product: &ProductData,
    concepts: &Concepts,
    generation: &Generation,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "PACKAGING DESIGN REPORT");
    let _ = writeln!(out, "=======================\n");
    let _ = writeln!(out, "Design ID: {design_id}");
    let _ = writeln!(out, "Generated: {}\n", chrono::Utc::now().to_rfc3339());

    let _ = writeln!(out, "Product: {}", product.product_name);
    let _ = writeln!(out, "Tagline: {}", product.tagline_or_default());
    if !product.colors.is_empty() {
        let _ = writeln!(out, "Preferred colours: {}", vec_str(&product.colors));
    }
    let _ = writeln!(out, "Sales platform: {}", product.sales_platform);
    let _ = writeln!(out, "Desired emotion: {}", product.desired_emotion);
    if !product.product_story.is_empty() {
        let _ = writeln!(out, "Story: {}", product.product_story);
    }
    out.push('\n');

    numbered(&mut out, "Concepts", &concepts.concepts);
    numbered(&mut out, "Styles", &concepts.styles);
    let _ = writeln!(out, "Palette: {}", vec_str(&concepts.colors));
    let _ = writeln!(out, "Keywords: {}\n", vec_str(&concepts.keywords));
    numbered(&mut out, "Layouts", &concepts.layouts);

    let _ = writeln!(out, "Generator: {}", generation.generator());
    let _ = writeln!(out, "Cost: {}", generation.cost());
    let _ = writeln!(out, "Confidence: {:.2}\n", generation.confidence());

    out.push_str("BRIEF\n-----\n");
    out.push_str(&prompt::concept_brief(product));
    out.push('\n');
    out
}

pub async fn write_report(
    storage: &StorageService,
    design_id: &str,
    product: &ProductData,
    concepts: &Concepts,
    generation: &Generation,
) -> Result<PathBuf> {
    let text = render_report(design_id, product, concepts, generation);
    storage.write_text(design_id, REPORT_FILE, &text).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{advisor, concepts::generate_concepts};

    #[tokio::test]
    async fn report_lists_concepts_and_generator() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageService::open(dir.path()).await.unwrap();
        let mut product = ProductData::new("Honey Jar");
        product.colors = vec!["yellow".to_string()];
        let concepts = generate_concepts("Honey Jar", "calm", "online");
        let generation = Generation::Advice(advisor::advise(&product));

        let path = write_report(&storage, "design_abc12345", &product, &concepts, &generation)
            .await
            .unwrap();
        assert!(path.ends_with("designs/design_abc12345/report.txt"));
        let text = tokio::fs::read_to_string(path).await.unwrap();
        assert!(text.contains("Design ID: design_abc12345"));
        assert!(text.contains(&concepts.concepts[0]));
        assert!(text.contains("Generator: Smart Packaging Advisor"));
        assert!(text.contains("Cost: FREE"));
    }
}
