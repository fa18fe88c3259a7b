use super::data_url;
use crate::{
    common::{
        ProductData,
        utils::{color_hex, xml_escape},
    },
    server::{
        advisor,
        cascade::{GeneratedImage, GenerationRequest, ImageProducer, ProducerError},
    },
};
use async_trait::async_trait;

/// Last image stage: an SVG mockup that ships with the written advice.
pub struct VectorFallback;

#[async_trait]
impl ImageProducer for VectorFallback {
    fn name(&self) -> &'static str {
        "vector-fallback"
    }

    fn is_remote(&self) -> bool {
        false
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<GeneratedImage, ProducerError> {
        let svg = render_svg(&request.product);
        Ok(GeneratedImage {
            image_url: data_url("image/svg+xml", svg.as_bytes()),
            generator: "Vector Fallback".to_string(),
            cost: "FREE".to_string(),
            prompt_used: None,
            confidence: 0.8,
            advice: Some(advisor::advise(&request.product)),
        })
    }
}

pub fn render_svg(product: &ProductData) -> String {
    let main = color_hex(product.primary_color(), "#2E7D32");
    let accent = product
        .colors
        .get(1)
        .map_or_else(|| "#FFC107".to_string(), |c| color_hex(c, "#FFC107"));
    let name = xml_escape(&product.product_name);
    let tagline = xml_escape(product.tagline_or_default());

    format!(
        r##"<svg width="1024" height="1024" xmlns="http://www.w3.org/2000/svg">
    <defs>
        <linearGradient id="grad1" x1="0%" y1="0%" x2="100%" y2="100%">
            <stop offset="0%" style="stop-color:{main};stop-opacity:1" />
            <stop offset="100%" style="stop-color:{accent};stop-opacity:1" />
        </linearGradient>
        <filter id="shadow" x="-20%" y="-20%" width="140%" height="140%">
            <feDropShadow dx="8" dy="8" stdDeviation="6" flood-color="#000" flood-opacity="0.25"/>
        </filter>
    </defs>
    <rect width="1024" height="1024" fill="#f8f9fa"/>
    <rect x="200" y="200" width="600" height="600" fill="url(#grad1)" stroke="#333" stroke-width="4" rx="20" filter="url(#shadow)"/>
    <rect x="220" y="220" width="560" height="80" fill="rgba(255,255,255,0.2)" rx="10"/>
    <rect x="220" y="700" width="560" height="80" fill="rgba(255,255,255,0.2)" rx="10"/>
    <text x="500" y="400" font-family="Arial, sans-serif" font-size="48" fill="white" text-anchor="middle" font-weight="bold">{name}</text>
    <text x="500" y="460" font-family="Arial, sans-serif" font-size="32" fill="white" text-anchor="middle">{tagline}</text>
    <text x="500" y="580" font-family="Arial, sans-serif" font-size="24" fill="white" text-anchor="middle">With Professional Advice Below</text>
    <text x="500" y="650" font-family="Arial, sans-serif" font-size="20" fill="white" text-anchor="middle">Scroll down for expert design guidance</text>
</svg>"##
    )
}
