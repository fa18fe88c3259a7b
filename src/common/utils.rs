use image::Rgba;
use std::fmt::Display;

pub fn vec_str<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| format!("{item}"))
        .collect::<Vec<String>>()
        .join(", ")
}

/// Joins at most `limit` items with " and ", e.g. "green and gold".
pub fn join_and<T: AsRef<str>>(items: &[T], limit: usize) -> String {
    items
        .iter()
        .take(limit)
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(" and ")
}

pub fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

/// Resolves a colour name or hex string to a `#RRGGBB` value.
pub fn color_hex(color: &str, default: &'static str) -> String {
    let color = color.trim();
    if parse_hex_color(color).is_some() {
        return color.to_string();
    }
    match color.to_ascii_lowercase().as_str() {
        "green" => "#2E7D32",
        "blue" => "#1976D2",
        "red" => "#D32F2F",
        "yellow" => "#F57C00",
        "orange" => "#FF9800",
        "purple" => "#7B1FA2",
        "brown" => "#5D4037",
        "black" => "#424242",
        _ => default,
    }
    .to_string()
}

pub fn parse_hex_color(color: &str) -> Option<Rgba<u8>> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}

/// Escapes text for use inside SVG markup.
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Eight hex characters of a fresh v4 uuid, prefixed.
pub fn short_id(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &id[..8])
}
