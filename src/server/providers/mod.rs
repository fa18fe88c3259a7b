use crate::server::cascade::ProducerError;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Response;

pub mod bitmap;
pub mod deepai;
pub mod gemini;
pub mod replicate;
pub mod self_hosted;
pub mod vector;

pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Splits a `data:` URL into its MIME type and decoded bytes.
pub fn decode_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(payload).ok()?;
    Some((mime.to_string(), bytes))
}

/// Turns a non-success status into a [`ProducerError::Upstream`].
async fn ensure_success(response: Response) -> Result<Response, ProducerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProducerError::Upstream {
        status: status.as_u16(),
        body: body.chars().take(500).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_urls_decode_back() {
        let url = data_url("image/svg+xml", b"<svg/>");
        assert!(url.starts_with("data:image/svg+xml;base64,"));
        assert_eq!(
            decode_data_url(&url),
            Some(("image/svg+xml".to_string(), b"<svg/>".to_vec()))
        );
        assert_eq!(decode_data_url("https://example.com/a.png"), None);
        assert_eq!(decode_data_url("data:text/plain,hello"), None);
    }
}
