use anyhow::{Context, Result, anyhow};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

pub const DEFAULT_BACKEND_PORT: u16 = 8000;
pub const DEFAULT_DIFFUSION_PORT: u16 = 7861;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Backend,
    Diffusion,
}

impl FromStr for AppMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backend" => Ok(Self::Backend),
            "diffusion" => Ok(Self::Diffusion),
            other => Err(anyhow!("Unknown APP_MODE '{other}'")),
        }
    }
}

/// Remote image providers that can head the generator cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Replicate,
    DeepAi,
    SelfHosted,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "replicate" => Ok(Self::Replicate),
            "deepai" => Ok(Self::DeepAi),
            "self-hosted" | "selfhosted" | "local" => Ok(Self::SelfHosted),
            other => Err(anyhow!("Unknown image provider '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cuda,
    Cpu,
}

impl Device {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cuda => "cuda",
            Self::Cpu => "cpu",
        }
    }

    /// Half precision only pays off on the GPU.
    pub const fn precision(self) -> &'static str {
        match self {
            Self::Cuda => "float16",
            Self::Cpu => "float32",
        }
    }
}

impl FromStr for Device {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cuda" | "gpu" => Ok(Self::Cuda),
            "cpu" => Ok(Self::Cpu),
            other => Err(anyhow!("Unknown DIFFUSION_DEVICE '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: AppMode,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub max_file_size: usize,
    pub storage_root: PathBuf,
    pub static_dir: PathBuf,

    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub replicate_api_token: Option<String>,
    pub replicate_base_url: String,
    pub deepai_api_key: Option<String>,
    pub deepai_url: String,
    pub self_hosted_url: Option<String>,
    pub image_providers: Vec<ProviderKind>,
    pub provider_timeout: Duration,
    pub font_path: PathBuf,
    pub vector_fallback: bool,

    pub cleanup_days: u64,
    pub cleanup_interval: Duration,

    // Declared for deployment parity, the core flow does not read them.
    pub cloud_storage_bucket: String,
    pub database_url: String,
    pub secret_key: Option<String>,

    pub diffusion_runtime_url: String,
    pub diffusion_model: String,
    pub diffusion_device: Device,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: AppMode::Backend,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_BACKEND_PORT,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
            max_file_size: 10 * 1024 * 1024,
            storage_root: PathBuf::from("storage"),
            static_dir: PathBuf::from("static"),
            gemini_api_key: None,
            gemini_model: "gemini-2.5-flash-image".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            replicate_api_token: None,
            replicate_base_url: "https://api.replicate.com/v1".to_string(),
            deepai_api_key: None,
            deepai_url: "https://api.deepai.org/api/text2img".to_string(),
            self_hosted_url: None,
            image_providers: vec![ProviderKind::DeepAi],
            provider_timeout: Duration::from_secs(30),
            font_path: PathBuf::from("assets/fonts/DejaVuSans-Bold.ttf"),
            vector_fallback: true,
            cleanup_days: 30,
            cleanup_interval: Duration::from_secs(24 * 60 * 60),
            cloud_storage_bucket: "packsmith-designs".to_string(),
            database_url: "sqlite://./packsmith.db".to_string(),
            secret_key: None,
            diffusion_runtime_url: "http://127.0.0.1:7860".to_string(),
            diffusion_model: "runwayml/stable-diffusion-v1-5".to_string(),
            diffusion_device: Device::Cpu,
        }
    }
}

impl Config {
    /// Build the configuration from the process environment, falling back to
    /// [`Config::default`] for anything unset or empty.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let mode = var("APP_MODE")
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or(defaults.mode);
        let default_port = match mode {
            AppMode::Backend => DEFAULT_BACKEND_PORT,
            AppMode::Diffusion => DEFAULT_DIFFUSION_PORT,
        };

        let image_providers = match var("IMAGE_PROVIDERS") {
            Some(list) => list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse)
                .collect::<Result<Vec<_>>>()?,
            None => defaults.image_providers,
        };

        Ok(Self {
            mode,
            host: var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT")?.unwrap_or(default_port),
            cors_origins: var("CORS_ORIGINS").map_or(defaults.cors_origins, |list| {
                list.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),
            max_file_size: parsed("MAX_FILE_SIZE")?.unwrap_or(defaults.max_file_size),
            storage_root: var("STORAGE_ROOT").map_or(defaults.storage_root, PathBuf::from),
            static_dir: var("STATIC_DIR").map_or(defaults.static_dir, PathBuf::from),
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_model: var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            replicate_api_token: var("REPLICATE_API_TOKEN"),
            replicate_base_url: var("REPLICATE_BASE_URL").unwrap_or(defaults.replicate_base_url),
            deepai_api_key: var("DEEPAI_API_KEY"),
            deepai_url: var("DEEPAI_API_URL").unwrap_or(defaults.deepai_url),
            self_hosted_url: var("SELF_HOSTED_DIFFUSION_URL"),
            image_providers,
            provider_timeout: parsed("PROVIDER_TIMEOUT_SECS")?
                .map_or(defaults.provider_timeout, Duration::from_secs),
            font_path: var("FONT_PATH").map_or(defaults.font_path, PathBuf::from),
            vector_fallback: parsed("VECTOR_FALLBACK")?.unwrap_or(defaults.vector_fallback),
            cleanup_days: parsed("CLEANUP_DAYS")?.unwrap_or(defaults.cleanup_days),
            cleanup_interval: parsed::<u64>("CLEANUP_INTERVAL_HOURS")?
                .map(hours)
                .transpose()?
                .unwrap_or(defaults.cleanup_interval),
            cloud_storage_bucket: var("CLOUD_STORAGE_BUCKET")
                .unwrap_or(defaults.cloud_storage_bucket),
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            secret_key: var("SECRET_KEY"),
            diffusion_runtime_url: var("DIFFUSION_RUNTIME_URL")
                .unwrap_or(defaults.diffusion_runtime_url),
            diffusion_model: var("DIFFUSION_MODEL").unwrap_or(defaults.diffusion_model),
            diffusion_device: var("DIFFUSION_DEVICE")
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or(defaults.diffusion_device),
        })
    }
}

/// Empty variables count as unset.
fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn hours(h: u64) -> Result<Duration> {
    h.checked_mul(60 * 60)
        .map(Duration::from_secs)
        .ok_or_else(|| anyhow!("Invalid value for CLEANUP_INTERVAL_HOURS: {h} hours is too long"))
}

fn parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(name)
        .map(|v| v.parse::<T>().with_context(|| format!("Invalid value for {name}: '{v}'")))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_parse() {
        assert_eq!("DeepAI".parse::<ProviderKind>().unwrap(), ProviderKind::DeepAi);
        assert_eq!(
            " self-hosted ".parse::<ProviderKind>().unwrap(),
            ProviderKind::SelfHosted
        );
        assert!("dalle".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn device_selects_precision() {
        assert_eq!(Device::Cuda.precision(), "float16");
        assert_eq!(Device::Cpu.precision(), "float32");
        assert_eq!("gpu".parse::<Device>().unwrap(), Device::Cuda);
    }

    #[test]
    fn cleanup_interval_hours_are_checked() {
        assert_eq!(hours(6).unwrap(), Duration::from_secs(6 * 60 * 60));
        assert!(hours(u64::MAX).is_err());
    }

    #[test]
    fn defaults_have_no_provider_keys() {
        let config = Config::default();
        assert!(config.gemini_api_key.is_none());
        assert!(config.replicate_api_token.is_none());
        assert!(config.deepai_api_key.is_none());
        assert_eq!(config.image_providers, vec![ProviderKind::DeepAi]);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
    }
}
