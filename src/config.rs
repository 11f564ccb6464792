//! Configuration management for the OCR gateway
//!
//! Everything is read from the environment (optionally seeded from `.env`).
//! Unset variables fall back to defaults; set-but-invalid values are errors.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

/// Default instruction sent to the generative backend
pub const DEFAULT_PROMPT: &str = "Extract all text from this image";

/// Default keywords for the face heuristic
pub const DEFAULT_FACE_KEYWORDS: &[&str] = &["face", "photo", "portrait", "mugshot"];

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unknown OCR backend {0:?} (expected \"paddle\" or \"ollama\")")]
    UnknownBackend(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for request bodies (base64 inflates images by a third)
    pub max_body_bytes: usize,
}

/// Which engine serves `/ocr`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// PaddleOCR line recognition (local ONNX models)
    Paddle,
    /// Ollama vision-language model
    Ollama,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paddle" | "paddleocr" => Ok(Self::Paddle),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paddle => write!(f, "paddle"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub paddle: PaddleConfig,
    pub ollama: OllamaConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaddleConfig {
    /// Directory holding det_model.onnx, rec_model.onnx and the dictionary
    pub model_dir: PathBuf,
    /// Character dictionary, relative to `model_dir` unless absolute
    pub dictionary: PathBuf,
    /// Run cls_model.onnx (when present) to flip upside-down lines
    pub use_angle_cls: bool,
    pub intra_threads: usize,
    /// Probability map binarization threshold
    pub det_threshold: f32,
    /// Minimum mean probability for a detected region
    pub box_threshold: f32,
    /// Recognized lines below this confidence are discarded
    pub drop_score: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    pub default_prompt: String,
    pub face_keywords: Vec<String>,
    /// Where the Ollama backend stages images (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,
    pub max_image_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                max_body_bytes: 32 * 1024 * 1024,
            },
            backend: BackendConfig {
                kind: BackendKind::Paddle,
                paddle: PaddleConfig {
                    model_dir: PathBuf::from("./models/paddleocr"),
                    dictionary: PathBuf::from("ppocr_keys_v1.txt"),
                    use_angle_cls: true,
                    intra_threads: 4,
                    det_threshold: 0.3,
                    box_threshold: 0.6,
                    drop_score: 0.5,
                },
                ollama: OllamaConfig {
                    url: "http://localhost:11434".to_string(),
                    model: "minicpm-v:8b".to_string(),
                    timeout_secs: 300,
                },
            },
            extraction: ExtractionConfig {
                default_prompt: DEFAULT_PROMPT.to_string(),
                face_keywords: DEFAULT_FACE_KEYWORDS
                    .iter()
                    .map(|k| k.to_string())
                    .collect(),
                temp_dir: None,
                max_image_bytes: 10 * 1024 * 1024,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let kind = match var("OCR_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.backend.kind,
        };

        let face_keywords = match var("FACE_KEYWORDS") {
            Some(value) => value
                .split(',')
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            None => defaults.extraction.face_keywords,
        };

        Ok(Config {
            server: ServerConfig {
                host: var("HOST").unwrap_or(defaults.server.host),
                port: parse_or("PORT", var("PORT"), defaults.server.port)?,
                max_body_bytes: parse_or(
                    "MAX_BODY_BYTES",
                    var("MAX_BODY_BYTES"),
                    defaults.server.max_body_bytes,
                )?,
            },
            backend: BackendConfig {
                kind,
                paddle: PaddleConfig {
                    model_dir: var("PADDLE_MODEL_DIR")
                        .map(PathBuf::from)
                        .unwrap_or(defaults.backend.paddle.model_dir),
                    dictionary: var("PADDLE_DICTIONARY")
                        .map(PathBuf::from)
                        .unwrap_or(defaults.backend.paddle.dictionary),
                    use_angle_cls: parse_or(
                        "PADDLE_USE_ANGLE_CLS",
                        var("PADDLE_USE_ANGLE_CLS"),
                        defaults.backend.paddle.use_angle_cls,
                    )?,
                    intra_threads: parse_or(
                        "PADDLE_INTRA_THREADS",
                        var("PADDLE_INTRA_THREADS"),
                        defaults.backend.paddle.intra_threads,
                    )?,
                    det_threshold: parse_or(
                        "PADDLE_DET_THRESHOLD",
                        var("PADDLE_DET_THRESHOLD"),
                        defaults.backend.paddle.det_threshold,
                    )?,
                    box_threshold: parse_or(
                        "PADDLE_BOX_THRESHOLD",
                        var("PADDLE_BOX_THRESHOLD"),
                        defaults.backend.paddle.box_threshold,
                    )?,
                    drop_score: parse_or(
                        "PADDLE_DROP_SCORE",
                        var("PADDLE_DROP_SCORE"),
                        defaults.backend.paddle.drop_score,
                    )?,
                },
                ollama: OllamaConfig {
                    url: var("OLLAMA_URL").unwrap_or(defaults.backend.ollama.url),
                    model: var("OLLAMA_MODEL").unwrap_or(defaults.backend.ollama.model),
                    timeout_secs: parse_or(
                        "OLLAMA_TIMEOUT_SECS",
                        var("OLLAMA_TIMEOUT_SECS"),
                        defaults.backend.ollama.timeout_secs,
                    )?,
                },
            },
            extraction: ExtractionConfig {
                default_prompt: var("OCR_DEFAULT_PROMPT")
                    .unwrap_or(defaults.extraction.default_prompt),
                face_keywords,
                temp_dir: var("OCR_TEMP_DIR").map(PathBuf::from),
                max_image_bytes: parse_or(
                    "MAX_IMAGE_BYTES",
                    var("MAX_IMAGE_BYTES"),
                    defaults.extraction.max_image_bytes,
                )?,
            },
        })
    }

    /// Staging directory for transient image files
    pub fn temp_dir(&self) -> PathBuf {
        self.extraction
            .temp_dir
            .clone()
            .unwrap_or_else(env::temp_dir)
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                name,
                value: raw,
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}
