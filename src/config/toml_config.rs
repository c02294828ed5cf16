use crate::utils::error::{PhototypeError, Result};
use crate::utils::validation::{validate_path, validate_positive_number, validate_range, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// 所有服務共用的設定檔 (`phototype.toml`)
///
/// 每個欄位都有預設值，沒有設定檔時即為預設拓撲。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhototypeConfig {
    pub paths: PathsConfig,
    pub frontend: FrontendConfig,
    pub router: RouterConfig,
    pub lang_detect: LangDetectConfig,
    pub preprocessor: PreprocessorConfig,
    pub ocr: Vec<OcrServiceConfig>,
}

impl Default for PhototypeConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            frontend: FrontendConfig::default(),
            router: RouterConfig::default(),
            lang_detect: LangDetectConfig::default(),
            preprocessor: PreprocessorConfig::default(),
            ocr: default_ocr_services(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub uploads_dir: PathBuf,
    pub json_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// poppler 執行檔所在目錄，未設定時從 PATH 尋找
    pub poppler_path: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("uploads"),
            json_dir: PathBuf::from("json"),
            processed_dir: PathBuf::from("processed"),
            logs_dir: PathBuf::from("logs"),
            poppler_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub max_upload_mb: usize,
    /// 設定後上傳時會呼叫路由服務取得語言
    pub router_url: Option<String>,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_upload_mb: 16,
            router_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub ocr_language: String,
    pub lang_detect_url: String,
    pub preprocessor_url: String,
    /// 語言代碼 -> OCR 服務 URL
    pub ocr_urls: BTreeMap<String, String>,
    pub detect_timeout_seconds: u64,
    pub preprocess_timeout_seconds: u64,
    pub ocr_timeout_seconds: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8000,
            ocr_language: "en".to_string(),
            lang_detect_url: "http://127.0.0.1:8002".to_string(),
            preprocessor_url: "http://127.0.0.1:8001".to_string(),
            ocr_urls: BTreeMap::from([
                ("en".to_string(), "http://127.0.0.1:8003".to_string()),
                ("ru".to_string(), "http://127.0.0.1:8004".to_string()),
            ]),
            detect_timeout_seconds: 30,
            preprocess_timeout_seconds: 60,
            ocr_timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LangDetectConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub chunk_min_chars: usize,
    pub doc_char_limit: usize,
}

impl Default for LangDetectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8002,
            chunk_min_chars: crate::core::text::DEFAULT_CHUNK_MIN_CHARS,
            doc_char_limit: crate::core::text::DEFAULT_DOC_CHAR_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessorConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub dpi: u32,
    pub enhance_dpi: u32,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8001,
            dpi: 200,
            enhance_dpi: crate::core::enhance::DEFAULT_ENHANCE_DPI,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrServiceConfig {
    /// ISO 639-1，服務名稱為 `ocr-<language>`
    pub language: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_ocr_host")]
    pub host: String,
    pub port: u16,
}

fn default_ocr_host() -> String {
    "127.0.0.1".to_string()
}

impl OcrServiceConfig {
    pub fn service_name(&self) -> String {
        format!("ocr-{}", self.language)
    }
}

impl Default for OcrServiceConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            enabled: false,
            host: default_ocr_host(),
            port: 8003,
        }
    }
}

/// `serve` 子指令與主控程式使用的服務清單項目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    pub name: String,
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl PhototypeConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PhototypeError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 檔案存在才讀取，否則使用預設值
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(
                "Config file {} not found, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| PhototypeError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${ROUTER_URL})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| PhototypeError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 依啟動順序列出所有服務
    pub fn services(&self) -> Vec<ServiceEntry> {
        let mut services = vec![
            ServiceEntry {
                name: "frontend".to_string(),
                enabled: self.frontend.enabled,
                host: self.frontend.host.clone(),
                port: self.frontend.port,
            },
            ServiceEntry {
                name: "router".to_string(),
                enabled: self.router.enabled,
                host: self.router.host.clone(),
                port: self.router.port,
            },
            ServiceEntry {
                name: "lang-detect".to_string(),
                enabled: self.lang_detect.enabled,
                host: self.lang_detect.host.clone(),
                port: self.lang_detect.port,
            },
            ServiceEntry {
                name: "preprocessor".to_string(),
                enabled: self.preprocessor.enabled,
                host: self.preprocessor.host.clone(),
                port: self.preprocessor.port,
            },
        ];
        services.extend(self.ocr.iter().map(|ocr| ServiceEntry {
            name: ocr.service_name(),
            enabled: ocr.enabled,
            host: ocr.host.clone(),
            port: ocr.port,
        }));
        services
    }

    pub fn service(&self, name: &str) -> Option<ServiceEntry> {
        self.services().into_iter().find(|s| s.name == name)
    }

    pub fn ocr_service(&self, language: &str) -> Option<&OcrServiceConfig> {
        self.ocr.iter().find(|ocr| ocr.language == language)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.frontend.max_upload_mb * 1024 * 1024
    }
}

fn default_ocr_services() -> Vec<OcrServiceConfig> {
    vec![
        OcrServiceConfig::default(),
        OcrServiceConfig {
            language: "ru".to_string(),
            port: 8004,
            ..Default::default()
        },
    ]
}

impl Validate for PhototypeConfig {
    fn validate(&self) -> Result<()> {
        validate_path("paths.uploads_dir", &self.paths.uploads_dir.to_string_lossy())?;
        validate_path("paths.json_dir", &self.paths.json_dir.to_string_lossy())?;
        validate_path("paths.processed_dir", &self.paths.processed_dir.to_string_lossy())?;
        validate_path("paths.logs_dir", &self.paths.logs_dir.to_string_lossy())?;

        if let Some(router_url) = &self.frontend.router_url {
            validate_url("frontend.router_url", router_url)?;
        }
        validate_positive_number("frontend.max_upload_mb", self.frontend.max_upload_mb, 1)?;

        validate_url("router.lang_detect_url", &self.router.lang_detect_url)?;
        validate_url("router.preprocessor_url", &self.router.preprocessor_url)?;
        for (language, url) in &self.router.ocr_urls {
            validate_url(&format!("router.ocr_urls.{}", language), url)?;
        }
        if self.router.enabled && !self.router.ocr_urls.contains_key(&self.router.ocr_language) {
            return Err(PhototypeError::MissingConfigError {
                field: format!("router.ocr_urls.{}", self.router.ocr_language),
            });
        }

        validate_positive_number("lang_detect.chunk_min_chars", self.lang_detect.chunk_min_chars, 1)?;
        validate_range(
            "lang_detect.doc_char_limit",
            self.lang_detect.doc_char_limit,
            1,
            crate::core::text::MAX_TEXT_CHARS,
        )?;
        validate_range("preprocessor.dpi", self.preprocessor.dpi, 50, 1200)?;
        validate_range("preprocessor.enhance_dpi", self.preprocessor.enhance_dpi, 50, 1200)?;

        let mut seen_ports = std::collections::HashSet::new();
        for service in self.services().iter().filter(|s| s.enabled) {
            if service.port == 0 {
                return Err(PhototypeError::InvalidConfigValueError {
                    field: format!("{}.port", service.name),
                    value: service.port.to_string(),
                    reason: "Port must be between 1 and 65535".to_string(),
                });
            }
            if !seen_ports.insert((service.host.clone(), service.port)) {
                return Err(PhototypeError::ConfigValidationError {
                    field: format!("{}.port", service.name),
                    message: format!("Port {} is already used by another service", service.port),
                });
            }
        }

        Ok(())
    }
}
