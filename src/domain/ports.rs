use crate::domain::model::{LanguageScore, StageOutcome};
use crate::utils::error::Result;
use async_trait::async_trait;
use image::DynamicImage;
use std::path::Path;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn append_line(
        &self,
        path: &str,
        line: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
    /// 目錄下指定副檔名的檔名，依名稱排序
    fn list_files(
        &self,
        extension: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

/// PDF 文字層擷取
pub trait TextLayerExtractor: Send + Sync {
    /// 回傳最多 `char_limit` 個字元，頁與頁之間以換行分隔
    fn extract_text(&self, pdf: &[u8], char_limit: usize) -> Result<String>;
}

/// 將 PDF 每一頁轉成圖片
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<DynamicImage>>;
}

pub trait OcrEngine: Send + Sync {
    /// `language` 為 ISO 639-1 代碼，由實作自行轉換
    fn recognize(&self, image: &Path, language: &str) -> Result<String>;
    fn method(&self) -> &'static str;
}

pub trait LanguageDetector: Send + Sync {
    /// 候選語言與分數，未必已正規化
    fn detect(&self, text: &str) -> Vec<LanguageScore>;
}

/// 路由管線依賴的下游服務
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn detect_language_from_pdf(&self, pdf: Vec<u8>, filename: &str) -> StageOutcome;
    async fn detect_language_from_text(&self, text: &str) -> StageOutcome;
    async fn preprocess(&self, pdf: Vec<u8>, filename: &str) -> StageOutcome;
    async fn extract_text(&self, files: &[String], language: &str) -> StageOutcome;
}
