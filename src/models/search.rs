use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One image record as returned by the search provider.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CandidateImage {
    #[serde(default)]
    pub title: Option<String>,
    /// Remote image URL; candidates without one are dropped.
    #[serde(default)]
    pub image: Option<String>,
    /// Page the image was found on.
    #[serde(default)]
    pub url: Option<String>,
}

/// Where an `ImageResult::image` reference points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provenance {
    #[serde(rename = "Servidor Local")]
    LocalCache,
    #[serde(rename = "Web (Falha Download)")]
    RemoteFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageResult {
    #[serde(rename = "titulo")]
    pub title: String,
    pub link: String,
    /// Local `/static/...` path or the original remote URL.
    #[serde(rename = "imagem")]
    pub image: String,
    #[serde(rename = "fonte")]
    pub provenance: Provenance,
    #[serde(rename = "descricao_original")]
    pub description_original: String,
}

/// Page numbers arrive either as JSON numbers or numeric strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PageParam {
    Number(i64),
    Float(f64),
    Text(String),
}

impl PageParam {
    pub fn value(&self) -> Option<i64> {
        match self {
            PageParam::Number(n) => Some(*n),
            PageParam::Float(f) => Some(f.trunc() as i64),
            PageParam::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Terms are usually strings, but bare numbers (`{"termo": 123}`) are searched as their text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TermParam {
    Text(String),
    Number(serde_json::Number),
}

impl TermParam {
    pub fn value(self) -> String {
        match self {
            TermParam::Text(s) => s,
            TermParam::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(rename = "termo")]
    pub term: Option<TermParam>,
    #[serde(rename = "pagina")]
    pub page: Option<PageParam>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CachedFile {
    #[serde(rename = "nome")]
    pub name: String,
    pub url: String,
    #[serde(rename = "tamanho_bytes")]
    pub size_bytes: u64,
    #[serde(rename = "existe")]
    pub exists: bool,
    #[serde(rename = "modificado_em")]
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheListing {
    pub total_pastas: usize,
    pub imagens: BTreeMap<String, Vec<CachedFile>>,
    pub pasta_downloads: String,
    pub pasta_existe: bool,
}
