use serde::Serialize;

use crate::models::ledger::LedgerStats;
use crate::models::template::Template;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime: u64,
    pub categories: usize,
    pub products: usize,
    pub templates: usize,
    pub active_templates: usize,
    pub ledger: LedgerStats,
    pub workers: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct TemplateDto {
    pub id: i32,
    pub category_id: i32,
    pub search_url_pattern: String,
    pub site: Option<String>,
    pub active: bool,
    pub created_at: String,
}

impl From<Template> for TemplateDto {
    fn from(template: Template) -> Self {
        let site = template.pattern().ok().and_then(|p| p.host());
        Self {
            id: template.id.value(),
            category_id: template.category_id.value(),
            search_url_pattern: template.search_url_pattern,
            site,
            active: template.is_active,
            created_at: template.created_at.to_rfc3339(),
        }
    }
}
