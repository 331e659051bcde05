//! User-facing content: FAQ entries and liability forms.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaqEntry {
    pub id: i64,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiabilityForm {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
}
