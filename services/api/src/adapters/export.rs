//! services/api/src/adapters/export.rs
//!
//! Export pipeline adapters: rendering a reading's report into a
//! self-contained document and uploading it to the blob store. These
//! implement the `ReportRenderer` and `BlobStorage` ports from the `core`
//! crate.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tarot_journal_core::domain::Reading;
use tarot_journal_core::ports::{BlobStorage, PortError, PortResult, ReportRenderer};
use uuid::Uuid;

//=========================================================================================
// Report Renderer
//=========================================================================================

/// Renders a reading into a standalone HTML document. Rasterizing that
/// document to PDF is the client's concern; the journal only needs a
/// durable, self-contained representation of the report.
#[derive(Clone, Default)]
pub struct HtmlReportRenderer;

fn escape_html(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

impl HtmlReportRenderer {
    fn document(reading: &Reading) -> String {
        let cards: String = reading
            .cards
            .iter()
            .map(|drawn| {
                format!(
                    "<figure class=\"card\">\
                     <img src=\"{}\" alt=\"{}\">\
                     <figcaption>{}：{} ({})</figcaption>\
                     </figure>",
                    drawn.card.image_url,
                    escape_html(&drawn.card.name),
                    drawn.position.label_cn(),
                    drawn.card.name_cn,
                    drawn.orientation_cn(),
                )
            })
            .collect();

        format!(
            "<!DOCTYPE html>\n\
             <html lang=\"zh-Hant\">\n\
             <head>\n\
             <meta charset=\"utf-8\">\n\
             <title>塔羅占卜紀錄</title>\n\
             <style>\n\
             body {{ background: #1a1033; color: #e5e7eb; font-family: serif; margin: 2rem; }}\n\
             h1, h3 {{ color: #eab308; }}\n\
             .cards {{ display: flex; gap: 1rem; }}\n\
             .card img {{ width: 150px; border-radius: 8px; }}\n\
             .closing {{ font-style: italic; color: #d8b4fe; }}\n\
             </style>\n\
             </head>\n\
             <body>\n\
             <h1>福星何大師 · 塔羅占卜紀錄</h1>\n\
             <section class=\"question\"><h3>問題</h3><p>{}</p></section>\n\
             <section class=\"cards\">{}</section>\n\
             {}\n\
             </body>\n\
             </html>\n",
            escape_html(&reading.question),
            cards,
            reading.report_html,
        )
    }
}

#[async_trait]
impl ReportRenderer for HtmlReportRenderer {
    async fn render(&self, reading: &Reading) -> PortResult<Vec<u8>> {
        Ok(Self::document(reading).into_bytes())
    }
}

//=========================================================================================
// Blob Storage
//=========================================================================================

/// Uploads exported documents to an HTTP blob store keyed by user and
/// reading id, returning the durable retrieval URL.
#[derive(Clone)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBlobStore {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BlobStorage for HttpBlobStore {
    async fn upload(
        &self,
        user_id: Uuid,
        reading_id: Uuid,
        document: Vec<u8>,
    ) -> PortResult<String> {
        let url = format!("{}/readings/{user_id}/{reading_id}.html", self.base_url);

        let response = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "text/html; charset=utf-8")
            .body(document)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "blob store returned {} for {}",
                response.status(),
                url
            )));
        }
        Ok(url)
    }
}
