//! crates/tarot_journal_core/src/report.rs
//!
//! Prompt construction for the interpretation model and composition of the
//! displayed report from the model's structured response.

use std::fmt::Write;

use crate::domain::{DrawnCard, Interpretation};

/// Builds the single natural-language prompt sent to the interpretation
/// model: the question plus each card's localized name, orientation, and
/// orientation-appropriate summary, with the required output schema.
pub fn build_prompt(question: &str, cards: &[DrawnCard]) -> String {
    let mut prompt = String::from(
        "你是一位精通塔羅牌的「福星何大師」。請根據使用者的問題和抽出的三張牌進行解讀。\n\n",
    );
    let _ = writeln!(prompt, "問題：{question}\n");
    prompt.push_str("抽牌結果：\n");
    for (i, drawn) in cards.iter().enumerate() {
        let _ = writeln!(
            prompt,
            "{}. {}：{} ({}) - {}",
            i + 1,
            drawn.position.label_cn(),
            drawn.card.name_cn,
            drawn.orientation_cn(),
            drawn.summary(),
        );
    }
    prompt.push_str(
        "\n請輸出一個 JSON 物件，格式如下：\n\
         {\n\
           \"interpretation\": \"這裡放整體的解牌敘述，將三張牌連結起來回答問題，請使用HTML標籤如<p>分段。\",\n\
           \"advice\": [\"建議行動1\", \"建議行動2\", \"建議行動3\"],\n\
           \"closing\": \"一句充滿智慧與祝福的結語\"\n\
         }\n\
         請確保語氣神秘但溫暖，富有洞察力。繁體中文回答。",
    );
    prompt
}

/// Composes the displayed rich-text report from the three parts of a
/// structured interpretation.
pub fn compose_report_html(interpretation: &Interpretation) -> String {
    let advice_items: String = interpretation
        .advice
        .iter()
        .map(|item| format!("<li>{item}</li>"))
        .collect();

    format!(
        "<div class=\"report\">\n\
         <section class=\"report-section\">\n\
         <h3>大師解牌</h3>\n\
         <div>{}</div>\n\
         </section>\n\
         <section class=\"report-section\">\n\
         <h3>指引與建議</h3>\n\
         <ul>{}</ul>\n\
         </section>\n\
         <section class=\"report-section\">\n\
         <h3>結語</h3>\n\
         <p class=\"closing\">\"{}\"</p>\n\
         </section>\n\
         </div>",
        interpretation.interpretation, advice_items, interpretation.closing,
    )
}

/// Strips markup from a rich-text report, producing the plain-text form
/// kept alongside it for previews and search.
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                // Keep block boundaries readable as whitespace.
                if !text.ends_with([' ', '\n']) && !text.is_empty() {
                    text.push(' ');
                }
            }
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
