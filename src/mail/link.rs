use scraper::{Html, Selector};

/// Find the href of the first anchor whose visible text contains `phrase`,
/// compared case-insensitively. Unparseable markup simply yields `None`.
pub fn extract_download_link(html: &str, phrase: &str) -> Option<String> {
    let needle = phrase.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let document = Html::parse_document(html);
    let anchors = Selector::parse("a").ok()?;

    document
        .select(&anchors)
        .filter(|anchor| {
            let text = anchor.text().collect::<String>();
            collapse_whitespace(&text).to_lowercase().contains(&needle)
        })
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .map(str::to_string)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
