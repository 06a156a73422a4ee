use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::domain::{FailureReason, JobId, Outcome};

/// Title text of an HDOCK job page, followed by the job id.
pub const TITLE_MARKER: &str = "HDOCK Server: Job results for";

static TITLE_SELECTOR: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("title").ok());

/// Recovers the job id from a submission response page.
///
/// The page title must contain [`TITLE_MARKER`]; the id is the first token after it,
/// with trailing punctuation dropped. Never panics: every miss is reported as a
/// [`FailureReason`].
pub fn extract_job_id(html: Option<&str>) -> Outcome<JobId> {
    let html = match html {
        Some(html) if !html.trim().is_empty() => html,
        _ => return Err(FailureReason::NoResponse),
    };
    let title = page_title(html).ok_or(FailureReason::TitleMissing)?;
    let (_, rest) = title
        .split_once(TITLE_MARKER)
        .ok_or(FailureReason::MarkerMissing)?;
    let token = rest
        .split_whitespace()
        .next()
        .map(|token| token.trim_end_matches(is_trailing_punctuation))
        .ok_or_else(|| FailureReason::MalformedJobId(String::new()))?;
    token.parse()
}

fn is_trailing_punctuation(ch: char) -> bool {
    ch.is_ascii_punctuation() && ch != '_' && ch != '-'
}

fn page_title(html: &str) -> Option<String> {
    let selector = TITLE_SELECTOR.as_ref()?;
    let document = Html::parse_document(html);
    let title = document.select(selector).next()?;
    let text = title.text().collect::<String>();
    Some(text.split_whitespace().collect::<Vec<_>>().join(" "))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn extracts_id_from_title() {
        let html = "<html><head><title> HDOCK Server: Job results for 67c074b475cea</title></head></html>";
        let id = extract_job_id(Some(html)).unwrap();
        assert_eq!(id.as_str(), "67c074b475cea");
    }

    #[test]
    fn title_spanning_lines_and_attributes() {
        let html = "<TITLE lang=\"en\">\n  HDOCK Server:   Job results\n for abc123 extra\n</TITLE>";
        assert_eq!(extract_job_id(Some(html)).unwrap().as_str(), "abc123");
    }

    #[test]
    fn failures_are_typed() {
        assert_matches!(extract_job_id(None), Err(FailureReason::NoResponse));
        assert_matches!(extract_job_id(Some("   ")), Err(FailureReason::NoResponse));
        assert_matches!(
            extract_job_id(Some("<html></html>")),
            Err(FailureReason::TitleMissing)
        );
        assert_matches!(
            extract_job_id(Some("<title>HDOCK Server: Error</title>")),
            Err(FailureReason::MarkerMissing)
        );
        assert_matches!(
            extract_job_id(Some("<title>HDOCK Server: Job results for</title>")),
            Err(FailureReason::MalformedJobId(_))
        );
    }

    #[test]
    fn commented_out_title_is_not_the_page_title() {
        let html = "<!-- <title>draft</title> --><title>HDOCK Server: Job results for abc123</title>";
        assert_eq!(extract_job_id(Some(html)).unwrap().as_str(), "abc123");
    }

    #[test]
    fn numeric_entities_are_decoded() {
        let html = "<title>HDOCK&#32;Server: Job results for&nbsp;abc123</title>";
        assert_eq!(extract_job_id(Some(html)).unwrap().as_str(), "abc123");
    }

    #[test]
    fn unclosed_title_runs_to_end_of_page() {
        let html = "<title>HDOCK Server: Job results for abc123\n<body>";
        assert_eq!(extract_job_id(Some(html)).unwrap().as_str(), "abc123");
    }

    #[test]
    fn trailing_punctuation_is_dropped_but_inner_characters_are_checked() {
        let html = "<title>HDOCK Server: Job results for abc123, queued</title>";
        assert_eq!(extract_job_id(Some(html)).unwrap().as_str(), "abc123");
        let html = "<title>HDOCK Server: Job results for job_7-b.</title>";
        assert_eq!(extract_job_id(Some(html)).unwrap().as_str(), "job_7-b");
        assert_matches!(
            extract_job_id(Some("<title>HDOCK Server: Job results for ab/12</title>")),
            Err(FailureReason::MalformedJobId(_))
        );
    }

    #[test]
    fn marker_outside_title_is_ignored() {
        let html = "<title>Upload</title><body>HDOCK Server: Job results for abc123</body>";
        assert_matches!(extract_job_id(Some(html)), Err(FailureReason::MarkerMissing));
    }
}
