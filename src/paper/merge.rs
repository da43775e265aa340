//! Field-level reconciliation of an existing record with a fetched one.
//!
//! | Field | `overwrite = false` | `overwrite = true` |
//! |-------|---------------------|--------------------|
//! | title | kept | kept |
//! | doi | filled if absent | filled if absent |
//! | authors, year, venue, abstract, pdf_url | filled if absent | replaced if fetched is present |
//!
//! A fetched absent value never clears an existing one.

use super::Paper;

/// Merges `fetched` into `existing` in place.
pub fn merge(existing: &mut Paper, fetched: &Paper, overwrite: bool) {
    if existing.doi().is_none()
        && let Some(doi) = fetched.doi()
    {
        existing.doi = Some(doi.to_string());
    }

    if !fetched.authors.is_empty() && (overwrite || existing.authors.is_empty()) {
        existing.authors.clone_from(&fetched.authors);
    }

    if fetched.year != 0 && (overwrite || existing.year == 0) {
        existing.year = fetched.year;
    }

    merge_text(&mut existing.venue, &fetched.venue, overwrite);
    merge_optional(&mut existing.abstract_text, fetched.abstract_text.as_deref(), overwrite);
    merge_optional(&mut existing.pdf_url, fetched.pdf_url.as_deref(), overwrite);
}

fn merge_text(existing: &mut String, fetched: &str, overwrite: bool) {
    if !fetched.trim().is_empty() && (overwrite || existing.trim().is_empty()) {
        *existing = fetched.to_string();
    }
}

fn merge_optional(existing: &mut Option<String>, fetched: Option<&str>, overwrite: bool) {
    let Some(fetched) = fetched.filter(|value| !value.trim().is_empty()) else {
        return;
    };
    let existing_absent = existing.as_deref().is_none_or(|value| value.trim().is_empty());
    if overwrite || existing_absent {
        *existing = Some(fetched.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse() -> Paper {
        Paper {
            title: "Original Title".to_string(),
            authors: Vec::new(),
            year: 0,
            venue: String::new(),
            doi: Some("10.1234/test".to_string()),
            abstract_text: None,
            pdf_url: None,
        }
    }

    fn complete() -> Paper {
        Paper {
            title: "Old Title".to_string(),
            authors: vec!["Old Author".to_string()],
            year: 2020,
            venue: "Old Venue".to_string(),
            doi: Some("10.1234/test".to_string()),
            abstract_text: Some("Old Abstract".to_string()),
            pdf_url: Some("http://old.pdf".to_string()),
        }
    }

    fn fetched() -> Paper {
        Paper {
            title: "New Title".to_string(),
            authors: vec!["Author A".to_string()],
            year: 2024,
            venue: "New Venue".to_string(),
            doi: Some("10.1234/TEST".to_string()),
            abstract_text: Some("New Abstract".to_string()),
            pdf_url: Some("http://new.pdf".to_string()),
        }
    }

    #[test]
    fn test_fill_if_absent_without_overwrite() {
        let mut paper = sparse();
        merge(&mut paper, &fetched(), false);

        assert_eq!(paper.title, "Original Title");
        assert_eq!(paper.authors, vec!["Author A"]);
        assert_eq!(paper.year, 2024);
        assert_eq!(paper.venue, "New Venue");
        assert_eq!(paper.abstract_text.as_deref(), Some("New Abstract"));
        assert_eq!(paper.pdf_url.as_deref(), Some("http://new.pdf"));
    }

    #[test]
    fn test_present_fields_kept_without_overwrite() {
        let mut paper = complete();
        merge(&mut paper, &fetched(), false);
        assert_eq!(paper, complete());
    }

    #[test]
    fn test_overwrite_replaces_all_but_title_and_doi() {
        let mut paper = complete();
        merge(&mut paper, &fetched(), true);

        assert_eq!(paper.title, "Old Title");
        assert_eq!(paper.doi.as_deref(), Some("10.1234/test"));
        assert_eq!(paper.authors, vec!["Author A"]);
        assert_eq!(paper.year, 2024);
        assert_eq!(paper.venue, "New Venue");
        assert_eq!(paper.abstract_text.as_deref(), Some("New Abstract"));
        assert_eq!(paper.pdf_url.as_deref(), Some("http://new.pdf"));
    }

    #[test]
    fn test_absent_fetched_values_never_clear() {
        let empty = Paper::default();
        for overwrite in [false, true] {
            let mut paper = complete();
            merge(&mut paper, &empty, overwrite);
            assert_eq!(paper, complete(), "overwrite={overwrite}");
        }
    }

    #[test]
    fn test_blank_existing_text_counts_as_absent() {
        let mut paper = sparse();
        paper.abstract_text = Some("  ".to_string());
        merge(&mut paper, &fetched(), false);
        assert_eq!(paper.abstract_text.as_deref(), Some("New Abstract"));
    }

    #[test]
    fn test_blank_fetched_text_ignored() {
        let mut paper = complete();
        let mut blank = fetched();
        blank.abstract_text = Some(String::new());
        blank.venue = " ".to_string();
        merge(&mut paper, &blank, true);
        assert_eq!(paper.abstract_text.as_deref(), Some("Old Abstract"));
        assert_eq!(paper.venue, "Old Venue");
    }

    #[test]
    fn test_missing_doi_is_filled() {
        let mut paper = sparse();
        paper.doi = None;
        merge(&mut paper, &fetched(), false);
        assert_eq!(paper.doi.as_deref(), Some("10.1234/TEST"));
    }
}
