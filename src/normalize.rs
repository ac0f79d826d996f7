//! Chart entry → search query normalization.
//!
//! Chart data credits every featured artist and decorates titles with quotes
//! and slash medleys, none of which match the metadata service's canonical
//! records. Reducing each entry to its primary title and artist makes the
//! first search hit far more reliable.

const FEATURING: &str = "featuring";

/// Build the search query for a chart entry.
///
/// Both parts are lower-cased. The artist is cut at the first `featuring`,
/// then at the first comma, then at the first double quote; the title is cut
/// at the first double quote, then at the first `/`. The parts are joined
/// with one space. Whitespace left behind by a cut is kept, so
/// `("Bad Habits", "Ed Sheeran Featuring Travis Barker")` becomes
/// `"bad habits ed sheeran "`.
pub fn normalize(title: &str, artist: &str) -> String {
    let artist = artist.to_lowercase();
    let artist = truncate_at(&artist, FEATURING);
    let artist = truncate_at(artist, ",");
    let artist = truncate_at(artist, "\"");

    let title = title.to_lowercase();
    let title = truncate_at(&title, "\"");
    let title = truncate_at(title, "/");

    format!("{} {}", title, artist)
}

fn truncate_at<'a>(s: &'a str, delimiter: &str) -> &'a str {
    match s.find(delimiter) {
        Some(idx) => &s[..idx],
        None => s,
    }
}
