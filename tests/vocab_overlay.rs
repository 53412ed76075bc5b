// tests/vocab_overlay.rs
// TOML overlay for the ticker vocabulary: add/remove custom symbols.

use reddit_sentiment_tracker::extract::{TickerExtractor, TickerVocabulary};

#[test]
fn overlay_adds_and_removes_symbols() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tickers.toml");
    std::fs::write(
        &path,
        r#"
add = ["gmev", " NKLA "]
remove = ["DIDI"]
"#,
    )
    .unwrap();

    let mut vocab = TickerVocabulary::default();
    assert!(vocab.is_valid("DIDI"));
    vocab.apply_overlay_file(&path).unwrap();

    assert!(vocab.is_valid("GMEV"));
    assert!(vocab.is_valid("NKLA"));
    assert!(!vocab.is_valid("DIDI"));

    let ex = TickerExtractor::with_vocabulary(vocab);
    let found = ex.extract("NKLA and GMEV look wild, DIDI too");
    assert!(found.contains("NKLA"));
    assert!(found.contains("GMEV"));
    assert!(!found.contains("DIDI"));
}

#[test]
fn missing_overlay_file_is_an_error() {
    let mut vocab = TickerVocabulary::default();
    assert!(vocab
        .apply_overlay_file(std::path::Path::new("does/not/exist.toml"))
        .is_err());
}

#[test]
fn partial_overlay_sections_are_fine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tickers.toml");
    std::fs::write(&path, r#"add = ["ABCD"]"#).unwrap();

    let mut vocab = TickerVocabulary::default();
    vocab.apply_overlay_file(&path).unwrap();
    assert!(vocab.is_valid("ABCD"));
}
