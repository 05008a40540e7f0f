//! Property tests for the span synchronizer: after any sequence of leaf
//! edits the tree still tiles the buffer and untouched leaves keep their
//! text.

use oxpecker::tex::{Document, Everywhere, LatexContext, Mutator, PathCollector, Walker};
use proptest::prelude::*;

fn piece() -> impl Strategy<Value = String> {
    let word = "[a-z]{1,6}";
    prop_oneof![
        word.prop_map(|w| format!("{w} ")),
        word.prop_map(|w| format!("\\emph{{{w}}} ")),
        word.prop_map(|w| format!("{{{w}}}")),
        word.prop_map(|w| format!("${w}$ ")),
        word.prop_map(|w| format!("% {w}\n")),
        word.prop_map(|w| format!("\\section{{{w}}}\n")),
        word.prop_map(|w| format!("\\begin{{quote}}{w}\\end{{quote}}")),
        word.prop_map(|w| format!("\\begin{{itemize}}\\item {w} \\item[x] {w}\\end{{itemize}}")),
        Just("\\\\".to_string()),
        Just("~".to_string()),
        Just("é ".to_string()),
    ]
}

fn document_source() -> impl Strategy<Value = String> {
    prop::collection::vec(piece(), 1..12).prop_map(|pieces| pieces.concat())
}

fn leaf_paths(doc: &Document) -> Vec<Vec<usize>> {
    let mut collector = PathCollector::default();
    Walker::default().walk(doc.nodes(), &Everywhere, &mut collector);
    collector.paths
}

fn leaf_texts(doc: &Document, paths: &[Vec<usize>]) -> Vec<String> {
    paths
        .iter()
        .map(|path| doc.text(doc.node(path).unwrap()).to_string())
        .collect()
}

proptest! {
    #[test]
    fn parse_round_trips(source in document_source()) {
        let doc = Document::parse(source.clone(), &LatexContext::default()).unwrap();
        prop_assert_eq!(doc.reserialize(), source);
        prop_assert!(doc.check_spans().is_ok());
    }

    #[test]
    fn edits_keep_spans_in_sync(
        source in document_source(),
        replacements in prop::collection::vec("[a-zé ]{0,9}", 1..16),
    ) {
        let mut doc = Document::parse(source, &LatexContext::default()).unwrap();
        let paths = leaf_paths(&doc);
        prop_assume!(!paths.is_empty());

        for (idx, new_text) in replacements.iter().enumerate() {
            let path = &paths[idx % paths.len()];
            let mut expected = leaf_texts(&doc, &paths);
            expected[idx % paths.len()] = new_text.clone();

            doc.apply_text_change(path, new_text).unwrap();

            prop_assert!(doc.check_spans().is_ok(), "{:?}", doc.check_spans());
            prop_assert_eq!(doc.reserialize(), doc.source().to_string());
            prop_assert_eq!(leaf_texts(&doc, &paths), expected);
        }
    }

    #[test]
    fn edits_survive_a_reparse(
        source in document_source(),
        new_text in "[a-z]{1,9}",
    ) {
        let context = LatexContext::default();
        let mut doc = Document::parse(source, &context).unwrap();
        for path in leaf_paths(&doc) {
            doc.apply_text_change(&path, &new_text).unwrap();
        }
        let reparsed = Document::parse(doc.source().to_string(), &context).unwrap();
        prop_assert_eq!(reparsed.reserialize(), doc.reserialize());
        prop_assert_eq!(leaf_paths(&reparsed), leaf_paths(&doc));
    }
}
