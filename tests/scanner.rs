//! End-to-end tests for the element scanner: pattern selection, listener
//! registration and removal, dispatch order, aborts and reuse.

#![allow(clippy::unwrap_used)]

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use xmlscan::sax::{SaxHandler, SaxResult};
use xmlscan::serial::serialize_node;
use xmlscan::{
    Attribute, Document, ElementListener, ElementScanner, ListenerError, NodeId, ScanError,
    ScanStats, SharedListener,
};

/// Records `(path, element name)` for every notification.
#[derive(Default)]
struct Recorder {
    calls: Vec<(String, String)>,
}

impl ElementListener for Recorder {
    fn element_matched(
        &mut self,
        path: &str,
        doc: &Document,
        node: NodeId,
    ) -> Result<(), ListenerError> {
        let name = doc.node_name(node).unwrap_or_default().to_string();
        self.calls.push((path.to_string(), name));
        Ok(())
    }
}

fn recorder() -> (Rc<RefCell<Recorder>>, SharedListener) {
    let rec = Rc::new(RefCell::new(Recorder::default()));
    let shared: SharedListener = rec.clone();
    (rec, shared)
}

fn paths(rec: &Rc<RefCell<Recorder>>) -> Vec<String> {
    rec.borrow().calls.iter().map(|(p, _)| p.clone()).collect()
}

/// Scans `xml` with one recorder registered for `pattern`, returning the
/// matched paths.
fn matched_paths(pattern: &str, xml: &str) -> Vec<String> {
    let mut scanner = ElementScanner::new();
    let (rec, shared) = recorder();
    scanner.add_listener(shared, pattern).unwrap();
    scanner.parse_str(xml).unwrap();
    paths(&rec)
}

// --- Pattern selection ---

#[test]
fn test_bare_name_matches_every_depth() {
    let xml = "<x><a><x/><b><c><x>t</x></c></b></a><xx/><y><x/></y></x>";
    assert_eq!(
        matched_paths("x", xml),
        vec!["/x/a/x", "/x/a/b/c/x", "/x/y/x", "/x"]
    );
    assert!(matched_paths("q", xml).is_empty());
}

#[test]
fn test_child_and_descendant_steps() {
    let xml = "<r><a><b/><c><b/></c></a><b/></r>";
    assert_eq!(matched_paths("a/b", xml), vec!["/r/a/b"]);
    assert_eq!(matched_paths("a//b", xml), vec!["/r/a/b", "/r/a/c/b"]);
    assert_eq!(matched_paths("/r/b", xml), vec!["/r/b"]);
    assert_eq!(matched_paths("*/b", xml), vec!["/r/a/b", "/r/a/c/b", "/r/b"]);
    assert_eq!(matched_paths("//c/b", xml), vec!["/r/a/c/b"]);
}

#[test]
fn test_repeated_descendant_steps_on_deep_document() {
    let depth = 80;
    let xml = format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));
    assert!(matched_paths("b//a//a//a//a//a//a", &xml).is_empty());

    let found = matched_paths("a//a//a//a//a//a", &xml);
    assert_eq!(found.len(), depth - 5);
    assert_eq!(found[0], "/a".repeat(depth));
}

#[test]
fn test_matching_ignores_namespace_prefixes() {
    let xml = r#"<s:svg xmlns:s="urn:svg"><s:g><rect/></s:g><s:rect/></s:svg>"#;
    assert_eq!(matched_paths("rect", xml), vec!["/svg/g/rect", "/svg/rect"]);
    assert_eq!(matched_paths("g/rect", xml), vec!["/svg/g/rect"]);
}

#[test]
fn test_content_predicate_filters_at_dispatch() {
    let mut scanner = ElementScanner::new();
    let (rec, shared) = recorder();
    scanner.add_listener(shared, "book[price > 30]").unwrap();
    let stats = scanner
        .parse_str(
            "<lib><book><price>42</price></book><book><price>12</price></book><book/></lib>",
        )
        .unwrap();

    assert_eq!(paths(&rec), vec!["/lib/book"]);
    assert_eq!(
        stats,
        ScanStats {
            elements: 6,
            materialized: 5,
            notifications: 1,
        }
    );
}

#[test]
fn test_attribute_predicate_skips_building() {
    let mut scanner = ElementScanner::new();
    let (rec, shared) = recorder();
    scanner.add_listener(shared, "entry[@lang = 'en']").unwrap();
    let stats = scanner
        .parse_str(
            r#"<feed><entry lang="en"><t/></entry><entry lang="de"><t/></entry><entry/></feed>"#,
        )
        .unwrap();

    assert_eq!(paths(&rec), vec!["/feed/entry"]);
    assert_eq!(stats.materialized, 2);
}

#[test]
fn test_predicate_on_text_and_functions() {
    let xml = "<r><w>alpha</w><w>beta</w><w>alphabet</w></r>";
    assert_eq!(
        matched_paths("w[starts-with(., 'alpha')]", xml),
        vec!["/r/w", "/r/w"]
    );
    assert_eq!(matched_paths("w[string-length() = 4]", xml), vec!["/r/w"]);
    assert_eq!(matched_paths("r[count(w) = 3]", xml), vec!["/r"]);
}

// --- Registration ---

#[test]
fn test_invalid_pattern_rejected_at_registration() {
    let mut scanner = ElementScanner::new();
    let (_, shared) = recorder();
    let err = scanner.add_listener(shared, "a//").unwrap_err();
    assert_eq!(err.position, 3);
    assert_eq!(scanner.listener_count(), 0);
    assert!(scanner.listen("b[unknown()]", |_, _, _| Ok(())).is_err());
}

#[test]
fn test_same_listener_under_two_patterns() {
    let mut scanner = ElementScanner::new();
    let (rec, shared) = recorder();
    scanner.add_listener(Rc::clone(&shared), "a").unwrap();
    scanner.add_listener(shared, "b").unwrap();

    scanner.parse_str("<r><b/><a/></r>").unwrap();
    assert_eq!(
        rec.borrow().calls,
        vec![
            ("/r/b".to_string(), "b".to_string()),
            ("/r/a".to_string(), "a".to_string()),
        ]
    );
}

#[test]
fn test_one_element_matching_two_registrations() {
    let mut scanner = ElementScanner::new();
    let (rec, shared) = recorder();
    scanner.add_listener(Rc::clone(&shared), "x").unwrap();
    scanner.add_listener(shared, "z/x").unwrap();

    let stats = scanner.parse_str("<root><x/><z><x/></z></root>").unwrap();
    assert_eq!(paths(&rec), vec!["/root/x", "/root/z/x", "/root/z/x"]);
    assert_eq!(stats.notifications, 3);
}

#[test]
fn test_remove_listener_combinations() {
    let (_, l1) = recorder();
    let (_, l2) = recorder();
    let setup = || {
        let mut scanner = ElementScanner::new();
        scanner.add_listener(Rc::clone(&l1), "a").unwrap();
        scanner.add_listener(Rc::clone(&l1), "b").unwrap();
        scanner.add_listener(Rc::clone(&l2), "a").unwrap();
        scanner.add_listener(Rc::clone(&l2), "c").unwrap();
        scanner
    };

    let mut scanner = setup();
    assert_eq!(scanner.remove_listener(None, None), 0);
    assert_eq!(scanner.listener_count(), 4);

    assert_eq!(scanner.remove_listener(Some(&l1), None), 2);
    assert_eq!(scanner.listener_count(), 2);
    assert_eq!(scanner.patterns().collect::<Vec<_>>(), vec!["a", "c"]);

    let mut scanner = setup();
    assert_eq!(scanner.remove_listener(None, Some("a")), 2);
    assert_eq!(scanner.patterns().collect::<Vec<_>>(), vec!["b", "c"]);

    let mut scanner = setup();
    assert_eq!(scanner.remove_listener(Some(&l2), Some("a")), 1);
    assert_eq!(scanner.listener_count(), 3);
    assert_eq!(scanner.remove_listener(Some(&l2), Some("zzz")), 0);
}

#[test]
fn test_removed_listener_is_not_notified() {
    let mut scanner = ElementScanner::new();
    let (rec, shared) = recorder();
    scanner.add_listener(Rc::clone(&shared), "a").unwrap();
    scanner.parse_str("<a/>").unwrap();
    scanner.remove_listener(Some(&shared), None);
    scanner.parse_str("<a/>").unwrap();
    assert_eq!(paths(&rec), vec!["/a"]);
}

// --- Dispatch ---

#[test]
fn test_root_x_z_x_scenario() {
    let mut scanner = ElementScanner::new();
    let (rec, shared) = recorder();
    scanner.add_listener(shared, "x").unwrap();

    let seen_y = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&seen_y);
    scanner
        .listen("y", move |_, _, _| {
            *flag.borrow_mut() = true;
            Ok(())
        })
        .unwrap();
    scanner.remove_listener(None, Some("y"));

    let stats = scanner
        .parse_str("<root><x><y/></x><z><x/></z></root>")
        .unwrap();
    assert_eq!(paths(&rec), vec!["/root/x", "/root/z/x"]);
    assert!(!*seen_y.borrow());
    // y is built only as part of the first x.
    assert_eq!(stats.materialized, 3);
}

#[test]
fn test_nested_matches_dispatched_once_innermost_first() {
    let mut scanner = ElementScanner::new();
    let children = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&children);
    scanner
        .listen("x", move |path, doc, node| {
            sink.borrow_mut()
                .push((path.to_string(), doc.children(node).count()));
            Ok(())
        })
        .unwrap();

    let stats = scanner.parse_str("<x><x><x/></x></x>").unwrap();
    assert_eq!(
        *children.borrow(),
        vec![
            ("/x/x/x".to_string(), 0),
            ("/x/x".to_string(), 1),
            ("/x".to_string(), 1),
        ]
    );
    assert_eq!(stats.notifications, 3);
    assert_eq!(stats.materialized, 3);
}

#[test]
fn test_outer_match_contains_inner_match() {
    let mut scanner = ElementScanner::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    for pattern in ["section", "title"] {
        let sink = Rc::clone(&order);
        scanner
            .listen(pattern, move |_, doc, node| {
                sink.borrow_mut().push(serialize_node(doc, node));
                Ok(())
            })
            .unwrap();
    }

    scanner
        .parse_str("<doc><section><title>A</title><p/></section><title>B</title></doc>")
        .unwrap();
    assert_eq!(
        *order.borrow(),
        vec![
            "<title>A</title>",
            "<section><title>A</title><p/></section>",
            "<title>B</title>",
        ]
    );
}

#[test]
fn test_empty_registry_builds_nothing() {
    let mut scanner = ElementScanner::new();
    let stats = scanner
        .parse_str("<a><b>text<c/><!-- c --></b><?pi x?></a>")
        .unwrap();
    assert_eq!(
        stats,
        ScanStats {
            elements: 3,
            materialized: 0,
            notifications: 0,
        }
    );
}

#[test]
fn test_listener_can_retain_subtree() {
    let mut scanner = ElementScanner::new();
    let kept = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&kept);
    scanner
        .listen("item", move |_, doc, node| {
            sink.borrow_mut().push(doc.extract_subtree(node));
            Ok(())
        })
        .unwrap();
    scanner
        .parse_str("<list><item n='1'>a<b/></item><item n='2'>c</item></list>")
        .unwrap();

    let kept = kept.borrow();
    assert_eq!(kept.len(), 2);
    let first = &kept[0];
    let root = first.roots()[0];
    assert_eq!(first.attribute(root, "n"), Some("1"));
    assert_eq!(first.text_content(root), "a");
    assert_eq!(kept[1].text_content(kept[1].roots()[0]), "c");
}

// --- Errors ---

#[test]
fn test_listener_failure_aborts_parse() {
    let mut scanner = ElementScanner::new();
    let calls = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&calls);
    scanner
        .listen("x", move |_, _, _| {
            *counter.borrow_mut() += 1;
            Err("stop here".into())
        })
        .unwrap();
    let (later, shared) = recorder();
    scanner.add_listener(shared, "x").unwrap();

    let err = scanner
        .parse_str("<root><x/><x/><x/></root>")
        .unwrap_err();
    assert_eq!(*calls.borrow(), 1);
    assert!(later.borrow().calls.is_empty());
    assert!(err.is_application_error());
    match err {
        ScanError::Listener { path, source } => {
            assert_eq!(path, "/root/x");
            assert_eq!(source.to_string(), "stop here");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_malformed_input_is_upstream_error() {
    let mut scanner = ElementScanner::new();
    let (rec, shared) = recorder();
    scanner.add_listener(shared, "x").unwrap();

    let err = scanner.parse_str("<root><x></y></root>").unwrap_err();
    assert!(matches!(err, ScanError::Parse(_)), "{err:?}");
    assert!(!err.is_application_error());
    assert!(rec.borrow().calls.is_empty());

    let err = scanner.parse_str("<root><x/>").unwrap_err();
    assert!(matches!(err, ScanError::Parse(_)), "{err:?}");
    assert_eq!(paths(&rec), vec!["/root/x"]);
}

// --- Reuse ---

#[test]
fn test_reuse_across_parses() {
    let mut scanner = ElementScanner::new();
    let (rec, shared) = recorder();
    scanner.add_listener(shared, "b").unwrap();

    let first = scanner.parse_str("<a><b/><b/></a>").unwrap();
    assert_eq!(first.notifications, 2);

    // An aborted parse leaves state behind that the next one must reset.
    assert!(scanner.parse_str("<a><b><c></a>").is_err());

    let second = scanner.parse_str("<z><b/></z>").unwrap();
    assert_eq!(
        second,
        ScanStats {
            elements: 2,
            materialized: 1,
            notifications: 1,
        }
    );
    assert_eq!(scanner.stats(), second);
    assert_eq!(paths(&rec), vec!["/a/b", "/a/b", "/z/b"]);
}

#[test]
fn test_reuse_after_listener_abort() {
    let mut scanner = ElementScanner::new();
    let fail = Rc::new(RefCell::new(true));
    let toggle = Rc::clone(&fail);
    scanner
        .listen("inner", move |_, _, _| {
            if *toggle.borrow() {
                return Err("first run fails".into());
            }
            Ok(())
        })
        .unwrap();
    let (rec, shared) = recorder();
    scanner.add_listener(shared, "outer").unwrap();

    assert!(scanner.parse_str("<outer><inner/></outer>").is_err());
    *fail.borrow_mut() = false;
    scanner.parse_str("<outer><inner/></outer>").unwrap();
    assert_eq!(paths(&rec), vec!["/outer"]);
}

// --- Input variants ---

#[test]
fn test_parse_bytes_and_reader() {
    let mut scanner = ElementScanner::new();
    let texts = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&texts);
    scanner
        .listen("a", move |_, doc, node| {
            sink.borrow_mut().push(doc.text_content(node));
            Ok(())
        })
        .unwrap();

    let latin1 = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r><a>caf\xe9</a></r>";
    scanner.parse_bytes(latin1).unwrap();
    scanner
        .parse_reader(std::io::Cursor::new("<r><a>reader</a></r>"))
        .unwrap();
    assert_eq!(*texts.borrow(), vec!["café", "reader"]);
}

#[test]
fn test_whitespace_and_entity_options() {
    let xml = "<!DOCTYPE r [<!ENTITY who \"world\">]><r><a>\n  <b>hello &who;</b>\n</a></r>";
    let run = |scanner: &mut ElementScanner| {
        let out = Rc::new(RefCell::new(String::new()));
        let sink = Rc::clone(&out);
        scanner
            .listen("a", move |_, doc, node| {
                sink.borrow_mut().push_str(&serialize_node(doc, node));
                Ok(())
            })
            .unwrap();
        scanner.parse_str(xml).unwrap();
        let result = out.borrow().clone();
        result
    };

    let mut scanner = ElementScanner::new();
    assert_eq!(run(&mut scanner), "<a>\n  <b>hello world</b>\n</a>");

    let mut scanner = ElementScanner::new();
    scanner.set_strip_whitespace(true);
    scanner.set_expand_entities(false);
    assert_eq!(run(&mut scanner), "<a><b>hello &who;</b></a>");
}

#[test]
fn test_declared_entity_in_attribute_without_expansion() {
    let xml = r#"<!DOCTYPE r [<!ENTITY co "Acme">]><r><x a="&co;">&co;</x></r>"#;
    for expand in [true, false] {
        let mut scanner = ElementScanner::new();
        scanner.set_expand_entities(expand);
        let out = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&out);
        scanner
            .listen("x", move |_, doc, node| {
                sink.borrow_mut().push(serialize_node(doc, node));
                Ok(())
            })
            .unwrap();
        let stats = scanner.parse_str(xml).unwrap();
        assert_eq!(stats.notifications, 1);
        let expected = if expand {
            r#"<x a="Acme">Acme</x>"#
        } else {
            r#"<x a="Acme">&co;</x>"#
        };
        assert_eq!(*out.borrow(), vec![expected.to_string()]);
    }

    let mut scanner = ElementScanner::new();
    scanner.set_expand_entities(false);
    let err = scanner
        .parse_str(r#"<r><x a="&missing;"/></r>"#)
        .unwrap_err();
    assert!(matches!(err, ScanError::Parse(_)));
}

// --- Downstream observer ---

#[derive(Default)]
struct Observer {
    opened: Vec<String>,
    closed: usize,
    text: String,
    documents: usize,
    stop_at: Option<&'static str>,
}

impl SaxHandler for Observer {
    fn start_document(&mut self) -> SaxResult {
        self.documents += 1;
        Ok(())
    }

    fn start_element(
        &mut self,
        local_name: &str,
        _prefix: Option<&str>,
        _namespace: Option<&str>,
        _attributes: &[Attribute],
    ) -> SaxResult {
        if self.stop_at == Some(local_name) {
            return Err(ScanError::aborted(format!("saw {local_name}")));
        }
        self.opened.push(local_name.to_string());
        Ok(())
    }

    fn end_element(
        &mut self,
        _local_name: &str,
        _prefix: Option<&str>,
        _namespace: Option<&str>,
    ) -> SaxResult {
        self.closed += 1;
        Ok(())
    }

    fn characters(&mut self, content: &str) -> SaxResult {
        self.text.push_str(content);
        Ok(())
    }
}

#[test]
fn test_downstream_handler_sees_every_event() {
    let mut scanner = ElementScanner::new();
    let (rec, shared) = recorder();
    scanner.add_listener(shared, "b").unwrap();

    let mut observer = Observer::default();
    scanner
        .parse_str_with_handler("<a>1<b>2</b><c>3</c></a>", &mut observer)
        .unwrap();

    assert_eq!(observer.documents, 1);
    assert_eq!(observer.opened, vec!["a", "b", "c"]);
    assert_eq!(observer.closed, 3);
    assert_eq!(observer.text, "123");
    assert_eq!(paths(&rec), vec!["/a/b"]);
}

#[test]
fn test_downstream_handler_can_abort() {
    let mut scanner = ElementScanner::new();
    let (rec, shared) = recorder();
    scanner.add_listener(shared, "b").unwrap();

    let mut observer = Observer {
        stop_at: Some("c"),
        ..Observer::default()
    };
    let err = scanner
        .parse_str_with_handler("<a><b/><c/><b/></a>", &mut observer)
        .unwrap_err();

    assert!(matches!(err, ScanError::Aborted(_)), "{err:?}");
    assert_eq!(err.to_string(), "scan aborted: saw c");
    assert_eq!(paths(&rec), vec!["/a/b"]);
}

#[test]
fn test_session_with_handler_forwards_events() {
    let mut scanner = ElementScanner::new();
    let (rec, shared) = recorder();
    scanner.add_listener(shared, "b").unwrap();

    let mut observer = Observer::default();
    {
        let mut session = scanner.session_with_handler(&mut observer);
        session.start_document().unwrap();
        session.start_element("a", None, None, &[]).unwrap();
        session.start_element("b", None, None, &[]).unwrap();
        session.end_element("b", None, None).unwrap();
        session.end_element("a", None, None).unwrap();
        session.end_document().unwrap();
    }
    assert_eq!(observer.opened, vec!["a", "b"]);
    assert_eq!(paths(&rec), vec!["/a/b"]);
    assert_eq!(scanner.stats().notifications, 1);
}
