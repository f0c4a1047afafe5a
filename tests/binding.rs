mod common;

use common::WordProvider;
use std::rc::Rc;
use tiny_highlight::*;

fn buffer(text: &str) -> SharedBuffer {
    SharedBuffer::new(StyledBuffer::new(text), Themes::one_dark())
}

#[test]
fn test_attribute_edits_are_ignored() {
    let buffer = buffer("let x = 1");
    let hl = BufferHighlighter::new(buffer.clone(), WordProvider::new(), HighlighterConfig::synchronous()).unwrap();

    // Styling produced attribute-only notifications; none became an edit
    assert_eq!(hl.highlighter().generation(), 0);
    assert!(hl.highlighter().with_provider(|p| p.edits.is_empty()));
    assert_eq!(hl.highlighter().stats().suppressed_notifications, 0);
}

#[test]
fn test_character_edits_reach_provider() {
    let buffer = buffer("let x = 1");
    let hl = BufferHighlighter::new(buffer.clone(), WordProvider::new(), HighlighterConfig::synchronous()).unwrap();

    buffer.replace(4..5, "value");
    let edits = hl.highlighter().with_provider(|p| p.edits.clone());
    assert_eq!(edits, vec![ContentEdit::new(4..9, 4)]);
    assert_eq!(buffer.token_at(6).as_deref(), Some("variable"));
}

#[test]
fn test_rejected_edit_is_not_reported() {
    let buffer = buffer("let x = 1");
    let hl = BufferHighlighter::new(buffer.clone(), WordProvider::new(), HighlighterConfig::synchronous()).unwrap();

    assert!(buffer.delete(5..50).is_none());
    assert_eq!(hl.highlighter().generation(), 0);
}

#[test]
fn test_scrolling_requests_visible_region() {
    let text = "let value = 12345;\n".repeat(40);
    let buffer = buffer(&text);
    let config = HighlighterConfig {
        max_region_len: Some(38),
        max_in_flight: 1,
        ..HighlighterConfig::asynchronous(false)
    };
    let hl = BufferHighlighter::new(buffer.clone(), WordProvider::new(), config).unwrap();

    let first = hl.highlighter().with_provider(|p| std::mem::take(&mut p.queue));
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].range, 0..38);

    buffer.set_viewport(Some(380..418));
    first.into_iter().for_each(common::Job::deliver);
    hl.process_events();

    let next = hl.highlighter().with_provider(|p| std::mem::take(&mut p.queue));
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].range, 380..418);
}

#[test]
fn test_drop_detaches_from_buffer() {
    let buffer = buffer("let x = 1");
    let hl = BufferHighlighter::new(buffer.clone(), WordProvider::new(), HighlighterConfig::synchronous()).unwrap();
    drop(hl);

    // Styles stay, edits no longer reach anybody
    assert!(buffer.insert(0, "//").is_some());
    assert_eq!(buffer.token_at(2).as_deref(), Some("keyword"));
    assert_eq!(buffer.token_at(0), None);
}

#[test]
fn test_theme_swap_restyles_on_invalidate() {
    let resolver = Rc::new(ThemeResolver::default());
    let buffer = SharedBuffer::with_resolver(StyledBuffer::new("let x = 1"), resolver.clone());
    let hl = BufferHighlighter::new(buffer.clone(), WordProvider::new(), HighlighterConfig::synchronous()).unwrap();

    let before = buffer.run_at(0).unwrap().style;
    resolver.set_theme(Themes::monokai());
    hl.invalidate(TextTarget::All);
    let after = buffer.run_at(0).unwrap().style;

    assert_ne!(before, after);
    assert_eq!(after, Themes::monokai().resolve("keyword"));
}
