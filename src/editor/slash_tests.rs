use super::*;

fn setup(text: &str) -> (BlockStore, CaretController, SlashCommandController, BlockId) {
    let store = BlockStore::from_blocks(vec![Block::new(BlockType::Paragraph, text)]);
    let id = store.blocks()[0].id;
    (
        store,
        CaretController::default(),
        SlashCommandController::default(),
        id,
    )
}

#[test]
fn trigger_detected_before_caret() {
    assert!(slash_trigger_at("hello/", 6));
    assert!(slash_trigger_at("/", 1));
    assert!(!slash_trigger_at("hello/", 5));
    assert!(!slash_trigger_at("", 0));
    assert!(slash_trigger_at("héllo/", 6));
}

#[test]
fn strips_trailing_slash_first() {
    assert_eq!(strip_trigger_slash("hello/"), "hello");
    assert_eq!(strip_trigger_slash("a/b/"), "a/b");
    assert_eq!(strip_trigger_slash("/"), "");
}

#[test]
fn strips_last_slash_when_not_trailing() {
    assert_eq!(strip_trigger_slash("a/b/c"), "a/bc");
    assert_eq!(strip_trigger_slash("and/or text"), "andor text");
    assert_eq!(strip_trigger_slash("no slash"), "no slash");
}

#[test]
fn selecting_heading_rewrites_active_block() {
    let (mut store, mut caret, mut slash, id) = setup("hello/");
    let now = Instant::now();
    assert!(slash.open(&store, id, MenuAnchor { x: 4, y: 2 }));
    assert_eq!(slash.anchor(), Some(MenuAnchor { x: 4, y: 2 }));

    assert!(slash.select(&mut store, &mut caret, BlockType::Heading1, now));

    let block = &store.blocks()[0];
    assert_eq!(block.id, id);
    assert_eq!(block.kind, BlockType::Heading1);
    assert_eq!(block.content, "hello");
    assert!(!slash.is_open());
    assert_eq!(
        caret.pending(),
        Some(CaretRequest {
            block_id: id,
            position: CaretPosition::End,
        })
    );
}

#[test]
fn selecting_on_bare_slash_places_caret_at_start() {
    let (mut store, mut caret, mut slash, id) = setup("/");
    slash.open(&store, id, MenuAnchor::default());
    slash.select(&mut store, &mut caret, BlockType::Quote, Instant::now());
    assert_eq!(store.blocks()[0].content, "");
    assert_eq!(caret.pending().map(|request| request.position), Some(CaretPosition::Start));
}

#[test]
fn selection_emits_single_change() {
    let (mut store, mut caret, mut slash, id) = setup("x/");
    let count = std::rc::Rc::new(std::cell::Cell::new(0));
    let counter = std::rc::Rc::clone(&count);
    store.subscribe(move |_| counter.set(counter.get() + 1));

    slash.open(&store, id, MenuAnchor::default());
    slash.select(&mut store, &mut caret, BlockType::Code, Instant::now());
    assert_eq!(count.get(), 1);
}

#[test]
fn highlight_wraps_both_ways() {
    let (store, _, mut slash, id) = setup("/");
    slash.open(&store, id, MenuAnchor::default());
    let len = slash.items().len();

    slash.move_highlight(-1);
    assert_eq!(slash.highlighted(), Some(len - 1));
    slash.move_highlight(1);
    assert_eq!(slash.highlighted(), Some(0));
    slash.move_highlight(len as i32 + 2);
    assert_eq!(slash.highlighted(), Some(2));
}

#[test]
fn confirm_uses_highlighted_item() {
    let (mut store, mut caret, mut slash, id) = setup("/");
    slash.open(&store, id, MenuAnchor::default());
    let target = slash
        .items()
        .iter()
        .position(|kind| *kind == BlockType::Bullet)
        .unwrap();
    slash.move_highlight(target as i32);
    assert!(slash.select_highlighted(&mut store, &mut caret, Instant::now()));
    assert_eq!(store.blocks()[0].kind, BlockType::Bullet);
}

#[test]
fn closing_leaves_document_untouched() {
    let (store, _, mut slash, id) = setup("hello/");
    slash.open(&store, id, MenuAnchor::default());
    assert!(slash.close());
    assert_eq!(slash.state(), SlashMenuState::Idle);
    assert_eq!(store.blocks()[0].content, "hello/");
    assert!(!slash.close());
}

#[test]
fn select_without_open_menu_does_nothing() {
    let (mut store, mut caret, mut slash, _) = setup("text/");
    assert!(!slash.select(&mut store, &mut caret, BlockType::Heading2, Instant::now()));
    assert_eq!(store.blocks()[0].kind, BlockType::Paragraph);
    assert!(caret.pending().is_none());
}

#[test]
fn open_on_unknown_block_is_rejected() {
    let (store, _, mut slash, _) = setup("/");
    assert!(!slash.open(&store, BlockId::new(), MenuAnchor::default()));
    assert!(!slash.is_open());
}

#[test]
fn enter_suppressed_only_within_grace_window() {
    let (mut store, mut caret, _, id) = setup("/");
    let mut slash = SlashCommandController::new(Duration::from_millis(150));
    let now = Instant::now();

    assert!(!slash.suppresses_enter(now));
    slash.open(&store, id, MenuAnchor::default());
    assert!(slash.suppresses_enter(now));

    slash.select(&mut store, &mut caret, BlockType::Heading2, now);
    assert!(slash.suppresses_enter(now + Duration::from_millis(10)));
    assert!(!slash.suppresses_enter(now + Duration::from_millis(200)));
    assert_eq!(slash.state(), SlashMenuState::Idle);
}
