use std::cell::RefCell;
use std::rc::Rc;

use super::*;

fn editor_with(blocks: Vec<Block>) -> BlockEditor {
    BlockEditor::new(blocks)
}

fn paragraphs(texts: &[&str]) -> Vec<Block> {
    texts
        .iter()
        .map(|text| Block::new(BlockType::Paragraph, *text))
        .collect()
}

fn contents(editor: &BlockEditor) -> Vec<&str> {
    editor
        .blocks()
        .iter()
        .map(|block| block.content.as_str())
        .collect()
}

fn id_at(editor: &BlockEditor, index: usize) -> BlockId {
    editor.blocks()[index].id
}

fn pending(editor: &BlockEditor) -> Option<CaretRequest> {
    editor.caret().pending()
}

fn count_changes(editor: &mut BlockEditor) -> Rc<RefCell<usize>> {
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    editor.subscribe(move |_| *sink.borrow_mut() += 1);
    count
}

#[test]
fn empty_document_starts_with_one_paragraph() {
    let editor = editor_with(Vec::new());
    assert_eq!(editor.blocks().len(), 1);
    assert_eq!(editor.blocks()[0].kind, BlockType::Paragraph);
}

#[test]
fn load_schedules_caret_on_first_block() {
    let mut editor = editor_with(Vec::new());
    editor.load(paragraphs(&["first", "second"]));
    assert_eq!(
        pending(&editor),
        Some(CaretRequest {
            block_id: id_at(&editor, 0),
            position: CaretPosition::Start,
        })
    );
}

#[test]
fn content_change_updates_block() {
    let mut editor = editor_with(paragraphs(&["a"]));
    let id = id_at(&editor, 0);
    assert!(editor.handle(EditorEvent::ContentChanged {
        block: id,
        text: "abc".to_string(),
    }));
    assert_eq!(contents(&editor), vec!["abc"]);
}

#[test]
fn enter_on_paragraph_adds_empty_paragraph_after() {
    let mut editor = editor_with(paragraphs(&["one", "three"]));
    let id = id_at(&editor, 0);
    assert!(editor.handle(EditorEvent::Enter { block: id }));
    assert_eq!(contents(&editor), vec!["one", "", "three"]);
    assert_eq!(editor.blocks()[1].kind, BlockType::Paragraph);
    assert_eq!(
        pending(&editor),
        Some(CaretRequest {
            block_id: id_at(&editor, 1),
            position: CaretPosition::Start,
        })
    );
}

#[test]
fn enter_on_heading_continues_with_paragraph() {
    let mut editor = editor_with(vec![Block::new(BlockType::Heading1, "Title")]);
    let id = id_at(&editor, 0);
    editor.handle(EditorEvent::Enter { block: id });
    assert_eq!(editor.blocks()[1].kind, BlockType::Paragraph);
}

#[test]
fn enter_on_list_items_continues_the_list() {
    let mut editor = editor_with(vec![
        Block::new(BlockType::Bullet, "milk"),
        Block::new(BlockType::Checklist, "done").with_properties(json!({ "checked": true })),
    ]);
    let bullet = id_at(&editor, 0);
    editor.handle(EditorEvent::Enter { block: bullet });
    assert_eq!(editor.blocks()[1].kind, BlockType::Bullet);

    let checklist = id_at(&editor, 2);
    editor.handle(EditorEvent::Enter { block: checklist });
    assert_eq!(editor.blocks()[3].kind, BlockType::Checklist);
    assert!(!editor.blocks()[3].is_checked());
}

#[test]
fn split_moves_tail_into_new_block_with_one_emit() {
    let mut editor = editor_with(paragraphs(&["héllo world"]));
    let changes = count_changes(&mut editor);
    let id = id_at(&editor, 0);
    assert!(editor.handle(EditorEvent::Split {
        block: id,
        offset: 5,
    }));
    assert_eq!(contents(&editor), vec!["héllo", " world"]);
    assert_eq!(id_at(&editor, 0), id);
    assert_eq!(*changes.borrow(), 1);
}

#[test]
fn backspace_removes_empty_block_and_focuses_previous_end() {
    let mut editor = editor_with(paragraphs(&["keep", ""]));
    let previous = id_at(&editor, 0);
    let empty = id_at(&editor, 1);
    assert!(editor.handle(EditorEvent::Backspace { block: empty }));
    assert_eq!(contents(&editor), vec!["keep"]);
    assert_eq!(
        pending(&editor),
        Some(CaretRequest {
            block_id: previous,
            position: CaretPosition::End,
        })
    );
}

#[test]
fn backspace_ignores_first_and_non_empty_blocks() {
    let mut editor = editor_with(paragraphs(&["", "text"]));
    let first = id_at(&editor, 0);
    let second = id_at(&editor, 1);
    assert!(!editor.handle(EditorEvent::Backspace { block: first }));
    assert!(!editor.handle(EditorEvent::Backspace { block: second }));
    assert_eq!(editor.blocks().len(), 2);
}

#[test]
fn backspace_on_sole_block_keeps_document() {
    let mut editor = editor_with(Vec::new());
    let only = id_at(&editor, 0);
    assert!(!editor.handle(EditorEvent::Backspace { block: only }));
    assert_eq!(editor.blocks().len(), 1);
    assert_eq!(id_at(&editor, 0), only);
}

#[test]
fn merge_backward_joins_text_and_places_caret_at_seam() {
    let mut editor = editor_with(paragraphs(&["foo", "bar"]));
    let previous = id_at(&editor, 0);
    let current = id_at(&editor, 1);
    assert!(editor.handle(EditorEvent::MergeBackward { block: current }));
    assert_eq!(contents(&editor), vec!["foobar"]);
    assert_eq!(
        pending(&editor),
        Some(CaretRequest {
            block_id: previous,
            position: CaretPosition::Offset(3),
        })
    );
}

#[test]
fn merge_backward_skips_dividers() {
    let mut editor = editor_with(vec![
        Block::new(BlockType::Divider, ""),
        Block::new(BlockType::Paragraph, "text"),
    ]);
    let current = id_at(&editor, 1);
    assert!(!editor.handle(EditorEvent::MergeBackward { block: current }));
    assert_eq!(editor.blocks().len(), 2);
}

#[test]
fn navigation_moves_between_neighbours() {
    let mut editor = editor_with(paragraphs(&["a", "b", "c"]));
    let middle = id_at(&editor, 1);

    editor.handle(EditorEvent::Navigate {
        block: middle,
        direction: NavigateDirection::Up,
    });
    assert_eq!(
        pending(&editor),
        Some(CaretRequest {
            block_id: id_at(&editor, 0),
            position: CaretPosition::End,
        })
    );

    editor.handle(EditorEvent::Navigate {
        block: middle,
        direction: NavigateDirection::Down,
    });
    assert_eq!(
        pending(&editor),
        Some(CaretRequest {
            block_id: id_at(&editor, 2),
            position: CaretPosition::Start,
        })
    );

    let last = id_at(&editor, 2);
    assert!(!editor.handle(EditorEvent::Navigate {
        block: last,
        direction: NavigateDirection::Down,
    }));
}

#[test]
fn shift_navigation_extends_selection() {
    let mut editor = editor_with(paragraphs(&["a", "b", "c"]));
    let middle = id_at(&editor, 1);
    editor.handle(EditorEvent::Navigate {
        block: middle,
        direction: NavigateDirection::SelectUp,
    });
    assert_eq!(editor.selection().len(), 2);
    assert!(editor.selection().contains(&id_at(&editor, 0)));
}

#[test]
fn slash_command_converts_block_and_guards_enter() {
    let mut editor = editor_with(paragraphs(&["hello/"]));
    let id = id_at(&editor, 0);
    let now = Instant::now();

    assert!(editor.handle_at(EditorEvent::SlashTrigger { block: id, x: 6, y: 0 }, now));
    assert!(editor.slash_menu().is_open());
    assert!(!editor.handle_at(EditorEvent::Enter { block: id }, now));

    assert!(editor.handle_at(
        EditorEvent::SlashSelect {
            block_type: BlockType::Heading1,
        },
        now,
    ));
    assert_eq!(editor.blocks()[0].kind, BlockType::Heading1);
    assert_eq!(editor.blocks()[0].content, "hello");

    let echo = now + Duration::from_millis(20);
    assert!(!editor.handle_at(EditorEvent::Enter { block: id }, echo));
    assert_eq!(editor.blocks().len(), 1);

    let later = now + Duration::from_millis(400);
    assert!(editor.handle_at(EditorEvent::Enter { block: id }, later));
    assert_eq!(editor.blocks().len(), 2);
}

#[test]
fn slash_close_keeps_content() {
    let mut editor = editor_with(paragraphs(&["a/"]));
    let id = id_at(&editor, 0);
    editor.handle(EditorEvent::SlashTrigger { block: id, x: 0, y: 0 });
    editor.handle(EditorEvent::SlashMove { delta: 3 });
    assert!(editor.handle(EditorEvent::SlashClose));
    assert_eq!(editor.blocks()[0].content, "a/");
    assert_eq!(editor.blocks()[0].kind, BlockType::Paragraph);
    assert!(!editor.handle(EditorEvent::SlashConfirm));
}

#[test]
fn paste_into_empty_block_reuses_it() {
    let mut editor = editor_with(Vec::new());
    let id = id_at(&editor, 0);
    assert!(editor.handle(EditorEvent::Paste {
        block: id,
        plain_text: "Just text".to_string(),
        html: None,
    }));
    assert_eq!(editor.blocks().len(), 1);
    assert_eq!(id_at(&editor, 0), id);
    assert_eq!(contents(&editor), vec!["Just text"]);
}

#[test]
fn paste_multiple_lines_creates_typed_blocks_with_one_emit() {
    let mut editor = editor_with(Vec::new());
    let changes = count_changes(&mut editor);
    let id = id_at(&editor, 0);
    editor.handle(EditorEvent::Paste {
        block: id,
        plain_text: "# Title\n- item one\n- item two".to_string(),
        html: None,
    });
    let kinds: Vec<BlockType> = editor.blocks().iter().map(|block| block.kind).collect();
    assert_eq!(
        kinds,
        vec![BlockType::Heading1, BlockType::Bullet, BlockType::Bullet]
    );
    assert_eq!(contents(&editor), vec!["Title", "item one", "item two"]);
    assert_eq!(*changes.borrow(), 1);
    assert_eq!(
        pending(&editor),
        Some(CaretRequest {
            block_id: id_at(&editor, 2),
            position: CaretPosition::End,
        })
    );
}

#[test]
fn paste_prefers_html() {
    let mut editor = editor_with(Vec::new());
    let id = id_at(&editor, 0);
    editor.handle(EditorEvent::Paste {
        block: id,
        plain_text: "ignored".to_string(),
        html: Some("<blockquote>Quoted</blockquote>".to_string()),
    });
    assert_eq!(editor.blocks()[0].kind, BlockType::Quote);
    assert_eq!(editor.blocks()[0].content, "Quoted");
}

#[test]
fn delete_selected_removes_blocks_and_focuses_predecessor() {
    let mut editor = editor_with(paragraphs(&["A", "B", "C", "D"]));
    let a = id_at(&editor, 0);
    let b = id_at(&editor, 1);
    editor.handle(EditorEvent::Navigate {
        block: b,
        direction: NavigateDirection::SelectDown,
    });
    assert!(editor.handle(EditorEvent::DeleteSelected));
    assert_eq!(contents(&editor), vec!["A", "D"]);
    assert_eq!(
        pending(&editor),
        Some(CaretRequest {
            block_id: a,
            position: CaretPosition::End,
        })
    );
}

#[test]
fn drag_drop_and_move_block_reorder() {
    let mut editor = editor_with(paragraphs(&["a", "b", "c"]));
    assert!(editor.handle(EditorEvent::DragDrop { from: 0, to: 2 }));
    assert_eq!(contents(&editor), vec!["b", "c", "a"]);

    let moved = id_at(&editor, 2);
    assert!(editor.handle(EditorEvent::MoveBlock {
        block: moved,
        direction: VerticalDirection::Up,
    }));
    assert_eq!(contents(&editor), vec!["b", "a", "c"]);
}

#[test]
fn toggle_checked_flips_checklist_state() {
    let mut editor = editor_with(vec![
        Block::new(BlockType::Checklist, "task"),
        Block::new(BlockType::Paragraph, "plain"),
    ]);
    let task = id_at(&editor, 0);
    assert!(editor.handle(EditorEvent::ToggleChecked { block: task }));
    assert!(editor.blocks()[0].is_checked());
    assert!(editor.handle(EditorEvent::ToggleChecked { block: task }));
    assert!(!editor.blocks()[0].is_checked());

    let plain = id_at(&editor, 1);
    assert!(!editor.handle(EditorEvent::ToggleChecked { block: plain }));
}

#[test]
fn focus_and_blur_track_focused_block() {
    let mut editor = editor_with(paragraphs(&["a"]));
    let id = id_at(&editor, 0);
    assert!(editor.handle(EditorEvent::Focus { block: id }));
    assert_eq!(editor.focused_block(), Some(id));
    assert!(editor.handle(EditorEvent::Blur));
    assert_eq!(editor.focused_block(), None);
    assert!(!editor.handle(EditorEvent::Focus {
        block: BlockId::new(),
    }));
}
