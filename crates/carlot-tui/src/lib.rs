// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use carlot_app::{
    AmountClass, AppCommand, AppMode, AppState, CellEdit, DerivedView, EditorKind, GridIntent,
    HighlightPolicy, Reconciled, Record, RecordField, RecordId, ReferenceData, RowChange,
    SortDirection, format_amount, parse_amount,
};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const SORT_ARROW_ASC: &str = "↑";
const SORT_ARROW_DESC: &str = "↓";
const FILTER_MARK_ACTIVE: &str = "▼";
const CHECKBOX_ON: &str = "[x]";
const CHECKBOX_OFF: &str = "[ ]";

/// Seam between the grid surface and whatever owns the records.
///
/// The grid only ever renders what this hands back: rows from `load_rows`
/// and row transactions from `apply_intent`.
pub trait GridRuntime {
    fn reference(&self) -> Arc<ReferenceData>;
    fn highlight_policy(&self) -> HighlightPolicy;
    fn total_label(&self) -> String;
    fn load_rows(&mut self) -> Result<(Vec<Record>, DerivedView)>;
    fn apply_intent(&mut self, intent: GridIntent) -> Result<Reconciled>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: RecordField,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableUiState {
    pub selected_row: usize,
    pub selected_col: usize,
    pub checked: BTreeSet<RecordId>,
    pub sort: Option<SortSpec>,
    pub category_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellEditor {
    Choice {
        id: RecordId,
        field: RecordField,
        options: Vec<String>,
        cursor: usize,
    },
    Text {
        id: RecordId,
        field: RecordField,
        buffer: String,
    },
}

impl CellEditor {
    fn id(&self) -> RecordId {
        match self {
            Self::Choice { id, .. } | Self::Text { id, .. } => *id,
        }
    }

    fn field(&self) -> RecordField {
        match self {
            Self::Choice { field, .. } | Self::Text { field, .. } => *field,
        }
    }

    /// The value the editor would commit right now.
    fn value(&self) -> Option<&str> {
        match self {
            Self::Choice {
                options, cursor, ..
            } => options.get(*cursor).map(String::as_str),
            Self::Text { buffer, .. } => Some(buffer.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewData {
    /// Row buffer in store order. Only `RowChange::apply_to` writes here.
    pub rows: Vec<Record>,
    pub derived: DerivedView,
    pub reference: Arc<ReferenceData>,
    pub policy: HighlightPolicy,
    pub total_label: String,
    pub table_state: TableUiState,
    pub editor: Option<CellEditor>,
    status_token: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableCommand {
    MoveRow(isize),
    MoveColumn(isize),
    JumpFirstRow,
    JumpLastRow,
    ToggleChecked,
    ToggleAllChecked,
    CycleSort,
    ToggleCategoryFilter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TableStatus {
    NoRowSelected,
    Checked(RecordId),
    Unchecked(RecordId),
    AllChecked(usize),
    AllUnchecked,
    SortAsc(&'static str),
    SortDesc(&'static str),
    SortCleared,
    FilterOn(String),
    FilterOff,
}

impl TableStatus {
    fn message(self) -> String {
        match self {
            Self::NoRowSelected => "no row selected".to_owned(),
            Self::Checked(id) => format!("row {id} checked"),
            Self::Unchecked(id) => format!("row {id} unchecked"),
            Self::AllChecked(count) => format!("{count} rows checked"),
            Self::AllUnchecked => "all rows unchecked".to_owned(),
            Self::SortAsc(column) => format!("sort {column} asc"),
            Self::SortDesc(column) => format!("sort {column} desc"),
            Self::SortCleared => "sort cleared".to_owned(),
            Self::FilterOn(category) => format!("filter on ({category})"),
            Self::FilterOff => "filter off".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TableEvent {
    CursorUpdated,
    Status(TableStatus),
}

pub fn run_app<R: GridRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    if let Err(error) = refresh_view_data(runtime, &mut view_data) {
        state.dispatch(AppCommand::SetStatus(format!("load failed: {error:#}")));
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, &view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn refresh_view_data<R: GridRuntime>(runtime: &mut R, view_data: &mut ViewData) -> Result<()> {
    let (rows, derived) = runtime.load_rows().context("load rows")?;
    view_data.reference = runtime.reference();
    view_data.policy = runtime.highlight_policy();
    view_data.total_label = runtime.total_label();
    view_data.rows = rows;
    view_data.derived = derived;

    let rows = &view_data.rows;
    view_data
        .table_state
        .checked
        .retain(|id| rows.iter().any(|row| row.id == *id));
    clamp_table_cursor(view_data);
    Ok(())
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: GridRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q'))
    {
        return true;
    }

    if state.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            state.dispatch(AppCommand::ToggleHelp);
        }
        return false;
    }

    if view_data.editor.is_some() {
        handle_editor_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    if handle_table_key(state, view_data, internal_tx, key) {
        return false;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), KeyModifiers::NONE) => return true,
        (KeyCode::Char('n'), KeyModifiers::NONE) => add_row(state, runtime, view_data, internal_tx),
        (KeyCode::Char('d'), KeyModifiers::NONE) => {
            remove_checked_rows(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Enter, _) | (KeyCode::Char('e'), KeyModifiers::NONE) => {
            open_editor(state, view_data, internal_tx);
        }
        (KeyCode::Char('?'), _) => {
            state.dispatch(AppCommand::ToggleHelp);
        }
        _ => {}
    }
    false
}

fn handle_table_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if state.mode != AppMode::Nav {
        return false;
    }
    let Some(command) = table_command_for_key(key) else {
        return false;
    };

    let event = apply_table_command(view_data, command);
    if let TableEvent::Status(status) = event {
        emit_status(state, view_data, internal_tx, status.message());
    }
    true
}

fn table_command_for_key(key: KeyEvent) -> Option<TableCommand> {
    match (key.code, key.modifiers) {
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(TableCommand::MoveRow(1)),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(TableCommand::MoveRow(-1)),
        (KeyCode::Char('h'), _) | (KeyCode::Left, _) => Some(TableCommand::MoveColumn(-1)),
        (KeyCode::Char('l'), _) | (KeyCode::Right, _) => Some(TableCommand::MoveColumn(1)),
        (KeyCode::Char('g'), _) | (KeyCode::Home, _) => Some(TableCommand::JumpFirstRow),
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => Some(TableCommand::JumpLastRow),
        (KeyCode::Char(' '), KeyModifiers::NONE) => Some(TableCommand::ToggleChecked),
        (KeyCode::Char('a'), KeyModifiers::NONE) => Some(TableCommand::ToggleAllChecked),
        (KeyCode::Char('s'), KeyModifiers::NONE) => Some(TableCommand::CycleSort),
        (KeyCode::Char('f'), KeyModifiers::NONE) => Some(TableCommand::ToggleCategoryFilter),
        _ => None,
    }
}

fn apply_table_command(view_data: &mut ViewData, command: TableCommand) -> TableEvent {
    match command {
        TableCommand::MoveRow(delta) => {
            move_row(view_data, delta);
            TableEvent::CursorUpdated
        }
        TableCommand::MoveColumn(delta) => {
            move_col(view_data, delta);
            TableEvent::CursorUpdated
        }
        TableCommand::JumpFirstRow => {
            view_data.table_state.selected_row = 0;
            TableEvent::CursorUpdated
        }
        TableCommand::JumpLastRow => {
            view_data.table_state.selected_row = visible_rows(view_data).len().saturating_sub(1);
            TableEvent::CursorUpdated
        }
        TableCommand::ToggleChecked => TableEvent::Status(toggle_checked(view_data)),
        TableCommand::ToggleAllChecked => TableEvent::Status(toggle_all_checked(view_data)),
        TableCommand::CycleSort => TableEvent::Status(cycle_sort(view_data)),
        TableCommand::ToggleCategoryFilter => {
            TableEvent::Status(toggle_category_filter(view_data))
        }
    }
}

fn move_row(view_data: &mut ViewData, delta: isize) {
    let count = visible_rows(view_data).len();
    if count == 0 {
        view_data.table_state.selected_row = 0;
        return;
    }
    let current = view_data.table_state.selected_row as isize;
    let next = (current + delta).clamp(0, count as isize - 1);
    view_data.table_state.selected_row = next as usize;
}

fn move_col(view_data: &mut ViewData, delta: isize) {
    let last = RecordField::ALL.len() as isize - 1;
    let current = view_data.table_state.selected_col as isize;
    view_data.table_state.selected_col = (current + delta).clamp(0, last) as usize;
}

fn toggle_checked(view_data: &mut ViewData) -> TableStatus {
    let Some(id) = selected_record(view_data).map(|record| record.id) else {
        return TableStatus::NoRowSelected;
    };
    let checked = &mut view_data.table_state.checked;
    if checked.remove(&id) {
        TableStatus::Unchecked(id)
    } else {
        checked.insert(id);
        TableStatus::Checked(id)
    }
}

fn toggle_all_checked(view_data: &mut ViewData) -> TableStatus {
    let visible = visible_rows(view_data)
        .into_iter()
        .map(|record| record.id)
        .collect::<Vec<_>>();
    if visible.is_empty() {
        return TableStatus::NoRowSelected;
    }

    let checked = &mut view_data.table_state.checked;
    if visible.iter().all(|id| checked.contains(id)) {
        for id in &visible {
            checked.remove(id);
        }
        TableStatus::AllUnchecked
    } else {
        checked.extend(visible.iter().copied());
        TableStatus::AllChecked(visible.len())
    }
}

fn cycle_sort(view_data: &mut ViewData) -> TableStatus {
    let field = selected_field(view_data);
    let keep = selected_record(view_data).map(|record| record.id);

    view_data.table_state.sort = match view_data.table_state.sort {
        Some(sort) if sort.field == field => match sort.direction {
            SortDirection::Asc => Some(SortSpec {
                field,
                direction: SortDirection::Desc,
            }),
            SortDirection::Desc => None,
        },
        _ => Some(SortSpec {
            field,
            direction: SortDirection::Asc,
        }),
    };

    if let Some(id) = keep {
        select_record(view_data, id);
    }
    match view_data.table_state.sort.map(|sort| sort.direction) {
        Some(SortDirection::Asc) => TableStatus::SortAsc(field.label()),
        Some(SortDirection::Desc) => TableStatus::SortDesc(field.label()),
        None => TableStatus::SortCleared,
    }
}

fn toggle_category_filter(view_data: &mut ViewData) -> TableStatus {
    let keep = selected_record(view_data).map(|record| record.id);

    let status = if view_data.table_state.category_filter.take().is_some() {
        TableStatus::FilterOff
    } else {
        let Some(category) = selected_record(view_data).map(|record| record.category.clone())
        else {
            return TableStatus::NoRowSelected;
        };
        view_data.table_state.category_filter = Some(category.clone());
        TableStatus::FilterOn(category)
    };

    if !keep.is_some_and(|id| select_record(view_data, id)) {
        clamp_table_cursor(view_data);
    }
    status
}

fn handle_editor_key<R: GridRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            view_data.editor = None;
            state.dispatch(AppCommand::ExitToNav);
            emit_status(state, view_data, internal_tx, "edit canceled");
        }
        KeyCode::Enter => commit_editor(state, runtime, view_data, internal_tx),
        _ => {
            if let Some(editor) = view_data.editor.as_mut() {
                edit_buffer(editor, key);
            }
        }
    }
}

fn edit_buffer(editor: &mut CellEditor, key: KeyEvent) {
    match editor {
        CellEditor::Choice {
            options, cursor, ..
        } => match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                *cursor = (*cursor + 1).min(options.len().saturating_sub(1));
            }
            KeyCode::Char('k') | KeyCode::Up => *cursor = cursor.saturating_sub(1),
            KeyCode::Char('g') | KeyCode::Home => *cursor = 0,
            KeyCode::Char('G') | KeyCode::End => *cursor = options.len().saturating_sub(1),
            _ => {}
        },
        CellEditor::Text { buffer, .. } => match key.code {
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                buffer.push(ch);
            }
            KeyCode::Backspace => {
                buffer.pop();
            }
            _ => {}
        },
    }
}

fn open_editor(state: &mut AppState, view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>) {
    let field = selected_field(view_data);
    let Some(record) = selected_record(view_data).cloned() else {
        emit_status(state, view_data, internal_tx, TableStatus::NoRowSelected.message());
        return;
    };

    let editor = match field.editor() {
        EditorKind::FixedChoice => choice_editor(
            record.id,
            field,
            view_data.reference.categories().to_vec(),
            &record.category,
        ),
        EditorKind::DependentChoice => {
            let options = view_data
                .reference
                .subcategories_for(&record.category)
                .to_vec();
            if options.is_empty() {
                let message = format!("no {} choices for {}", field.label(), record.category);
                emit_status(state, view_data, internal_tx, message);
                return;
            }
            choice_editor(record.id, field, options, &record.subcategory)
        }
        EditorKind::Text => CellEditor::Text {
            id: record.id,
            field,
            buffer: record.raw_value(field),
        },
    };

    view_data.editor = Some(editor);
    state.dispatch(AppCommand::BeginEdit(field));
}

fn choice_editor(
    id: RecordId,
    field: RecordField,
    options: Vec<String>,
    current: &str,
) -> CellEditor {
    let cursor = options
        .iter()
        .position(|option| option == current)
        .unwrap_or(0);
    CellEditor::Choice {
        id,
        field,
        options,
        cursor,
    }
}

/// Hands the edited cell to the runtime and renders whatever record comes back.
fn commit_editor<R: GridRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(editor) = view_data.editor.take() else {
        return;
    };
    state.dispatch(AppCommand::ExitToNav);

    let field = editor.field();
    let Some(value) = editor.value() else {
        emit_status(state, view_data, internal_tx, "nothing to commit");
        return;
    };
    let edit = match view_data.rows.iter().find(|row| row.id == editor.id()) {
        Some(row) => CellEdit::from_row(&stage_edit(row, field, value), field),
        None => CellEdit::new(editor.id(), field, value),
    };

    let message = match run_intent(runtime, view_data, GridIntent::CommitEdit(edit)) {
        Ok(RowChange::Replaced { record }) => commit_message(&record, field),
        Ok(_) => format!("{} updated", field.label()),
        Err(error) => format!("edit dropped: {error:#}"),
    };
    emit_status(state, view_data, internal_tx, message);
}

/// The surface's post-edit copy of a row, before the store resolves it.
fn stage_edit(row: &Record, field: RecordField, value: &str) -> Record {
    let mut staged = row.clone();
    match field {
        RecordField::Category => staged.category = value.to_owned(),
        RecordField::Subcategory => staged.subcategory = value.to_owned(),
        RecordField::Amount => staged.amount = parse_amount(value),
    }
    staged
}

fn commit_message(record: &Record, field: RecordField) -> String {
    match field {
        RecordField::Category => format!(
            "{} set to {}; {} reset to {}",
            RecordField::Category.label(),
            record.category,
            RecordField::Subcategory.label(),
            display_or_dash(&record.subcategory)
        ),
        RecordField::Subcategory => format!(
            "{} set to {}",
            field.label(),
            display_or_dash(&record.subcategory)
        ),
        RecordField::Amount => format!("{} set to {}", field.label(), format_amount(record.amount)),
    }
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

fn add_row<R: GridRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let message = match run_intent(runtime, view_data, GridIntent::AddRow) {
        Ok(RowChange::Inserted { record, .. }) => {
            if select_record(view_data, record.id) {
                format!("row {} added", record.id)
            } else {
                format!("row {} added (hidden by filter)", record.id)
            }
        }
        Ok(_) => "row added".to_owned(),
        Err(error) => format!("add failed: {error:#}"),
    };
    emit_status(state, view_data, internal_tx, message);
}

fn remove_checked_rows<R: GridRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if view_data.table_state.checked.is_empty() {
        emit_status(state, view_data, internal_tx, "no rows checked");
        return;
    }

    let ids = view_data.table_state.checked.clone();
    let before = view_data.rows.len();
    let message = match run_intent(runtime, view_data, GridIntent::RemoveRows(ids)) {
        Ok(_) => {
            view_data.table_state.checked.clear();
            let removed = before.saturating_sub(view_data.rows.len());
            if removed == 1 {
                "1 row removed".to_owned()
            } else {
                format!("{removed} rows removed")
            }
        }
        Err(error) => format!("remove failed: {error:#}"),
    };
    emit_status(state, view_data, internal_tx, message);
}

fn run_intent<R: GridRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    intent: GridIntent,
) -> Result<RowChange> {
    let Reconciled { change, view } = runtime.apply_intent(intent)?;
    change.apply_to(&mut view_data.rows);
    view_data.derived = view;
    clamp_table_cursor(view_data);
    Ok(change)
}

/// Rows as displayed: category filter first, then a stable sort.
fn visible_rows(view_data: &ViewData) -> Vec<&Record> {
    let table_state = &view_data.table_state;
    let mut rows = view_data
        .rows
        .iter()
        .filter(|row| {
            table_state
                .category_filter
                .as_ref()
                .is_none_or(|category| row.category == *category)
        })
        .collect::<Vec<_>>();

    if let Some(sort) = table_state.sort {
        rows.sort_by(|left, right| {
            let ordering = compare_field(left, right, sort.field);
            match sort.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
    }
    rows
}

fn compare_field(left: &Record, right: &Record, field: RecordField) -> Ordering {
    match field {
        RecordField::Category => left
            .category
            .to_lowercase()
            .cmp(&right.category.to_lowercase()),
        RecordField::Subcategory => left
            .subcategory
            .to_lowercase()
            .cmp(&right.subcategory.to_lowercase()),
        RecordField::Amount => left.amount.total_cmp(&right.amount),
    }
}

fn selected_record(view_data: &ViewData) -> Option<&Record> {
    visible_rows(view_data)
        .get(view_data.table_state.selected_row)
        .copied()
}

fn selected_field(view_data: &ViewData) -> RecordField {
    let index = view_data
        .table_state
        .selected_col
        .min(RecordField::ALL.len() - 1);
    RecordField::ALL[index]
}

fn select_record(view_data: &mut ViewData, id: RecordId) -> bool {
    let position = visible_rows(view_data)
        .iter()
        .position(|record| record.id == id);
    match position {
        Some(index) => {
            view_data.table_state.selected_row = index;
            true
        }
        None => false,
    }
}

fn clamp_table_cursor(view_data: &mut ViewData) {
    let count = visible_rows(view_data).len();
    let table_state = &mut view_data.table_state;
    table_state.selected_row = table_state.selected_row.min(count.saturating_sub(1));
    table_state.selected_col = table_state.selected_col.min(RecordField::ALL.len() - 1);
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let header = Paragraph::new(header_text(view_data))
        .block(Block::default().title("carlot").borders(Borders::ALL));
    frame.render_widget(header, layout[0]);

    render_table(frame, layout[1], view_data);
    render_summary(frame, layout[2], view_data);

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status_widget, layout[3]);

    if let Some(editor) = &view_data.editor {
        let area = centered_rect(50, 50, frame.area());
        frame.render_widget(Clear, area);
        let overlay = Paragraph::new(editor_overlay_text(editor)).block(
            Block::default()
                .title(format!("edit {}", editor.field().label()))
                .borders(Borders::ALL),
        );
        frame.render_widget(overlay, area);
    }

    if state.help_visible {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn column_widths() -> [Constraint; 4] {
    [
        Constraint::Length(3),
        Constraint::Min(10),
        Constraint::Min(10),
        Constraint::Min(18),
    ]
}

fn render_table(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let bold = Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::BOLD);
    let mut header_cells = vec![Cell::from(header_checkbox(view_data)).style(bold)];
    header_cells.extend(
        RecordField::ALL
            .iter()
            .map(|field| Cell::from(header_label(view_data, *field)).style(bold)),
    );
    let header = Row::new(header_cells);

    let table_state = &view_data.table_state;
    let rows = visible_rows(view_data)
        .into_iter()
        .enumerate()
        .map(|(row_index, record)| {
            let selected_row = row_index == table_state.selected_row;
            let highlighted = view_data.derived.is_row_highlighted(record.id);

            let mut base = Style::default();
            if highlighted {
                base = base.fg(Color::LightRed);
            }
            if selected_row {
                base = base.bg(Color::DarkGray);
            }

            let checkbox = if table_state.checked.contains(&record.id) {
                CHECKBOX_ON
            } else {
                CHECKBOX_OFF
            };
            let mut cells = vec![Cell::from(checkbox).style(base)];
            cells.extend(RecordField::ALL.iter().enumerate().map(|(col, field)| {
                let mut style = base;
                if highlighted && *field == RecordField::Amount {
                    style = style.fg(Color::Red).add_modifier(Modifier::BOLD);
                }
                if selected_row && col == table_state.selected_col {
                    style = Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD);
                }
                Cell::from(cell_text(view_data, record, *field)).style(style)
            }));
            Row::new(cells)
        });

    let table = Table::new(rows, column_widths())
        .header(header)
        .column_spacing(1)
        .block(Block::default().title("listings").borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn render_summary(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let (label, amount) = summary_cells(view_data);
    let mut amount_style = Style::default();
    if view_data.policy.classify(view_data.derived.total) == AmountClass::Highlighted {
        amount_style = amount_style.fg(Color::Red);
    }
    let row = Row::new(vec![
        Cell::from(""),
        Cell::from(label),
        Cell::from(""),
        Cell::from(amount).style(amount_style),
    ])
    .style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );
    let table = Table::new(vec![row], column_widths())
        .column_spacing(1)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn header_text(view_data: &ViewData) -> String {
    let mut text = format!(
        "{} listings | {} checked",
        view_data.rows.len(),
        view_data.table_state.checked.len()
    );
    if let Some(category) = &view_data.table_state.category_filter {
        text.push_str(&format!(
            " | {} = {category}",
            RecordField::Category.label()
        ));
    }
    text
}

fn header_checkbox(view_data: &ViewData) -> &'static str {
    let visible = visible_rows(view_data);
    let all_checked = !visible.is_empty()
        && visible
            .iter()
            .all(|record| view_data.table_state.checked.contains(&record.id));
    if all_checked { CHECKBOX_ON } else { CHECKBOX_OFF }
}

fn header_label(view_data: &ViewData, field: RecordField) -> String {
    let mut label = field.label().to_owned();
    if let Some(sort) = view_data.table_state.sort
        && sort.field == field
    {
        label.push(' ');
        label.push_str(match sort.direction {
            SortDirection::Asc => SORT_ARROW_ASC,
            SortDirection::Desc => SORT_ARROW_DESC,
        });
    }
    if field == RecordField::Category && view_data.table_state.category_filter.is_some() {
        label.push(' ');
        label.push_str(FILTER_MARK_ACTIVE);
    }
    label
}

fn cell_text(view_data: &ViewData, record: &Record, field: RecordField) -> String {
    match field {
        RecordField::Category => record.category.clone(),
        RecordField::Subcategory => record.subcategory.clone(),
        RecordField::Amount => view_data.policy.decorate(record.amount),
    }
}

/// Label and formatted total for the pinned trailing row.
fn summary_cells(view_data: &ViewData) -> (String, String) {
    let summary = view_data.derived.summary_row(&view_data.total_label);
    (summary.label, view_data.policy.decorate(summary.amount))
}

fn editor_overlay_text(editor: &CellEditor) -> String {
    match editor {
        CellEditor::Choice {
            options, cursor, ..
        } => options
            .iter()
            .enumerate()
            .map(|(index, option)| {
                let marker = if index == *cursor { ">" } else { " " };
                format!("{marker} {option}")
            })
            .collect::<Vec<_>>()
            .join("\n"),
        CellEditor::Text { buffer, .. } => format!("{buffer}_"),
    }
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    let mode = match state.mode {
        AppMode::Nav => "NAV",
        AppMode::Edit(_) => "EDIT",
    };
    let hints = match &view_data.editor {
        Some(CellEditor::Choice { .. }) => "j/k g/G choose | enter commit | esc cancel",
        Some(CellEditor::Text { .. }) => "type | backspace | enter commit | esc cancel",
        None => {
            "j/k/h/l g/G | space/a check | n add | d del | enter/e edit | s sort | f filter | ? help | q quit"
        }
    };
    match &state.status_line {
        Some(status) => format!("{mode} | {status} | {hints}"),
        None => format!("{mode} | {hints}"),
    }
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q/ctrl+c quit\n\
nav: j/k/h/l or arrows move | g/G first/last row | q quit | ? help\n\
nav: space check row | a check/uncheck all | n add row | d delete checked\n\
nav: enter/e edit cell | s cycle sort (asc/desc/off) | f filter by make\n\
edit (choice): j/k g/G choose | enter commit | esc cancel\n\
edit (price): type | backspace | enter commit | esc cancel\n\
help: esc or ? close"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        CellEditor, GridRuntime, InternalEvent, ViewData, cell_text, compare_field,
        handle_key_event, header_checkbox, header_label, process_internal_events,
        refresh_view_data, status_text, summary_cells, visible_rows,
    };
    use anyhow::Result;
    use carlot_app::{
        AppCommand, AppMode, AppState, DEFAULT_TOTAL_LABEL, DerivedView, GridIntent,
        HighlightPolicy, Reconciled, Record, RecordField, RecordId, RecordStore, ReferenceData,
    };
    use carlot_testkit::demo_store;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::cmp::Ordering;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::sync::mpsc::{self, Receiver, Sender};

    struct TestRuntime {
        store: RecordStore,
        policy: HighlightPolicy,
        intent_count: usize,
    }

    impl TestRuntime {
        fn demo() -> Self {
            Self {
                store: demo_store(),
                policy: HighlightPolicy::default(),
                intent_count: 0,
            }
        }
    }

    impl GridRuntime for TestRuntime {
        fn reference(&self) -> Arc<ReferenceData> {
            self.store.shared_reference()
        }

        fn highlight_policy(&self) -> HighlightPolicy {
            self.policy
        }

        fn total_label(&self) -> String {
            DEFAULT_TOTAL_LABEL.to_owned()
        }

        fn load_rows(&mut self) -> Result<(Vec<Record>, DerivedView)> {
            let rows = self.store.snapshot().to_vec();
            let derived = DerivedView::build(&rows, &self.policy);
            Ok((rows, derived))
        }

        fn apply_intent(&mut self, intent: GridIntent) -> Result<Reconciled> {
            self.intent_count += 1;
            Ok(carlot_app::apply_intent(
                &mut self.store,
                &self.policy,
                intent,
            )?)
        }
    }

    struct Harness {
        state: AppState,
        runtime: TestRuntime,
        view_data: ViewData,
        tx: Sender<InternalEvent>,
        _rx: Receiver<InternalEvent>,
    }

    impl Harness {
        fn demo() -> Self {
            let mut runtime = TestRuntime::demo();
            let mut view_data = ViewData::default();
            refresh_view_data(&mut runtime, &mut view_data).expect("demo rows load");
            let (tx, rx) = mpsc::channel();
            Self {
                state: AppState::default(),
                runtime,
                view_data,
                tx,
                _rx: rx,
            }
        }

        fn key(&mut self, code: KeyCode) -> bool {
            self.key_with(code, KeyModifiers::NONE)
        }

        fn key_with(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
            handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                KeyEvent::new(code, modifiers),
            )
        }

        fn keys(&mut self, codes: &[KeyCode]) {
            for code in codes {
                self.key(*code);
            }
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.key(KeyCode::Char(ch));
            }
        }

        fn visible_ids(&self) -> Vec<i64> {
            visible_rows(&self.view_data)
                .iter()
                .map(|record| record.id.get())
                .collect()
        }

        fn assert_in_sync(&self) {
            assert_eq!(self.view_data.rows.as_slice(), self.runtime.store.snapshot());
        }

        fn status(&self) -> &str {
            self.state.status_line.as_deref().unwrap_or_default()
        }
    }

    #[test]
    fn quit_keys_exit_from_nav() {
        let mut harness = Harness::demo();
        assert!(harness.key(KeyCode::Char('q')));
        assert!(harness.key_with(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(harness.key_with(KeyCode::Char('q'), KeyModifiers::CONTROL));
    }

    #[test]
    fn category_commit_renders_store_record_with_reset_model() {
        let mut harness = Harness::demo();
        harness.key(KeyCode::Char('j'));
        harness.key(KeyCode::Enter);

        match &harness.view_data.editor {
            Some(CellEditor::Choice { options, cursor, .. }) => {
                assert_eq!(options[*cursor], "Ford");
                assert_eq!(options.len(), 6);
            }
            other => panic!("expected choice editor, got {other:?}"),
        }
        assert_eq!(harness.state.mode, AppMode::Edit(RecordField::Category));

        harness.keys(&[KeyCode::Char('j'), KeyCode::Enter]);
        assert_eq!(
            harness.runtime.store.get(RecordId::new(2)),
            Some(&Record::new(RecordId::new(2), "Porsche", "911", 32_000.0))
        );
        harness.assert_in_sync();
        assert_eq!(harness.state.mode, AppMode::Nav);
        assert!(harness.view_data.editor.is_none());
        assert!(harness.status().contains("model reset to 911"));
    }

    #[test]
    fn price_commit_updates_total_and_highlight() {
        let mut harness = Harness::demo();
        harness.keys(&[KeyCode::Char('l'), KeyCode::Char('l'), KeyCode::Char('j')]);
        harness.key(KeyCode::Char('e'));
        assert_eq!(
            harness.view_data.editor,
            Some(CellEditor::Text {
                id: RecordId::new(2),
                field: RecordField::Amount,
                buffer: "32000".to_owned(),
            })
        );

        for _ in 0..5 {
            harness.key(KeyCode::Backspace);
        }
        harness.type_text("150,000,000");
        harness.key(KeyCode::Enter);

        harness.assert_in_sync();
        assert_eq!(harness.view_data.rows[1].amount, 150_000_000.0);
        assert_eq!(harness.view_data.derived.total, 322_107_000.0);
        assert_eq!(
            harness.view_data.derived.highlighted,
            BTreeSet::from([RecordId::new(2), RecordId::new(4)])
        );
        assert!(harness.status().contains("price set to 150,000,000"));
    }

    #[test]
    fn model_editor_offers_choices_for_the_row_make() {
        let mut harness = Harness::demo();
        harness.key(KeyCode::Char('l'));
        harness.key(KeyCode::Enter);
        assert_eq!(
            harness.view_data.editor,
            Some(CellEditor::Choice {
                id: RecordId::new(1),
                field: RecordField::Subcategory,
                options: vec!["Corolla".to_owned(), "Prius".to_owned(), "Supra".to_owned()],
                cursor: 0,
            })
        );

        harness.key(KeyCode::Esc);
        assert!(harness.view_data.editor.is_none());
        assert_eq!(harness.status(), "edit canceled");
        assert_eq!(harness.runtime.intent_count, 0);
    }

    #[test]
    fn commit_for_row_missing_from_store_is_dropped() {
        let mut harness = Harness::demo();
        harness.keys(&[KeyCode::Char('G'), KeyCode::Char('G')]);
        harness.keys(&[KeyCode::Char('l'), KeyCode::Char('l'), KeyCode::Enter]);
        harness.type_text("9");
        harness
            .runtime
            .store
            .remove(&BTreeSet::from([RecordId::new(4)]));
        let surface_before = harness.view_data.rows.clone();

        harness.key(KeyCode::Enter);
        assert!(harness.status().starts_with("edit dropped"));
        assert!(harness.status().contains("not found"));
        assert_eq!(harness.view_data.rows, surface_before);
        assert_eq!(harness.state.mode, AppMode::Nav);
    }

    #[test]
    fn delete_needs_checked_rows() {
        let mut harness = Harness::demo();
        harness.key(KeyCode::Char('d'));
        assert_eq!(harness.status(), "no rows checked");
        assert_eq!(harness.runtime.intent_count, 0);

        harness.keys(&[
            KeyCode::Char(' '),
            KeyCode::Char('j'),
            KeyCode::Char(' '),
            KeyCode::Char('d'),
        ]);
        harness.assert_in_sync();
        assert_eq!(harness.visible_ids(), vec![3, 4]);
        assert_eq!(harness.view_data.derived.total, 172_072_000.0);
        assert!(harness.view_data.table_state.checked.is_empty());
        assert_eq!(harness.status(), "2 rows removed");
    }

    #[test]
    fn toggle_all_checks_then_clears_visible_rows() {
        let mut harness = Harness::demo();
        harness.key(KeyCode::Char('a'));
        assert_eq!(harness.view_data.table_state.checked.len(), 4);
        assert_eq!(header_checkbox(&harness.view_data), "[x]");

        harness.key(KeyCode::Char('a'));
        assert!(harness.view_data.table_state.checked.is_empty());
        assert_eq!(header_checkbox(&harness.view_data), "[ ]");
    }

    #[test]
    fn add_row_lands_at_head_and_takes_cursor() {
        let mut harness = Harness::demo();
        harness.keys(&[KeyCode::Char('j'), KeyCode::Char('j')]);
        harness.key(KeyCode::Char('n'));

        harness.assert_in_sync();
        assert_eq!(
            harness.view_data.rows[0],
            Record::new(RecordId::new(5), "Toyota", "Corolla", 0.0)
        );
        assert_eq!(harness.view_data.table_state.selected_row, 0);
        assert_eq!(harness.status(), "row 5 added");
    }

    #[test]
    fn sort_cycles_without_touching_store_order() {
        let mut harness = Harness::demo();
        harness.keys(&[KeyCode::Char('l'), KeyCode::Char('l')]);

        harness.key(KeyCode::Char('s'));
        assert_eq!(harness.visible_ids(), vec![2, 1, 3, 4]);
        assert_eq!(header_label(&harness.view_data, RecordField::Amount), "price ↑");

        harness.key(KeyCode::Char('s'));
        assert_eq!(harness.visible_ids(), vec![4, 3, 1, 2]);
        assert_eq!(harness.status(), "sort price desc");

        harness.key(KeyCode::Char('s'));
        assert_eq!(harness.visible_ids(), vec![1, 2, 3, 4]);
        assert_eq!(harness.status(), "sort cleared");

        let store_ids = harness
            .runtime
            .store
            .snapshot()
            .iter()
            .map(|record| record.id.get())
            .collect::<Vec<_>>();
        assert_eq!(store_ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn sort_keeps_the_selected_record_under_the_cursor() {
        let mut harness = Harness::demo();
        harness.keys(&[KeyCode::Char('l'), KeyCode::Char('l'), KeyCode::Char('s')]);
        assert_eq!(harness.view_data.table_state.selected_row, 1);
    }

    #[test]
    fn text_sort_ignores_case() {
        let lower = Record::new(RecordId::new(1), "apple", "", 0.0);
        let upper = Record::new(RecordId::new(2), "Banana", "", 0.0);
        assert_eq!(
            compare_field(&lower, &upper, RecordField::Category),
            Ordering::Less
        );
    }

    #[test]
    fn category_filter_hides_rows_but_total_covers_everything() {
        let mut harness = Harness::demo();
        harness.keys(&[KeyCode::Char('j'), KeyCode::Char('f')]);
        assert_eq!(harness.visible_ids(), vec![2]);
        assert_eq!(harness.status(), "filter on (Ford)");
        assert_eq!(harness.view_data.derived.total, 172_139_000.0);
        assert_eq!(header_label(&harness.view_data, RecordField::Category), "make ▼");

        harness.key(KeyCode::Char('f'));
        assert_eq!(harness.visible_ids(), vec![1, 2, 3, 4]);
        assert_eq!(harness.view_data.table_state.selected_row, 1);
    }

    #[test]
    fn help_overlay_swallows_keys_until_closed() {
        let mut harness = Harness::demo();
        harness.key(KeyCode::Char('?'));
        assert!(harness.state.help_visible);

        harness.key(KeyCode::Char('n'));
        assert_eq!(harness.runtime.store.len(), 4);

        harness.key(KeyCode::Esc);
        assert!(!harness.state.help_visible);
    }

    #[test]
    fn text_editor_accepts_q_without_quitting() {
        let mut harness = Harness::demo();
        harness.keys(&[KeyCode::Char('l'), KeyCode::Char('l'), KeyCode::Enter]);
        assert!(!harness.key(KeyCode::Char('q')));
        assert!(matches!(
            &harness.view_data.editor,
            Some(CellEditor::Text { buffer, .. }) if buffer == "35000q"
        ));
    }

    #[test]
    fn surface_stays_in_lockstep_over_a_key_script() {
        let mut harness = Harness::demo();
        let script = [
            KeyCode::Char('n'),
            KeyCode::Enter,
            KeyCode::Char('j'),
            KeyCode::Char('j'),
            KeyCode::Char('j'),
            KeyCode::Char('j'),
            KeyCode::Char('j'),
            KeyCode::Enter,
            KeyCode::Char('l'),
            KeyCode::Enter,
            KeyCode::Char('j'),
            KeyCode::Enter,
            KeyCode::Char('G'),
            KeyCode::Char(' '),
            KeyCode::Char('d'),
            KeyCode::Char('n'),
            KeyCode::Char('l'),
            KeyCode::Char('e'),
            KeyCode::Char('7'),
            KeyCode::Enter,
        ];
        for code in script {
            harness.key(code);
            harness.assert_in_sync();
            assert_eq!(
                harness.view_data.derived,
                DerivedView::build(harness.runtime.store.snapshot(), &HighlightPolicy::default())
            );
        }
    }

    #[test]
    fn amount_cells_are_decorated_when_highlighted() {
        let harness = Harness::demo();
        let rows = &harness.view_data.rows;
        assert_eq!(
            cell_text(&harness.view_data, &rows[3], RecordField::Amount),
            "💸 172,000,000"
        );
        assert_eq!(
            cell_text(&harness.view_data, &rows[0], RecordField::Amount),
            "35,000"
        );
    }

    #[test]
    fn summary_row_shows_label_and_grouped_total() {
        let harness = Harness::demo();
        assert_eq!(
            summary_cells(&harness.view_data),
            ("total".to_owned(), "💸 172,139,000".to_owned())
        );
    }

    #[test]
    fn summary_row_drops_marker_once_total_falls_below_threshold() {
        let mut harness = Harness::demo();
        harness.keys(&[KeyCode::Char('G'), KeyCode::Char(' '), KeyCode::Char('d')]);
        assert_eq!(
            summary_cells(&harness.view_data),
            ("total".to_owned(), "139,000".to_owned())
        );
    }

    #[test]
    fn status_text_reflects_mode_and_hints() {
        let mut harness = Harness::demo();
        assert!(status_text(&harness.state, &harness.view_data).starts_with("NAV | "));

        harness.key(KeyCode::Enter);
        let text = status_text(&harness.state, &harness.view_data);
        assert!(text.starts_with("EDIT | editing make | "));
        assert!(text.contains("esc cancel"));
    }

    #[test]
    fn stale_status_clear_is_ignored() {
        let mut harness = Harness::demo();
        harness.key(KeyCode::Char('a'));
        let (tx, rx) = mpsc::channel();

        tx.send(InternalEvent::ClearStatus { token: 0 })
            .expect("channel open");
        process_internal_events(&mut harness.state, &harness.view_data, &rx);
        assert_eq!(harness.status(), "4 rows checked");

        tx.send(InternalEvent::ClearStatus {
            token: harness.view_data.status_token,
        })
        .expect("channel open");
        process_internal_events(&mut harness.state, &harness.view_data, &rx);
        assert!(harness.state.status_line.is_none());

        harness
            .state
            .dispatch(AppCommand::SetStatus("kept".to_owned()));
        assert_eq!(harness.status(), "kept");
    }
}
