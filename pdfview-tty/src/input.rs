//! Translation of terminal key and mouse events into viewer actions.
//!
//! Pointer positions stay in terminal cells here; the caller maps them into
//! canvas space with its [`Viewport`](crate::layout::Viewport) because only
//! it knows the scroll offset.

use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use pdfview_core::{AnnotationInfo, AnnotationKind, Gesture};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPos {
    pub column: u16,
    pub row: u16,
}

impl CellPos {
    pub fn new(column: u16, row: u16) -> Self {
        Self { column, row }
    }
}

/// Annotation metadata collected by successive prompts, in prompt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Content,
    Title,
    Subject,
    Name,
}

impl MetadataField {
    pub const FIRST: MetadataField = MetadataField::Content;

    pub fn label(&self) -> &'static str {
        match self {
            MetadataField::Content => "content",
            MetadataField::Title => "author",
            MetadataField::Subject => "subject",
            MetadataField::Name => "name",
        }
    }

    pub fn next(&self) -> Option<MetadataField> {
        match self {
            MetadataField::Content => Some(MetadataField::Title),
            MetadataField::Title => Some(MetadataField::Subject),
            MetadataField::Subject => Some(MetadataField::Name),
            MetadataField::Name => None,
        }
    }

    pub fn apply(&self, info: &mut AnnotationInfo, value: String) {
        match self {
            MetadataField::Content => info.content = value,
            MetadataField::Title => info.title = value,
            MetadataField::Subject => info.subject = value,
            MetadataField::Name => info.name = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Search,
    OpenFile,
    Password,
    GotoPage,
    AnnotationField(MetadataField),
    AttachmentName,
    AttachmentDest,
}

impl PromptKind {
    fn prefix(&self) -> String {
        match self {
            PromptKind::Search => "/".to_owned(),
            PromptKind::OpenFile => "open: ".to_owned(),
            PromptKind::Password => "password: ".to_owned(),
            PromptKind::GotoPage => "page: ".to_owned(),
            PromptKind::AnnotationField(field) => format!("{}: ", field.label()),
            PromptKind::AttachmentName => "attachment: ".to_owned(),
            PromptKind::AttachmentDest => "save to: ".to_owned(),
        }
    }

    fn is_masked(&self) -> bool {
        matches!(self, PromptKind::Password)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Gesture(Gesture),
    /// Relative page move, already multiplied by the count prefix.
    PageStep(isize),
    GotoLastPage,
    /// Scroll by fractions of the visible area.
    Pan { delta_x: f32, delta_y: f32 },
    Click(CellPos),
    RightClick(CellPos),
    DeleteAt(CellPos),
    Hover(CellPos),
    DragMoved { from: CellPos, to: CellPos },
    DragSelect { from: CellPos, to: CellPos },
    OpenOutline,
    CloseOverlay,
    OutlineMoveSelection { delta: isize },
    OutlineActivateSelection,
    BeginPrompt(PromptKind),
    PromptChanged { kind: PromptKind, text: String },
    PromptSubmit { kind: PromptKind, text: String },
    PromptCancel { kind: PromptKind },
    Resize,
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Outline,
    Prompt(PromptKind),
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
    mode: InputMode,
    prompt_buffer: String,
    press: Option<CellPos>,
    dragged: bool,
}

impl EventMapper {
    pub const PAN_STEP: f32 = 0.1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.prompt_buffer.clear();
            self.press = None;
            self.dragged = false;
            self.mode = mode;
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Switches to a text prompt, optionally pre-filled.
    pub fn begin_prompt(&mut self, kind: PromptKind, initial: &str) {
        self.set_mode(InputMode::Prompt(kind));
        self.prompt_buffer.clear();
        self.prompt_buffer.push_str(initial);
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        if let Event::Resize(..) = event {
            return UiEvent::Resize;
        }
        if let Event::Key(KeyEvent { kind, .. }) = event {
            if kind == KeyEventKind::Release {
                return UiEvent::None;
            }
        }
        match self.mode {
            InputMode::Normal => self.map_event_normal(event),
            InputMode::Outline => self.map_event_outline(event),
            InputMode::Prompt(kind) => self.map_event_prompt(kind, event),
        }
    }

    fn map_event_normal(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent {
                code, modifiers, ..
            }) => self.map_key_normal(code, modifiers),
            Event::Mouse(mouse) => self.map_mouse(mouse),
            _ => UiEvent::None,
        }
    }

    fn map_key_normal(&mut self, code: KeyCode, modifiers: KeyModifiers) -> UiEvent {
        match (code, modifiers) {
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                if let Some(digit) = c.to_digit(10) {
                    self.push_digit(digit as usize);
                }
                UiEvent::None
            }
            (KeyCode::Char('c'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                UiEvent::Quit
            }
            (KeyCode::Left, modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.pan(-Self::PAN_STEP, 0.0)
            }
            (KeyCode::Right, modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.pan(Self::PAN_STEP, 0.0)
            }
            (KeyCode::Up, modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.pan(0.0, -Self::PAN_STEP)
            }
            (KeyCode::Down, modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.pan(0.0, Self::PAN_STEP)
            }
            (KeyCode::Char('H'), KeyModifiers::SHIFT) | (KeyCode::Char('h'), KeyModifiers::NONE) => {
                self.pan(-Self::PAN_STEP, 0.0)
            }
            (KeyCode::Char('L'), KeyModifiers::SHIFT) | (KeyCode::Char('l'), KeyModifiers::NONE) => {
                self.pan(Self::PAN_STEP, 0.0)
            }
            (KeyCode::Char('K'), KeyModifiers::SHIFT) => self.pan(0.0, -Self::PAN_STEP),
            (KeyCode::Char('J'), KeyModifiers::SHIFT) => self.pan(0.0, Self::PAN_STEP),
            (KeyCode::Char('j'), KeyModifiers::NONE)
            | (KeyCode::Down, KeyModifiers::NONE)
            | (KeyCode::PageDown, _)
            | (KeyCode::Char(' '), KeyModifiers::NONE) => {
                UiEvent::PageStep(self.take_count() as isize)
            }
            (KeyCode::Char('k'), KeyModifiers::NONE)
            | (KeyCode::Up, KeyModifiers::NONE)
            | (KeyCode::PageUp, _) => UiEvent::PageStep(-(self.take_count() as isize)),
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => match self.pending_count.take() {
                Some(page) if page > 0 => {
                    self.reset_count();
                    UiEvent::Gesture(Gesture::GotoPage(page))
                }
                _ => {
                    self.reset_count();
                    UiEvent::GotoLastPage
                }
            },
            (KeyCode::Home, _) => self.gesture(Gesture::GotoPage(1)),
            (KeyCode::Char('g'), KeyModifiers::NONE) => match self.pending_count.take() {
                Some(page) if page > 0 => {
                    self.reset_count();
                    UiEvent::Gesture(Gesture::GotoPage(page))
                }
                _ => self.prompt(PromptKind::GotoPage),
            },
            (KeyCode::Char('+'), _) | (KeyCode::Char('='), _) => self.gesture(Gesture::ZoomIn),
            (KeyCode::Char('-'), _) => self.gesture(Gesture::ZoomOut),
            (KeyCode::Char('r'), KeyModifiers::NONE) => self.gesture(Gesture::RotateRight),
            (KeyCode::Char('R'), _) => self.gesture(Gesture::RotateLeft),
            (KeyCode::Char('/'), _) => self.prompt(PromptKind::Search),
            (KeyCode::Char('n'), KeyModifiers::NONE) => self.gesture(Gesture::SearchNext),
            (KeyCode::Char('N'), modifiers)
                if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT =>
            {
                self.gesture(Gesture::SearchPrev)
            }
            (KeyCode::Char('t'), _) | (KeyCode::Char('T'), _) => {
                self.reset_count();
                UiEvent::OpenOutline
            }
            (KeyCode::Char('o'), KeyModifiers::NONE) => self.prompt(PromptKind::OpenFile),
            (KeyCode::Char('x'), KeyModifiers::NONE) => self.prompt(PromptKind::AttachmentName),
            (KeyCode::Char('a'), KeyModifiers::NONE) => self.choose(AnnotationKind::Text),
            (KeyCode::Char('A'), _) => self.choose(AnnotationKind::FreeText),
            (KeyCode::Char('b'), KeyModifiers::NONE) => self.choose(AnnotationKind::Rectangle),
            (KeyCode::Char('v'), KeyModifiers::NONE) => self.choose(AnnotationKind::Highlight),
            (KeyCode::Esc, _) => self.gesture(Gesture::CloseAnnotationPopup),
            (KeyCode::Char('q'), _) => {
                self.reset_count();
                UiEvent::Quit
            }
            _ => {
                self.reset_count();
                UiEvent::None
            }
        }
    }

    fn map_mouse(&mut self, mouse: MouseEvent) -> UiEvent {
        let at = CellPos::new(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left)
                if mouse.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                self.press = None;
                UiEvent::DeleteAt(at)
            }
            MouseEventKind::Down(MouseButton::Left) => {
                self.press = Some(at);
                self.dragged = false;
                UiEvent::None
            }
            MouseEventKind::Drag(MouseButton::Left) => match self.press {
                Some(from) => {
                    self.dragged |= from != at;
                    UiEvent::DragMoved { from, to: at }
                }
                None => UiEvent::None,
            },
            MouseEventKind::Up(MouseButton::Left) => match self.press.take() {
                Some(from) if self.dragged && from != at => {
                    self.dragged = false;
                    UiEvent::DragSelect { from, to: at }
                }
                Some(_) => {
                    self.dragged = false;
                    UiEvent::Click(at)
                }
                None => UiEvent::None,
            },
            MouseEventKind::Down(MouseButton::Right) => {
                self.press = None;
                UiEvent::RightClick(at)
            }
            MouseEventKind::Moved => UiEvent::Hover(at),
            _ => UiEvent::None,
        }
    }

    fn map_event_outline(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent {
                code, modifiers, ..
            }) => match (code, modifiers) {
                (KeyCode::Esc, _) | (KeyCode::Char('t'), _) | (KeyCode::Char('T'), _) => {
                    UiEvent::CloseOverlay
                }
                (KeyCode::Enter, _) => UiEvent::OutlineActivateSelection,
                (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, KeyModifiers::NONE) => {
                    UiEvent::OutlineMoveSelection { delta: 1 }
                }
                (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, KeyModifiers::NONE) => {
                    UiEvent::OutlineMoveSelection { delta: -1 }
                }
                (KeyCode::PageDown, _) => UiEvent::OutlineMoveSelection { delta: 10 },
                (KeyCode::PageUp, _) => UiEvent::OutlineMoveSelection { delta: -10 },
                (KeyCode::Char('q'), _) => UiEvent::Quit,
                _ => UiEvent::None,
            },
            _ => UiEvent::None,
        }
    }

    fn map_event_prompt(&mut self, kind: PromptKind, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent {
                code, modifiers, ..
            }) => match (code, modifiers) {
                (KeyCode::Esc, _) => {
                    self.set_mode(InputMode::Normal);
                    UiEvent::PromptCancel { kind }
                }
                (KeyCode::Char('c'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                    self.set_mode(InputMode::Normal);
                    UiEvent::PromptCancel { kind }
                }
                (KeyCode::Enter, _) => {
                    let text = std::mem::take(&mut self.prompt_buffer);
                    self.set_mode(InputMode::Normal);
                    UiEvent::PromptSubmit { kind, text }
                }
                (KeyCode::Backspace, _) => {
                    self.prompt_buffer.pop();
                    UiEvent::PromptChanged {
                        kind,
                        text: self.prompt_buffer.clone(),
                    }
                }
                (KeyCode::Char(c), mods) if mods.is_empty() || mods == KeyModifiers::SHIFT => {
                    self.prompt_buffer.push(c);
                    UiEvent::PromptChanged {
                        kind,
                        text: self.prompt_buffer.clone(),
                    }
                }
                _ => UiEvent::None,
            },
            _ => UiEvent::None,
        }
    }

    fn gesture(&mut self, gesture: Gesture) -> UiEvent {
        self.reset_count();
        UiEvent::Gesture(gesture)
    }

    fn choose(&mut self, kind: AnnotationKind) -> UiEvent {
        self.gesture(Gesture::ChooseAnnotationKind(kind))
    }

    fn prompt(&mut self, kind: PromptKind) -> UiEvent {
        self.begin_prompt(kind, "");
        UiEvent::BeginPrompt(kind)
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        self.pending_count = Some(current.saturating_mul(10).saturating_add(digit));
        if let Some(c) = char::from_digit(digit as u32, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> usize {
        let count = self
            .pending_count
            .take()
            .filter(|&count| count > 0)
            .unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    fn pan(&mut self, delta_x: f32, delta_y: f32) -> UiEvent {
        let multiplier = self.take_count() as f32;
        UiEvent::Pan {
            delta_x: delta_x * multiplier,
            delta_y: delta_y * multiplier,
        }
    }

    /// Text for the status line: the open prompt, or the count typed so far.
    pub fn pending_input(&self) -> Option<String> {
        if let InputMode::Prompt(kind) = self.mode {
            let shown = if kind.is_masked() {
                "*".repeat(self.prompt_buffer.chars().count())
            } else {
                self.prompt_buffer.clone()
            };
            return Some(format!("{}{}", kind.prefix(), shown));
        }
        if self.pending_digits.is_empty() {
            None
        } else {
            Some(self.pending_digits.clone())
        }
    }
}
