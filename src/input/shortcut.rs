#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutKey {
    Character(char),
    Escape,
    Space,
    Left,
    Right,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShortcutModifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl ShortcutModifiers {
    pub const fn new(ctrl: bool, shift: bool, alt: bool) -> Self {
        Self { ctrl, shift, alt }
    }

    const fn has_command_modifier(self) -> bool {
        self.ctrl || self.alt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputContext {
    /// Number of tags in the vocabulary; digits beyond it are ignored.
    pub tag_count: usize,
    pub has_image: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    /// Zero-based tag index.
    SelectTag(usize),
    CancelInteraction,
    PanHoldStart,
    PanHoldEnd,
    EnterSelect,
    EnterPan,
    ZoomIn,
    ZoomOut,
    ResetPosition,
    Detect,
    NextImage,
    PrevImage,
    ToggleDone,
    DeleteHovered,
}

fn resolve_tag_digit(digit: u32, tag_count: usize) -> Option<ShortcutAction> {
    let index = usize::try_from(digit).ok()?.checked_sub(1)?;
    (index < tag_count).then_some(ShortcutAction::SelectTag(index))
}

fn resolve_character(ch: char, context: InputContext) -> Option<ShortcutAction> {
    if let Some(digit) = ch.to_digit(10) {
        return resolve_tag_digit(digit, context.tag_count);
    }
    match ch.to_ascii_lowercase() {
        'v' => Some(ShortcutAction::EnterSelect),
        'h' => Some(ShortcutAction::EnterPan),
        '+' | '=' => Some(ShortcutAction::ZoomIn),
        '-' | '_' => Some(ShortcutAction::ZoomOut),
        'f' => Some(ShortcutAction::ResetPosition),
        'd' => Some(ShortcutAction::Detect),
        'n' => Some(ShortcutAction::NextImage),
        'p' => Some(ShortcutAction::PrevImage),
        'x' => Some(ShortcutAction::ToggleDone),
        _ => None,
    }
}

pub fn resolve_shortcut(
    key: ShortcutKey,
    modifiers: ShortcutModifiers,
    context: InputContext,
) -> Option<ShortcutAction> {
    if !context.has_image || modifiers.has_command_modifier() {
        return None;
    }

    match key {
        ShortcutKey::Escape => Some(ShortcutAction::CancelInteraction),
        ShortcutKey::Space => Some(ShortcutAction::PanHoldStart),
        ShortcutKey::Left => Some(ShortcutAction::PrevImage),
        ShortcutKey::Right => Some(ShortcutAction::NextImage),
        ShortcutKey::Delete => Some(ShortcutAction::DeleteHovered),
        ShortcutKey::Character(ch) => resolve_character(ch, context),
    }
}

/// Only the pan hold key reacts to being released.
pub fn resolve_key_release(key: ShortcutKey, context: InputContext) -> Option<ShortcutAction> {
    if !context.has_image {
        return None;
    }
    match key {
        ShortcutKey::Space => Some(ShortcutAction::PanHoldEnd),
        _ => None,
    }
}
