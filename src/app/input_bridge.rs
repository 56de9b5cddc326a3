use crate::input::{ShortcutKey, ShortcutModifiers};

fn shortcut_character_from_keycode(keycode: u32) -> Option<char> {
    // GDK reports XKB keycodes (evdev + 8) on both X11 and Wayland. Raw evdev
    // codes are not matched: they overlap XKB codes of other shortcut keys.
    match keycode {
        10..=18 => char::from_digit(keycode - 9, 10),
        55 => Some('v'),
        43 => Some('h'),
        41 => Some('f'),
        40 => Some('d'),
        57 => Some('n'),
        33 => Some('p'),
        53 => Some('x'),
        _ => None,
    }
}

fn is_keyval_shortcut_character(character: char) -> bool {
    character.is_ascii_alphanumeric() || matches!(character, '+' | '=' | '-' | '_')
}

pub(super) fn normalize_shortcut_key(key: gtk4::gdk::Key, keycode: u32) -> Option<ShortcutKey> {
    match key {
        gtk4::gdk::Key::Escape => return Some(ShortcutKey::Escape),
        gtk4::gdk::Key::space | gtk4::gdk::Key::KP_Space => return Some(ShortcutKey::Space),
        gtk4::gdk::Key::Left | gtk4::gdk::Key::KP_Left => return Some(ShortcutKey::Left),
        gtk4::gdk::Key::Right | gtk4::gdk::Key::KP_Right => return Some(ShortcutKey::Right),
        gtk4::gdk::Key::Delete | gtk4::gdk::Key::KP_Delete | gtk4::gdk::Key::BackSpace => {
            return Some(ShortcutKey::Delete)
        }
        gtk4::gdk::Key::KP_Add => return Some(ShortcutKey::Character('+')),
        gtk4::gdk::Key::KP_Subtract => return Some(ShortcutKey::Character('-')),
        _ => {}
    }

    let keyval_shortcut = key
        .to_unicode()
        .filter(|character| !character.is_control())
        .map(|character| character.to_ascii_lowercase());
    // Layouts such as AZERTY put symbols on the unshifted digit row.
    match keyval_shortcut {
        Some(character) if is_keyval_shortcut_character(character) => {
            Some(ShortcutKey::Character(character))
        }
        Some(character) => shortcut_character_from_keycode(keycode)
            .or(character.is_ascii().then_some(character))
            .map(ShortcutKey::Character),
        None => shortcut_character_from_keycode(keycode).map(ShortcutKey::Character),
    }
}

pub(super) fn shortcut_modifiers(modifier: gtk4::gdk::ModifierType) -> ShortcutModifiers {
    ShortcutModifiers::new(
        modifier.contains(gtk4::gdk::ModifierType::CONTROL_MASK),
        modifier.contains(gtk4::gdk::ModifierType::SHIFT_MASK),
        modifier.contains(gtk4::gdk::ModifierType::ALT_MASK),
    )
}
