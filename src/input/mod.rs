mod shortcut;

pub use shortcut::{
    resolve_key_release, resolve_shortcut, InputContext, ShortcutAction, ShortcutKey,
    ShortcutModifiers,
};
