use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::action::TreeAction;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum KeymapProfile {
    #[default]
    Default,
    Vim,
    Arrows,
}

/// Key bindings for browsing and keyboard-driven reordering.
///
/// While a drag is in flight, vertical navigation keys move the drop target,
/// `Enter`/`Space` drop and `Esc` cancels.
#[derive(Clone, Copy, Debug)]
pub struct TreeKeyBindings {
    profile: KeymapProfile,
}

impl Default for TreeKeyBindings {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeKeyBindings {
    pub const fn new() -> Self {
        Self {
            profile: KeymapProfile::Default,
        }
    }

    pub const fn with_profile(profile: KeymapProfile) -> Self {
        Self { profile }
    }

    pub const fn profile(&self) -> KeymapProfile {
        self.profile
    }

    pub const fn set_profile(&mut self, profile: KeymapProfile) {
        self.profile = profile;
    }

    pub fn resolve<C>(&self, key: KeyEvent, dragging: bool) -> Option<TreeAction<C>> {
        let nav_action = match self.profile {
            KeymapProfile::Default => self.resolve_default_nav(key),
            KeymapProfile::Vim => self.resolve_vim_nav(key),
            KeymapProfile::Arrows => self.resolve_arrow_nav(key),
        };

        if dragging {
            return match nav_action {
                Some(TreeAction::SelectPrev) => Some(TreeAction::DragPrev),
                Some(TreeAction::SelectNext) => Some(TreeAction::DragNext),
                _ => self.resolve_drag(key),
            };
        }

        if key.modifiers.contains(KeyModifiers::SHIFT) {
            match key.code {
                KeyCode::Up | KeyCode::Down => return Some(TreeAction::BeginDrag),
                KeyCode::Char('N') => return Some(TreeAction::CreateContainer),
                _ => {}
            }
        }

        if nav_action.is_some() {
            return nav_action;
        }

        self.resolve_common(key)
    }

    pub fn resolve_with<C, F>(&self, key: KeyEvent, dragging: bool, custom: F) -> Option<TreeAction<C>>
    where
        F: Fn(KeyEvent) -> Option<C>,
    {
        if let Some(action) = custom(key) {
            return Some(TreeAction::Custom(action));
        }

        self.resolve(key, dragging)
    }

    const fn resolve_default_nav<C>(&self, key: KeyEvent) -> Option<TreeAction<C>> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => Some(TreeAction::SelectPrev),
            KeyCode::Down | KeyCode::Char('j') => Some(TreeAction::SelectNext),
            KeyCode::Left | KeyCode::Char('h') => Some(TreeAction::SelectParent),
            _ => None,
        }
    }

    const fn resolve_vim_nav<C>(&self, key: KeyEvent) -> Option<TreeAction<C>> {
        match key.code {
            KeyCode::Char('k') => Some(TreeAction::SelectPrev),
            KeyCode::Char('j') => Some(TreeAction::SelectNext),
            KeyCode::Char('h') => Some(TreeAction::SelectParent),
            _ => None,
        }
    }

    const fn resolve_arrow_nav<C>(&self, key: KeyEvent) -> Option<TreeAction<C>> {
        match key.code {
            KeyCode::Up => Some(TreeAction::SelectPrev),
            KeyCode::Down => Some(TreeAction::SelectNext),
            KeyCode::Left => Some(TreeAction::SelectParent),
            _ => None,
        }
    }

    const fn resolve_drag<C>(&self, key: KeyEvent) -> Option<TreeAction<C>> {
        match key.code {
            KeyCode::Enter | KeyCode::Char(' ') => Some(TreeAction::Drop),
            KeyCode::Esc => Some(TreeAction::CancelDrag),
            _ => None,
        }
    }

    const fn resolve_common<C>(&self, key: KeyEvent) -> Option<TreeAction<C>> {
        match key.code {
            KeyCode::Enter => Some(TreeAction::Activate),
            KeyCode::Char(' ') | KeyCode::Right => Some(TreeAction::ToggleNode),
            KeyCode::Char('m') => Some(TreeAction::BeginDrag),
            KeyCode::Char('n') => Some(TreeAction::CreateChildContainer),
            KeyCode::Char('N') => Some(TreeAction::CreateContainer),
            KeyCode::Char('E') => Some(TreeAction::ExpandAll),
            KeyCode::Char('C') => Some(TreeAction::CollapseAll),
            KeyCode::Home => Some(TreeAction::SelectFirst),
            KeyCode::End => Some(TreeAction::SelectLast),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn navigation_keys_become_drag_moves_while_dragging() {
        let keys = TreeKeyBindings::new();

        assert_eq!(
            keys.resolve::<()>(key(KeyCode::Down), false),
            Some(TreeAction::SelectNext)
        );
        assert_eq!(
            keys.resolve::<()>(key(KeyCode::Down), true),
            Some(TreeAction::DragNext)
        );
        assert_eq!(
            keys.resolve::<()>(key(KeyCode::Char('k')), true),
            Some(TreeAction::DragPrev)
        );
        assert_eq!(
            keys.resolve::<()>(key(KeyCode::Enter), true),
            Some(TreeAction::Drop)
        );
        assert_eq!(
            keys.resolve::<()>(key(KeyCode::Esc), true),
            Some(TreeAction::CancelDrag)
        );
        assert_eq!(keys.resolve::<()>(key(KeyCode::Char('n')), true), None);
    }

    #[test]
    fn shift_arrow_picks_up_and_profiles_filter_keys() {
        let keys = TreeKeyBindings::with_profile(KeymapProfile::Arrows);

        assert_eq!(
            keys.resolve::<()>(KeyEvent::new(KeyCode::Up, KeyModifiers::SHIFT), false),
            Some(TreeAction::BeginDrag)
        );
        assert_eq!(keys.resolve::<()>(key(KeyCode::Char('j')), false), None);
        assert_eq!(
            keys.resolve::<()>(key(KeyCode::Enter), false),
            Some(TreeAction::Activate)
        );
    }

    #[test]
    fn custom_mapping_takes_precedence() {
        let keys = TreeKeyBindings::new();
        let action = keys.resolve_with(key(KeyCode::Char('m')), false, |key| {
            (key.code == KeyCode::Char('m')).then_some("rename")
        });

        assert_eq!(action, Some(TreeAction::Custom("rename")));
    }
}
