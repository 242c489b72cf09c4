/// Actions that a user or application can initiate on the content tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeAction<Custom = ()> {
    /// Move the cursor to the previous visible row.
    SelectPrev,
    /// Move the cursor to the next visible row.
    SelectNext,
    /// Move the cursor to the parent row.
    SelectParent,
    /// Move the cursor to the first visible row.
    SelectFirst,
    /// Move the cursor to the last visible row.
    SelectLast,
    /// Select the node under the cursor (containers also toggle expansion).
    Activate,
    /// Toggle expansion of the container under the cursor.
    ToggleNode,
    /// Expand every container.
    ExpandAll,
    /// Collapse every container.
    CollapseAll,
    /// Request a new root-level collection.
    CreateContainer,
    /// Request a new collection under the container at the cursor.
    CreateChildContainer,
    /// Pick up the node under the cursor for a keyboard drag.
    BeginDrag,
    /// Move the drop target to the previous sibling of the dragged node.
    DragPrev,
    /// Move the drop target to the next sibling of the dragged node.
    DragNext,
    /// Drop the dragged node onto the current target.
    Drop,
    /// Abort the current drag.
    CancelDrag,
    /// Custom action forwarded to the caller without internal handling.
    Custom(Custom),
}

impl<C> TreeAction<C> {
    /// Returns `true` for actions that only make sense during a drag.
    pub const fn is_drag_action(&self) -> bool {
        matches!(
            self,
            Self::DragPrev | Self::DragNext | Self::Drop | Self::CancelDrag
        )
    }
}

/// Result of handling an action, key or mouse event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeEvent<Custom = ()> {
    /// The action was handled internally and state was updated.
    Handled,
    /// The action was ignored (e.g., nothing under the cursor / nothing to do).
    Unhandled,
    /// The action is forwarded to the caller for handling.
    Action(TreeAction<Custom>),
}
