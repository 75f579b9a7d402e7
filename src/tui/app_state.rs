#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub(super) enum AppMode {
    Normal,
    NamingGroup,
    EditingBranch,
    ShowingLog,
}

/// Which list the cursor keys drive.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub(super) enum Focus {
    Tree,
    Frequent,
    Groups,
}
