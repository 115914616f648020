/// Modal surfaces that can claim keyboard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Overlay {
    ConflictDialog,
    SettingsPanel,
    QuitDialog,
}

/// Ordered claim list: the most recent claim receives key events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayStack {
    claims: Vec<Overlay>,
}

impl OverlayStack {
    /// Claims input for `overlay`. A repeated claim moves it to the top.
    pub fn claim(&mut self, overlay: Overlay) {
        self.claims.retain(|claimed| *claimed != overlay);
        self.claims.push(overlay);
    }

    /// Releases a claim. Returns false if `overlay` held none.
    pub fn release(&mut self, overlay: Overlay) -> bool {
        let before = self.claims.len();
        self.claims.retain(|claimed| *claimed != overlay);
        self.claims.len() != before
    }

    /// The overlay that currently owns key events.
    pub fn owner(&self) -> Option<Overlay> {
        self.claims.last().copied()
    }

    pub fn is_claimed(&self, overlay: Overlay) -> bool {
        self.claims.contains(&overlay)
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
