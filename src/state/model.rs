/// Lifecycle of the image a session is built around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No image yet; mask and effect operations are unavailable.
    #[default]
    Empty,
    /// First image decoding.
    Loading,
    /// Image decoded; mask authoring and effects are enabled.
    Ready,
    /// A new image is decoding while the previous session is still held.
    Reloading,
}

impl SessionState {
    pub const fn accepts_edits(self) -> bool {
        matches!(self, Self::Ready)
    }

    pub const fn is_loading(self) -> bool {
        matches!(self, Self::Loading | Self::Reloading)
    }
}
