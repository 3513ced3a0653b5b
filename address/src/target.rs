use std::fmt;

/// Symbolic names for the things in the host we hook or read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookTarget {
    /// One-time "title menu ready" event; triggers setup.
    TitleReady,
    /// Global holding the host's render singleton.
    RenderSingleton,
    Present,
    ResizeBuffers,
    Signal,
}

impl HookTarget {
    pub const ALL: [HookTarget; 5] = [
        HookTarget::TitleReady,
        HookTarget::RenderSingleton,
        HookTarget::Present,
        HookTarget::ResizeBuffers,
        HookTarget::Signal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HookTarget::TitleReady => "GUITitle:Play",
            HookTarget::RenderSingleton => "sMhRender",
            HookTarget::Present => "present",
            HookTarget::ResizeBuffers => "resize-buffers",
            HookTarget::Signal => "signal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        HookTarget::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Slot in the COM vtable of the object the target is a method of:
    /// `IDXGISwapChain` for present and resize, `ID3D12CommandQueue` for signal.
    pub fn vtable_slot(&self) -> Option<usize> {
        match self {
            HookTarget::Present => Some(8),
            HookTarget::ResizeBuffers => Some(13),
            HookTarget::Signal => Some(14),
            _ => None,
        }
    }
}

impl fmt::Display for HookTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        for t in HookTarget::ALL.iter() {
            assert_eq!(HookTarget::from_name(t.name()), Some(*t));
        }
        assert_eq!(HookTarget::from_name("GUITitle:Play"), Some(HookTarget::TitleReady));
        assert_eq!(HookTarget::from_name("Present"), None);
        assert_eq!(HookTarget::Signal.vtable_slot(), Some(14));
        assert_eq!(HookTarget::TitleReady.vtable_slot(), None);
    }
}
