#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Visibility {
    pub visible: bool,
}

impl Visibility {
    pub fn visible() -> Self {
        Self { visible: true }
    }

    pub fn hidden() -> Self {
        Self { visible: false }
    }
}

/// Per-entity display toggles driven by interaction.
///
/// Stored on the entity so toggling one model placement never touches the
/// shared geometry of its siblings.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct DisplayFlags {
    pub wireframe: bool,
    pub highlighted: bool,
}

/// Hints for the renderer that are decided at build time.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderHints {
    pub frustum_culled: bool,
    /// Draw order bias; higher draws later.
    pub render_order: i32,
}

impl Default for RenderHints {
    fn default() -> Self {
        Self {
            frustum_culled: true,
            render_order: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DisplayFlags, RenderHints, Visibility};

    #[test]
    fn visibility_helpers() {
        assert!(Visibility::visible().visible);
        assert!(!Visibility::hidden().visible);
    }

    #[test]
    fn defaults() {
        assert!(RenderHints::default().frustum_culled);
        assert!(!DisplayFlags::default().wireframe);
    }
}
