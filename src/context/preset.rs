//! Preset attribute encoding and matching

/// Index of the mode pushed to hardware
pub const MODE_MAIN: usize = 0;
/// Index of the first preset
pub const MODE_PRESET: usize = 1;
/// Attribute slots per preset
pub const PRESET_ATTR_NUM: usize = 4;
/// Bit offset of the color mode in an attribute word
pub const PRESET_CM_SHIFT: u32 = 16;
/// Bit offset of the render intent in an attribute word
pub const PRESET_RI_SHIFT: u32 = 0;
/// Wildcard value for either half
pub const PRESET_ALL_MASK: u32 = 0xFFFF;
/// Slot value meaning "no filter here"
pub const PRESET_ATTR_UNUSED: u32 = u32::MAX;

/// Pack a (color mode, render intent) filter
pub const fn preset_attr(color_mode: u16, render_intent: u16) -> u32 {
    ((color_mode as u32) << PRESET_CM_SHIFT) | ((render_intent as u32) << PRESET_RI_SHIFT)
}

/// One packed preset filter slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetAttr(pub u32);

impl PresetAttr {
    /// Color mode half
    pub const fn color_mode(self) -> u32 {
        (self.0 >> PRESET_CM_SHIFT) & PRESET_ALL_MASK
    }

    /// Render intent half
    pub const fn render_intent(self) -> u32 {
        (self.0 >> PRESET_RI_SHIFT) & PRESET_ALL_MASK
    }

    /// Whether the slot is empty
    pub const fn is_unused(self) -> bool {
        self.0 == PRESET_ATTR_UNUSED
    }

    /// Each half matches on the wildcard or on the exact value
    pub fn matches(self, color_mode: u32, render_intent: u32) -> bool {
        if self.is_unused() {
            return false;
        }
        let cm = self.color_mode();
        let ri = self.render_intent();
        (cm == PRESET_ALL_MASK || cm == color_mode) && (ri == PRESET_ALL_MASK || ri == render_intent)
    }
}
