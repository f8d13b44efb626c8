use std::fmt;

/// Address of a remote object: class id in the high 16 bits, instance id in
/// the low 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(u32);

impl ObjectKey {
    pub const fn new(class_id: u16, instance_id: u16) -> Self {
        Self(((class_id as u32) << 16) | instance_id as u32)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn class_id(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub const fn instance_id(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

impl From<u32> for ObjectKey {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<ObjectKey> for u32 {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Well-known class ids.
pub mod class {
    /// The application object itself.
    pub const APP: u16 = 0;
    /// Digital input port.
    pub const DIG_IN: u16 = 1;
    /// Digital output port.
    pub const DIG_OUT: u16 = 2;

    /// Returns a human-readable name for a class id.
    pub fn name(class_id: u16) -> &'static str {
        match class_id {
            APP => "APP",
            DIG_IN => "DIG_IN",
            DIG_OUT => "DIG_OUT",
            _ => "USER",
        }
    }
}
