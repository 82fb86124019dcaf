/// The encoder's view of the stack: routine nesting level and the number of
/// words currently allocated in the innermost frame. Every operation returns
/// a new frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    level: usize,
    size: i32,
}

impl Frame {
    /// Level 0, nothing allocated: the main program's global frame.
    pub const INITIAL: Frame = Frame { level: 0, size: 0 };

    pub fn level(self) -> usize {
        self.level
    }

    pub fn size(self) -> i32 {
        self.size
    }

    /// Same level, `n` more words on top. Saturates at `i32::MAX`.
    pub fn expand(self, n: i32) -> Frame {
        Frame {
            level: self.level,
            size: self.size.saturating_add(n),
        }
    }

    /// Like [`Frame::expand`], but `None` when the size leaves the `i32` range.
    pub fn checked_expand(self, n: i32) -> Option<Frame> {
        Some(Frame {
            level: self.level,
            size: self.size.checked_add(n)?,
        })
    }

    /// Same level, exactly `n` words.
    pub fn replace(self, n: i32) -> Frame {
        Frame {
            level: self.level,
            size: n,
        }
    }

    /// One level deeper, starting with `n` words.
    pub fn push(self, n: i32) -> Frame {
        Frame {
            level: self.level + 1,
            size: n,
        }
    }
}

/// Static coordinates of a stored value: routine level and displacement
/// within that level's frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectAddress {
    pub level: usize,
    pub displacement: i32,
}

impl ObjectAddress {
    pub fn new(level: usize, displacement: i32) -> Self {
        Self {
            level,
            displacement,
        }
    }
}

impl From<Frame> for ObjectAddress {
    /// The next free word in the frame.
    fn from(frame: Frame) -> Self {
        Self::new(frame.level, frame.size)
    }
}
