use std::fmt;

/// A fixed-size per-frame input record: buttons plus a 2-axis stick.
///
/// Value-typed and byte-comparable, matching the wire layout of a track file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Inputs {
    /// Button bit flags.
    pub buttons: u16,
    /// Joystick x coordinate.
    pub stick_x: i8,
    /// Joystick y coordinate.
    pub stick_y: i8,
}

impl Inputs {
    /// The all-zero "no input" record, used as the default for frames absent from
    /// both a diff and the underlying track.
    pub const NONE: Inputs = Inputs {
        buttons: 0,
        stick_x: 0,
        stick_y: 0,
    };

    /// Construct an input record.
    pub fn new(buttons: u16, stick_x: i8, stick_y: i8) -> Self {
        Self {
            buttons,
            stick_x,
            stick_y,
        }
    }
}

impl fmt::Display for Inputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Inputs(buttons = {:#06X}, stick_x = {}, stick_y = {})",
            self.buttons, self.stick_x, self.stick_y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_none() {
        assert_eq!(Inputs::default(), Inputs::NONE);
    }
}
