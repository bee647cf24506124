// Model of the data read in this app

/// Value the Dallas driver family reports for a disconnected or unreadable sensor
pub const DEVICE_DISCONNECTED_C: f32 = -127.0;

pub fn is_fault_reading(celsius: f32) -> bool {
    celsius == DEVICE_DISCONNECTED_C
}

/// Motion state as sent in the `humV` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionCode {
    Idle,
    Detected,
}

impl MotionCode {
    pub fn from_flag(motion: bool) -> Self {
        if motion { Self::Detected } else { Self::Idle }
    }

    pub fn value(self) -> u8 {
        match self {
            Self::Idle => 20,
            Self::Detected => 80,
        }
    }

    pub fn is_active(self) -> bool {
        self == Self::Detected
    }
}

/// One iteration's worth of readings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature: f32,
    pub motion: MotionCode,
}
