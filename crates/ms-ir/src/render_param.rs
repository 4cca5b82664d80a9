//! Decode-engine render parameters.

/// A render parameter applied to a loaded module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderParam {
    /// Output gain in millibel (0 = unity)
    MasterGain(i32),
    /// Stereo separation in percent (0 = mono, 100 = default, 200 = max)
    StereoSeparation(i32),
    /// Interpolation filter length in taps (0 = engine default, 1 = nearest)
    InterpolationFilter(i32),
    /// Volume ramping strength (-1 = engine default)
    VolumeRamping(i32),
}

impl RenderParam {
    /// Numeric parameter id understood by the decode engine.
    pub fn id(&self) -> u32 {
        match self {
            RenderParam::MasterGain(_) => 1,
            RenderParam::StereoSeparation(_) => 2,
            RenderParam::InterpolationFilter(_) => 3,
            RenderParam::VolumeRamping(_) => 4,
        }
    }

    pub fn value(&self) -> i32 {
        match *self {
            RenderParam::MasterGain(v)
            | RenderParam::StereoSeparation(v)
            | RenderParam::InterpolationFilter(v)
            | RenderParam::VolumeRamping(v) => v,
        }
    }

    /// Rebuild a parameter from its numeric id.
    pub fn from_id(id: u32, value: i32) -> Option<Self> {
        match id {
            1 => Some(RenderParam::MasterGain(value)),
            2 => Some(RenderParam::StereoSeparation(value)),
            3 => Some(RenderParam::InterpolationFilter(value)),
            4 => Some(RenderParam::VolumeRamping(value)),
            _ => None,
        }
    }
}
