// camera.rs — Strategy camera limits.
//
// The camera object is a block of floats. Its address is not stored anywhere
// we can find statically, so hook.rs detours the camera update callback and
// grabs `this` (ECX) on the first call. After that the detour is removed and
// the worker edits the object directly.

use crate::error::Result;
use crate::memory::{ReadMemory, WriteMemory};
use std::fmt;

// Float indices into the camera object.
const CURRENT_ANGLE: usize = 77;
const CAMERA_MIN: usize = 81;
const CAMERA_MAX: usize = 82;
/// 2.0 is 90 degrees, i.e. looking straight down.
const MIN_ANGLE: usize = 83;
/// min_angle + delta = max angle.
const MAX_ANGLE_DELTA: usize = 84;
const CURRENT_HEIGHT: usize = 85;

fn at(camera: usize, index: usize) -> usize {
    camera + index * 4
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraInfo {
    pub address: usize,
    pub current_angle: f32,
    pub camera_min: f32,
    pub camera_max: f32,
    pub min_angle: f32,
    pub max_angle_delta: f32,
    pub current_height: f32,
}

impl CameraInfo {
    pub fn read<M: ReadMemory>(mem: &M, camera: usize) -> Result<Self> {
        Ok(Self {
            address: camera,
            current_angle: mem.read_f32(at(camera, CURRENT_ANGLE))?,
            camera_min: mem.read_f32(at(camera, CAMERA_MIN))?,
            camera_max: mem.read_f32(at(camera, CAMERA_MAX))?,
            min_angle: mem.read_f32(at(camera, MIN_ANGLE))?,
            max_angle_delta: mem.read_f32(at(camera, MAX_ANGLE_DELTA))?,
            current_height: mem.read_f32(at(camera, CURRENT_HEIGHT))?,
        })
    }
}

impl fmt::Display for CameraInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Camera at 0x{:X}", self.address)?;
        writeln!(f, "Camera angle: {:.6}", self.current_angle)?;
        writeln!(f, "Camera min: {:.6}", self.camera_min)?;
        writeln!(f, "Camera max: {:.6}", self.camera_max)?;
        writeln!(f, "Camera min angle: {:.6}", self.min_angle)?;
        writeln!(f, "Camera max angle delta: {:.6}", self.max_angle_delta)?;
        write!(f, "Camera height: {:.6}", self.current_height)
    }
}

/// Move the lowest allowed camera height by `delta`; returns the new value.
pub fn adjust_min<M: WriteMemory>(mem: &mut M, camera: usize, delta: f32) -> Result<f32> {
    let addr = at(camera, CAMERA_MIN);
    let v = mem.read_f32(addr)? + delta;
    mem.write_f32(addr, v)?;
    Ok(v)
}
