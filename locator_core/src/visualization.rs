//! Rerun.io rendering surface.
//!
//! Presents each [`Frame`] as a Rerun recording: the ordered trail as a line
//! strip, the target marker as a point, the follow grid beneath it, the
//! camera eye, and hover text as a log line.
//!
//! Enable with the `visualization` feature flag.

use rerun::{RecordingStream, RecordingStreamBuilder};

use crate::error::RenderError;
use crate::render::{Frame, FrameSink};
use crate::sample::SceneSample;

const TRAIL_COLOR: [u8; 4] = [0, 212, 255, 255];
const MARKER_COLOR: [u8; 4] = [255, 80, 80, 255];
const GRID_COLOR: [u8; 4] = [60, 60, 60, 120];

fn f32x3(p: &SceneSample) -> [f32; 3] {
    [p.sx as f32, p.sy as f32, p.sz as f32]
}

/// Frame sink that streams to a Rerun viewer or `.rrd` file.
pub struct RerunSink {
    rec: RecordingStream,
    grid_size: f32,
    grid_divisions: usize,
    last_tooltip: Option<String>,
}

impl RerunSink {
    /// Spawns a Rerun viewer and streams frames to it.
    pub fn spawn(app_id: &str, box_size: f64) -> Result<Self, RenderError> {
        let rec = RecordingStreamBuilder::new(app_id).spawn().map_err(RenderError::sink)?;
        Self::with_stream(rec, box_size)
    }

    /// Records frames into an `.rrd` file.
    pub fn to_file(app_id: &str, path: &str, box_size: f64) -> Result<Self, RenderError> {
        let rec = RecordingStreamBuilder::new(app_id).save(path).map_err(RenderError::sink)?;
        Self::with_stream(rec, box_size)
    }

    fn with_stream(rec: RecordingStream, box_size: f64) -> Result<Self, RenderError> {
        rec.log_static("world", &rerun::ViewCoordinates::RIGHT_HAND_Y_UP())
            .map_err(RenderError::sink)?;
        Ok(Self {
            rec,
            grid_size: box_size as f32,
            grid_divisions: 10,
            last_tooltip: None,
        })
    }

    /// Grid line segments in the XZ plane centred on `center`.
    fn grid_segments(&self, center: [f32; 3]) -> Vec<[[f32; 3]; 2]> {
        let half = self.grid_size / 2.0;
        let step = self.grid_size / self.grid_divisions as f32;
        let [cx, cy, cz] = center;
        let mut segments = Vec::with_capacity((self.grid_divisions + 1) * 2);
        for i in 0..=self.grid_divisions {
            let offset = -half + i as f32 * step;
            segments.push([[cx + offset, cy, cz - half], [cx + offset, cy, cz + half]]);
            segments.push([[cx - half, cy, cz + offset], [cx + half, cy, cz + offset]]);
        }
        segments
    }

    fn log_frame(&mut self, frame: &Frame) -> Result<(), rerun::RecordingStreamError> {
        self.rec.set_time_sequence("frame", frame.index as i64);

        let trail: Vec<[f32; 3]> = frame.trail.iter().map(f32x3).collect();
        if trail.len() >= 2 {
            self.rec.log(
                "world/trail",
                &rerun::LineStrips3D::new([trail]).with_colors([TRAIL_COLOR]),
            )?;
        }

        self.rec.log(
            "world/marker",
            &rerun::Points3D::new([f32x3(&frame.marker)])
                .with_colors([MARKER_COLOR])
                .with_radii([0.15]),
        )?;

        let eye = frame.pose.position;
        self.rec.log(
            "world/camera",
            &rerun::Points3D::new([[eye.x as f32, eye.y as f32, eye.z as f32]]).with_radii([0.05]),
        )?;

        if frame.follow_grid.visible {
            let g = frame.follow_grid.position;
            self.rec.log(
                "world/grid",
                &rerun::LineStrips3D::new(self.grid_segments([g.x as f32, g.y as f32, g.z as f32]))
                    .with_colors([GRID_COLOR]),
            )?;
        } else {
            self.rec.log("world/grid", &rerun::Clear::flat())?;
        }

        // Only log tooltip transitions
        if frame.tooltip != self.last_tooltip {
            if let Some(text) = &frame.tooltip {
                self.rec.log("logs/hover", &rerun::TextLog::new(text.as_str()))?;
            }
            self.last_tooltip = frame.tooltip.clone();
        }

        Ok(())
    }
}

impl FrameSink for RerunSink {
    fn present(&mut self, frame: &Frame) -> Result<(), RenderError> {
        self.log_frame(frame).map_err(RenderError::sink)
    }
}
