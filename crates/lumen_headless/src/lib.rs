//! Lumen headless backend
//!
//! Software rendering and frame capture for tests and CI machines without a
//! GPU. The [`CpuSink`] rasterizes the compositor's submissions into plain
//! RGBA8 buffers; [`CapturedFrame`] carries the result with pixel accessors
//! and diff helpers for visual regression checks.
//!
//! ```
//! use lumen_core::Color;
//! use lumen_headless::CpuSink;
//! use lumen_paint::{Canvas, Compositor};
//!
//! let mut compositor = Compositor::new(10, 5);
//! let region = compositor.create_region();
//! let root = compositor.root();
//! compositor.add_child(root, region);
//! compositor.set_bounds(region, lumen_core::Bounds::new(0, 0, 10, 5));
//!
//! let mut canvas = Canvas::new(&mut compositor);
//! canvas.begin_region(region);
//! canvas.set_color(Color::from_argb(0xffddaa88));
//! canvas.fill(0.0, 0.0, 10.0, 5.0);
//! canvas.end_region();
//! drop(canvas);
//!
//! let mut sink = CpuSink::new();
//! compositor.submit_frame(&mut sink);
//! let frame = sink.capture().unwrap();
//! assert_eq!(frame.pixel(0, 0), Some([0xdd, 0xaa, 0x88, 0xff]));
//! ```

pub mod backend;
pub mod framebuffer;

pub use backend::CpuSink;
pub use framebuffer::{compare_frames, CaptureError, CapturedFrame, FrameSequence, RegressionResult};
