//! Pixel-exact rendering scenarios on the CPU sink

use lumen_core::{Bounds, Color};
use lumen_headless::CpuSink;
use lumen_paint::{Canvas, Compositor, QuadColors, RegionId};

fn child_at(comp: &mut Compositor, bounds: Bounds) -> RegionId {
    let id = comp.create_region();
    let root = comp.root();
    comp.add_child(root, id);
    comp.set_bounds(id, bounds);
    id
}

#[test]
fn solid_fill_covers_every_pixel() {
    let mut comp = Compositor::new(10, 5);
    let region = child_at(&mut comp, Bounds::new(0, 0, 10, 5));
    let mut canvas = Canvas::new(&mut comp);
    canvas.begin_region(region);
    canvas.set_color(Color::from_argb(0xffddaa88));
    canvas.fill(0.0, 0.0, 10.0, 5.0);
    canvas.end_region();
    drop(canvas);

    let mut sink = CpuSink::new();
    comp.submit_frame(&mut sink);

    let frame = sink.capture().expect("window layer captured");
    assert_eq!(frame.width, 10);
    assert_eq!(frame.height, 5);
    for y in 0..5 {
        for x in 0..10 {
            assert_eq!(
                frame.pixel(x, y),
                Some([0xdd, 0xaa, 0x88, 0xff]),
                "pixel ({x}, {y})"
            );
        }
    }
}

#[test]
fn vertical_gradient_rows_match_per_channel_lerp() {
    let top = Color::from_argb(0xff345678);
    let bottom = Color::from_argb(0xff88aacc);
    let mut comp = Compositor::new(10, 5);
    let region = child_at(&mut comp, Bounds::new(0, 0, 10, 5));
    let mut canvas = Canvas::new(&mut comp);
    canvas.begin_region(region);
    canvas.set_color(QuadColors::vertical(top, bottom));
    canvas.fill(0.0, 0.0, 10.0, 5.0);
    canvas.end_region();
    drop(canvas);

    let mut sink = CpuSink::new();
    comp.submit_frame(&mut sink);

    let frame = sink.capture().expect("window layer captured");
    for y in 0..5u32 {
        let expected = Color::lerp(top, bottom, y as f32 / 4.0).rgba_bytes();
        for x in 0..10 {
            assert_eq!(frame.pixel(x, y), Some(expected), "row {y}");
        }
    }
}

#[test]
fn overlapping_fills_keep_declaration_order() {
    let mut comp = Compositor::new(20, 10);
    let below = child_at(&mut comp, Bounds::new(0, 0, 12, 10));
    let above = child_at(&mut comp, Bounds::new(8, 0, 12, 10));
    let mut canvas = Canvas::new(&mut comp);
    canvas.begin_region(below);
    canvas.set_color(Color::from_argb(0xffff0000));
    canvas.fill(0.0, 0.0, 12.0, 10.0);
    canvas.end_region();
    canvas.begin_region(above);
    canvas.set_color(Color::from_argb(0xff00ff00));
    canvas.fill(0.0, 0.0, 12.0, 10.0);
    canvas.end_region();
    drop(canvas);

    let mut sink = CpuSink::new();
    comp.submit_frame(&mut sink);

    let frame = sink.capture().expect("window layer captured");
    // Left of the overlap: first fill. Overlap and right: the later sibling.
    assert_eq!(frame.pixel(2, 5), Some([0xff, 0x00, 0x00, 0xff]));
    assert_eq!(frame.pixel(10, 5), Some([0x00, 0xff, 0x00, 0xff]));
    assert_eq!(frame.pixel(18, 5), Some([0x00, 0xff, 0x00, 0xff]));
}

#[test]
fn isolated_region_appears_through_its_sampling_quad() {
    let mut comp = Compositor::new(40, 30);
    let island = child_at(&mut comp, Bounds::new(5, 5, 20, 20));
    comp.set_needs_layer(island, true);
    let mut canvas = Canvas::new(&mut comp);
    canvas.begin_region(island);
    canvas.set_color(Color::from_argb(0xff4080c0));
    canvas.fill(0.0, 0.0, 20.0, 20.0);
    canvas.end_region();
    drop(canvas);

    let mut sink = CpuSink::new();
    comp.submit_frame(&mut sink);

    let frame = sink.capture().expect("window layer captured");
    // The offscreen content arrives via the intermediate quad at the
    // region's window position.
    assert_eq!(frame.pixel(6, 6), Some([0x40, 0x80, 0xc0, 0xff]));
    assert_eq!(frame.pixel(24, 24), Some([0x40, 0x80, 0xc0, 0xff]));
    // Outside the region stays untouched.
    assert_eq!(frame.pixel(30, 15), Some([0, 0, 0, 0]));
}

#[test]
fn partial_redraw_only_touches_dirty_pixels() {
    let mut comp = Compositor::new(20, 10);
    let stable = child_at(&mut comp, Bounds::new(0, 0, 10, 10));
    let moving = child_at(&mut comp, Bounds::new(10, 0, 10, 10));
    let mut canvas = Canvas::new(&mut comp);
    canvas.begin_region(stable);
    canvas.set_color(Color::from_argb(0xff112233));
    canvas.fill(0.0, 0.0, 10.0, 10.0);
    canvas.end_region();
    canvas.begin_region(moving);
    canvas.set_color(Color::from_argb(0xffaabbcc));
    canvas.fill(0.0, 0.0, 10.0, 10.0);
    canvas.end_region();
    drop(canvas);

    let mut sink = CpuSink::new();
    for _ in 0..3 {
        comp.submit_frame(&mut sink);
    }

    // Redraw only the right region; the left one's pixels must survive the
    // partial pass untouched.
    let mut canvas = Canvas::new(&mut comp);
    canvas.begin_region(moving);
    canvas.set_color(Color::from_argb(0xffccbbaa));
    canvas.fill(0.0, 0.0, 10.0, 10.0);
    canvas.end_region();
    drop(canvas);
    comp.submit_frame(&mut sink);

    let frame = sink.capture().expect("window layer captured");
    assert_eq!(frame.pixel(5, 5), Some([0x11, 0x22, 0x33, 0xff]));
    assert_eq!(frame.pixel(15, 5), Some([0xcc, 0xbb, 0xaa, 0xff]));
}
