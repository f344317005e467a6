//! Integration tests for the full frame path
//!
//! These tests drive a compositor through Canvas drawing and verify what a
//! backend actually receives:
//! - clean frames submit no passes once the buffer history drains
//! - disjoint same-pipeline regions merge into one batch submission
//! - overlapping siblings keep back-to-front declaration order
//! - isolated regions render offscreen before anything samples them
//! - post-effect preprocess passes slot between content and composite

use lumen_core::{Bounds, Color};
use lumen_paint::{
    BatchDraw, BatchKey, BlendMode, BlurBloomPostEffect, Canvas, Compositor, LayerInfo,
    PostEffect, RegionId, SampleSource, SubmitSink,
};

#[derive(Debug, PartialEq)]
enum Event {
    BeginLayer {
        pass: u32,
        index: u16,
        offscreen: bool,
    },
    Batch {
        pass: u32,
        key: BatchKey,
        blend: BlendMode,
        draws: usize,
        xs: Vec<f32>,
    },
    Preprocess {
        first_pass: u32,
        passes: u32,
        source_layer: u16,
    },
    EndFrame {
        passes: u32,
    },
}

#[derive(Debug, Default)]
struct RecordingSink {
    events: Vec<Event>,
}

impl RecordingSink {
    fn batches(&self) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Batch { .. }))
            .collect()
    }
}

impl SubmitSink for RecordingSink {
    fn begin_layer(&mut self, pass: u32, layer: &LayerInfo, _dirty: &[Bounds]) {
        self.events.push(Event::BeginLayer {
            pass,
            index: layer.index,
            offscreen: layer.offscreen,
        });
    }

    fn submit_batch(&mut self, pass: u32, key: BatchKey, blend: BlendMode, draws: &[BatchDraw]) {
        let xs = draws
            .iter()
            .flat_map(|d| d.instances.iter().map(|i| i.dst[0]))
            .collect();
        self.events.push(Event::Batch {
            pass,
            key,
            blend,
            draws: draws.len(),
            xs,
        });
    }

    fn preprocess_effect(
        &mut self,
        first_pass: u32,
        effect: &PostEffect,
        source: &SampleSource,
    ) -> u32 {
        let passes = effect.preprocess_pass_count();
        self.events.push(Event::Preprocess {
            first_pass,
            passes,
            source_layer: source.layer,
        });
        passes
    }

    fn end_frame(&mut self, _frame: u64, passes: u32) {
        self.events.push(Event::EndFrame { passes });
    }
}

fn child_at(comp: &mut Compositor, bounds: Bounds) -> RegionId {
    let id = comp.create_region();
    let root = comp.root();
    comp.add_child(root, id);
    comp.set_bounds(id, bounds);
    id
}

fn draw_fill(comp: &mut Compositor, region: RegionId, x: f32, y: f32, w: f32, h: f32) {
    let mut canvas = Canvas::new(comp);
    canvas.begin_region(region);
    canvas.set_color(Color::from_argb(0xffffffff));
    canvas.fill(x, y, w, h);
    canvas.end_region();
}

/// Submit until the dirty history ring is drained.
fn settle(comp: &mut Compositor) {
    let mut sink = RecordingSink::default();
    for _ in 0..3 {
        comp.submit_frame(&mut sink);
    }
}

#[test]
fn clean_frame_submits_no_passes() {
    let mut comp = Compositor::new(200, 100);
    settle(&mut comp);

    let mut sink = RecordingSink::default();
    let passes = comp.submit_frame(&mut sink);
    assert_eq!(passes, 0);
    assert_eq!(sink.events, vec![Event::EndFrame { passes: 0 }]);
}

#[test]
fn disjoint_regions_merge_into_one_batch() {
    let mut comp = Compositor::new(200, 100);
    let a = child_at(&mut comp, Bounds::new(0, 0, 50, 50));
    let b = child_at(&mut comp, Bounds::new(100, 0, 50, 50));
    draw_fill(&mut comp, a, 0.0, 0.0, 40.0, 40.0);
    draw_fill(&mut comp, b, 0.0, 0.0, 40.0, 40.0);

    let mut sink = RecordingSink::default();
    comp.submit_frame(&mut sink);

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    match batches[0] {
        Event::Batch {
            key, draws, xs, ..
        } => {
            assert_eq!(*key, BatchKey::Fill);
            // One submission, one draw per region, offsets applied.
            assert_eq!(*draws, 2);
            let mut xs = xs.clone();
            xs.sort_by(f32::total_cmp);
            assert_eq!(xs, vec![0.0, 100.0]);
        }
        _ => unreachable!(),
    }
}

#[test]
fn overlapping_siblings_submit_back_to_front() {
    let mut comp = Compositor::new(200, 100);
    let below = child_at(&mut comp, Bounds::new(10, 10, 60, 60));
    let above = child_at(&mut comp, Bounds::new(40, 10, 60, 60));
    draw_fill(&mut comp, below, 0.0, 0.0, 60.0, 60.0);
    draw_fill(&mut comp, above, 0.0, 0.0, 60.0, 60.0);

    let mut sink = RecordingSink::default();
    comp.submit_frame(&mut sink);

    // The overlap forbids merging: two fill submissions, declaration order.
    let batches = sink.batches();
    assert_eq!(batches.len(), 2);
    match (batches[0], batches[1]) {
        (
            Event::Batch { xs: first, .. },
            Event::Batch { xs: second, .. },
        ) => {
            assert_eq!(first, &vec![10.0]);
            assert_eq!(second, &vec![40.0]);
        }
        _ => unreachable!(),
    }
}

#[test]
fn isolated_region_content_renders_before_it_is_sampled() {
    let mut comp = Compositor::new(200, 100);
    let island = child_at(&mut comp, Bounds::new(20, 20, 50, 40));
    comp.set_needs_layer(island, true);
    draw_fill(&mut comp, island, 0.0, 0.0, 50.0, 40.0);

    let mut sink = RecordingSink::default();
    comp.submit_frame(&mut sink);

    let layer_order: Vec<(u16, bool)> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            Event::BeginLayer {
                index, offscreen, ..
            } => Some((*index, *offscreen)),
            _ => None,
        })
        .collect();
    assert_eq!(layer_order, vec![(1, true), (0, false)]);

    // Offscreen pass carries the region's fill at its slot offset; the
    // window pass samples layer 1 through the intermediate quad.
    let keys: Vec<(u32, BatchKey)> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Batch { pass, key, .. } => Some((*pass, *key)),
            _ => None,
        })
        .collect();
    assert!(keys.contains(&(0, BatchKey::Fill)));
    assert!(keys.contains(&(1, BatchKey::SampleLayer { layer: 1 })));
}

#[test]
fn preprocess_passes_sit_between_content_and_composite() {
    let mut comp = Compositor::new(200, 100);
    let island = child_at(&mut comp, Bounds::new(20, 20, 50, 40));
    let effect = BlurBloomPostEffect {
        blur_size: 8.0,
        ..Default::default()
    };
    let expected = PostEffect::BlurBloom(effect.clone()).preprocess_pass_count();
    comp.set_post_effect(island, Some(PostEffect::BlurBloom(effect)));
    draw_fill(&mut comp, island, 0.0, 0.0, 50.0, 40.0);

    let mut sink = RecordingSink::default();
    let passes = comp.submit_frame(&mut sink);

    // Content pass 0, preprocess starting at 1, window composite after.
    let preprocess_at = sink
        .events
        .iter()
        .position(|e| matches!(e, Event::Preprocess { .. }))
        .unwrap();
    match &sink.events[preprocess_at] {
        Event::Preprocess {
            first_pass,
            passes,
            source_layer,
        } => {
            assert_eq!(*first_pass, 1);
            assert_eq!(*passes, expected);
            assert_eq!(*source_layer, 1);
        }
        _ => unreachable!(),
    }
    let window_begin = sink
        .events
        .iter()
        .position(|e| matches!(e, Event::BeginLayer { index: 0, .. }))
        .unwrap();
    assert!(preprocess_at < window_begin);
    match sink.events[window_begin] {
        Event::BeginLayer { pass, .. } => assert_eq!(pass, 1 + expected),
        _ => unreachable!(),
    }
    assert_eq!(passes, 2 + expected);
}

#[test]
fn hiding_a_region_stops_its_submissions() {
    let mut comp = Compositor::new(200, 100);
    let a = child_at(&mut comp, Bounds::new(0, 0, 50, 50));
    draw_fill(&mut comp, a, 0.0, 0.0, 40.0, 40.0);
    settle(&mut comp);

    comp.set_visible(a, false);
    let mut sink = RecordingSink::default();
    comp.submit_frame(&mut sink);
    // The vacated area is redrawn, but the hidden region contributes no
    // batches.
    assert!(sink
        .events
        .iter()
        .any(|e| matches!(e, Event::BeginLayer { index: 0, .. })));
    assert!(sink.batches().is_empty());
}
