use crate::error::{Error, Result};
use crate::processing::{
    decode::{Candidate, OutputLayout},
    nms,
};
use common::span;
use ndarray::ArrayD;
use preprocess::{BoundingBox, LetterboxTransform};

/// A detection in original-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub score: f32,
}

impl From<Candidate> for Detection {
    fn from(c: Candidate) -> Self {
        Self {
            bbox: c.bbox,
            class_id: c.class_id,
            score: c.score,
        }
    }
}

/// Turns raw network output into filtered detections in source-image space.
///
/// Configuration is read-only after construction; `postprocess` takes `&self`
/// and keeps no state between calls.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    layout: OutputLayout,
    score_threshold: f32,
    iou_threshold: f32,
    clip_boxes: bool,
}

impl PostProcessor {
    pub fn new(layout: OutputLayout, score_threshold: f32, iou_threshold: f32) -> Result<Self> {
        check_threshold("score_threshold", score_threshold)?;
        check_threshold("iou_threshold", iou_threshold)?;

        Ok(Self {
            layout,
            score_threshold,
            iou_threshold,
            clip_boxes: false,
        })
    }

    /// Clamp inverted boxes to the source image before NMS.
    pub fn with_clip_boxes(mut self, clip_boxes: bool) -> Self {
        self.clip_boxes = clip_boxes;
        self
    }

    pub fn layout(&self) -> OutputLayout {
        self.layout
    }

    pub fn score_threshold(&self) -> f32 {
        self.score_threshold
    }

    pub fn iou_threshold(&self) -> f32 {
        self.iou_threshold
    }

    pub fn clip_boxes(&self) -> bool {
        self.clip_boxes
    }

    /// Decode, map back to source coordinates, then run per-class NMS.
    ///
    /// Output is grouped by ascending class id, each group in NMS selection
    /// order (descending score, ties by raw index). Nothing above the score
    /// floor gives an empty vector.
    #[tracing::instrument(skip_all, fields(layout = %self.layout))]
    pub fn postprocess(
        &self,
        outputs: &[ArrayD<f32>],
        transform: &LetterboxTransform,
    ) -> Result<Vec<Detection>> {
        let candidates = {
            let _s = span!("decode");
            self.layout
                .decode(outputs, transform.input_size, self.score_threshold)?
        };

        let decoded = candidates.len();
        let (source_width, source_height) = transform.source_size;

        // IoU is measured on source-space boxes.
        let candidates: Vec<Candidate> = candidates
            .into_iter()
            .map(|c| {
                let mut bbox = transform.box_to_source(&c.bbox);
                if self.clip_boxes {
                    bbox = bbox.clamp(source_width as f32, source_height as f32);
                }
                Candidate { bbox, ..c }
            })
            .collect();

        let kept = {
            let _s = span!("nms");
            nms::per_class(candidates, self.iou_threshold)
        };

        tracing::debug!(decoded, kept = kept.len(), "Postprocessed detections");

        Ok(kept.into_iter().map(Detection::from).collect())
    }
}

fn check_threshold(name: &str, value: f32) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "{} must be in (0, 1], got {}",
            name, value
        )))
    }
}
