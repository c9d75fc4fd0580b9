use crate::error::{Error, Result};
use ndarray::{ArrayD, ArrayView1, ArrayView2, Axis, Ix3};
use preprocess::BoundingBox;
use std::fmt;
use std::str::FromStr;

/// Raw output convention of a supported network family.
///
/// Boxes are always decoded into corner form in the letterboxed input's pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLayout {
    /// `boxes [1, N, 4]` as `x1, y1, x2, y2` pixels, `scores [1, N, C]` probabilities.
    #[default]
    YoloNas,
    /// `[1, N, 5 + C]` as `cx, cy, w, h, objectness, class scores...` in pixels.
    Yolov5,
    /// `[1, 4 + C, N]` (channel-major) as `cx, cy, w, h, class scores...` in pixels.
    Yolov8,
    /// `dets [1, N, 4]` as normalized `cx, cy, w, h`, `logits [1, N, C]` with
    /// background at index 0.
    RfDetr,
}

/// A decoded prediction that cleared the score floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Position in the raw output, used to break score ties.
    pub index: usize,
    pub class_id: u32,
    pub score: f32,
    pub bbox: BoundingBox,
}

impl OutputLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputLayout::YoloNas => "yolo-nas",
            OutputLayout::Yolov5 => "yolov5",
            OutputLayout::Yolov8 => "yolov8",
            OutputLayout::RfDetr => "rf-detr",
        }
    }

    /// Number of output tensors the network produces.
    pub fn tensor_count(&self) -> usize {
        match self {
            OutputLayout::YoloNas | OutputLayout::RfDetr => 2,
            OutputLayout::Yolov5 | OutputLayout::Yolov8 => 1,
        }
    }

    /// Decode raw tensors, dropping every prediction whose score is below `score_threshold`.
    pub fn decode(
        &self,
        outputs: &[ArrayD<f32>],
        input_size: (u32, u32),
        score_threshold: f32,
    ) -> Result<Vec<Candidate>> {
        if outputs.len() != self.tensor_count() {
            return Err(Error::MalformedOutput(format!(
                "{} expects {} output tensor(s), got {}",
                self,
                self.tensor_count(),
                outputs.len()
            )));
        }

        let candidates = match self {
            OutputLayout::YoloNas => decode_yolo_nas(self, &outputs[0], &outputs[1], score_threshold)?,
            OutputLayout::Yolov5 => decode_yolov5(self, &outputs[0], score_threshold)?,
            OutputLayout::Yolov8 => decode_yolov8(self, &outputs[0], score_threshold)?,
            OutputLayout::RfDetr => {
                decode_rf_detr(self, &outputs[0], &outputs[1], input_size, score_threshold)?
            }
        };

        tracing::trace!(
            layout = %self,
            candidates = candidates.len(),
            "Decoded raw output"
        );

        Ok(candidates)
    }
}

impl fmt::Display for OutputLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputLayout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "yolo-nas" | "yolonas" => Ok(OutputLayout::YoloNas),
            "yolov5" => Ok(OutputLayout::Yolov5),
            "yolov8" => Ok(OutputLayout::Yolov8),
            "rf-detr" | "rfdetr" => Ok(OutputLayout::RfDetr),
            other => Err(Error::Configuration(format!(
                "unknown output layout '{}' (expected yolo-nas, yolov5, yolov8 or rf-detr)",
                other
            ))),
        }
    }
}

fn decode_yolo_nas(
    layout: &OutputLayout,
    boxes: &ArrayD<f32>,
    scores: &ArrayD<f32>,
    score_threshold: f32,
) -> Result<Vec<Candidate>> {
    let boxes = batch_view(layout, boxes, "boxes")?;
    let scores = batch_view(layout, scores, "scores")?;

    expect_width(layout, &boxes, "boxes", |w| w == 4, "4")?;
    expect_width(layout, &scores, "scores", |c| c >= 1, "at least 1 class")?;
    expect_same_count(layout, boxes.nrows(), scores.nrows())?;

    let mut candidates = Vec::new();
    for (index, (b, s)) in boxes.rows().into_iter().zip(scores.rows()).enumerate() {
        let (class_id, score) = argmax(s);
        if !clears_floor(score, score_threshold) {
            continue;
        }
        candidates.push(Candidate {
            index,
            class_id: class_id as u32,
            score,
            bbox: BoundingBox::new(b[0], b[1], b[2], b[3]),
        });
    }
    Ok(candidates)
}

fn decode_yolov5(
    layout: &OutputLayout,
    output: &ArrayD<f32>,
    score_threshold: f32,
) -> Result<Vec<Candidate>> {
    let rows = batch_view(layout, output, "output")?;
    expect_width(layout, &rows, "output", |w| w >= 6, "5 + at least 1 class")?;

    let mut candidates = Vec::new();
    for (index, row) in rows.rows().into_iter().enumerate() {
        let objectness = row[4];
        let (class_id, class_score) = argmax(row.slice_move(ndarray::s![5..]));
        let score = objectness * class_score;
        if !clears_floor(score, score_threshold) {
            continue;
        }
        candidates.push(Candidate {
            index,
            class_id: class_id as u32,
            score,
            bbox: BoundingBox::from_cxcywh(row[0], row[1], row[2], row[3]),
        });
    }
    Ok(candidates)
}

fn decode_yolov8(
    layout: &OutputLayout,
    output: &ArrayD<f32>,
    score_threshold: f32,
) -> Result<Vec<Candidate>> {
    let channels = batch_view(layout, output, "output")?;
    if channels.nrows() < 5 {
        return Err(Error::MalformedOutput(format!(
            "{} output must be [1, 4 + C, N] with C >= 1, got shape {:?}",
            layout,
            output.shape()
        )));
    }

    // Columns are predictions once the channel axis is leading.
    let mut candidates = Vec::new();
    for (index, col) in channels.columns().into_iter().enumerate() {
        let (class_id, score) = argmax(col.slice_move(ndarray::s![4..]));
        if !clears_floor(score, score_threshold) {
            continue;
        }
        candidates.push(Candidate {
            index,
            class_id: class_id as u32,
            score,
            bbox: BoundingBox::from_cxcywh(col[0], col[1], col[2], col[3]),
        });
    }
    Ok(candidates)
}

fn decode_rf_detr(
    layout: &OutputLayout,
    dets: &ArrayD<f32>,
    logits: &ArrayD<f32>,
    input_size: (u32, u32),
    score_threshold: f32,
) -> Result<Vec<Candidate>> {
    let dets = batch_view(layout, dets, "dets")?;
    let logits = batch_view(layout, logits, "logits")?;

    expect_width(layout, &dets, "dets", |w| w == 4, "4")?;
    expect_width(layout, &logits, "logits", |c| c >= 2, "background + at least 1 class")?;
    expect_same_count(layout, dets.nrows(), logits.nrows())?;

    let input_width = input_size.0 as f32;
    let input_height = input_size.1 as f32;

    let mut candidates = Vec::new();
    for (index, (d, l)) in dets.rows().into_iter().zip(logits.rows()).enumerate() {
        // Index 0 is background; class ids are shifted down by one.
        let (class_idx, max_logit) = argmax(l.slice_move(ndarray::s![1..]));
        let score = sigmoid(max_logit);
        if !clears_floor(score, score_threshold) {
            continue;
        }

        let normalized = BoundingBox::from_cxcywh(d[0], d[1], d[2], d[3]);
        candidates.push(Candidate {
            index,
            class_id: class_idx as u32,
            score,
            bbox: BoundingBox::new(
                normalized.x1 * input_width,
                normalized.y1 * input_height,
                normalized.x2 * input_width,
                normalized.y2 * input_height,
            ),
        });
    }
    Ok(candidates)
}

/// View `[1, A, B]` as `[A, B]`.
fn batch_view<'a>(
    layout: &OutputLayout,
    tensor: &'a ArrayD<f32>,
    name: &str,
) -> Result<ArrayView2<'a, f32>> {
    let view = tensor.view().into_dimensionality::<Ix3>().map_err(|_| {
        Error::MalformedOutput(format!(
            "{} `{}` must have rank 3, got shape {:?}",
            layout,
            name,
            tensor.shape()
        ))
    })?;

    if view.len_of(Axis(0)) != 1 {
        return Err(Error::MalformedOutput(format!(
            "{} `{}` must have batch size 1, got shape {:?}",
            layout,
            name,
            tensor.shape()
        )));
    }

    Ok(view.index_axis_move(Axis(0), 0))
}

fn expect_width(
    layout: &OutputLayout,
    view: &ArrayView2<f32>,
    name: &str,
    ok: impl Fn(usize) -> bool,
    expected: &str,
) -> Result<()> {
    if !ok(view.ncols()) {
        return Err(Error::MalformedOutput(format!(
            "{} `{}` last dimension must be {}, got {}",
            layout,
            name,
            expected,
            view.ncols()
        )));
    }
    Ok(())
}

fn expect_same_count(layout: &OutputLayout, boxes: usize, scores: usize) -> Result<()> {
    if boxes != scores {
        return Err(Error::MalformedOutput(format!(
            "{} box and score tensors disagree on prediction count ({} vs {})",
            layout, boxes, scores
        )));
    }
    Ok(())
}

/// Highest value and its index; the lowest index wins ties and NaN never wins.
#[inline]
fn argmax(values: ArrayView1<f32>) -> (usize, f32) {
    let mut best = (0usize, f32::NEG_INFINITY);
    for (i, &v) in values.iter().enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }
    best
}

/// `score >= floor`, false for NaN.
#[inline]
fn clears_floor(score: f32, floor: f32) -> bool {
    score >= floor
}

/// Sigmoid activation function
#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
