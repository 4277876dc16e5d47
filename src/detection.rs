use std::path::Path;
use std::sync::Mutex;

use log::{debug, info};
use opencv::core::{CV_32F, Mat, Scalar, Size, Vector};
use opencv::dnn;
use opencv::prelude::*;
use serde::Serialize;

use crate::error::{Error, Result};

/// 检测模型内部使用的置信度阈值
pub const DETECTION_THRESHOLD: f32 = 0.5;

/// Fashionpedia 的 46 个类别，顺序与模型输出一致
pub const FASHIONPEDIA_LABELS: [&str; 46] = [
    "shirt, blouse",
    "top, t-shirt, sweatshirt",
    "sweater",
    "cardigan",
    "jacket",
    "vest",
    "pants",
    "shorts",
    "skirt",
    "coat",
    "dress",
    "jumpsuit",
    "cape",
    "glasses",
    "hat",
    "headband, head covering, hair accessory",
    "tie",
    "glove",
    "watch",
    "belt",
    "leg warmer",
    "tights, stockings",
    "sock",
    "shoe",
    "bag, wallet",
    "scarf",
    "umbrella",
    "hood",
    "collar",
    "lapel",
    "epaulette",
    "sleeve",
    "pocket",
    "neckline",
    "buckle",
    "zipper",
    "applique",
    "bead",
    "bow",
    "flower",
    "fringe",
    "ribbon",
    "rivet",
    "ruffle",
    "sequin",
    "tassel",
];

// ImageNet 的 RGB 均值与标准差
const PIXEL_MEAN: [f64; 3] = [123.675, 116.28, 103.53];
const PIXEL_STD: f64 = 0.226 * 255.;

/// 检测框，像素坐标 `(x1, y1, x2, y2)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// 单个检测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionComponent {
    pub category: String,
    pub confidence: f32,
    pub bbox: BBox,
}

/// 服装检测模型
pub trait Detector: Send + Sync {
    /// 检测 BGR 图片中的服装，只返回置信度不低于 [`DETECTION_THRESHOLD`] 的结果
    fn detect(&self, image: &Mat) -> Result<Vec<DetectionComponent>>;
}

/// 使用 OpenCV DNN 运行的 YOLOS Fashionpedia 模型
pub struct YolosDetector {
    net: Mutex<dnn::Net>,
    input_size: i32,
}

impl YolosDetector {
    /// 从 ONNX 文件加载模型
    ///
    /// # Arguments
    ///
    /// * `path` - ONNX 文件路径，输入为 `pixel_values`，输出为 `logits` 和 `pred_boxes`
    /// * `input_size` - 导出时固定的正方形输入尺寸
    pub fn new(path: impl AsRef<Path>, input_size: i32) -> Result<Self> {
        let path = path.as_ref();
        info!("加载检测模型: {}", path.display());
        let path = path.to_str().ok_or_else(|| Error::InvalidInput("模型路径不是 UTF-8".into()))?;
        let net = dnn::read_net_from_onnx(path)?;
        Ok(Self { net: Mutex::new(net), input_size })
    }
}

impl Detector for YolosDetector {
    fn detect(&self, image: &Mat) -> Result<Vec<DetectionComponent>> {
        let (width, height) = (image.cols() as f32, image.rows() as f32);
        let mean = Scalar::new(PIXEL_MEAN[0], PIXEL_MEAN[1], PIXEL_MEAN[2], 0.);
        let blob = dnn::blob_from_image(
            image,
            1. / PIXEL_STD,
            Size::new(self.input_size, self.input_size),
            mean,
            true,
            false,
            CV_32F,
        )?;

        let mut outputs = Vector::<Mat>::new();
        {
            let mut net = self.net.lock().map_err(Error::provider)?;
            net.set_input(&blob, "pixel_values", 1., Scalar::default())?;
            let names = Vector::<String>::from_iter(["logits".to_string(), "pred_boxes".to_string()]);
            net.forward(&mut outputs, &names)?;
        }
        let logits = outputs.get(0)?;
        let boxes = outputs.get(1)?;

        let components = decode_outputs(
            logits.data_typed::<f32>()?,
            boxes.data_typed::<f32>()?,
            (width, height),
            DETECTION_THRESHOLD,
        );
        debug!("检测到 {} 个部件", components.len());
        Ok(components)
    }
}

/// 解析 YOLOS 的输出
///
/// `logits` 的形状为 `(queries, classes + 1)`，最后一类表示“无目标”；`boxes` 的形状为
/// `(queries, 4)`，为相对输入尺寸归一化的 `(cx, cy, w, h)`。
pub fn decode_outputs(
    logits: &[f32],
    boxes: &[f32],
    (width, height): (f32, f32),
    threshold: f32,
) -> Vec<DetectionComponent> {
    let nq = boxes.len() / 4;
    if nq == 0 || logits.len() % nq != 0 {
        return vec![];
    }
    // 至少需要一个类别和“无目标”
    let nc = logits.len() / nq;
    if nc < 2 {
        return vec![];
    }

    let mut components = vec![];
    for (row, bbox) in logits.chunks_exact(nc).zip(boxes.chunks_exact(4)) {
        let probs = softmax(row);
        let Some((label, &score)) = probs[..nc - 1]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
        else {
            continue;
        };
        if score < threshold {
            continue;
        }
        let (cx, cy, w, h) = (bbox[0], bbox[1], bbox[2], bbox[3]);
        components.push(DetectionComponent {
            category: label_name(label),
            confidence: score,
            bbox: BBox {
                x1: (cx - w / 2.) * width,
                y1: (cy - h / 2.) * height,
                x2: (cx + w / 2.) * width,
                y2: (cy + h / 2.) * height,
            },
        });
    }
    components
}

fn label_name(label: usize) -> String {
    match FASHIONPEDIA_LABELS.get(label) {
        Some(name) => name.to_string(),
        None => format!("LABEL_{label}"),
    }
}

fn softmax(v: &[f32]) -> Vec<f32> {
    let max = v.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp = v.iter().map(|x| (x - max).exp()).collect::<Vec<_>>();
    let sum = exp.iter().sum::<f32>();
    exp.into_iter().map(|x| x / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 构造一个 3 类 + 无目标的 logits 行，目标类别的概率约为 `p`
    fn logits_row(label: usize, p: f32) -> Vec<f32> {
        let mut row = vec![0.; 4];
        // 其他 3 项的 exp 都为 1，令目标项为 3p/(1-p) 即可
        row[label] = (3. * p / (1. - p)).ln();
        row
    }

    #[test]
    fn test_softmax() {
        let p = softmax(&[0., 0.]);
        assert_eq!(p, vec![0.5, 0.5]);
    }

    #[test]
    fn test_decode_outputs() {
        let logits = [logits_row(0, 0.9), logits_row(1, 0.3), logits_row(2, 0.6)].concat();
        let boxes = [[0.5, 0.5, 0.2, 0.4], [0.1, 0.1, 0.1, 0.1], [0.25, 0.75, 0.5, 0.5]].concat();
        let components = decode_outputs(&logits, &boxes, (100., 200.), 0.5);

        assert_eq!(components.len(), 2);
        assert_eq!(components[0].category, "shirt, blouse");
        assert!((components[0].confidence - 0.9).abs() < 1e-4);
        let bbox = components[0].bbox;
        assert!((bbox.x1 - 40.).abs() < 1e-3);
        assert!((bbox.y1 - 60.).abs() < 1e-3);
        assert!((bbox.x2 - 60.).abs() < 1e-3);
        assert!((bbox.y2 - 140.).abs() < 1e-3);
        assert_eq!(components[1].category, "sweater");
    }

    #[test]
    fn test_decode_outputs_ignores_no_object() {
        // 只有“无目标”一类概率高
        let logits = vec![0., 0., 0., 10.];
        let boxes = vec![0.5, 0.5, 1., 1.];
        assert!(decode_outputs(&logits, &boxes, (10., 10.), 0.5).is_empty());
    }

    #[test]
    fn test_decode_outputs_malformed() {
        let boxes = vec![0.5, 0.5, 1., 1.];
        assert!(decode_outputs(&[], &boxes, (10., 10.), 0.5).is_empty());
        assert!(decode_outputs(&[3.], &boxes, (10., 10.), 0.5).is_empty());
        assert!(decode_outputs(&[1., 0.], &[], (10., 10.), 0.5).is_empty());
    }

    #[test]
    fn test_label_name() {
        assert_eq!(label_name(23), "shoe");
        assert_eq!(label_name(99), "LABEL_99");
    }
}
