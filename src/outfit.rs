use std::fs;
use std::path::Path;

use log::{debug, warn};
use opencv::core::{Mat, Rect};
use opencv::prelude::*;
use rand::distr::{Alphanumeric, SampleString};
use serde::Serialize;
use utoipa::ToSchema;

use crate::detection::{BBox, DetectionComponent};
use crate::error::{Error, Result};
use crate::utils::imencode_jpg;

/// 低于该置信度的检测结果不会被裁剪
pub const MIN_CONFIDENCE: f32 = 0.75;

/// 服装上的配件和局部区域，单独裁剪出来没有意义
pub const EXCLUDED_CATEGORIES: [&str; 20] = [
    "headband, head covering, hair accessory",
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

/// 穿搭中的一件单品及其裁剪结果
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OutfitComponent {
    pub category: String,
    pub confidence: f32,
    /// 裁剪图片的相对路径，形如 `segments/<name>.jpg`
    pub segment_path: String,
}

/// 过滤检测结果，每个类别只保留置信度最高的一个
///
/// 结果按类别第一次出现的顺序排列。
pub fn select_components(components: Vec<DetectionComponent>) -> Vec<DetectionComponent> {
    let mut selected: Vec<DetectionComponent> = vec![];
    for comp in components {
        if comp.confidence < MIN_CONFIDENCE || EXCLUDED_CATEGORIES.contains(&&*comp.category) {
            continue;
        }
        match selected.iter_mut().find(|c| c.category == comp.category) {
            Some(best) if comp.confidence > best.confidence => *best = comp,
            Some(_) => {}
            None => selected.push(comp),
        }
    }
    selected
}

/// 将检测框取整并限制在图片范围内，面积为 0 时返回 None
pub fn clamp_bbox(bbox: &BBox, (width, height): (i32, i32)) -> Option<Rect> {
    let clamp = |v: f32, max: i32| (v as i32).clamp(0, max);
    let (x1, y1) = (clamp(bbox.x1, width), clamp(bbox.y1, height));
    let (x2, y2) = (clamp(bbox.x2, width), clamp(bbox.y2, height));
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
}

/// 裁剪各个单品并保存到 `segments_dir`
pub fn crop_components(
    image: &Mat,
    components: &[DetectionComponent],
    segments_dir: &Path,
) -> Result<Vec<OutfitComponent>> {
    let mut output = vec![];
    for comp in components {
        let Some(rect) = clamp_bbox(&comp.bbox, (image.cols(), image.rows())) else {
            warn!("跳过空的检测框: {} {:?}", comp.category, comp.bbox);
            continue;
        };
        let cropped = Mat::roi(image, rect)?.try_clone()?;
        let data = imencode_jpg(&cropped)?;

        let name = format!("{}.jpg", Alphanumeric.sample_string(&mut rand::rng(), 16));
        let path = segments_dir.join(&name);
        fs::write(&path, data).map_err(|e| Error::io(&path, e))?;
        debug!("保存片段: {} -> {}", comp.category, path.display());

        output.push(OutfitComponent {
            category: comp.category.clone(),
            confidence: comp.confidence,
            segment_path: format!("segments/{name}"),
        });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(category: &str, confidence: f32) -> DetectionComponent {
        DetectionComponent {
            category: category.to_string(),
            confidence,
            bbox: BBox { x1: 0., y1: 0., x2: 10., y2: 10. },
        }
    }

    #[test]
    fn test_select_components_filters_and_dedups() {
        let components = vec![
            comp("pants", 0.8),
            comp("shoe", 0.7),
            comp("sleeve", 0.99),
            comp("shirt, blouse", 0.9),
            comp("pants", 0.95),
            comp("shirt, blouse", 0.85),
        ];
        let selected = select_components(components);
        assert_eq!(selected, vec![comp("pants", 0.95), comp("shirt, blouse", 0.9)]);
    }

    #[test]
    fn test_select_components_keeps_first_on_tie() {
        let mut first = comp("dress", 0.8);
        first.bbox.x2 = 5.;
        let selected = select_components(vec![first.clone(), comp("dress", 0.8)]);
        assert_eq!(selected, vec![first]);
    }

    #[test]
    fn test_select_components_boundary() {
        let selected = select_components(vec![comp("coat", 0.75)]);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn test_clamp_bbox() {
        let bbox = BBox { x1: -5.5, y1: 2.9, x2: 120.2, y2: 50.7 };
        assert_eq!(clamp_bbox(&bbox, (100, 100)), Some(Rect::new(0, 2, 100, 48)));

        let empty = BBox { x1: 10., y1: 10., x2: 10.5, y2: 20. };
        assert_eq!(clamp_bbox(&empty, (100, 100)), None);
    }
}
