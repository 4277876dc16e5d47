use std::fs;
use std::path::Path;

use indicatif::ProgressStyle;
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use opencv::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
        .expect("invalid progress bar template")
        .progress_chars("#>-")
}

/// 解析逗号分隔的标签，去掉首尾空白和空标签
pub fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(',').map(str::trim).filter(|t| !t.is_empty()).map(String::from).collect()
}

/// 检查上传的文件名，只允许单层文件名
pub fn check_filename(filename: &str) -> Result<()> {
    if filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\', '\0'])
    {
        return Err(Error::InvalidInput(format!("非法文件名: {filename:?}")));
    }
    Ok(())
}

/// 解码图片为 BGR 格式的 Mat
pub fn imdecode(bytes: &[u8]) -> Result<Mat> {
    let buf = Vector::<u8>::from_slice(bytes);
    let img = imgcodecs::imdecode(&buf, imgcodecs::IMREAD_COLOR)?;
    if img.empty() {
        return Err(Error::Provider("无法解码图片".to_string()));
    }
    Ok(img)
}

/// 将图片编码为 jpg
pub fn imencode_jpg(img: &impl opencv::core::ToInputArray) -> Result<Vec<u8>> {
    let mut buf = Vector::<u8>::new();
    imgcodecs::imencode(".jpg", img, &mut buf, &Vector::new())?;
    Ok(buf.to_vec())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_slice(&data).map_err(|e| Error::json(path, e))
}

/// 写入 JSON 文件，考虑到中途打断的情况，使用临时文件写入再重命名
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value).map_err(|e| Error::json(path, e))?;
    write_atomic(path, &data)
}

pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = tmp_path(path);
    fs::write(&tmp_path, data).map_err(|e| Error::io(&tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| Error::io(path, e))
}

/// 返回文件对应的临时文件路径
pub fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags("casual,summer"), vec!["casual", "summer"]);
        assert_eq!(parse_tags(" casual , ,summer ,"), vec!["casual", "summer"]);
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn test_check_filename() {
        assert!(check_filename("shirt.jpg").is_ok());
        assert!(check_filename("").is_err());
        assert!(check_filename("..").is_err());
        assert!(check_filename("../shirt.jpg").is_err());
        assert!(check_filename("a\\b.jpg").is_err());
    }

    #[test]
    fn test_tmp_path() {
        let path = Path::new("/data/index.npy");
        assert_eq!(tmp_path(path), Path::new("/data/index.npy.tmp"));
    }
}
