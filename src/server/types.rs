use axum::body::Bytes;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// 分析穿搭的请求
#[derive(TryFromMultipart)]
pub struct AnalyzeOutfitRequest {
    pub image: FieldData<Bytes>,
}

/// 分析穿搭表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct AnalyzeOutfitForm {
    /// 穿搭图片
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub image: String,
}

/// 添加单品的请求
#[derive(TryFromMultipart)]
pub struct AddItemRequest {
    pub image: FieldData<Bytes>,
    pub comment: String,
    pub tags: Option<String>,
}

/// 添加单品表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct AddItemForm {
    /// 单品图片，使用上传时的文件名保存
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub image: String,
    /// 描述
    pub comment: String,
    /// 标签，多个标签用逗号分隔
    pub tags: Option<String>,
}

/// 搜索请求
#[derive(TryFromMultipart)]
pub struct SearchRequest {
    pub image: FieldData<Bytes>,
    pub comment: Option<String>,
}

/// 搜索表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SearchForm {
    /// 查询图片
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub image: String,
    /// 查询文本，为空时只使用图片搜索
    pub comment: Option<String>,
}

/// 搜索的查询参数
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// 返回的最近邻数量，范围 1 到 50
    pub k: Option<usize>,
    /// 最大平方欧氏距离
    pub max_distance: Option<f32>,
}

/// 操作结果
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// 错误信息
#[derive(Debug, Serialize, ToSchema)]
#[allow(unused)]
pub struct ErrorResponse {
    pub error: String,
}
