use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum_typed_multipart::{TypedMultipart, TypedMultipartError};
use log::info;
use tokio::task::block_in_place;

use super::error::{Result, invalid_request};
use super::state::AppState;
use super::types::*;
use crate::catalog::CatalogItem;
use crate::error::Error;
use crate::outfit::OutfitComponent;
use crate::utils::parse_tags;
use crate::wardrobe::ListedItem;

/// 搜索时允许的最大 k
pub const MAX_K: usize = 50;

/// 检测穿搭中的单品并裁剪保存
#[utoipa::path(
    post,
    path = "/analyze-outfit",
    request_body(content = AnalyzeOutfitForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = Vec<OutfitComponent>),
        (status = 422, body = ErrorResponse),
    )
)]
pub async fn analyze_outfit_handler(
    State(state): State<Arc<AppState>>,
    data: Result<TypedMultipart<AnalyzeOutfitRequest>, TypedMultipartError>,
) -> Result<Json<Vec<OutfitComponent>>> {
    let TypedMultipart(data) = data.map_err(invalid_request)?;
    info!("正在分析上传的穿搭图片");
    let wardrobe = state.wardrobe.read().await;
    let components = block_in_place(|| wardrobe.analyze_outfit(&data.image.contents))?;
    Ok(Json(components))
}

/// 添加单品到服装库
#[utoipa::path(
    post,
    path = "/add-item",
    request_body(content = AddItemForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = MessageResponse),
        (status = 400, body = ErrorResponse),
    )
)]
pub async fn add_item_handler(
    State(state): State<Arc<AppState>>,
    data: Result<TypedMultipart<AddItemRequest>, TypedMultipartError>,
) -> Result<Json<MessageResponse>> {
    let TypedMultipart(data) = data.map_err(invalid_request)?;
    let filename = data
        .image
        .metadata
        .file_name
        .ok_or_else(|| Error::InvalidInput("文件名不能为空".to_string()))?;
    let tags = parse_tags(data.tags.as_deref().unwrap_or_default());

    let mut wardrobe = state.wardrobe.write().await;
    block_in_place(|| wardrobe.add_item(&filename, &data.image.contents, &data.comment, tags))?;
    Ok(Json(MessageResponse::new("Item added successfully")))
}

/// 根据服装库重建索引
#[utoipa::path(
    post,
    path = "/rebuild-index",
    responses(
        (status = 200, body = MessageResponse),
    )
)]
pub async fn rebuild_index_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>> {
    let mut wardrobe = state.wardrobe.write().await;
    block_in_place(|| wardrobe.rebuild_index())?;
    Ok(Json(MessageResponse::new("Index rebuilt successfully")))
}

/// 使用图片和可选的文本搜索单品
#[utoipa::path(
    post,
    path = "/search",
    params(SearchQuery),
    request_body(content = SearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = Vec<CatalogItem>),
        (status = 400, body = ErrorResponse),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SearchQuery>, QueryRejection>,
    data: Result<TypedMultipart<SearchRequest>, TypedMultipartError>,
) -> Result<Json<Vec<CatalogItem>>> {
    let Query(query) = query.map_err(|e| invalid_request(e.body_text()))?;
    let TypedMultipart(data) = data.map_err(invalid_request)?;
    let k = query.k.unwrap_or(state.search.k);
    if !(1..=MAX_K).contains(&k) {
        return Err(Error::InvalidInput(format!("k 的范围为 1 到 {MAX_K}")).into());
    }
    let max_distance = query.max_distance.unwrap_or(state.search.max_distance);

    let wardrobe = state.wardrobe.read().await;
    let result = block_in_place(|| {
        wardrobe.search(&data.image.contents, data.comment.as_deref(), k, max_distance)
    })?;
    Ok(Json(result.into_iter().map(|(_, item)| item).collect()))
}

/// 列出所有单品
#[utoipa::path(
    get,
    path = "/items",
    responses(
        (status = 200, body = Vec<ListedItem>),
    )
)]
pub async fn list_items_handler(State(state): State<Arc<AppState>>) -> Json<Vec<ListedItem>> {
    let wardrobe = state.wardrobe.read().await;
    Json(wardrobe.list_items())
}

/// 删除单品
#[utoipa::path(
    delete,
    path = "/items/{filename}",
    params(("filename" = String, Path, description = "图片文件名")),
    responses(
        (status = 200, body = MessageResponse),
        (status = 404, body = ErrorResponse),
    )
)]
pub async fn delete_item_handler(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Json<MessageResponse>> {
    let mut wardrobe = state.wardrobe.write().await;
    block_in_place(|| wardrobe.delete_item(&filename))?;
    Ok(Json(MessageResponse::new("Item deleted successfully")))
}
