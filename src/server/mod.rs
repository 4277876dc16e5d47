mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::api::MAX_K;
pub use self::state::*;
pub use self::types::MessageResponse;

/// 默认上传限制：10M
pub const DEFAULT_UPLOAD_LIMIT: usize = 1024 * 1024 * 10;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::analyze_outfit_handler,
        api::add_item_handler,
        api::rebuild_index_handler,
        api::search_handler,
        api::list_items_handler,
        api::delete_item_handler,
    ),
    components(schemas(
        types::AnalyzeOutfitForm,
        types::AddItemForm,
        types::SearchForm,
        types::MessageResponse,
        types::ErrorResponse,
        crate::catalog::CatalogItem,
        crate::outfit::OutfitComponent,
        crate::wardrobe::ListedItem,
    ))
)]
pub struct ApiDoc;

/// 构建API服务器
///
/// 原图和裁剪片段分别以静态文件的形式挂载在 `/images` 和 `/segments` 下。
pub fn create_app(state: Arc<AppState>, upload_limit: usize) -> Router {
    let data_dir = state.data_dir.clone();
    Router::new()
        .route("/analyze-outfit", post(api::analyze_outfit_handler))
        .route("/add-item", post(api::add_item_handler))
        .route("/rebuild-index", post(api::rebuild_index_handler))
        .route("/search", post(api::search_handler))
        .route("/items", get(api::list_items_handler))
        .route("/items/{filename}", delete(api::delete_item_handler))
        .nest_service("/images", ServeDir::new(data_dir.images()))
        .nest_service("/segments", ServeDir::new(data_dir.segments()))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_limit))
        .with_state(state)
}
