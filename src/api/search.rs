use rocket::serde::json::Json;
use rocket::State;

use crate::api::ApiError;
use crate::models::search::{ImageResult, SearchRequest, TermParam};
use crate::search::SearchPipeline;

#[post("/buscar", data = "<request>")]
pub async fn search(
    request: Json<SearchRequest>,
    pipeline: &State<SearchPipeline>,
) -> Result<Json<Vec<ImageResult>>, ApiError> {
    let request = request.into_inner();
    let term = request.term.map(TermParam::value).unwrap_or_default();
    let page = request.page.and_then(|p| p.value());

    let results = pipeline.search(&term, page).await?;
    Ok(Json(results))
}
