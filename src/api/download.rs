use std::io::Cursor;

use rocket::http::{ContentType, Header, Status};
use rocket::{request::Request, response::{self, Responder, Response}, State};

use crate::api::ApiError;
use crate::images::{Download, DownloadProxy};

// Attachment responder for downloaded images
pub struct DownloadResponse(pub Download);

impl<'r> Responder<'r, 'static> for DownloadResponse {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let Download { data, content_type, filename } = self.0;

        let content_type = ContentType::parse_flexible(&content_type).unwrap_or(ContentType::JPEG);
        let etag = format!("\"{:x}\"", md5::compute(&data));

        if let Some(if_none_match) = req.headers().get_one("If-None-Match") {
            if if_none_match == etag {
                return Response::build()
                    .status(Status::NotModified)
                    .header(Header::new("ETag", etag))
                    .ok();
            }
        }

        Response::build()
            .header(content_type)
            .header(Header::new(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", filename.replace('"', "")),
            ))
            .header(Header::new("ETag", etag))
            .sized_body(data.len(), Cursor::new(data))
            .ok()
    }
}

#[get("/baixar_imagem?<url>")]
pub async fn download_image(
    url: Option<String>,
    proxy: &State<DownloadProxy>,
) -> Result<DownloadResponse, ApiError> {
    let reference = url.unwrap_or_default();
    let download = proxy.resolve(&reference).await?;
    Ok(DownloadResponse(download))
}
