pub mod fetcher;
pub mod proxy;

pub use fetcher::{detect_image_type, FetchedImage, HttpImageFetcher, ImageFetchError, ImageFetcher};
pub use proxy::{Download, DownloadError, DownloadProxy};
