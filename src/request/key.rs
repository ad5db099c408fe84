use std::fmt::Write;

use super::{ImageSource, Request};

const KEY_SEPARATOR: char = '\n';

/// One line per output-affecting field, custom transformation keys last.
pub(super) fn create_key(request: &Request) -> String {
    let mut key = String::with_capacity(64);

    match &request.source {
        ImageSource::Uri(uri) => key.push_str(uri.as_str()),
        ImageSource::Resource(id) => {
            let _ = write!(key, "{id}");
        }
    }
    key.push(KEY_SEPARATOR);

    if request.rotation_degrees != 0.0 {
        let _ = write!(key, "rotation:{}", request.rotation_degrees);
        if let Some((px, py)) = request.rotation_pivot {
            let _ = write!(key, "@{px}x{py}");
        }
        key.push(KEY_SEPARATOR);
    }

    if let Some(resize) = request.resize {
        let _ = write!(key, "resize:{}x{}", resize.width, resize.height);
        if resize.only_if_bigger {
            key.push_str(":onlyIfBigger");
        }
        key.push(KEY_SEPARATOR);
    }

    if let Some(mode) = request.scale_mode {
        let _ = write!(key, "{mode}");
        key.push(KEY_SEPARATOR);
    }

    if let Some(format) = request.pixel_format {
        let _ = write!(key, "config:{format}");
        key.push(KEY_SEPARATOR);
    }

    for transformation in request.transformations().unwrap_or_default() {
        key.push_str(&transformation.key());
        key.push(KEY_SEPARATOR);
    }

    key
}
