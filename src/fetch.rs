use std::path::Path;
use tracing::{debug, info};
use url::Url;

use crate::cli::FetchArgs;
use snapfetch::{Config, Engine, RequestBuilder};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn run(args: FetchArgs) -> Result<(), AnyError> {
    let config = Config::load()?;
    let request = build_request(&args)?;

    let engine = Engine::builder().config(config).build()?;
    let result = engine.load(request).await;
    debug!(stats = %serde_json::to_string(&engine.stats())?, "Engine stats");
    engine.shutdown().await;
    let delivery = result?;

    let image = delivery.image.clone();
    let output = args.output.clone();
    tokio::task::spawn_blocking(move || image.save(&output)).await??;

    info!(
        width = delivery.image.width(),
        height = delivery.image.height(),
        from = %delivery.loaded_from,
        output = %args.output.display(),
        "Saved image"
    );
    Ok(())
}

fn build_request(args: &FetchArgs) -> Result<snapfetch::Request, AnyError> {
    let mut builder = RequestBuilder::from_uri(resolve_uri(&args.uri)?);

    if let Some((width, height)) = args.resize {
        builder = if args.only_if_bigger {
            builder.resize_only_if_bigger(width, height)?
        } else {
            builder.resize(width, height)?
        };
    }
    if args.center_crop {
        builder = builder.center_crop()?;
    }
    if args.center_inside {
        builder = builder.center_inside()?;
    }
    if args.max_side {
        builder = builder.resize_by_max_side()?;
    }
    if let Some(degrees) = args.rotate {
        builder = match args.pivot {
            Some((x, y)) => builder.rotate_about(degrees, x, y),
            None => builder.rotate(degrees),
        };
    }
    if let Some(format) = args.format {
        builder = builder.pixel_format(format);
    }

    Ok(builder.build()?)
}

/// Accept a URI, or a path to an existing local file.
fn resolve_uri(value: &str) -> Result<Url, AnyError> {
    let path = Path::new(value);
    if path.exists() {
        let absolute = std::fs::canonicalize(path)?;
        return Url::from_file_path(&absolute)
            .map_err(|_| format!("cannot turn '{}' into a file uri", absolute.display()).into());
    }
    Ok(Url::parse(value)?)
}
